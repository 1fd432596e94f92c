//! # Storage Collaborators
//!
//! The protocol core does not own persistence. It talks to two traits:
//!
//! - [`VoucherRepository`]: a keyed record store for [`Voucher`]s with
//!   last-write-wins semantics. Sync, because every real backend the app
//!   uses (a local key-value file) answers in microseconds.
//! - [`WitnessShareCache`]: decrypted Witness shares synced from the market
//!   relay. Async, because a cache miss may turn into a network fetch.
//!
//! The in-memory implementations here back the tests and the CLI. The
//! voucher store keeps records as `bincode` bytes rather than live structs,
//! so anything that survives a round trip through it would also survive a
//! process restart.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use super::model::{Voucher, VoucherId};
use crate::sharing::ShareBytes;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by storage backends.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Persistent voucher records, keyed by voucher id.
pub trait VoucherRepository: Send + Sync {
    fn load(&self, id: &VoucherId) -> StoreResult<Option<Voucher>>;

    /// Insert or overwrite.
    fn save(&self, voucher: &Voucher) -> StoreResult<()>;

    /// Every stored id. Used by the crash-recovery sweep.
    fn list_ids(&self) -> StoreResult<Vec<VoucherId>>;
}

/// Locally available, already-decrypted Witness shares.
#[async_trait]
pub trait WitnessShareCache: Send + Sync {
    async fn get(&self, id: &VoucherId) -> StoreResult<Option<ShareBytes>>;

    async fn put(&self, id: VoucherId, share: ShareBytes) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// A [`VoucherRepository`] over a concurrent map of `bincode` blobs.
#[derive(Debug, Default)]
pub struct MemoryVoucherStore {
    records: DashMap<VoucherId, Vec<u8>>,
}

impl MemoryVoucherStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl VoucherRepository for MemoryVoucherStore {
    fn load(&self, id: &VoucherId) -> StoreResult<Option<Voucher>> {
        match self.records.get(id) {
            Some(bytes) => bincode::deserialize(bytes.value())
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn save(&self, voucher: &Voucher) -> StoreResult<()> {
        let bytes =
            bincode::serialize(voucher).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.records.insert(voucher.id, bytes);
        Ok(())
    }

    fn list_ids(&self) -> StoreResult<Vec<VoucherId>> {
        let mut ids: Vec<VoucherId> = self.records.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        Ok(ids)
    }
}

/// A [`WitnessShareCache`] that never goes to the network.
#[derive(Debug, Default)]
pub struct MemoryWitnessCache {
    shares: DashMap<VoucherId, ShareBytes>,
}

impl MemoryWitnessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a cached share, e.g. to simulate a device that never synced.
    pub fn evict(&self, id: &VoucherId) {
        self.shares.remove(id);
    }
}

#[async_trait]
impl WitnessShareCache for MemoryWitnessCache {
    async fn get(&self, id: &VoucherId) -> StoreResult<Option<ShareBytes>> {
        Ok(self.shares.get(id).map(|entry| entry.value().clone()))
    }

    async fn put(&self, id: VoucherId, share: ShareBytes) -> StoreResult<()> {
        self.shares.insert(id, share);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use crate::voucher::model::{ShareSet, Status};

    fn voucher(value: u32) -> Voucher {
        Voucher {
            id: VoucherId::new(Keypair::generate().public_key()),
            value,
            issuer: Keypair::generate().public_key(),
            issuer_name: "Market".into(),
            created_at: 0,
            expires_at: None,
            status: Status::Active,
            shares: ShareSet::new(),
        }
    }

    #[test]
    fn save_then_load() {
        let store = MemoryVoucherStore::new();
        let v = voucher(100);
        assert_eq!(store.load(&v.id).unwrap(), None);
        store.save(&v).unwrap();
        assert_eq!(store.load(&v.id).unwrap(), Some(v));
    }

    #[test]
    fn last_write_wins() {
        let store = MemoryVoucherStore::new();
        let mut v = voucher(100);
        store.save(&v).unwrap();
        v.status = Status::Spent;
        store.save(&v).unwrap();
        assert_eq!(store.load(&v.id).unwrap().unwrap().status, Status::Spent);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn list_ids_is_sorted() {
        let store = MemoryVoucherStore::new();
        for value in 0..5 {
            store.save(&voucher(value)).unwrap();
        }
        let ids = store.list_ids().unwrap();
        assert_eq!(ids.len(), 5);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn witness_cache_get_put_evict() {
        let cache = MemoryWitnessCache::new();
        let id = VoucherId::new(Keypair::generate().public_key());
        assert!(cache.get(&id).await.unwrap().is_none());

        cache.put(id, ShareBytes::new([3; 32])).await.unwrap();
        assert_eq!(cache.get(&id).await.unwrap(), Some(ShareBytes::new([3; 32])));

        cache.evict(&id);
        assert!(cache.get(&id).await.unwrap().is_none());
    }
}
