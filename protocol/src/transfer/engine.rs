//! # Transfer Engine
//!
//! Owns the collaborators a device needs to move vouchers: the voucher
//! store, the Witness share cache, the clock, the lock manager and
//! (optionally) an identity key for signing Offers.
//!
//! The giver half lives in [`super::giver`], the receiver half in
//! [`super::receiver`]. Both are `impl TransferEngine` blocks so a single
//! engine can play either role, which is what a phone does.

use std::sync::Arc;

use tracing::info;

use super::error::TransferError;
use crate::clock::Clock;
use crate::config::TransferConfig;
use crate::crypto::keys::{Keypair, XOnlyPublicKey};
use crate::voucher::lock::{recover_expired_locks, TransferLockManager};
use crate::voucher::model::{Voucher, VoucherId};
use crate::voucher::store::{VoucherRepository, WitnessShareCache};

/// Device-side driver for the offer / ack exchange.
pub struct TransferEngine {
    pub(super) store: Arc<dyn VoucherRepository>,
    pub(super) witness_cache: Arc<dyn WitnessShareCache>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) locks: TransferLockManager,
    pub(super) config: TransferConfig,
    pub(super) identity: Option<Keypair>,
}

impl TransferEngine {
    pub fn new(
        store: Arc<dyn VoucherRepository>,
        witness_cache: Arc<dyn WitnessShareCache>,
        clock: Arc<dyn Clock>,
        config: TransferConfig,
    ) -> Self {
        let locks = TransferLockManager::new(store.clone(), clock.clone());
        Self {
            store,
            witness_cache,
            clock,
            locks,
            config,
            identity: None,
        }
    }

    /// Attach the device's long-lived identity key. Offers are signed with
    /// it when `sign_offers` is on.
    pub fn with_identity(mut self, identity: Keypair) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn identity(&self) -> Option<XOnlyPublicKey> {
        self.identity.as_ref().map(Keypair::public_key)
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn locks(&self) -> &TransferLockManager {
        &self.locks
    }

    /// Load a voucher record, failing on unknown ids.
    pub fn voucher(&self, id: &VoucherId) -> Result<Voucher, TransferError> {
        self.store
            .load(id)?
            .ok_or_else(|| TransferError::UnknownVoucher(id.to_hex()))
    }

    /// Startup sweep: every persisted lock that has lapsed goes back to
    /// `Active`. Returns the vouchers it touched.
    pub fn recover(&self) -> Result<Vec<VoucherId>, TransferError> {
        let recovered = recover_expired_locks(self.store.as_ref(), self.clock.now())?;
        if !recovered.is_empty() {
            info!(count = recovered.len(), "transfer engine recovered locks");
        }
        Ok(recovered)
    }

    pub(super) fn now(&self) -> u64 {
        self.clock.now()
    }
}
