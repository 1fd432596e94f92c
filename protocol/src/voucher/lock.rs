//! # Transfer Lock (write-ahead)
//!
//! Before an Offer QR goes on screen, the giver writes a [`TransferLock`]
//! into the voucher record: when it was taken, the challenge the Offer
//! carries, and how long it lasts. That record is the write-ahead log for
//! the transfer:
//!
//! - A second Offer for the same voucher can't be built while the lock is
//!   live. One voucher, one open transfer.
//! - Finalizing requires an ACK for *this* lock's challenge. An ACK for an
//!   older Offer doesn't match and gets refused.
//! - If the app dies mid-transfer, the lock is still in the store. After its
//!   TTL it reads as absent, and [`recover_expired_locks`] rewrites it.
//!
//! ## Concurrency
//!
//! The store is last-write-wins, so "load, check, save" needs an in-process
//! guard to be atomic. [`TransferLockManager`] keeps one mutex per voucher
//! id. Different vouchers never contend.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::model::{Status, StatusError, StatusEvent, Voucher, VoucherId};
use super::store::{StoreError, VoucherRepository};
use crate::clock::Clock;
use crate::config::{CHALLENGE_LENGTH, DEFAULT_LOCK_TTL_SECS};
use crate::sharing::ShareRole;

// ---------------------------------------------------------------------------
// TransferLock
// ---------------------------------------------------------------------------

/// The write-ahead record of one in-flight transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLock {
    /// Unix seconds when the lock was taken.
    pub lock_timestamp: u64,
    /// The challenge embedded in the Offer this lock guards.
    pub challenge: [u8; CHALLENGE_LENGTH],
    pub ttl_secs: u64,
}

impl TransferLock {
    pub fn new(lock_timestamp: u64, challenge: [u8; CHALLENGE_LENGTH], ttl_secs: u64) -> Self {
        Self {
            lock_timestamp,
            challenge,
            ttl_secs,
        }
    }

    /// With the default five-minute TTL.
    pub fn with_default_ttl(lock_timestamp: u64, challenge: [u8; CHALLENGE_LENGTH]) -> Self {
        Self::new(lock_timestamp, challenge, DEFAULT_LOCK_TTL_SECS)
    }

    pub fn expires_at(&self) -> u64 {
        self.lock_timestamp.saturating_add(self.ttl_secs)
    }

    /// `now < lock_timestamp + ttl`.
    pub fn is_live(&self, now: u64) -> bool {
        now < self.expires_at()
    }

    pub fn remaining_secs(&self, now: u64) -> u64 {
        self.expires_at().saturating_sub(now)
    }
}

/// Whether a voucher is locked. Derived from [`Status`], never stored
/// separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked(TransferLock),
}

impl LockState {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked(_))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from lock operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    /// Another transfer holds a live lock. Retry later.
    #[error("voucher {voucher_id} is locked by another transfer; retry in {retry_after_secs}s")]
    LockUnavailable {
        voucher_id: String,
        retry_after_secs: u64,
    },

    /// The lock ran out before the transfer completed.
    #[error("transfer lock expired")]
    LockExpired,

    #[error("unknown voucher: {0}")]
    UnknownVoucher(String),

    #[error("voucher is not transferable (status: {status})")]
    NotTransferable { status: String },

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// TransferLockManager
// ---------------------------------------------------------------------------

/// Acquires, checks and releases transfer locks on stored vouchers.
pub struct TransferLockManager {
    store: Arc<dyn VoucherRepository>,
    clock: Arc<dyn Clock>,
    guards: DashMap<VoucherId, Arc<Mutex<()>>>,
}

impl TransferLockManager {
    pub fn new(store: Arc<dyn VoucherRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            guards: DashMap::new(),
        }
    }

    /// Run `f` under the voucher's mutex.
    ///
    /// The mutex entry is dropped again once nobody else is waiting on it, so
    /// the table only holds vouchers with an operation in flight.
    fn with_guard<T>(&self, id: &VoucherId, f: impl FnOnce() -> T) -> T {
        let guard = self
            .guards
            .entry(*id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let out = {
            let _held = guard.lock();
            f()
        };
        drop(guard);
        self.guards.remove_if(id, |_, g| Arc::strong_count(g) == 1);
        out
    }

    fn load(&self, id: &VoucherId) -> Result<Voucher, LockError> {
        self.store
            .load(id)?
            .ok_or_else(|| LockError::UnknownVoucher(id.to_hex()))
    }

    /// Take the lock for a new Offer.
    ///
    /// Fails with `LockUnavailable` while another live lock exists, and with
    /// `NotTransferable` unless the voucher is effectively `Active`, unexpired
    /// and holding its Traveler share.
    pub fn acquire(
        &self,
        id: &VoucherId,
        challenge: [u8; CHALLENGE_LENGTH],
        ttl_secs: u64,
    ) -> Result<TransferLock, LockError> {
        self.with_guard(id, || -> Result<TransferLock, LockError> {
            let mut voucher = self.load(id)?;
            let now = self.clock.now();

            if let LockState::Locked(existing) = voucher.lock_state(now) {
                debug!(voucher_id = %id.short(), "lock contention");
                return Err(LockError::LockUnavailable {
                    voucher_id: id.to_hex(),
                    retry_after_secs: existing.remaining_secs(now),
                });
            }
            if !voucher.is_transferable(now) {
                return Err(LockError::NotTransferable {
                    status: voucher.status.effective(now).to_string(),
                });
            }

            let lock = TransferLock::new(now, challenge, ttl_secs);
            voucher.apply(StatusEvent::Lock(lock), now)?;
            self.store.save(&voucher)?;

            info!(voucher_id = %id.short(), ttl_secs, "transfer lock acquired");
            Ok(lock)
        })
    }

    /// Clear the lock, live or not, whichever Offer it belongs to. Idempotent;
    /// a no-op on vouchers that aren't locked (including terminal ones).
    ///
    /// For operator and recovery use. A transfer session backing out of its
    /// own Offer uses [`release_if`](Self::release_if).
    pub fn release(&self, id: &VoucherId) -> Result<(), LockError> {
        self.with_guard(id, || -> Result<(), LockError> {
            let Some(mut voucher) = self.store.load(id)? else {
                return Ok(());
            };
            if matches!(voucher.status, Status::LockedForTransfer(_)) {
                voucher.apply(StatusEvent::Release, self.clock.now())?;
                self.store.save(&voucher)?;
                info!(voucher_id = %id.short(), "transfer lock released");
            }
            Ok(())
        })
    }

    /// Clear the lock only if it still guards the Offer with `challenge`.
    ///
    /// Returns `true` when a stored lock was cleared. A live lock taken by a
    /// later Offer is left alone and reported as `false`.
    pub fn release_if(
        &self,
        id: &VoucherId,
        challenge: &[u8; CHALLENGE_LENGTH],
    ) -> Result<bool, LockError> {
        self.with_guard(id, || -> Result<bool, LockError> {
            let Some(mut voucher) = self.store.load(id)? else {
                return Ok(false);
            };
            if !matches!(voucher.status, Status::LockedForTransfer(_)) {
                return Ok(false);
            }
            let event = StatusEvent::Withdraw {
                challenge: *challenge,
            };
            match voucher.apply(event, self.clock.now()) {
                Ok(()) => {
                    self.store.save(&voucher)?;
                    info!(voucher_id = %id.short(), "transfer lock released");
                    Ok(true)
                }
                Err(StatusError::ChallengeMismatch) => {
                    debug!(voucher_id = %id.short(), "lock belongs to a newer offer; kept");
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// `true` while a live lock is held on the voucher.
    pub fn is_live(&self, id: &VoucherId) -> Result<bool, LockError> {
        Ok(self.current(id)?.is_some())
    }

    /// The live lock, if any.
    pub fn current(&self, id: &VoucherId) -> Result<Option<TransferLock>, LockError> {
        let voucher = self.load(id)?;
        match voucher.lock_state(self.clock.now()) {
            LockState::Locked(lock) => Ok(Some(lock)),
            LockState::Unlocked => Ok(None),
        }
    }

    /// Complete the transfer guarded by `challenge`: mark the voucher
    /// `Spent` and drop the Traveler share, in one write.
    ///
    /// An expired lock is rewritten to `Active` and reported as `LockExpired`.
    pub fn commit_spend(
        &self,
        id: &VoucherId,
        challenge: [u8; CHALLENGE_LENGTH],
    ) -> Result<Voucher, LockError> {
        self.with_guard(id, || -> Result<Voucher, LockError> {
            let mut voucher = self.load(id)?;
            let now = self.clock.now();

            match voucher.apply(StatusEvent::Spend { challenge }, now) {
                Ok(()) => {
                    // The giver no longer holds the voucher.
                    drop(voucher.shares.take(ShareRole::Traveler));
                    self.store.save(&voucher)?;
                    info!(voucher_id = %id.short(), "voucher spent");
                    Ok(voucher)
                }
                Err(StatusError::LockExpired) => {
                    voucher.apply(StatusEvent::Release, now)?;
                    self.store.save(&voucher)?;
                    warn!(voucher_id = %id.short(), "lock expired before finalization");
                    Err(LockError::LockExpired)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    #[cfg(test)]
    fn tracked_guards(&self) -> usize {
        self.guards.len()
    }
}

/// Rewrite every persisted lock that is no longer live back to `Active`.
///
/// Run once at startup. Returns the ids it touched.
pub fn recover_expired_locks(
    store: &dyn VoucherRepository,
    now: u64,
) -> Result<Vec<VoucherId>, LockError> {
    let mut recovered = Vec::new();
    for id in store.list_ids()? {
        let Some(mut voucher) = store.load(&id)? else {
            continue;
        };
        if let Status::LockedForTransfer(lock) = voucher.status {
            if !lock.is_live(now) {
                voucher.apply(StatusEvent::Release, now)?;
                store.save(&voucher)?;
                recovered.push(id);
            }
        }
    }
    if !recovered.is_empty() {
        info!(count = recovered.len(), "recovered expired transfer locks");
    }
    Ok(recovered)
}
