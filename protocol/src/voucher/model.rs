//! # Voucher Model
//!
//! A voucher is a bearer token whose identity is the x-only public key of a
//! keypair nobody holds in one piece. The record a device keeps about a
//! voucher carries its face value, who issued it, its lifecycle [`Status`],
//! and whichever of the three key shares *this* device happens to hold.
//!
//! ## Lifecycle
//!
//! ```text
//! Issued --Publish--> Pending --Activate--> Active --Lock--> LockedForTransfer
//!                                             ^                  |    |
//!                                             +-----Release------+    +--Spend--> Spent
//!                                             +-----Withdraw-----+
//!
//! any non-terminal --Expire--> Expired
//! any non-terminal --Burn----> Burned
//! ```
//!
//! Every transition goes through [`Status::apply`]. There are no boolean
//! flags to keep in sync; "is this voucher transferable" is answered in
//! exactly one place ([`Voucher::is_transferable`]).
//!
//! ## Expired locks
//!
//! A `LockedForTransfer` status whose lock has run out of TTL *is* `Active`.
//! [`Status::effective`] performs that rewrite, and every check that cares
//! about the present goes through it. A crashed app that left a lock behind
//! therefore never blocks the voucher for longer than the TTL.
//!
//! `Release` clears any lock. `Withdraw` is what a transfer session uses to
//! back out: it only clears the lock carrying that session's challenge, so an
//! abandoned Offer can't unlock the newer Offer that replaced it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use super::lock::{LockState, TransferLock};
use crate::config::{CHALLENGE_LENGTH, SHARE_LENGTH};
use crate::crypto::keys::{KeyError, XOnlyPublicKey};
use crate::sharing::{self, ShareBytes, ShareRole, SharingError};

// ---------------------------------------------------------------------------
// VoucherId
// ---------------------------------------------------------------------------

/// A voucher's identity: the x-only public key of its split keypair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoucherId(XOnlyPublicKey);

impl VoucherId {
    pub fn new(public_key: XOnlyPublicKey) -> Self {
        Self(public_key)
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        XOnlyPublicKey::from_bytes(bytes).map(Self)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        XOnlyPublicKey::from_hex(s).map(Self)
    }

    /// The public key signatures are checked against.
    pub fn public_key(&self) -> &XOnlyPublicKey {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// First 8 bytes in hex, for log lines.
    pub fn short(&self) -> String {
        self.to_hex()[..16].to_string()
    }
}

impl From<XOnlyPublicKey> for VoucherId {
    fn from(pk: XOnlyPublicKey) -> Self {
        Self(pk)
    }
}

impl fmt::Display for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoucherId({})", self.short())
    }
}

impl Serialize for VoucherId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VoucherId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        XOnlyPublicKey::deserialize(deserializer).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a voucher record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Minted locally, witness share not yet published.
    Issued,
    /// Witness share published, waiting for the market to pick it up.
    Pending,
    /// Spendable.
    Active,
    /// An Offer is out. Carries the write-ahead lock.
    LockedForTransfer(TransferLock),
    /// Handed over. Terminal.
    Spent,
    /// Past its validity date. Terminal.
    Expired,
    /// Destroyed by the issuer. Terminal.
    Burned,
}

/// Something that happens to a voucher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusEvent {
    /// The witness share went out to the market.
    Publish,
    /// The market acknowledged the voucher.
    Activate,
    /// An Offer was built; take the transfer lock.
    Lock(TransferLock),
    /// Clear the transfer lock, whoever holds it.
    Release,
    /// The transfer attempt with this challenge ended without a handover.
    Withdraw { challenge: [u8; CHALLENGE_LENGTH] },
    /// A valid ACK for the given challenge came back.
    Spend { challenge: [u8; CHALLENGE_LENGTH] },
    /// The voucher's validity date passed.
    Expire,
    /// The issuer destroyed the voucher.
    Burn,
}

impl StatusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StatusEvent::Publish => "publish",
            StatusEvent::Activate => "activate",
            StatusEvent::Lock(_) => "lock",
            StatusEvent::Release => "release",
            StatusEvent::Withdraw { .. } => "withdraw",
            StatusEvent::Spend { .. } => "spend",
            StatusEvent::Expire => "expire",
            StatusEvent::Burn => "burn",
        }
    }
}

/// Rejected status transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("cannot {event} a voucher in state {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    #[error("spend challenge does not match the active transfer lock")]
    ChallengeMismatch,

    #[error("transfer lock has expired")]
    LockExpired,
}

impl Status {
    /// Short lowercase name, for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Issued => "issued",
            Status::Pending => "pending",
            Status::Active => "active",
            Status::LockedForTransfer(_) => "locked_for_transfer",
            Status::Spent => "spent",
            Status::Expired => "expired",
            Status::Burned => "burned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Spent | Status::Expired | Status::Burned)
    }

    /// The status as of `now`: a lapsed transfer lock reads as `Active`.
    pub fn effective(&self, now: u64) -> Status {
        match self {
            Status::LockedForTransfer(lock) if !lock.is_live(now) => Status::Active,
            other => *other,
        }
    }

    /// The lock view of this status as of `now`.
    pub fn lock_state(&self, now: u64) -> LockState {
        match self.effective(now) {
            Status::LockedForTransfer(lock) => LockState::Locked(lock),
            _ => LockState::Unlocked,
        }
    }

    /// The one transition function.
    ///
    /// Works on the effective status, so an expired lock can be re-locked and
    /// a `Spend` against an expired lock fails with `LockExpired`.
    pub fn apply(&self, event: StatusEvent, now: u64) -> Result<Status, StatusError> {
        let current = self.effective(now);
        let invalid = || StatusError::InvalidTransition {
            from: current.name(),
            event: event.name(),
        };

        if current.is_terminal() {
            return Err(invalid());
        }

        match (current, event) {
            (Status::Issued, StatusEvent::Publish) => Ok(Status::Pending),
            (Status::Pending, StatusEvent::Activate) => Ok(Status::Active),
            (Status::Active, StatusEvent::Lock(lock)) => {
                if lock.is_live(now) {
                    Ok(Status::LockedForTransfer(lock))
                } else {
                    Err(StatusError::LockExpired)
                }
            }
            (Status::LockedForTransfer(_), StatusEvent::Release) => Ok(Status::Active),
            // Releasing an absent lock is a no-op.
            (Status::Active, StatusEvent::Release) => Ok(Status::Active),
            (Status::LockedForTransfer(lock), StatusEvent::Withdraw { challenge }) => {
                if lock.challenge == challenge {
                    Ok(Status::Active)
                } else {
                    Err(StatusError::ChallengeMismatch)
                }
            }
            (Status::Active, StatusEvent::Withdraw { .. }) => Ok(Status::Active),
            (Status::LockedForTransfer(lock), StatusEvent::Spend { challenge }) => {
                if lock.challenge == challenge {
                    Ok(Status::Spent)
                } else {
                    Err(StatusError::ChallengeMismatch)
                }
            }
            (Status::Active, StatusEvent::Spend { .. }) => {
                // The stored status may still say locked; only the TTL ran out.
                if matches!(self, Status::LockedForTransfer(_)) {
                    Err(StatusError::LockExpired)
                } else {
                    Err(invalid())
                }
            }
            (_, StatusEvent::Expire) => Ok(Status::Expired),
            (_, StatusEvent::Burn) => Ok(Status::Burned),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ShareSet
// ---------------------------------------------------------------------------

/// The shares of one voucher key that this device holds.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSet {
    anchor: Option<ShareBytes>,
    traveler: Option<ShareBytes>,
    witness: Option<ShareBytes>,
}

impl ShareSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, role: ShareRole) -> &Option<ShareBytes> {
        match role {
            ShareRole::Anchor => &self.anchor,
            ShareRole::Traveler => &self.traveler,
            ShareRole::Witness => &self.witness,
        }
    }

    fn slot_mut(&mut self, role: ShareRole) -> &mut Option<ShareBytes> {
        match role {
            ShareRole::Anchor => &mut self.anchor,
            ShareRole::Traveler => &mut self.traveler,
            ShareRole::Witness => &mut self.witness,
        }
    }

    pub fn get(&self, role: ShareRole) -> Option<&ShareBytes> {
        self.slot(role).as_ref()
    }

    pub fn contains(&self, role: ShareRole) -> bool {
        self.slot(role).is_some()
    }

    /// Store a share, replacing (and wiping) any previous one.
    pub fn insert(&mut self, role: ShareRole, share: ShareBytes) {
        *self.slot_mut(role) = Some(share);
    }

    /// Take a share out. The caller now owns its wiping.
    pub fn take(&mut self, role: ShareRole) -> Option<ShareBytes> {
        self.slot_mut(role).take()
    }

    /// Roles currently held, in x-coordinate order.
    pub fn roles(&self) -> Vec<ShareRole> {
        ShareRole::ALL
            .into_iter()
            .filter(|r| self.contains(*r))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.roles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild the voucher secret from whatever is held.
    pub fn combine(&self) -> Result<Zeroizing<[u8; SHARE_LENGTH]>, SharingError> {
        sharing::combine(&[
            self.anchor.as_ref(),
            self.traveler.as_ref(),
            self.witness.as_ref(),
        ])
    }
}

impl fmt::Debug for ShareSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.roles()).finish()
    }
}

// ---------------------------------------------------------------------------
// Voucher
// ---------------------------------------------------------------------------

/// A device's record of one voucher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    /// Face value in minor units.
    pub value: u32,
    pub issuer: XOnlyPublicKey,
    /// Display name of the issuer, at most 20 UTF-8 bytes on the wire.
    pub issuer_name: String,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds; `None` never expires.
    pub expires_at: Option<u64>,
    pub status: Status,
    pub shares: ShareSet,
}

impl Voucher {
    /// `true` once `expires_at` has passed.
    pub fn is_past_expiry(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|t| now >= t)
    }

    /// The authoritative "can I hand this over right now" check: effectively
    /// `Active`, not past expiry, and we hold the Traveler share to give.
    pub fn is_transferable(&self, now: u64) -> bool {
        self.status.effective(now) == Status::Active
            && !self.is_past_expiry(now)
            && self.shares.contains(ShareRole::Traveler)
    }

    pub fn lock_state(&self, now: u64) -> LockState {
        self.status.lock_state(now)
    }

    /// Apply an event, replacing the status on success and leaving it
    /// untouched on failure.
    pub fn apply(&mut self, event: StatusEvent, now: u64) -> Result<(), StatusError> {
        self.status = self.status.apply(event, now)?;
        Ok(())
    }
}
