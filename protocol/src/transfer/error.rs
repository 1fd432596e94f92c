//! Error types for the transfer protocol.
//!
//! Every transfer operation returns a [`TransferError`]. Component errors
//! convert in with `?`; the variants below name the protocol-level outcomes
//! a UI has to tell apart.

use thiserror::Error;

use super::wire::{OfferSignError, WireError};
use crate::crypto::encryption::EncryptionError;
use crate::crypto::keys::KeyError;
use crate::crypto::signatures::SignatureError;
use crate::sharing::SharingError;
use crate::voucher::lock::LockError;
use crate::voucher::model::StatusError;
use crate::voucher::store::StoreError;

/// Errors that can occur during a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Fewer than two shares were available to rebuild the key.
    #[error("insufficient shares: {0}")]
    InsufficientShares(SharingError),

    /// Share interpolation hit corrupted data.
    #[error("share reconstruction failed: {0}")]
    ReconstructionCorruption(SharingError),

    /// AES-GCM rejected the encrypted Traveler share.
    #[error("traveler share failed authentication")]
    AuthenticationFailure,

    /// An ACK or Offer signature did not verify.
    #[error("signature invalid")]
    SignatureInvalid,

    /// The scanned payload is structurally broken.
    #[error("wire format invalid: {0}")]
    WireFormatInvalid(#[from] WireError),

    /// Another transfer holds the voucher. Retry later.
    #[error("voucher busy; retry in {retry_after_secs}s")]
    LockUnavailable { retry_after_secs: u64 },

    /// The transfer lock lapsed; the voucher is back to `Active`.
    #[error("transfer lock expired")]
    LockExpired,

    /// The Offer is older than its validity window.
    #[error("offer expired: built at {timestamp}, now {now}")]
    OfferExpired { timestamp: u64, now: u64 },

    /// The Offer claims a time too far in the future.
    #[error("offer timestamp {timestamp} is ahead of local time {now}")]
    OfferFromFuture { timestamp: u64, now: u64 },

    /// No Witness share is cached for this voucher on this device.
    #[error("witness share not available for voucher {0}")]
    WitnessShareUnavailable(String),

    /// The rebuilt key doesn't belong to the voucher id in the Offer.
    #[error("reconstructed key does not match voucher id")]
    KeyMismatch,

    /// This device already holds the voucher the Offer describes.
    #[error("offer for voucher {0} already accepted")]
    DuplicateOffer(String),

    /// The receiver turned the Offer down.
    #[error("transfer declined by receiver")]
    TransferDeclined,

    /// The ACK belongs to a different voucher than the open session.
    #[error("ack is for voucher {got}, session is for {expected}")]
    VoucherMismatch { expected: String, got: String },

    /// The voucher isn't in a state that allows this step.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unknown voucher: {0}")]
    UnknownVoucher(String),

    #[error("voucher not transferable (status: {0})")]
    NotTransferable(String),

    #[error("unsupported ack status byte 0x{0:02x}")]
    UnsupportedAckStatus(u8),

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("signing failed: {0}")]
    Signing(SignatureError),

    #[error("encryption failed: {0}")]
    Encryption(EncryptionError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl TransferError {
    /// `true` for outcomes the caller can recover from locally by waiting or
    /// retrying. Cryptographic and wire failures are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransferError::LockUnavailable { .. } | TransferError::LockExpired
        )
    }
}

impl From<SharingError> for TransferError {
    fn from(e: SharingError) -> Self {
        match e {
            SharingError::InsufficientShares(_) => TransferError::InsufficientShares(e),
            _ => TransferError::ReconstructionCorruption(e),
        }
    }
}

impl From<EncryptionError> for TransferError {
    fn from(e: EncryptionError) -> Self {
        match e {
            EncryptionError::AuthenticationFailure => TransferError::AuthenticationFailure,
            other => TransferError::Encryption(other),
        }
    }
}

impl From<SignatureError> for TransferError {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::SigningFailed => TransferError::Signing(e),
            _ => TransferError::SignatureInvalid,
        }
    }
}

impl From<OfferSignError> for TransferError {
    fn from(e: OfferSignError) -> Self {
        match e {
            OfferSignError::Wire(w) => w.into(),
            OfferSignError::Signature(s) => s.into(),
        }
    }
}

impl From<StatusError> for TransferError {
    fn from(e: StatusError) -> Self {
        match e {
            StatusError::LockExpired => TransferError::LockExpired,
            other => TransferError::InvalidState(other.to_string()),
        }
    }
}

impl From<LockError> for TransferError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::LockUnavailable {
                retry_after_secs, ..
            } => TransferError::LockUnavailable { retry_after_secs },
            LockError::LockExpired => TransferError::LockExpired,
            LockError::UnknownVoucher(id) => TransferError::UnknownVoucher(id),
            LockError::NotTransferable { status } => TransferError::NotTransferable(status),
            LockError::Status(s) => s.into(),
            LockError::Store(s) => TransferError::Store(s),
        }
    }
}
