//! # Giver Side
//!
//! ```text
//! create_offer:  load voucher -> fetch P3 -> key = H(P3) -> seal P2
//!                -> fresh challenge -> sign (optional) -> encode
//!                -> take TransferLock
//! finalize:      decode ack -> check status -> verify sig over challenge
//!                -> commit_spend (drop P2, mark Spent)
//! ```
//!
//! The lock is taken last so a failure anywhere in offer construction
//! leaves the voucher untouched. Once the lock is held, every failure path
//! releases it again; the only exception is a malformed ACK scan, which
//! keeps the session open for another try.

use rand::RngCore;
use tracing::{info, warn};

use super::engine::TransferEngine;
use super::error::TransferError;
use super::state::{TransferRole, TransferState, TransferStateMachine};
use super::wire::{challenge_digest, AckStatus, WireAck, WireOffer, OFFER_LENGTH};
use crate::config::{CHALLENGE_LENGTH, SHARE_LENGTH};
use crate::crypto::encryption::{self, witness_share_key, EncryptionError};
use crate::crypto::keys::SchnorrSignature;
use crate::crypto::signatures::verify_hash;
use crate::sharing::ShareRole;
use crate::voucher::lock::{LockState, TransferLock};
use crate::voucher::model::{Voucher, VoucherId};

/// An open transfer on the giver's device: the Offer on screen, waiting for
/// the receiver's ACK.
#[derive(Debug)]
pub struct GivingSession {
    machine: TransferStateMachine,
    voucher_id: VoucherId,
    challenge: [u8; CHALLENGE_LENGTH],
    lock: TransferLock,
    offer: [u8; OFFER_LENGTH],
}

impl GivingSession {
    pub fn voucher_id(&self) -> &VoucherId {
        &self.voucher_id
    }

    /// The 240 bytes to render as a QR code.
    pub fn offer_bytes(&self) -> &[u8; OFFER_LENGTH] {
        &self.offer
    }

    pub fn lock(&self) -> &TransferLock {
        &self.lock
    }

    pub fn state(&self) -> &TransferState {
        self.machine.state()
    }

    pub fn machine(&self) -> &TransferStateMachine {
        &self.machine
    }
}

impl TransferEngine {
    /// Build the Offer for `id` and lock the voucher.
    pub async fn create_offer(&self, id: &VoucherId) -> Result<GivingSession, TransferError> {
        let mut machine = TransferStateMachine::new(TransferRole::Giver);
        let voucher = self.voucher(id)?;
        let now = self.now();

        if let LockState::Locked(existing) = voucher.lock_state(now) {
            return Err(TransferError::LockUnavailable {
                retry_after_secs: existing.remaining_secs(now),
            });
        }
        if !voucher.is_transferable(now) {
            return Err(TransferError::NotTransferable(
                voucher.status.effective(now).to_string(),
            ));
        }
        let traveler = voucher
            .shares
            .get(ShareRole::Traveler)
            .ok_or_else(|| TransferError::NotTransferable("traveler share missing".into()))?;

        let witness = self
            .witness_cache
            .get(id)
            .await?
            .ok_or_else(|| TransferError::WitnessShareUnavailable(id.to_hex()))?;

        let key = witness_share_key(witness.as_bytes());
        let sealed = encryption::encrypt(&key, traveler.as_bytes(), id.as_bytes())?;
        let encrypted_traveler = <[u8; SHARE_LENGTH]>::try_from(sealed.ciphertext.as_slice())
            .map_err(|_| TransferError::Encryption(EncryptionError::EncryptFailed))?;

        let mut challenge = [0u8; CHALLENGE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut challenge);

        let timestamp = u32::try_from(now)
            .map_err(|_| TransferError::InvalidState(format!("clock {now} exceeds u32 range")))?;

        let mut offer = WireOffer {
            voucher_id: *id,
            value: voucher.value,
            issuer_id: voucher.issuer,
            encrypted_traveler,
            nonce: sealed.nonce,
            tag: sealed.tag,
            challenge,
            issuer_name: voucher.issuer_name.clone(),
            timestamp,
            signature: SchnorrSignature::EMPTY,
        };
        if self.config.sign_offers {
            if let Some(identity) = &self.identity {
                offer.sign(identity.secret())?;
            }
        }
        let bytes = offer.encode()?;

        let lock = self
            .locks
            .acquire(id, challenge, self.config.lock_ttl_secs)?;
        machine.advance(TransferState::OfferBuilt)?;

        info!(
            attempt_id = %machine.attempt_id(),
            voucher_id = %id.short(),
            signed = offer.is_signed(),
            state = %machine.state(),
            "offer built"
        );

        Ok(GivingSession {
            machine,
            voucher_id: *id,
            challenge,
            lock,
            offer: bytes,
        })
    }

    /// Complete the transfer with the receiver's ACK.
    ///
    /// A malformed scan or an ACK for another voucher leaves the session
    /// open. Every other failure closes it and releases the lock; the
    /// voucher stays with the giver.
    pub async fn finalize(
        &self,
        session: &mut GivingSession,
        ack_bytes: &[u8],
    ) -> Result<Voucher, TransferError> {
        if session.machine.is_terminal() {
            return Err(TransferError::InvalidState(format!(
                "session already {}",
                session.machine.state()
            )));
        }

        let ack = WireAck::decode(ack_bytes)?;
        if ack.voucher_id != session.voucher_id {
            return Err(TransferError::VoucherMismatch {
                expected: session.voucher_id.to_hex(),
                got: ack.voucher_id.to_hex(),
            });
        }

        match ack.status {
            AckStatus::Received => {}
            AckStatus::Declined => {
                self.close_failed(session, "declined by receiver");
                return Err(TransferError::TransferDeclined);
            }
            AckStatus::Reserved(b) => {
                self.close_failed(session, "unsupported ack status");
                return Err(TransferError::UnsupportedAckStatus(b));
            }
        }

        let digest = challenge_digest(&session.voucher_id, &session.challenge);
        if !verify_hash(session.voucher_id.public_key(), &digest, &ack.signature) {
            self.close_failed(session, "ack signature invalid");
            return Err(TransferError::SignatureInvalid);
        }
        session.machine.advance(TransferState::AckVerified)?;

        match self.locks.commit_spend(&session.voucher_id, session.challenge) {
            Ok(spent) => {
                session.machine.advance(TransferState::Finalized)?;
                info!(
                    attempt_id = %session.machine.attempt_id(),
                    voucher_id = %session.voucher_id.short(),
                    "transfer finalized"
                );
                Ok(spent)
            }
            Err(e) => {
                // commit_spend already reverted an expired lock to Active.
                session.machine.fail(e.to_string());
                warn!(
                    attempt_id = %session.machine.attempt_id(),
                    voucher_id = %session.voucher_id.short(),
                    error = %e,
                    "finalization failed"
                );
                Err(e.into())
            }
        }
    }

    /// Give up on an open session and release the lock.
    pub fn abort(&self, session: &mut GivingSession) -> Result<(), TransferError> {
        if session.machine.is_terminal() {
            return Ok(());
        }
        session.machine.fail("aborted");
        self.locks.release_if(&session.voucher_id, &session.challenge)?;
        info!(
            attempt_id = %session.machine.attempt_id(),
            voucher_id = %session.voucher_id.short(),
            "transfer aborted"
        );
        Ok(())
    }

    fn close_failed(&self, session: &mut GivingSession, reason: &str) {
        session.machine.fail(reason);
        if let Err(e) = self.locks.release_if(&session.voucher_id, &session.challenge) {
            warn!(voucher_id = %session.voucher_id.short(), error = %e, "lock release failed");
        }
        warn!(
            attempt_id = %session.machine.attempt_id(),
            voucher_id = %session.voucher_id.short(),
            reason,
            "transfer failed"
        );
    }
}
