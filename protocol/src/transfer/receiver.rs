//! # Receiver Side
//!
//! ```text
//! accept_offer:  decode -> freshness window -> sender sig (if expected)
//!                -> duplicate check -> fetch own P3 -> key = H(P3)
//!                -> open P2 -> combine(P2, P3) -> key matches voucher id?
//!                -> sign challenge digest -> wipe key -> store {P2, P3}
//!                -> encode ACK
//! decline_offer: decode -> ACK{DECLINED, zero signature}
//!                (OfferConsumed -> AckBuilt, no key is ever rebuilt)
//! ```
//!
//! Nothing is decrypted until the Offer has passed the freshness window.
//! An AEAD failure is final: there is no second key to try.

use tracing::{debug, info, warn};

use super::engine::TransferEngine;
use super::error::TransferError;
use super::state::{TransferRole, TransferState, TransferStateMachine};
use super::wire::{challenge_digest, AckStatus, WireAck, WireOffer, ACK_LENGTH};
use crate::config::TransferConfig;
use crate::crypto::encryption::{self, witness_share_key};
use crate::crypto::keys::{SchnorrSignature, SecretKeyBytes, XOnlyPublicKey};
use crate::crypto::signatures::sign_hash;
use crate::sharing::{self, ShareBytes, ShareRole};
use crate::voucher::model::{ShareSet, Status, Voucher, VoucherId};

/// What the receiver ends up with after accepting an Offer.
#[derive(Debug)]
pub struct ReceivedTransfer {
    /// The new local record: `Active`, holding Traveler + Witness.
    pub voucher: Voucher,
    /// The 97 bytes to render as the ACK QR code.
    pub ack: [u8; ACK_LENGTH],
    pub machine: TransferStateMachine,
}

/// A turned-down Offer: the ACK to show and the attempt that produced it.
#[derive(Debug)]
pub struct DeclinedOffer {
    pub voucher_id: VoucherId,
    pub ack: [u8; ACK_LENGTH],
    pub machine: TransferStateMachine,
}

impl TransferEngine {
    /// Consume a scanned Offer and produce the ACK.
    ///
    /// When `expected_sender` is given, the Offer must carry a valid
    /// signature from that identity key.
    pub async fn accept_offer(
        &self,
        offer_bytes: &[u8],
        expected_sender: Option<&XOnlyPublicKey>,
    ) -> Result<ReceivedTransfer, TransferError> {
        let mut machine = TransferStateMachine::new(TransferRole::Receiver);
        match self.consume(&mut machine, offer_bytes, expected_sender).await {
            Ok((voucher, ack)) => Ok(ReceivedTransfer {
                voucher,
                ack,
                machine,
            }),
            Err(e) => {
                machine.fail(e.to_string());
                warn!(attempt_id = %machine.attempt_id(), error = %e, "offer rejected");
                Err(e)
            }
        }
    }

    async fn consume(
        &self,
        machine: &mut TransferStateMachine,
        offer_bytes: &[u8],
        expected_sender: Option<&XOnlyPublicKey>,
    ) -> Result<(Voucher, [u8; ACK_LENGTH]), TransferError> {
        let offer = WireOffer::decode(offer_bytes)?;
        let id = offer.voucher_id;
        self.check_freshness(&offer)?;
        machine.advance(TransferState::OfferConsumed)?;
        debug!(attempt_id = %machine.attempt_id(), voucher_id = %id.short(), "offer decoded");

        if let Some(sender) = expected_sender {
            if !offer.verify_signature(sender) {
                return Err(TransferError::SignatureInvalid);
            }
        }

        let now = self.now();
        if let Some(existing) = self.store.load(&id)? {
            let held = existing.shares.contains(ShareRole::Traveler);
            if held && existing.status.effective(now) != Status::Spent {
                return Err(TransferError::DuplicateOffer(id.to_hex()));
            }
        }

        let witness = self
            .witness_cache
            .get(&id)
            .await?
            .ok_or_else(|| TransferError::WitnessShareUnavailable(id.to_hex()))?;

        let key = witness_share_key(witness.as_bytes());
        let plaintext = encryption::decrypt_parts(
            &key,
            &offer.encrypted_traveler,
            &offer.nonce,
            &offer.tag,
            id.as_bytes(),
        )?;
        let traveler = ShareBytes::from_slice(&plaintext)?;
        drop(plaintext);

        let signature = {
            let secret = sharing::combine(&[None, Some(&traveler), Some(&witness)])?;
            let voucher_key =
                SecretKeyBytes::from_bytes(&secret).map_err(|_| TransferError::KeyMismatch)?;
            if voucher_key.public_key() != *id.public_key() {
                return Err(TransferError::KeyMismatch);
            }
            sign_hash(&voucher_key, &challenge_digest(&id, &offer.challenge))?
        };
        machine.advance(TransferState::ChallengeSigned)?;

        let mut shares = ShareSet::new();
        shares.insert(ShareRole::Traveler, traveler);
        shares.insert(ShareRole::Witness, witness);
        let voucher = Voucher {
            id,
            value: offer.value,
            issuer: offer.issuer_id,
            issuer_name: offer.issuer_name.clone(),
            created_at: u64::from(offer.timestamp),
            expires_at: None,
            status: Status::Active,
            shares,
        };
        self.store.save(&voucher)?;

        let ack = WireAck {
            voucher_id: id,
            signature,
            status: AckStatus::Received,
        }
        .encode();
        machine.advance(TransferState::AckBuilt)?;

        info!(
            attempt_id = %machine.attempt_id(),
            voucher_id = %id.short(),
            value = offer.value,
            "offer accepted"
        );

        Ok((voucher, ack))
    }

    /// Turn an Offer down. The ACK carries `DECLINED` and a zero signature;
    /// nothing is decrypted and nothing is stored.
    pub fn decline_offer(&self, offer_bytes: &[u8]) -> Result<DeclinedOffer, TransferError> {
        let mut machine = TransferStateMachine::new(TransferRole::Receiver);
        let offer = match WireOffer::decode(offer_bytes) {
            Ok(offer) => offer,
            Err(e) => {
                let e = TransferError::from(e);
                machine.fail(e.to_string());
                warn!(attempt_id = %machine.attempt_id(), error = %e, "unreadable offer");
                return Err(e);
            }
        };
        machine.advance(TransferState::OfferConsumed)?;

        let ack = WireAck {
            voucher_id: offer.voucher_id,
            signature: SchnorrSignature::EMPTY,
            status: AckStatus::Declined,
        }
        .encode();
        machine.advance(TransferState::AckBuilt)?;

        info!(
            attempt_id = %machine.attempt_id(),
            voucher_id = %offer.voucher_id.short(),
            "offer declined"
        );
        Ok(DeclinedOffer {
            voucher_id: offer.voucher_id,
            ack,
            machine,
        })
    }

    fn check_freshness(&self, offer: &WireOffer) -> Result<(), TransferError> {
        check_offer_freshness(offer, &self.config, self.now())
    }
}

/// Reject Offers outside `[now - offer_ttl, now + max_skew]`.
pub fn check_offer_freshness(
    offer: &WireOffer,
    config: &TransferConfig,
    now: u64,
) -> Result<(), TransferError> {
    let timestamp = u64::from(offer.timestamp);
    if timestamp > now.saturating_add(config.max_clock_skew_secs) {
        return Err(TransferError::OfferFromFuture { timestamp, now });
    }
    if now >= timestamp.saturating_add(config.offer_ttl_secs) {
        return Err(TransferError::OfferExpired { timestamp, now });
    }
    Ok(())
}
