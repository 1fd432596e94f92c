//! # Voucher Issuance
//!
//! Minting a voucher is the one moment its private key exists whole:
//!
//! 1. Generate a fresh secp256k1 keypair. The x-only public key becomes the
//!    voucher id.
//! 2. Split the secret into Anchor / Traveler / Witness shares and wipe it.
//! 3. The issuer keeps Anchor + Traveler in an `Issued` record.
//! 4. The Witness share is sealed under today's market key into a
//!    [`WitnessEnvelope`] for the relay. Once published the record moves to
//!    `Pending`, and to `Active` when the market confirms.
//!
//! Market members who fetch the envelope open it with the same daily key
//! and drop the Witness share into their [`WitnessShareCache`]. That is what
//! lets a receiver later decrypt a Traveler share without the giver ever
//! sending P3.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::model::{ShareSet, Status, Voucher, VoucherId};
use super::store::{StoreError, WitnessShareCache};
use crate::config::{AES_NONCE_LENGTH, AES_TAG_LENGTH, ISSUER_NAME_LENGTH};
use crate::crypto::encryption::{self, daily_key, EncryptionError, SealedBox};
use crate::crypto::keys::{Keypair, XOnlyPublicKey};
use crate::sharing::{self, ShareBytes, ShareRole, SharingError};

/// Errors during issuance and witness publication.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IssuanceError {
    #[error("issuer name is {0} bytes; the wire format allows {ISSUER_NAME_LENGTH}")]
    IssuerNameTooLong(usize),

    #[error("voucher value must be positive")]
    ZeroValue,

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Sharing(#[from] SharingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the issuer walks away with.
#[derive(Debug)]
pub struct IssuedVoucher {
    /// The issuer's record: Anchor + Traveler, status `Issued`.
    pub voucher: Voucher,
    /// P3, to be sealed and published.
    pub witness_share: ShareBytes,
}

/// Mint a new voucher.
pub fn issue_voucher(
    issuer: XOnlyPublicKey,
    issuer_name: &str,
    value: u32,
    expires_at: Option<u64>,
    now: u64,
) -> Result<IssuedVoucher, IssuanceError> {
    if issuer_name.len() > ISSUER_NAME_LENGTH {
        return Err(IssuanceError::IssuerNameTooLong(issuer_name.len()));
    }
    if value == 0 {
        return Err(IssuanceError::ZeroValue);
    }

    let voucher_key = Keypair::generate();
    let id = VoucherId::new(voucher_key.public_key());
    let [anchor, traveler, witness] = sharing::split(voucher_key.secret().as_bytes());
    drop(voucher_key);

    let mut shares = ShareSet::new();
    shares.insert(ShareRole::Anchor, anchor);
    shares.insert(ShareRole::Traveler, traveler);

    info!(voucher_id = %id.short(), value, "voucher issued");

    Ok(IssuedVoucher {
        voucher: Voucher {
            id,
            value,
            issuer,
            issuer_name: issuer_name.to_string(),
            created_at: now,
            expires_at,
            status: Status::Issued,
            shares,
        },
        witness_share: witness,
    })
}

// ---------------------------------------------------------------------------
// Witness envelope
// ---------------------------------------------------------------------------

/// A Witness share sealed under one day's market key, ready for the relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessEnvelope {
    pub voucher_id: VoucherId,
    /// The UTC date whose daily key sealed this envelope.
    pub date: NaiveDate,
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; AES_NONCE_LENGTH],
    pub tag: [u8; AES_TAG_LENGTH],
}

impl WitnessEnvelope {
    /// Seal `share` under `daily_key(market_seed, date)`, bound to the
    /// voucher id.
    pub fn seal(
        voucher_id: VoucherId,
        share: &ShareBytes,
        market_seed: &[u8; 32],
        date: NaiveDate,
    ) -> Result<Self, IssuanceError> {
        let key = daily_key(market_seed, date);
        let sealed = encryption::encrypt(&key, share.as_bytes(), voucher_id.as_bytes())?;
        Ok(Self {
            voucher_id,
            date,
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            tag: sealed.tag,
        })
    }

    /// Recover the Witness share. Needs the same market seed; the date comes
    /// from the envelope.
    pub fn open(&self, market_seed: &[u8; 32]) -> Result<ShareBytes, IssuanceError> {
        let key = daily_key(market_seed, self.date);
        let sealed = SealedBox {
            ciphertext: self.ciphertext.clone(),
            nonce: self.nonce,
            tag: self.tag,
        };
        let plaintext = encryption::decrypt(&key, &sealed, self.voucher_id.as_bytes())?;
        Ok(ShareBytes::from_slice(&plaintext)?)
    }
}

/// Open an envelope and store the Witness share in the local cache.
pub async fn sync_witness_share(
    cache: &dyn WitnessShareCache,
    envelope: &WitnessEnvelope,
    market_seed: &[u8; 32],
) -> Result<VoucherId, IssuanceError> {
    let share = envelope.open(market_seed)?;
    cache.put(envelope.voucher_id, share).await?;
    Ok(envelope.voucher_id)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
