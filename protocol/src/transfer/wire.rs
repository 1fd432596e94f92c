//! # QR Wire Codec
//!
//! The two messages that cross the air gap, as fixed-length big-endian
//! records. No varints, no optional fields, no padding ambiguity: a scanner
//! either reads exactly 240 (Offer) or 97 (Ack) bytes, or it reads garbage.
//!
//! ## Offer (240 bytes)
//!
//! ```text
//! offset  size  field
//!      0     4  magic "VCH" + version
//!      4    32  voucher id (x-only pubkey)
//!     36     4  value (u32, minor units)
//!     40    32  issuer id (x-only pubkey)
//!     72    32  encrypted Traveler share
//!    104    12  AES-GCM nonce
//!    116    16  AES-GCM tag
//!    132    16  challenge
//!    148    20  issuer name, UTF-8, zero-padded
//!    168     4  timestamp (u32, unix seconds)
//!    172    64  Schnorr signature over tagged_sha256(bytes 0..172), zeros if unsigned
//!    236     4  SHA-256(bytes 0..236)[..4]
//! ```
//!
//! ## Ack (97 bytes)
//!
//! ```text
//!      0    32  voucher id
//!     32    64  Schnorr signature over challenge_digest(id, challenge)
//!     96     1  status: 0x01 received, 0x02 declined
//! ```
//!
//! Decoders check length first and only then look at content. Nothing
//! cryptographic happens on a buffer that failed any structural check.

use thiserror::Error;

use crate::config::{
    AES_NONCE_LENGTH, AES_TAG_LENGTH, CHALLENGE_DIGEST_LABEL, CHALLENGE_LENGTH, CHECKSUM_LENGTH,
    ISSUER_NAME_LENGTH, OFFER_DIGEST_LABEL, OFFER_MAGIC, PUBLIC_KEY_LENGTH, SHARE_LENGTH,
    SIGNATURE_LENGTH, WIRE_VERSION,
};
use crate::crypto::hash::{sha256_array, tagged_sha256};
use crate::crypto::keys::{KeyError, SchnorrSignature, SecretKeyBytes, XOnlyPublicKey};
use crate::crypto::signatures::{sign_hash, verify_hash, SignatureError};
use crate::voucher::model::VoucherId;

/// Total Offer length on the wire.
pub const OFFER_LENGTH: usize = 240;

/// Total Ack length on the wire.
pub const ACK_LENGTH: usize = 97;

// Offer field offsets.
const MAGIC_END: usize = 4;
const VOUCHER_ID_END: usize = MAGIC_END + PUBLIC_KEY_LENGTH;
const VALUE_END: usize = VOUCHER_ID_END + 4;
const ISSUER_ID_END: usize = VALUE_END + PUBLIC_KEY_LENGTH;
const CIPHERTEXT_END: usize = ISSUER_ID_END + SHARE_LENGTH;
const NONCE_END: usize = CIPHERTEXT_END + AES_NONCE_LENGTH;
const TAG_END: usize = NONCE_END + AES_TAG_LENGTH;
const CHALLENGE_END: usize = TAG_END + CHALLENGE_LENGTH;
const ISSUER_NAME_END: usize = CHALLENGE_END + ISSUER_NAME_LENGTH;
const TIMESTAMP_END: usize = ISSUER_NAME_END + 4;
const SIGNATURE_END: usize = TIMESTAMP_END + SIGNATURE_LENGTH;
const CHECKSUM_END: usize = SIGNATURE_END + CHECKSUM_LENGTH;

const _: () = assert!(CHECKSUM_END == OFFER_LENGTH);
const _: () = assert!(PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH + 1 == ACK_LENGTH);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural problems with a scanned payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("invalid payload length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("bad magic bytes")]
    BadMagic,

    #[error("unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("issuer name is {0} bytes; at most {ISSUER_NAME_LENGTH} fit")]
    IssuerNameTooLong(usize),

    #[error("issuer name is not valid UTF-8 or contains NUL")]
    InvalidIssuerName,

    #[error("embedded key is not a valid curve point")]
    InvalidKey(#[from] KeyError),
}

// ---------------------------------------------------------------------------
// Offer
// ---------------------------------------------------------------------------

/// A decoded Offer: everything the receiver needs to pull the Traveler share
/// out and prove it did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireOffer {
    pub voucher_id: VoucherId,
    pub value: u32,
    pub issuer_id: XOnlyPublicKey,
    pub encrypted_traveler: [u8; SHARE_LENGTH],
    pub nonce: [u8; AES_NONCE_LENGTH],
    pub tag: [u8; AES_TAG_LENGTH],
    pub challenge: [u8; CHALLENGE_LENGTH],
    pub issuer_name: String,
    /// Unix seconds when the giver built the Offer.
    pub timestamp: u32,
    /// `SchnorrSignature::EMPTY` when unsigned.
    pub signature: SchnorrSignature,
}

impl WireOffer {
    fn encode_body(&self) -> Result<[u8; TIMESTAMP_END], WireError> {
        let name = self.issuer_name.as_bytes();
        if name.len() > ISSUER_NAME_LENGTH {
            return Err(WireError::IssuerNameTooLong(name.len()));
        }
        if name.contains(&0) {
            return Err(WireError::InvalidIssuerName);
        }

        let mut out = [0u8; TIMESTAMP_END];
        out[..3].copy_from_slice(&OFFER_MAGIC);
        out[3] = WIRE_VERSION;
        out[MAGIC_END..VOUCHER_ID_END].copy_from_slice(self.voucher_id.as_bytes());
        out[VOUCHER_ID_END..VALUE_END].copy_from_slice(&self.value.to_be_bytes());
        out[VALUE_END..ISSUER_ID_END].copy_from_slice(self.issuer_id.as_bytes());
        out[ISSUER_ID_END..CIPHERTEXT_END].copy_from_slice(&self.encrypted_traveler);
        out[CIPHERTEXT_END..NONCE_END].copy_from_slice(&self.nonce);
        out[NONCE_END..TAG_END].copy_from_slice(&self.tag);
        out[TAG_END..CHALLENGE_END].copy_from_slice(&self.challenge);
        out[CHALLENGE_END..CHALLENGE_END + name.len()].copy_from_slice(name);
        out[ISSUER_NAME_END..TIMESTAMP_END].copy_from_slice(&self.timestamp.to_be_bytes());
        Ok(out)
    }

    /// Serialize to the 240-byte wire form.
    pub fn encode(&self) -> Result<[u8; OFFER_LENGTH], WireError> {
        let body = self.encode_body()?;
        let mut out = [0u8; OFFER_LENGTH];
        out[..TIMESTAMP_END].copy_from_slice(&body);
        out[TIMESTAMP_END..SIGNATURE_END].copy_from_slice(self.signature.as_bytes());
        let checksum = sha256_array(&out[..SIGNATURE_END]);
        out[SIGNATURE_END..CHECKSUM_END].copy_from_slice(&checksum[..CHECKSUM_LENGTH]);
        Ok(out)
    }

    /// Parse a scanned buffer. Anything but exactly 240 well-formed bytes is
    /// an error; no partial result is ever returned.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != OFFER_LENGTH {
            return Err(WireError::InvalidLength {
                expected: OFFER_LENGTH,
                got: bytes.len(),
            });
        }
        if bytes[..3] != OFFER_MAGIC {
            return Err(WireError::BadMagic);
        }
        if bytes[3] != WIRE_VERSION {
            return Err(WireError::UnsupportedVersion(bytes[3]));
        }
        let checksum = sha256_array(&bytes[..SIGNATURE_END]);
        if bytes[SIGNATURE_END..CHECKSUM_END] != checksum[..CHECKSUM_LENGTH] {
            return Err(WireError::ChecksumMismatch);
        }

        let name_field = &bytes[CHALLENGE_END..ISSUER_NAME_END];
        let name_len = name_field
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |i| i + 1);
        let issuer_name = std::str::from_utf8(&name_field[..name_len])
            .map_err(|_| WireError::InvalidIssuerName)?;
        if issuer_name.contains('\0') {
            return Err(WireError::InvalidIssuerName);
        }

        Ok(Self {
            voucher_id: VoucherId::from_bytes(&array(&bytes[MAGIC_END..VOUCHER_ID_END]))?,
            value: u32::from_be_bytes(array(&bytes[VOUCHER_ID_END..VALUE_END])),
            issuer_id: XOnlyPublicKey::from_bytes(&array(&bytes[VALUE_END..ISSUER_ID_END]))?,
            encrypted_traveler: array(&bytes[ISSUER_ID_END..CIPHERTEXT_END]),
            nonce: array(&bytes[CIPHERTEXT_END..NONCE_END]),
            tag: array(&bytes[NONCE_END..TAG_END]),
            challenge: array(&bytes[TAG_END..CHALLENGE_END]),
            issuer_name: issuer_name.to_string(),
            timestamp: u32::from_be_bytes(array(&bytes[ISSUER_NAME_END..TIMESTAMP_END])),
            signature: SchnorrSignature::from_bytes(array(&bytes[TIMESTAMP_END..SIGNATURE_END])),
        })
    }

    /// The digest the Offer signature covers: every field before it.
    pub fn signing_digest(&self) -> Result<[u8; 32], WireError> {
        let body = self.encode_body()?;
        Ok(tagged_sha256(OFFER_DIGEST_LABEL, &[body.as_slice()]))
    }

    /// Sign with the giver's identity key, replacing any previous signature.
    pub fn sign(&mut self, identity: &SecretKeyBytes) -> Result<(), OfferSignError> {
        let digest = self.signing_digest()?;
        self.signature = sign_hash(identity, &digest)?;
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// `true` if signed by `sender`. Unsigned Offers never verify.
    pub fn verify_signature(&self, sender: &XOnlyPublicKey) -> bool {
        if !self.is_signed() {
            return false;
        }
        match self.signing_digest() {
            Ok(digest) => verify_hash(sender, &digest, &self.signature),
            Err(_) => false,
        }
    }
}

/// Failures while signing an Offer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OfferSignError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

// ---------------------------------------------------------------------------
// Ack
// ---------------------------------------------------------------------------

/// Status byte of an Ack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckStatus {
    /// 0x01: share decrypted, key rebuilt, challenge signed.
    Received,
    /// 0x02: the receiver turned the Offer down.
    Declined,
    /// Anything else, kept verbatim for forward compatibility.
    Reserved(u8),
}

impl AckStatus {
    pub fn to_byte(self) -> u8 {
        match self {
            AckStatus::Received => 0x01,
            AckStatus::Declined => 0x02,
            AckStatus::Reserved(b) => b,
        }
    }

    pub fn from_byte(b: u8) -> Self {
        match b {
            0x01 => AckStatus::Received,
            0x02 => AckStatus::Declined,
            other => AckStatus::Reserved(other),
        }
    }
}

/// A decoded Ack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireAck {
    pub voucher_id: VoucherId,
    pub signature: SchnorrSignature,
    pub status: AckStatus,
}

impl WireAck {
    pub fn encode(&self) -> [u8; ACK_LENGTH] {
        let mut out = [0u8; ACK_LENGTH];
        out[..PUBLIC_KEY_LENGTH].copy_from_slice(self.voucher_id.as_bytes());
        out[PUBLIC_KEY_LENGTH..PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH]
            .copy_from_slice(self.signature.as_bytes());
        out[ACK_LENGTH - 1] = self.status.to_byte();
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != ACK_LENGTH {
            return Err(WireError::InvalidLength {
                expected: ACK_LENGTH,
                got: bytes.len(),
            });
        }
        Ok(Self {
            voucher_id: VoucherId::from_bytes(&array(&bytes[..PUBLIC_KEY_LENGTH]))?,
            signature: SchnorrSignature::from_bytes(array(
                &bytes[PUBLIC_KEY_LENGTH..PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH],
            )),
            status: AckStatus::from_byte(bytes[ACK_LENGTH - 1]),
        })
    }
}

/// What the receiver signs with the rebuilt voucher key.
pub fn challenge_digest(voucher_id: &VoucherId, challenge: &[u8; CHALLENGE_LENGTH]) -> [u8; 32] {
    tagged_sha256(
        CHALLENGE_DIGEST_LABEL,
        &[voucher_id.as_bytes().as_slice(), challenge.as_slice()],
    )
}

/// Copy a slice of known length into an array. Only called with ranges
/// derived from the offset constants above.
fn array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}
