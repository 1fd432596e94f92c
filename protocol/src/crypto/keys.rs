//! # Key Management
//!
//! secp256k1 key types for vouchers and participant identities.
//!
//! A voucher *is* a keypair: its id is the x-only public key, and owning it
//! means being able to produce a BIP-340 signature with the matching secret.
//! That secret is normally split into three shares (see [`crate::sharing`])
//! and only exists in one piece for the few microseconds it takes to sign a
//! challenge.
//!
//! ## Security considerations
//!
//! - [`SecretKeyBytes`] zeroizes on drop and refuses to print itself.
//! - Secret keys are validated as non-zero scalars below the curve order on
//!   construction. Invalid material never gets a typed wrapper.
//! - Key bytes are never logged. If you add logging to this module,
//!   you will be asked to leave.

use k256::schnorr::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH};

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* a key was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key: not a valid secp256k1 scalar")]
    InvalidSecretKey,

    #[error("invalid public key: not a valid x-only secp256k1 point")]
    InvalidPublicKey,

    #[error("invalid hex encoding")]
    InvalidHex,
}

// ---------------------------------------------------------------------------
// SecretKeyBytes
// ---------------------------------------------------------------------------

/// A validated 32-byte secp256k1 secret key that wipes itself on drop.
///
/// This is the "use-then-zero" wrapper for every private key the protocol
/// touches: voucher keys reconstructed from shares, identity keys, keys
/// derived from credentials. Once it goes out of scope, the bytes are gone.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyBytes {
    bytes: [u8; SECRET_KEY_LENGTH],
    #[zeroize(skip)]
    public: [u8; PUBLIC_KEY_LENGTH],
}

impl SecretKeyBytes {
    /// Wrap raw bytes, rejecting zero and out-of-range scalars.
    ///
    /// The input array is copied; callers holding the original should wipe it.
    pub fn from_bytes(bytes: &[u8; SECRET_KEY_LENGTH]) -> Result<Self, KeyError> {
        let signing_key =
            SigningKey::from_bytes(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self {
            bytes: *bytes,
            public: verifying_key_bytes(signing_key.verifying_key()),
        })
    }

    /// Wrap a slice of exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let arr: &[u8; SECRET_KEY_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidSecretKey)?;
        Self::from_bytes(arr)
    }

    /// Parse a hex-encoded secret key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let mut bytes = hex::decode(s).map_err(|_| KeyError::InvalidHex)?;
        let result = Self::from_slice(&bytes);
        bytes.zeroize();
        result
    }

    /// Draw a fresh key from the OS CSPRNG.
    ///
    /// Rejection-samples until the bytes form a valid scalar. The loop runs
    /// more than once with probability around 2^-128.
    pub fn generate() -> Self {
        loop {
            let mut candidate = [0u8; SECRET_KEY_LENGTH];
            OsRng.fill_bytes(&mut candidate);
            let result = Self::from_bytes(&candidate);
            candidate.zeroize();
            if let Ok(key) = result {
                return key;
            }
        }
    }

    /// Borrow the raw bytes. Use immediately and let go.
    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_LENGTH] {
        &self.bytes
    }

    /// Hex-encode the secret. Only for deliberate export paths.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// The BIP-340 x-only public key, computed once at construction.
    pub fn public_key(&self) -> XOnlyPublicKey {
        XOnlyPublicKey(self.public)
    }

    pub(crate) fn signing_key(&self) -> Result<SigningKey, KeyError> {
        SigningKey::from_bytes(&self.bytes).map_err(|_| KeyError::InvalidSecretKey)
    }
}

impl fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material. Not even "partially."
        f.write_str("SecretKeyBytes(***)")
    }
}

impl PartialEq for SecretKeyBytes {
    /// Compares the derived public keys, never the secret bytes.
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for SecretKeyBytes {}

fn verifying_key_bytes(key: &VerifyingKey) -> [u8; PUBLIC_KEY_LENGTH] {
    let mut out = [0u8; PUBLIC_KEY_LENGTH];
    out.copy_from_slice(&key.to_bytes());
    out
}

// ---------------------------------------------------------------------------
// XOnlyPublicKey
// ---------------------------------------------------------------------------

/// A BIP-340 x-only public key: 32 bytes, validated to lie on the curve.
///
/// Voucher ids and issuer ids are both x-only keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XOnlyPublicKey([u8; PUBLIC_KEY_LENGTH]);

impl XOnlyPublicKey {
    /// Validate raw bytes as an x-only curve point.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LENGTH]) -> Result<Self, KeyError> {
        VerifyingKey::from_bytes(bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self(*bytes))
    }

    /// Validate a slice of exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let arr: &[u8; PUBLIC_KEY_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_bytes(arr)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        if s.len() != PUBLIC_KEY_LENGTH * 2 {
            return Err(KeyError::InvalidPublicKey);
        }
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidHex)?;
        Self::from_slice(&bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    /// Hex-encoded representation. 64 characters for 32 bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| KeyError::InvalidPublicKey)
    }
}

impl fmt::Display for XOnlyPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for XOnlyPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XOnlyPublicKey({})", &self.to_hex()[..16])
    }
}

impl Serialize for XOnlyPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for XOnlyPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// SchnorrSignature
// ---------------------------------------------------------------------------

/// A 64-byte BIP-340 Schnorr signature.
///
/// Wrapping the bytes doesn't validate them. Verification does that.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SchnorrSignature([u8; SIGNATURE_LENGTH]);

impl SchnorrSignature {
    /// The all-zero signature, used on the wire to mean "unsigned".
    pub const EMPTY: Self = Self([0u8; SIGNATURE_LENGTH]);

    /// Create a signature from raw 64-byte representation.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// `true` for the all-zero placeholder.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Returns the hex-encoded signature string. 128 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SchnorrSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for SchnorrSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchnorrSignature({}...)", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// A secret key bundled with its public key.
///
/// Used for long-lived participant identities and at voucher issuance, the
/// one moment the full voucher key legitimately exists in one place.
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKeyBytes,
    public: XOnlyPublicKey,
}

impl Keypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self::from_secret(SecretKeyBytes::generate())
    }

    /// Build a keypair around an existing secret.
    pub fn from_secret(secret: SecretKeyBytes) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Returns the x-only public key.
    pub fn public_key(&self) -> XOnlyPublicKey {
        self.public
    }

    /// Borrow the secret half.
    pub fn secret(&self) -> &SecretKeyBytes {
        &self.secret
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair(pub={})", self.public.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_roundtrips_through_hex() {
        let secret = SecretKeyBytes::generate();
        let restored = SecretKeyBytes::from_hex(&secret.to_hex()).unwrap();
        assert_eq!(secret.public_key(), restored.public_key());
    }

    #[test]
    fn zero_secret_rejected() {
        assert_eq!(
            SecretKeyBytes::from_bytes(&[0u8; 32]),
            Err(KeyError::InvalidSecretKey)
        );
    }

    #[test]
    fn scalar_above_order_rejected() {
        assert!(SecretKeyBytes::from_bytes(&[0xFF; 32]).is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let secret = SecretKeyBytes::from_bytes(&[0x11; 32]).unwrap();
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("11"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let kp = Keypair::generate();
        let hex_str = kp.public_key().to_hex();
        assert_eq!(hex_str.len(), 64);
        assert_eq!(XOnlyPublicKey::from_hex(&hex_str).unwrap(), kp.public_key());
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        assert!(XOnlyPublicKey::from_slice(&[2u8; 31]).is_err());
        assert!(XOnlyPublicKey::from_hex("abcd").is_err());
    }

    #[test]
    fn public_key_serde_is_hex() {
        let kp = Keypair::generate();
        let json = serde_json::to_string(&kp.public_key()).unwrap();
        assert_eq!(json, format!("\"{}\"", kp.public_key().to_hex()));
        let back: XOnlyPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kp.public_key());
    }

    #[test]
    fn empty_signature_detected() {
        assert!(SchnorrSignature::EMPTY.is_empty());
        let mut bytes = [0u8; 64];
        bytes[63] = 1;
        assert!(!SchnorrSignature::from_bytes(bytes).is_empty());
    }
}
