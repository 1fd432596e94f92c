//! # Digital Signatures
//!
//! BIP-340 Schnorr signing and verification over secp256k1.
//!
//! Everything the protocol signs is already a 32-byte domain-separated
//! digest (see [`crate::crypto::hash::tagged_sha256`]), so we sign the digest
//! directly through the prehash interface. Going through `Signer::sign` would
//! hash it a second time and quietly break interop with every other BIP-340
//! implementation on the planet.
//!
//! ## What gets signed
//!
//! - **ACK challenges**: the receiver proves it reconstructed the voucher key
//!   by signing `challenge_digest(voucher_id, challenge)` with that key.
//! - **Offers**: the giver optionally signs the Offer body with its identity
//!   key so a receiver who knows the giver can detect tampering beyond what
//!   the checksum catches.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::schnorr::Signature;
use thiserror::Error;

use super::keys::{SchnorrSignature, SecretKeyBytes, XOnlyPublicKey};
use crate::config::{MESSAGE_HASH_LENGTH, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

/// Errors during signature operations.
///
/// Intentionally vague. We don't tell attackers why verification failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignatureBytes,

    #[error("invalid message hash: expected 32 bytes")]
    InvalidMessageHash,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("signing failed")]
    SigningFailed,
}

/// Sign a 32-byte message hash with BIP-340 Schnorr.
///
/// # Example
///
/// ```
/// use voucher_protocol::crypto::{sign_hash, verify_hash, SecretKeyBytes};
///
/// let secret = SecretKeyBytes::generate();
/// let digest = [7u8; 32];
/// let signature = sign_hash(&secret, &digest).unwrap();
///
/// assert!(verify_hash(&secret.public_key(), &digest, &signature));
/// ```
pub fn sign_hash(
    secret: &SecretKeyBytes,
    message_hash: &[u8; MESSAGE_HASH_LENGTH],
) -> Result<SchnorrSignature, SignatureError> {
    let signing_key = secret
        .signing_key()
        .map_err(|_| SignatureError::SigningFailed)?;
    let signature: Signature = signing_key
        .sign_prehash(message_hash)
        .map_err(|_| SignatureError::SigningFailed)?;
    Ok(SchnorrSignature::from_bytes(signature.to_bytes()))
}

/// Verify a BIP-340 signature over a 32-byte message hash.
///
/// Returns `true` only for a valid signature. "Malformed" and "wrong" are
/// both just `false` here; use [`verify_hash_strict`] if you need to know.
pub fn verify_hash(
    public_key: &XOnlyPublicKey,
    message_hash: &[u8; MESSAGE_HASH_LENGTH],
    signature: &SchnorrSignature,
) -> bool {
    verify_hash_strict(public_key, message_hash, signature).is_ok()
}

/// Like [`verify_hash`], but reports the failure as an error.
pub fn verify_hash_strict(
    public_key: &XOnlyPublicKey,
    message_hash: &[u8; MESSAGE_HASH_LENGTH],
    signature: &SchnorrSignature,
) -> Result<(), SignatureError> {
    let verifying_key = public_key
        .verifying_key()
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig = Signature::try_from(signature.as_bytes().as_slice())
        .map_err(|_| SignatureError::InvalidSignatureBytes)?;
    verifying_key
        .verify_prehash(message_hash, &sig)
        .map_err(|_| SignatureError::VerificationFailed)
}

/// Verify from raw byte slices, checking every length first.
///
/// The untrusted-input entry point: a wrong-length argument is an error,
/// not a panic.
pub fn verify_raw(
    public_key: &[u8],
    message_hash: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    if public_key.len() != PUBLIC_KEY_LENGTH {
        return Err(SignatureError::InvalidPublicKey);
    }
    let hash: &[u8; MESSAGE_HASH_LENGTH] = message_hash
        .try_into()
        .map_err(|_| SignatureError::InvalidMessageHash)?;
    let sig_bytes: [u8; SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| SignatureError::InvalidSignatureBytes)?;
    let pk = XOnlyPublicKey::from_slice(public_key).map_err(|_| SignatureError::InvalidPublicKey)?;
    verify_hash_strict(&pk, hash, &SchnorrSignature::from_bytes(sig_bytes))
}

/// `true` if `hex_str` is 64 hex characters encoding a point on the curve.
pub fn is_valid_public_key(hex_str: &str) -> bool {
    XOnlyPublicKey::from_hex(hex_str).is_ok()
}
