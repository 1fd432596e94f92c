//! # AES-256-GCM Encryption
//!
//! Authenticated encryption for voucher shares. Two jobs, two key sources:
//!
//! - **Traveler share in an Offer.** Key = `tagged_sha256(WITNESS_KEY_LABEL,
//!   P3)`. Only someone already holding the Witness share can open it, which
//!   is the whole trick: P2 alone is useless, P3 alone is useless, the QR code
//!   carries P2 locked behind P3.
//! - **Witness share for publication.** Key = `daily_key(market_seed, date)`.
//!   One key per calendar day, derived deterministically, so yesterday's key
//!   can be forgotten and the same share published on two days yields two
//!   unlinkable ciphertexts.
//!
//! ## Detached tags
//!
//! The Offer wire format stores ciphertext, nonce and tag in separate
//! fixed-width fields, so everything here works with a detached tag
//! ([`SealedBox`]) rather than the usual `ciphertext || tag` blob.
//!
//! ## Nonce management
//!
//! GCM is notoriously unforgiving about nonce reuse. Random 96-bit nonces from
//! the OS CSPRNG, every single call. Don't get clever with counters.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use chrono::NaiveDate;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

use super::hash::{blake3_keyed, tagged_sha256};
use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH, AES_TAG_LENGTH, WITNESS_KEY_LABEL};

/// Errors that can occur during encryption/decryption.
///
/// Kept vague on purpose. "Wrong key" and "corrupted ciphertext" look the
/// same from the outside.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("authentication failed: wrong key or tampered ciphertext")]
    AuthenticationFailure,

    #[error("invalid nonce length: expected {AES_NONCE_LENGTH} bytes")]
    InvalidNonceLength,

    #[error("invalid tag length: expected {AES_TAG_LENGTH} bytes")]
    InvalidTagLength,
}

/// AES-GCM output with the nonce and tag kept apart from the ciphertext.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; AES_NONCE_LENGTH],
    pub tag: [u8; AES_TAG_LENGTH],
}

impl std::fmt::Debug for SealedBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedBox")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("nonce", &hex::encode(self.nonce))
            .finish()
    }
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
///
/// `aad` is authenticated but not encrypted. Pass the voucher id so a
/// ciphertext lifted from one voucher's Offer can't be replayed into
/// another's.
///
/// # Example
///
/// ```
/// use voucher_protocol::crypto::encryption::{encrypt, decrypt};
///
/// let key = [0x42u8; 32]; // In real code, use a derived key!
/// let sealed = encrypt(&key, b"traveler share", b"voucher-id").unwrap();
/// let opened = decrypt(&key, &sealed, b"voucher-id").unwrap();
/// assert_eq!(opened.as_slice(), b"traveler share");
/// ```
pub fn encrypt(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<SealedBox, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), aad, &mut buffer)
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut tag_bytes = [0u8; AES_TAG_LENGTH];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(SealedBox {
        ciphertext: buffer,
        nonce,
        tag: tag_bytes,
    })
}

/// Decrypt a [`SealedBox`], returning the plaintext in a wiping buffer.
///
/// On tag mismatch nothing is returned, not even a partially decrypted
/// buffer. The scratch space is zeroized either way.
pub fn decrypt(
    key: &[u8; AES_KEY_LENGTH],
    sealed: &SealedBox,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
    decrypt_parts(key, &sealed.ciphertext, &sealed.nonce, &sealed.tag, aad)
}

/// Decrypt from loose slices, as they come off the wire.
pub fn decrypt_parts(
    key: &[u8; AES_KEY_LENGTH],
    ciphertext: &[u8],
    nonce: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
    if nonce.len() != AES_NONCE_LENGTH {
        return Err(EncryptionError::InvalidNonceLength);
    }
    if tag.len() != AES_TAG_LENGTH {
        return Err(EncryptionError::InvalidTagLength);
    }
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::AuthenticationFailure)?;

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            aad,
            buffer.as_mut_slice(),
            Tag::from_slice(tag),
        )
        .map_err(|_| EncryptionError::AuthenticationFailure)?;
    Ok(buffer)
}

// ---------------------------------------------------------------------------
// Key derivation for the two share-encryption paths
// ---------------------------------------------------------------------------

/// AEAD key protecting the Traveler share, derived from the Witness share.
pub fn witness_share_key(witness_share: &[u8]) -> Zeroizing<[u8; AES_KEY_LENGTH]> {
    Zeroizing::new(tagged_sha256(WITNESS_KEY_LABEL, &[witness_share]))
}

/// The market's key for one UTC calendar day.
///
/// BLAKE3 keyed by the market seed over the ISO date (`YYYY-MM-DD`). Stable
/// for a given date, unrelated across dates.
pub fn daily_key(market_seed: &[u8; 32], date: NaiveDate) -> Zeroizing<[u8; AES_KEY_LENGTH]> {
    let label = date.format("%Y-%m-%d").to_string();
    Zeroizing::new(blake3_keyed(market_seed, label.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = [0xAB; 32];
        let sealed = encrypt(&key, &plaintext, b"").unwrap();
        assert_eq!(sealed.ciphertext.len(), 32);
        let opened = decrypt(&key, &sealed, b"").unwrap();
        assert_eq!(opened.as_slice(), &plaintext);
    }

    #[test]
    fn same_plaintext_gives_fresh_nonce_and_ciphertext() {
        let key = test_key();
        let a = encrypt(&key, b"same share bytes", b"").unwrap();
        let b = encrypt(&key, b"same share bytes", b"").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_is_authentication_failure() {
        let sealed = encrypt(&test_key(), b"secret", b"").unwrap();
        assert_eq!(
            decrypt(&test_key(), &sealed, b""),
            Err(EncryptionError::AuthenticationFailure)
        );
    }

    #[test]
    fn tampered_ciphertext_and_tag_rejected() {
        let key = test_key();
        let sealed = encrypt(&key, b"secret", b"").unwrap();

        let mut bad_ct = sealed.clone();
        bad_ct.ciphertext[0] ^= 0x01;
        assert!(decrypt(&key, &bad_ct, b"").is_err());

        let mut bad_tag = sealed;
        bad_tag.tag[15] ^= 0x80;
        assert!(decrypt(&key, &bad_tag, b"").is_err());
    }

    #[test]
    fn aad_mismatch_rejected() {
        let key = test_key();
        let sealed = encrypt(&key, b"p2", b"voucher-a").unwrap();
        assert!(decrypt(&key, &sealed, b"voucher-a").is_ok());
        assert_eq!(
            decrypt(&key, &sealed, b"voucher-b"),
            Err(EncryptionError::AuthenticationFailure)
        );
    }

    #[test]
    fn decrypt_parts_checks_lengths() {
        let key = test_key();
        assert_eq!(
            decrypt_parts(&key, b"ct", &[0u8; 11], &[0u8; 16], b""),
            Err(EncryptionError::InvalidNonceLength)
        );
        assert_eq!(
            decrypt_parts(&key, b"ct", &[0u8; 12], &[0u8; 15], b""),
            Err(EncryptionError::InvalidTagLength)
        );
    }

    #[test]
    fn witness_key_depends_on_share() {
        assert_ne!(*witness_share_key(&[1u8; 32]), *witness_share_key(&[2u8; 32]));
        assert_eq!(*witness_share_key(&[1u8; 32]), *witness_share_key(&[1u8; 32]));
    }

    #[test]
    fn daily_key_stable_per_date_and_rotates() {
        let seed = [7u8; 32];
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let tomorrow = today.succ_opt().unwrap();
        assert_eq!(*daily_key(&seed, today), *daily_key(&seed, today));
        assert_ne!(*daily_key(&seed, today), *daily_key(&seed, tomorrow));
        assert_ne!(*daily_key(&seed, today), *daily_key(&[8u8; 32], today));
    }
}
