//! # Hashing Utilities
//!
//! Cryptographic hash functions used throughout the voucher protocol. Two
//! families, each with a clear job:
//!
//! - **SHA-256**: signing digests, wire checksums, Base58Check, and the
//!   seed -> private key step. BIP-340 lives in SHA-256 land, so everything
//!   that ends up under a Schnorr signature is SHA-256 too.
//!
//! - **BLAKE3**: keyed hashing for the daily market key. BLAKE3's keyed
//!   mode is a proper PRF, which is exactly what "derive one key per day from
//!   a market seed" wants.
//!
//! ## Domain separation
//!
//! Every digest that feeds a signature or a key is prefixed with a label
//! from [`crate::config`] via [`tagged_sha256`]. A signature over an Offer
//! digest can never be replayed as a signature over an ACK challenge, even
//! if the underlying bytes happen to line up.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data as a `Vec<u8>`.
///
/// Prefer [`sha256_array`] in hot paths; this variant exists for callers
/// that immediately hand the digest to an API wanting owned bytes.
///
/// # Example
///
/// ```
/// use voucher_protocol::crypto::sha256;
///
/// let hash = sha256(b"voucher");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    sha256_array(data).to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the double-SHA-256 hash: `SHA-256(SHA-256(data))`.
///
/// Used for Base58Check checksums, where the rest of the world settled on
/// this construction long ago.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256_array(&sha256_array(data))
}

/// SHA-256 over a domain label followed by each part, fed sequentially.
///
/// The label is length-prefixed (one byte) so that a label that is a prefix
/// of another label can't produce colliding preimages.
pub fn tagged_sha256(label: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    debug_assert!(label.len() <= u8::MAX as usize);
    let mut hasher = Sha256::new();
    hasher.update([label.len() as u8]);
    hasher.update(label);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 in keyed mode: a PRF over `data` under a 32-byte key.
pub fn blake3_keyed(key: &[u8; 32], data: &[u8]) -> [u8; 32] {
    *blake3::keyed_hash(key, data).as_bytes()
}
