//! # Cryptographic Primitives
//!
//! Everything security-related in the voucher protocol flows through here.
//! Boring, well-audited cryptography only:
//!
//! - **BIP-340 Schnorr over secp256k1** for signatures. A voucher id is an
//!   x-only public key, and proving you hold a voucher means signing with it.
//! - **AES-256-GCM** for share encryption. AEAD, detached tags, random nonces.
//! - **SHA-256** for digests and checksums, always domain-separated.
//! - **BLAKE3** (keyed) for the daily market key.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations. The Shamir arithmetic in [`crate::sharing`] is the one
//! piece of field math we own, and it is about forty lines of table lookups.

pub mod encryption;
pub mod hash;
pub mod keys;
pub mod signatures;

// Re-export the things people actually need.
pub use encryption::{daily_key, decrypt, encrypt, witness_share_key, SealedBox};
pub use hash::{blake3_hash, double_sha256, sha256, sha256_array, tagged_sha256};
pub use keys::{Keypair, SchnorrSignature, SecretKeyBytes, XOnlyPublicKey};
pub use signatures::{is_valid_public_key, sign_hash, verify_hash};
