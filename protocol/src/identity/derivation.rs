//! # Credential Key Derivation
//!
//! Turns an `(identifier, secret)` pair, e.g. a phone number and a PIN, into
//! a secp256k1 identity key. Two steps, deliberately split:
//!
//! ```text
//! (identifier, secret)
//!     -> Argon2id(secret, salt = tagged_sha256(identifier))   slow, memory-hard
//!     -> seed (32 bytes)
//!     -> tagged_sha256(seed || counter) until it's a valid scalar   fast
//!     -> private key
//! ```
//!
//! The seed is the brute-force-resistant root. The second step is cheap, so
//! wallets that cache the seed can re-derive the key instantly.
//!
//! [`derive_private_key_from_credentials`] is the legacy single-call entry
//! point. It is exactly the composition of the two steps and must stay that
//! way, or every key derived by an older build stops matching.

use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{
    PRIVATE_KEY_LABEL, SEED_KDF_ITERATIONS, SEED_KDF_MEMORY_KIB, SEED_KDF_PARALLELISM,
    SEED_SALT_LABEL,
};
use crate::crypto::hash::tagged_sha256;
use crate::crypto::keys::{SecretKeyBytes, XOnlyPublicKey};

/// Length of a derived seed.
pub const SEED_LENGTH: usize = 32;

/// Errors from credential derivation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DerivationError {
    #[error("identifier must not be empty")]
    EmptyIdentifier,

    #[error("secret must not be empty")]
    EmptySecret,

    #[error("invalid KDF parameters")]
    InvalidParams,

    #[error("key derivation failed")]
    KeyDerivationFailed,
}

/// Argon2id cost parameters for [`derive_seed_with_params`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedKdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for SeedKdfParams {
    fn default() -> Self {
        Self {
            memory_kib: SEED_KDF_MEMORY_KIB,
            iterations: SEED_KDF_ITERATIONS,
            parallelism: SEED_KDF_PARALLELISM,
        }
    }
}

/// Derive the 32-byte seed from credentials with the production parameters.
pub fn derive_seed(
    identifier: &str,
    secret: &[u8],
) -> Result<Zeroizing<[u8; SEED_LENGTH]>, DerivationError> {
    derive_seed_with_params(identifier, secret, SeedKdfParams::default())
}

/// Derive the seed with explicit Argon2id costs.
///
/// Same inputs and parameters always give the same seed. Different
/// parameters give unrelated seeds, so pick once and never change them.
pub fn derive_seed_with_params(
    identifier: &str,
    secret: &[u8],
    params: SeedKdfParams,
) -> Result<Zeroizing<[u8; SEED_LENGTH]>, DerivationError> {
    if identifier.is_empty() {
        return Err(DerivationError::EmptyIdentifier);
    }
    if secret.is_empty() {
        return Err(DerivationError::EmptySecret);
    }

    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(SEED_LENGTH),
    )
    .map_err(|_| DerivationError::InvalidParams)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let salt = tagged_sha256(SEED_SALT_LABEL, &[identifier.as_bytes()]);
    let mut seed = Zeroizing::new([0u8; SEED_LENGTH]);
    argon2
        .hash_password_into(secret, &salt, seed.as_mut_slice())
        .map_err(|_| DerivationError::KeyDerivationFailed)?;
    Ok(seed)
}

/// Fast one-way step from seed to private key.
///
/// Hashes `seed || counter` and bumps the counter until the digest is a
/// valid scalar. Counter 0 succeeds for all but about 2^-128 of seeds.
pub fn derive_private_key(seed: &[u8; SEED_LENGTH]) -> Result<SecretKeyBytes, DerivationError> {
    for counter in 0u32..=u8::MAX as u32 {
        let candidate = Zeroizing::new(tagged_sha256(
            PRIVATE_KEY_LABEL,
            &[seed.as_slice(), counter.to_be_bytes().as_slice()],
        ));
        if let Ok(key) = SecretKeyBytes::from_bytes(&candidate) {
            return Ok(key);
        }
    }
    Err(DerivationError::KeyDerivationFailed)
}

/// The x-only public key for a private key.
pub fn derive_public_key(private_key: &SecretKeyBytes) -> XOnlyPublicKey {
    private_key.public_key()
}

/// Legacy one-shot derivation: `derive_private_key(derive_seed(..))`.
pub fn derive_private_key_from_credentials(
    identifier: &str,
    secret: &[u8],
) -> Result<SecretKeyBytes, DerivationError> {
    let seed = derive_seed(identifier, secret)?;
    derive_private_key(&seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Argon2 at 19 MiB is slow in debug builds; most tests use a cheap profile.
    const FAST: SeedKdfParams = SeedKdfParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn seed_is_deterministic() {
        let a = derive_seed_with_params("+33600000000", b"1234", FAST).unwrap();
        let b = derive_seed_with_params("+33600000000", b"1234", FAST).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn seed_depends_on_both_inputs() {
        let base = derive_seed_with_params("alice", b"pin", FAST).unwrap();
        let other_id = derive_seed_with_params("bob", b"pin", FAST).unwrap();
        let other_secret = derive_seed_with_params("alice", b"pim", FAST).unwrap();
        assert_ne!(*base, *other_id);
        assert_ne!(*base, *other_secret);
    }

    #[test]
    fn seed_depends_on_params() {
        let a = derive_seed_with_params("alice", b"pin", FAST).unwrap();
        let b = derive_seed_with_params(
            "alice",
            b"pin",
            SeedKdfParams {
                iterations: 2,
                ..FAST
            },
        )
        .unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn empty_inputs_rejected() {
        assert_eq!(
            derive_seed_with_params("", b"pin", FAST),
            Err(DerivationError::EmptyIdentifier)
        );
        assert_eq!(
            derive_seed_with_params("alice", b"", FAST),
            Err(DerivationError::EmptySecret)
        );
    }

    #[test]
    fn bad_params_rejected() {
        let params = SeedKdfParams {
            memory_kib: 1,
            ..FAST
        };
        assert_eq!(
            derive_seed_with_params("alice", b"pin", params),
            Err(DerivationError::InvalidParams)
        );
    }

    #[test]
    fn private_key_is_deterministic_from_seed() {
        let seed = [0x33u8; 32];
        let a = derive_private_key(&seed).unwrap();
        let b = derive_private_key(&seed).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), &seed);
    }

    #[test]
    fn public_key_matches_signing_key() {
        let key = derive_private_key(&[0x44u8; 32]).unwrap();
        assert_eq!(derive_public_key(&key), key.public_key());
    }

    #[test]
    fn legacy_path_equals_two_step_path() {
        let legacy = derive_private_key_from_credentials("market-vendor-7", b"hunter2").unwrap();
        let seed = derive_seed("market-vendor-7", b"hunter2").unwrap();
        let two_step = derive_private_key(&seed).unwrap();
        assert_eq!(legacy.as_bytes(), two_step.as_bytes());
    }
}
