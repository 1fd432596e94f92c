//! # Protocol Configuration & Constants
//!
//! Every magic number in the voucher protocol lives here. If you're
//! hardcoding a constant somewhere else, you're doing it wrong and you owe
//! the team coffee.
//!
//! The wire sizes below are load-bearing: two phones that disagree on a
//! single byte offset will happily scan each other's QR codes and then
//! reject every transfer. Change them only together with `WIRE_VERSION`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol version string, reported by the CLI.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Three-byte tag that opens every Offer payload. Followed by
/// [`WIRE_VERSION`] to form the 4-byte magic+version field.
pub const OFFER_MAGIC: [u8; 3] = *b"VCH";

/// Wire format version for Offer payloads. Bump on any layout change.
pub const WIRE_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Secret (private) key length in bytes. secp256k1 scalars are 32 bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// BIP-340 x-only public key length in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// BIP-340 Schnorr signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Message hashes fed to the signature engine are always 32 bytes.
pub const MESSAGE_HASH_LENGTH: usize = 32;

/// Length of one Shamir share of a voucher key. Same as the key itself,
/// because every byte position is shared independently.
pub const SHARE_LENGTH: usize = 32;

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Not 16. Not 8.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// Length of the random challenge bound to a single Offer.
pub const CHALLENGE_LENGTH: usize = 16;

/// Maximum issuer display name length on the wire (UTF-8 bytes).
pub const ISSUER_NAME_LENGTH: usize = 20;

/// Truncated SHA-256 checksum length at the end of an Offer.
pub const CHECKSUM_LENGTH: usize = 4;

// ---------------------------------------------------------------------------
// Key Derivation
// ---------------------------------------------------------------------------

/// Argon2id memory cost in KiB (19 MiB, the OWASP baseline).
pub const SEED_KDF_MEMORY_KIB: u32 = 19 * 1024;

/// Argon2id iteration count.
pub const SEED_KDF_ITERATIONS: u32 = 2;

/// Argon2id lane count. Phones are the target; one lane keeps it predictable.
pub const SEED_KDF_PARALLELISM: u32 = 1;

/// Domain label mixed into the seed salt.
pub const SEED_SALT_LABEL: &[u8] = b"voucher-protocol/seed-salt/v1";

/// Domain label for the seed -> private key step.
pub const PRIVATE_KEY_LABEL: &[u8] = b"voucher-protocol/private-key/v1";

/// Domain label for deriving the Traveler-share AEAD key from the Witness share.
pub const WITNESS_KEY_LABEL: &[u8] = b"voucher-protocol/witness-key/v1";

/// Domain label for the Offer signing digest.
pub const OFFER_DIGEST_LABEL: &[u8] = b"voucher-protocol/offer/v1";

/// Domain label for the ACK challenge digest.
pub const CHALLENGE_DIGEST_LABEL: &[u8] = b"voucher-protocol/challenge/v1";

// ---------------------------------------------------------------------------
// Address Formats
// ---------------------------------------------------------------------------

/// Bech32 HRP for encoded private keys.
pub const PRIVATE_KEY_HRP: &str = "vsec";

/// Bech32 HRP for encoded public keys.
pub const PUBLIC_KEY_HRP: &str = "vpub";

/// Default Base58Check version byte for the integrated ledger.
pub const BASE58_VERSION_BYTE: u8 = 0x00;

/// Default SS58 network prefix (42 = generic substrate).
pub const SS58_DEFAULT_PREFIX: u16 = 42;

/// Length of the truncated BLAKE2b checksum in an SS58 address over a
/// 32-byte public key.
pub const SS58_CHECKSUM_LENGTH: usize = 2;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Default transfer lock TTL. Five minutes covers a slow QR dance; after
/// that the voucher quietly reverts to `Active`.
pub const DEFAULT_LOCK_TTL_SECS: u64 = 300;

/// Default validity window for a scanned Offer.
pub const DEFAULT_OFFER_TTL_SECS: u64 = 300;

/// How far into the future an Offer timestamp may be before we call it
/// forged. Phones with no network drift; 2 minutes is generous.
pub const DEFAULT_MAX_CLOCK_SKEW_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Runtime-tunable transfer parameters.
///
/// Everything here has a sane default; market operators override values
/// through whatever configuration surface hosts the core (the CLI maps them
/// to flags and environment variables).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// TTL of the giver's transfer lock.
    pub lock_ttl_secs: u64,
    /// How long a receiver accepts an Offer after its embedded timestamp.
    pub offer_ttl_secs: u64,
    /// Maximum tolerated future skew of an Offer timestamp.
    pub max_clock_skew_secs: u64,
    /// Whether the giver signs Offers with its identity key.
    pub sign_offers: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            offer_ttl_secs: DEFAULT_OFFER_TTL_SECS,
            max_clock_skew_secs: DEFAULT_MAX_CLOCK_SKEW_SECS,
            sign_offers: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_magic_is_ascii() {
        assert!(OFFER_MAGIC.iter().all(|b| b.is_ascii_uppercase()));
    }

    #[test]
    fn test_crypto_parameter_sizes() {
        assert_eq!(SECRET_KEY_LENGTH, 32);
        assert_eq!(PUBLIC_KEY_LENGTH, 32);
        assert_eq!(SIGNATURE_LENGTH, 64);
        assert_eq!(AES_KEY_LENGTH, 32);
        assert_eq!(AES_NONCE_LENGTH, 12);
        assert_eq!(AES_TAG_LENGTH, 16);
        assert_eq!(SHARE_LENGTH, SECRET_KEY_LENGTH);
    }

    #[test]
    fn test_domain_labels_are_distinct() {
        let labels = [
            SEED_SALT_LABEL,
            PRIVATE_KEY_LABEL,
            WITNESS_KEY_LABEL,
            OFFER_DIGEST_LABEL,
            CHALLENGE_DIGEST_LABEL,
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_default_transfer_config() {
        let config = TransferConfig::default();
        assert_eq!(config.lock_ttl_secs, 300);
        assert_eq!(config.offer_ttl_secs, 300);
        assert!(config.sign_offers);
    }

    #[test]
    fn test_transfer_config_partial_json() {
        // Missing fields fall back to defaults.
        let config: TransferConfig = serde_json::from_str(r#"{"lock_ttl_secs": 60}"#).unwrap();
        assert_eq!(config.lock_ttl_secs, 60);
        assert_eq!(config.offer_ttl_secs, DEFAULT_OFFER_TTL_SECS);
    }
}
