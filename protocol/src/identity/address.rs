//! # Address Formats
//!
//! Three ways to write a key down, none of which the transfer core cares
//! about:
//!
//! - **Base58Check**: `version || pubkey || double_sha256[..4]` in Base58.
//!   The integrated ledger's account format.
//! - **SS58**: `prefix || pubkey || blake2b_512("SS58PRE" || ...)[..2]` in
//!   Base58, with the substrate one- or two-byte network prefix.
//! - **Bech32** with `vsec` / `vpub` HRPs for exporting private and public
//!   keys in a form that survives being read aloud over the phone.
//!
//! Every decoder validates length, checksum and (for keys) curve membership
//! before handing anything back.

use bech32::{Bech32, Hrp};
use blake2::{Blake2b512, Digest};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{
    BASE58_VERSION_BYTE, PRIVATE_KEY_HRP, PUBLIC_KEY_HRP, PUBLIC_KEY_LENGTH,
    SECRET_KEY_LENGTH, SS58_CHECKSUM_LENGTH, SS58_DEFAULT_PREFIX,
};
use crate::crypto::hash::double_sha256;
use crate::crypto::keys::{KeyError, SecretKeyBytes, XOnlyPublicKey};

/// Base58Check checksum length.
const BASE58_CHECKSUM_LENGTH: usize = 4;

/// Largest network id SS58 can encode (14 bits).
const SS58_MAX_PREFIX: u16 = 16_383;

const SS58_CONTEXT: &[u8] = b"SS58PRE";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while encoding or decoding addresses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58 string")]
    InvalidBase58,

    #[error("address checksum mismatch")]
    InvalidChecksum,

    #[error("invalid address length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid SS58 network prefix: {0}")]
    InvalidPrefix(u16),

    #[error("invalid HRP: expected '{expected}', got '{got}'")]
    InvalidHrp { expected: String, got: String },

    #[error("bech32 error: {0}")]
    Bech32(String),

    #[error(transparent)]
    Key(#[from] KeyError),
}

// ---------------------------------------------------------------------------
// Base58Check
// ---------------------------------------------------------------------------

/// Encode a public key as Base58Check with the default version byte.
pub fn to_base58check(public_key: &XOnlyPublicKey) -> String {
    to_base58check_versioned(public_key, BASE58_VERSION_BYTE)
}

/// Encode a public key as Base58Check with an explicit version byte.
pub fn to_base58check_versioned(public_key: &XOnlyPublicKey, version: u8) -> String {
    let mut payload = Vec::with_capacity(1 + PUBLIC_KEY_LENGTH + BASE58_CHECKSUM_LENGTH);
    payload.push(version);
    payload.extend_from_slice(public_key.as_bytes());
    let checksum = double_sha256(&payload);
    payload.extend_from_slice(&checksum[..BASE58_CHECKSUM_LENGTH]);
    bs58::encode(payload).into_string()
}

/// Decode a Base58Check address into `(version, public_key)`.
pub fn from_base58check(address: &str) -> Result<(u8, XOnlyPublicKey), AddressError> {
    let raw = bs58::decode(address)
        .into_vec()
        .map_err(|_| AddressError::InvalidBase58)?;
    let expected = 1 + PUBLIC_KEY_LENGTH + BASE58_CHECKSUM_LENGTH;
    if raw.len() != expected {
        return Err(AddressError::InvalidLength {
            expected,
            got: raw.len(),
        });
    }

    let (body, checksum) = raw.split_at(1 + PUBLIC_KEY_LENGTH);
    if double_sha256(body)[..BASE58_CHECKSUM_LENGTH] != *checksum {
        return Err(AddressError::InvalidChecksum);
    }
    let public_key = XOnlyPublicKey::from_slice(&body[1..])?;
    Ok((body[0], public_key))
}

// ---------------------------------------------------------------------------
// SS58
// ---------------------------------------------------------------------------

/// Encode a public key as SS58 with the default network prefix.
pub fn to_ss58(public_key: &XOnlyPublicKey) -> Result<String, AddressError> {
    ss58_encode_raw(public_key.as_bytes(), SS58_DEFAULT_PREFIX)
}

/// Encode a public key as SS58 under `prefix` (0..=16383).
pub fn to_ss58_with_prefix(
    public_key: &XOnlyPublicKey,
    prefix: u16,
) -> Result<String, AddressError> {
    ss58_encode_raw(public_key.as_bytes(), prefix)
}

/// Decode an SS58 address into `(prefix, public_key)`.
pub fn from_ss58(address: &str) -> Result<(u16, XOnlyPublicKey), AddressError> {
    let (prefix, bytes) = ss58_decode_raw(address)?;
    Ok((prefix, XOnlyPublicKey::from_bytes(&bytes)?))
}

fn ss58_prefix_bytes(prefix: u16) -> Result<Vec<u8>, AddressError> {
    match prefix {
        0..=63 => Ok(vec![prefix as u8]),
        64..=SS58_MAX_PREFIX => {
            let first = (((prefix & 0b0000_0000_1111_1100) >> 2) as u8) | 0b0100_0000;
            let second = ((prefix >> 8) as u8) | (((prefix & 0b0000_0000_0000_0011) as u8) << 6);
            Ok(vec![first, second])
        }
        _ => Err(AddressError::InvalidPrefix(prefix)),
    }
}

fn ss58_checksum(data: &[u8]) -> [u8; SS58_CHECKSUM_LENGTH] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CONTEXT);
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; SS58_CHECKSUM_LENGTH];
    out.copy_from_slice(&digest[..SS58_CHECKSUM_LENGTH]);
    out
}

fn ss58_encode_raw(
    key: &[u8; PUBLIC_KEY_LENGTH],
    prefix: u16,
) -> Result<String, AddressError> {
    let mut payload = ss58_prefix_bytes(prefix)?;
    payload.extend_from_slice(key);
    let checksum = ss58_checksum(&payload);
    payload.extend_from_slice(&checksum);
    Ok(bs58::encode(payload).into_string())
}

fn ss58_decode_raw(address: &str) -> Result<(u16, [u8; PUBLIC_KEY_LENGTH]), AddressError> {
    let raw = bs58::decode(address)
        .into_vec()
        .map_err(|_| AddressError::InvalidBase58)?;

    let (prefix_len, prefix) = match raw.first() {
        Some(&b) if b < 64 => (1, u16::from(b)),
        Some(&b) if b < 128 => {
            let second = *raw.get(1).ok_or(AddressError::InvalidLength {
                expected: 2 + PUBLIC_KEY_LENGTH + SS58_CHECKSUM_LENGTH,
                got: raw.len(),
            })?;
            let lower = (b << 2) | (second >> 6);
            let upper = second & 0b0011_1111;
            (2, u16::from(lower) | (u16::from(upper) << 8))
        }
        Some(&b) => return Err(AddressError::InvalidPrefix(u16::from(b))),
        None => return Err(AddressError::InvalidBase58),
    };

    let expected = prefix_len + PUBLIC_KEY_LENGTH + SS58_CHECKSUM_LENGTH;
    if raw.len() != expected {
        return Err(AddressError::InvalidLength {
            expected,
            got: raw.len(),
        });
    }

    let (body, checksum) = raw.split_at(prefix_len + PUBLIC_KEY_LENGTH);
    if ss58_checksum(body) != checksum {
        return Err(AddressError::InvalidChecksum);
    }
    let mut key = [0u8; PUBLIC_KEY_LENGTH];
    key.copy_from_slice(&body[prefix_len..]);
    Ok((prefix, key))
}

// ---------------------------------------------------------------------------
// Bech32
// ---------------------------------------------------------------------------

fn bech32_encode(hrp: &str, data: &[u8]) -> Result<String, AddressError> {
    let hrp = Hrp::parse(hrp).map_err(|e| AddressError::Bech32(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| AddressError::Bech32(e.to_string()))
}

fn bech32_decode(expected_hrp: &str, s: &str) -> Result<Zeroizing<Vec<u8>>, AddressError> {
    let (hrp, data) = bech32::decode(s).map_err(|e| AddressError::Bech32(e.to_string()))?;
    let data = Zeroizing::new(data);
    if hrp.as_str() != expected_hrp {
        return Err(AddressError::InvalidHrp {
            expected: expected_hrp.to_string(),
            got: hrp.to_string(),
        });
    }
    Ok(data)
}

/// Encode a private key as `vsec1...`. The string is wiped on drop.
pub fn encode_private_key(key: &SecretKeyBytes) -> Result<Zeroizing<String>, AddressError> {
    bech32_encode(PRIVATE_KEY_HRP, key.as_bytes()).map(Zeroizing::new)
}

/// Decode a `vsec1...` string back into a validated private key.
pub fn decode_private_key(s: &str) -> Result<SecretKeyBytes, AddressError> {
    let data = bech32_decode(PRIVATE_KEY_HRP, s)?;
    if data.len() != SECRET_KEY_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: SECRET_KEY_LENGTH,
            got: data.len(),
        });
    }
    Ok(SecretKeyBytes::from_slice(&data)?)
}

/// Encode a public key as `vpub1...`.
pub fn encode_public_key(key: &XOnlyPublicKey) -> Result<String, AddressError> {
    bech32_encode(PUBLIC_KEY_HRP, key.as_bytes())
}

/// Decode a `vpub1...` string back into a validated public key.
pub fn decode_public_key(s: &str) -> Result<XOnlyPublicKey, AddressError> {
    let data = bech32_decode(PUBLIC_KEY_HRP, s)?;
    if data.len() != PUBLIC_KEY_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: PUBLIC_KEY_LENGTH,
            got: data.len(),
        });
    }
    Ok(XOnlyPublicKey::from_slice(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;

    #[test]
    fn base58check_roundtrip() {
        let pk = Keypair::generate().public_key();
        let address = to_base58check(&pk);
        assert_eq!(from_base58check(&address).unwrap(), (BASE58_VERSION_BYTE, pk));
    }

    #[test]
    fn base58check_version_byte_preserved() {
        let pk = Keypair::generate().public_key();
        let address = to_base58check_versioned(&pk, 0x1E);
        assert_eq!(from_base58check(&address).unwrap().0, 0x1E);
        assert_ne!(address, to_base58check(&pk));
    }

    #[test]
    fn base58check_detects_typo() {
        let pk = Keypair::generate().public_key();
        let address = to_base58check(&pk);
        let mut chars: Vec<char> = address.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '2' { '3' } else { '2' };
        let typo: String = chars.into_iter().collect();
        assert!(from_base58check(&typo).is_err());
    }

    #[test]
    fn ss58_known_vector() {
        // The well-known development account under the generic prefix.
        let key: [u8; 32] =
            hex::decode("d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d")
                .unwrap()
                .try_into()
                .unwrap();
        let address = ss58_encode_raw(&key, 42).unwrap();
        assert_eq!(address, "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY");
        assert_eq!(ss58_decode_raw(&address).unwrap(), (42, key));
    }

    #[test]
    fn ss58_roundtrip_for_one_and_two_byte_prefixes() {
        let pk = Keypair::generate().public_key();
        for prefix in [0u16, 42, 63, 64, 2_007, SS58_MAX_PREFIX] {
            let address = to_ss58_with_prefix(&pk, prefix).unwrap();
            assert_eq!(from_ss58(&address).unwrap(), (prefix, pk), "prefix {prefix}");
        }
    }

    #[test]
    fn ss58_rejects_oversized_prefix() {
        let pk = Keypair::generate().public_key();
        assert_eq!(
            to_ss58_with_prefix(&pk, SS58_MAX_PREFIX + 1),
            Err(AddressError::InvalidPrefix(SS58_MAX_PREFIX + 1))
        );
    }

    #[test]
    fn ss58_default_prefix() {
        let pk = Keypair::generate().public_key();
        assert_eq!(from_ss58(&to_ss58(&pk).unwrap()).unwrap().0, SS58_DEFAULT_PREFIX);
    }

    #[test]
    fn bech32_private_key_roundtrip() {
        let secret = SecretKeyBytes::generate();
        let encoded = encode_private_key(&secret).unwrap();
        assert!(encoded.starts_with("vsec1"));
        let decoded = decode_private_key(&encoded).unwrap();
        assert_eq!(decoded.as_bytes(), secret.as_bytes());
    }

    #[test]
    fn bech32_public_key_roundtrip() {
        let pk = Keypair::generate().public_key();
        let encoded = encode_public_key(&pk).unwrap();
        assert!(encoded.starts_with("vpub1"));
        assert_eq!(decode_public_key(&encoded).unwrap(), pk);
    }

    #[test]
    fn bech32_hrps_not_interchangeable() {
        let kp = Keypair::generate();
        let public = encode_public_key(&kp.public_key()).unwrap();
        assert!(matches!(
            decode_private_key(&public),
            Err(AddressError::InvalidHrp { .. })
        ));
        let private = encode_private_key(kp.secret()).unwrap();
        assert!(decode_public_key(&private).is_err());
    }
}
