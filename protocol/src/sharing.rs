//! # Voucher Key Sharing
//!
//! A (2,3) Shamir scheme over GF(256) that splits a 32-byte voucher secret
//! key into three shares:
//!
//! | Role     | x | Who holds it                                           |
//! |----------|---|--------------------------------------------------------|
//! | Anchor   | 1 | the issuer, forever                                    |
//! | Traveler | 2 | the current holder; it moves with every transfer       |
//! | Witness  | 3 | everyone in the market, published under the daily key  |
//!
//! Any two shares rebuild the key. One share alone is uniformly random
//! noise. Every byte position is shared independently with its own random
//! linear coefficient.
//!
//! ## Finite Field Arithmetic
//!
//! GF(2^8) with the AES polynomial `x^8 + x^4 + x^3 + x + 1` (0x11B),
//! log/exp tables, generator 3.
//!
//! ## What `combine` does NOT check
//!
//! Feed it a corrupted or mismatched share and it will cheerfully hand back
//! 32 bytes of garbage. Authenticity is checked downstream, where the
//! rebuilt key's public key is compared with the voucher id and then used to
//! sign. This module only guarantees the arithmetic.
//!
//! ```
//! use voucher_protocol::sharing::{combine, split, ShareRole};
//!
//! let secret = [0x5Au8; 32];
//! let [anchor, traveler, witness] = split(&secret);
//!
//! let rebuilt = combine(&[None, Some(&traveler), Some(&witness)]).unwrap();
//! assert_eq!(*rebuilt, secret);
//! # let _ = (anchor, ShareRole::Anchor);
//! ```

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::SHARE_LENGTH;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while combining shares.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SharingError {
    /// Fewer than two shares were present.
    #[error("need at least 2 shares for reconstruction, got {0}")]
    InsufficientShares(usize),

    /// Interpolation produced a value that is not a byte. The share data is
    /// corrupt; the index points at the offending byte position.
    #[error("share data corrupted: byte {index} interpolated to {value}, outside 0..=255")]
    ReconstructionCorruption { index: usize, value: u16 },

    /// A share's bytes came in with the wrong length.
    #[error("invalid share length: expected {SHARE_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
}

// ---------------------------------------------------------------------------
// GF(256) Arithmetic
// ---------------------------------------------------------------------------

mod gf256 {
    /// Irreducible polynomial: x^8 + x^4 + x^3 + x + 1.
    const MODULUS: u16 = 0x11B;

    /// EXP[i] = 3^i. Doubled in length so a log sum never needs reducing.
    const fn build_exp_table() -> [u8; 512] {
        let mut table = [0u8; 512];
        let mut val: u16 = 1;
        let mut i = 0;
        while i < 255 {
            table[i] = val as u8;
            table[i + 255] = val as u8;
            val ^= val << 1;
            if val >= 256 {
                val ^= MODULUS;
            }
            i += 1;
        }
        table
    }

    const fn build_log_table() -> [u8; 256] {
        let exp = build_exp_table();
        let mut table = [0u8; 256];
        let mut i = 0;
        while i < 255 {
            table[exp[i] as usize] = i as u8;
            i += 1;
        }
        table
    }

    static EXP: [u8; 512] = build_exp_table();
    static LOG: [u8; 256] = build_log_table();

    #[inline]
    pub fn mul(a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        EXP[LOG[a as usize] as usize + LOG[b as usize] as usize]
    }

    /// `a / b`. Callers guarantee `b != 0`; share x-coordinates are distinct.
    #[inline]
    pub fn div(a: u8, b: u8) -> u8 {
        debug_assert!(b != 0, "division by zero in GF(256)");
        if a == 0 || b == 0 {
            return 0;
        }
        EXP[255 + LOG[a as usize] as usize - LOG[b as usize] as usize]
    }

    /// Lagrange basis weight `L_i(0)` for point `i` among `xs`.
    pub fn lagrange_weight_at_zero(xs: &[u8], i: usize) -> u8 {
        let mut numerator = 1u8;
        let mut denominator = 1u8;
        for (j, &xj) in xs.iter().enumerate() {
            if i == j {
                continue;
            }
            // (0 - x_j) = x_j in characteristic 2.
            numerator = mul(numerator, xj);
            denominator = mul(denominator, xs[i] ^ xj);
        }
        div(numerator, denominator)
    }

}

// ---------------------------------------------------------------------------
// Public Types
// ---------------------------------------------------------------------------

/// Which of the three shares a [`ShareBytes`] is. The discriminant is the
/// share's x-coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShareRole {
    /// P1, kept by the issuer.
    Anchor = 1,
    /// P2, travels with the voucher.
    Traveler = 2,
    /// P3, published to the market.
    Witness = 3,
}

impl ShareRole {
    pub const ALL: [ShareRole; 3] = [ShareRole::Anchor, ShareRole::Traveler, ShareRole::Witness];

    /// Evaluation point of this share.
    pub fn x(self) -> u8 {
        self as u8
    }

    /// Position in a `[_; 3]` share array.
    pub fn slot(self) -> usize {
        self as usize - 1
    }
}

impl fmt::Display for ShareRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShareRole::Anchor => "anchor",
            ShareRole::Traveler => "traveler",
            ShareRole::Witness => "witness",
        };
        f.write_str(name)
    }
}

/// One 32-byte share. Wipes itself on drop and never prints its contents.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ShareBytes([u8; SHARE_LENGTH]);

impl ShareBytes {
    pub fn new(bytes: [u8; SHARE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, SharingError> {
        let arr: [u8; SHARE_LENGTH] = slice
            .try_into()
            .map_err(|_| SharingError::InvalidLength(slice.len()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SHARE_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for ShareBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShareBytes(***)")
    }
}

// Shares persist as hex in the voucher store.
impl Serialize for ShareBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = Zeroizing::new(hex::encode(self.0));
        serializer.serialize_str(&encoded)
    }
}

impl<'de> Deserialize<'de> for ShareBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Zeroizing::new(String::deserialize(deserializer)?);
        let bytes = Zeroizing::new(hex::decode(s.as_str()).map_err(serde::de::Error::custom)?);
        Self::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Split and Combine
// ---------------------------------------------------------------------------

/// Split a 32-byte secret into `[anchor, traveler, witness]`.
///
/// Each byte `s` becomes the line `f(x) = s + a*x` with a fresh random `a`
/// from the OS CSPRNG, evaluated at x = 1, 2, 3.
pub fn split(secret: &[u8; SHARE_LENGTH]) -> [ShareBytes; 3] {
    let mut coefficients = Zeroizing::new([0u8; SHARE_LENGTH]);
    rand::rngs::OsRng.fill_bytes(coefficients.as_mut_slice());

    let mut out = [[0u8; SHARE_LENGTH]; 3];
    for role in ShareRole::ALL {
        let x = role.x();
        for (i, byte) in out[role.slot()].iter_mut().enumerate() {
            *byte = secret[i] ^ gf256::mul(coefficients[i], x);
        }
    }

    let shares = [
        ShareBytes(out[0]),
        ShareBytes(out[1]),
        ShareBytes(out[2]),
    ];
    out.zeroize();
    shares
}

/// Rebuild the secret from the present shares, indexed by role slot.
///
/// `None` means absent. A zero-filled share is a perfectly valid share, so
/// absence has to be explicit.
pub fn combine(
    shares: &[Option<&ShareBytes>; 3],
) -> Result<Zeroizing<[u8; SHARE_LENGTH]>, SharingError> {
    let present: Vec<(u8, &ShareBytes)> = ShareRole::ALL
        .iter()
        .filter_map(|role| shares[role.slot()].map(|s| (role.x(), s)))
        .collect();
    if present.len() < 2 {
        return Err(SharingError::InsufficientShares(present.len()));
    }

    let xs: Vec<u8> = present.iter().map(|(x, _)| *x).collect();
    let weights: Vec<u8> = (0..xs.len())
        .map(|i| gf256::lagrange_weight_at_zero(&xs, i))
        .collect();

    let mut secret = Zeroizing::new([0u8; SHARE_LENGTH]);
    for index in 0..SHARE_LENGTH {
        let mut acc: u16 = 0;
        for ((_, share), weight) in present.iter().zip(&weights) {
            acc ^= u16::from(gf256::mul(share.0[index], *weight));
        }
        secret[index] = checked_byte(index, acc)?;
    }
    Ok(secret)
}

/// Narrow an interpolated value back to a byte, flagging corruption.
fn checked_byte(index: usize, value: u16) -> Result<u8, SharingError> {
    u8::try_from(value).map_err(|_| SharingError::ReconstructionCorruption { index, value })
}
