// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Voucher Protocol: Core Library
//!
//! Paper vouchers, minus the paper. A voucher is a bearer claim whose
//! ownership is the ability to sign with a secp256k1 key, and that key is
//! never whole on any one device. It lives as three Shamir shares:
//!
//! - **Anchor** stays with the issuer.
//! - **Traveler** moves with every handover.
//! - **Witness** is published to the whole market under a daily key.
//!
//! Handing a voucher over is two QR codes and no network: the giver shows an
//! Offer carrying the Traveler share encrypted under a key only Witness
//! holders can derive, the receiver rebuilds the voucher key, signs the
//! giver's challenge with it and shows an ACK. The giver checks the
//! signature and marks the voucher spent. A TTL'd transfer lock keeps the
//! same voucher from being offered twice at once.
//!
//! ## Architecture
//!
//! - **crypto**: Schnorr signatures, AES-GCM, hashing, key types.
//! - **sharing**: (2,3) Shamir over GF(256).
//! - **identity**: credential-derived keys and their address encodings.
//! - **voucher**: the voucher record, its lifecycle, the transfer lock,
//!   storage traits and issuance.
//! - **transfer**: the Offer/ACK wire format and the exchange itself.
//! - **clock**: an injectable time source, because TTLs need testing.
//! - **config**: protocol constants and runtime-tunable parameters.
//!
//! ## Design Philosophy
//!
//! 1. Fixed-size wire formats. A QR code is not the place for surprises.
//! 2. Secrets live in wiping types, are never logged, and never outlive the
//!    function that needed them.
//! 3. Failed transfers leave the voucher exactly where it was.
//! 4. If it touches value, it has tests. Plural.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod identity;
pub mod sharing;
pub mod transfer;
pub mod voucher;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TransferConfig;
pub use transfer::{TransferEngine, TransferError};
pub use voucher::{Status, Voucher, VoucherId};
