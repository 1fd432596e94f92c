//! # Transfer Protocol
//!
//! The two-QR handover: the giver shows an Offer, the receiver shows an
//! ACK, and the voucher changes hands with no network on either side.
//!
//! ```text
//!   Giver (P1, P2)                                  Receiver (P3 cached)
//!   ──────────────                                  ────────────────────
//!   lock voucher, seal P2 under H(P3)
//!   ── Offer (240 B) ────────────────────────────────────────────────▶
//!                                     open P2, rebuild key from P2+P3,
//!                                     sign the challenge, wipe the key
//!   ◀──────────────────────────────────────────────────── ACK (97 B) ──
//!   verify against voucher id,
//!   drop P2, mark Spent
//! ```
//!
//! - [`wire`]: fixed-length Offer / ACK codecs.
//! - [`state`]: the per-attempt state machine.
//! - [`engine`]: collaborators and recovery; [`giver`] and [`receiver`]
//!   add the two halves of the exchange.
//! - [`error`]: `TransferError`, the taxonomy everything above reports in.

pub mod engine;
pub mod error;
pub mod giver;
pub mod receiver;
pub mod state;
pub mod wire;

pub use engine::TransferEngine;
pub use error::TransferError;
pub use giver::GivingSession;
pub use receiver::{check_offer_freshness, DeclinedOffer, ReceivedTransfer};
pub use state::{TransferRole, TransferState, TransferStateMachine};
pub use wire::{
    challenge_digest, AckStatus, WireAck, WireError, WireOffer, ACK_LENGTH, OFFER_LENGTH,
};
