//! # Identity Module
//!
//! Participant identities: how a person's credentials become a secp256k1
//! key, and how that key gets written down for the outside world.
//!
//! 1. **Derivation**: `(identifier, secret)` -> Argon2id seed -> private key.
//! 2. **Addresses**: Base58Check and SS58 for the two ledgers the market
//!    integrates with, Bech32 (`vsec`/`vpub`) for key export.
//!
//! Nothing here is on the transfer path. A voucher's own key is random and
//! lives split across shares; identity keys only sign Offers and show up in
//! the issuer field.

pub mod address;
pub mod derivation;

pub use address::{
    decode_private_key, decode_public_key, encode_private_key, encode_public_key,
    from_base58check, from_ss58, to_base58check, to_ss58, AddressError,
};
pub use derivation::{
    derive_private_key, derive_private_key_from_credentials, derive_public_key, derive_seed,
    DerivationError, SeedKdfParams,
};
