// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Voucher CLI
//!
//! Entry point for the `voucher-cli` binary. Parses CLI arguments,
//! initializes logging and dispatches to one of the subcommands:
//!
//! - `keys`           derive an identity key and print its encodings
//! - `issue`          mint a demo voucher and check its Witness envelope opens
//! - `daily-key`      print a day's market key
//! - `inspect-offer`  decode an Offer QR payload
//! - `inspect-ack`    decode an ACK QR payload
//! - `config`         print the effective transfer configuration
//! - `version`        print build version information
//!
//! Results go to stdout as pretty JSON; logs go to stderr.

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;

use voucher_protocol::clock::{Clock, SystemClock};
use voucher_protocol::crypto::encryption::daily_key;
use voucher_protocol::crypto::keys::{Keypair, XOnlyPublicKey};
use voucher_protocol::crypto::signatures::verify_hash;
use voucher_protocol::identity::address::to_ss58_with_prefix;
use voucher_protocol::identity::{
    derive_private_key, derive_public_key, derive_seed, encode_private_key, encode_public_key,
    to_base58check, to_ss58,
};
use voucher_protocol::sharing::ShareRole;
use voucher_protocol::transfer::{check_offer_freshness, challenge_digest, WireAck, WireOffer};
use voucher_protocol::voucher::{
    issue_voucher, sync_witness_share, MemoryWitnessCache, StatusEvent, WitnessEnvelope,
    WitnessShareCache,
};

use cli::{Commands, VoucherCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = VoucherCli::parse();
    logging::init_logging("voucher_cli=info,voucher_protocol=info", cli.log_format);

    match cli.command {
        Commands::Keys(args) => keys(args),
        Commands::Issue(args) => issue(args).await,
        Commands::DailyKey(args) => print_daily_key(args),
        Commands::InspectOffer(args) => inspect_offer(args),
        Commands::InspectAck(args) => inspect_ack(args),
        Commands::Config(args) => emit(&serde_json::to_value(args.to_config())?),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn emit(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse exactly `N` hex-encoded bytes.
fn parse_hex<const N: usize>(what: &str, s: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(s.trim()).with_context(|| format!("{what} is not valid hex"))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("{what} must be {N} bytes, got {}", b.len()))
}

fn parse_public_key(what: &str, s: &str) -> Result<XOnlyPublicKey> {
    XOnlyPublicKey::from_hex(s.trim()).with_context(|| format!("{what} is not a valid public key"))
}

fn keys(args: cli::KeysArgs) -> Result<()> {
    tracing::info!(identifier = %args.identifier, "deriving identity key");
    let seed = derive_seed(&args.identifier, args.secret.as_bytes())
        .context("seed derivation failed")?;
    let private_key = derive_private_key(&seed).context("private key derivation failed")?;
    let public_key = derive_public_key(&private_key);

    let mut out = json!({
        "public_key": public_key.to_hex(),
        "bech32": encode_public_key(&public_key)?,
        "base58check": to_base58check(&public_key),
        "ss58": to_ss58(&public_key)?,
    });
    if args.ss58_prefix != voucher_protocol::config::SS58_DEFAULT_PREFIX {
        out["ss58_custom"] = json!(to_ss58_with_prefix(&public_key, args.ss58_prefix)?);
    }
    if args.show_private {
        out["private_key"] = json!(encode_private_key(&private_key)?.as_str());
    }
    emit(&out)
}

async fn issue(args: cli::IssueArgs) -> Result<()> {
    let clock = SystemClock;
    let now = clock.now();
    let market_seed = parse_hex::<32>("market seed", &args.market_seed)?;
    let issuer = match &args.issuer {
        Some(hex) => parse_public_key("issuer", hex)?,
        None => Keypair::generate().public_key(),
    };
    let date = args.date.unwrap_or_else(|| clock.today());
    let expires_at = args.expires_in.map(|secs| now.saturating_add(secs));

    let issued = issue_voucher(issuer, &args.issuer_name, args.value, expires_at, now)
        .context("issuance failed")?;
    let mut voucher = issued.voucher;
    let envelope = WitnessEnvelope::seal(voucher.id, &issued.witness_share, &market_seed, date)
        .context("sealing witness envelope failed")?;

    // Sync the envelope the way a market member would before publishing it.
    let cache = MemoryWitnessCache::new();
    sync_witness_share(&cache, &envelope, &market_seed)
        .await
        .context("witness envelope does not open with this market seed")?;
    if cache.get(&voucher.id).await?.as_ref() != Some(&issued.witness_share) {
        bail!("witness envelope opened to the wrong share");
    }
    tracing::info!(voucher_id = %voucher.id.short(), "witness envelope verified");

    voucher
        .apply(StatusEvent::Publish, now)
        .context("publish transition failed")?;

    let mut out = json!({
        "voucher_id": voucher.id.to_hex(),
        "value": voucher.value,
        "issuer": voucher.issuer.to_hex(),
        "issuer_name": voucher.issuer_name,
        "created_at": voucher.created_at,
        "expires_at": voucher.expires_at,
        "status": voucher.status.name(),
        "shares_held": voucher.shares.roles().iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        "witness_envelope": envelope,
    });
    if args.reveal_shares {
        tracing::warn!("printing secret shares");
        let share_hex =
            |role: ShareRole| voucher.shares.get(role).map(|s| hex::encode(s.as_bytes()));
        out["shares"] = json!({
            "anchor": share_hex(ShareRole::Anchor),
            "traveler": share_hex(ShareRole::Traveler),
        });
    }
    emit(&out)
}

fn print_daily_key(args: cli::DailyKeyArgs) -> Result<()> {
    let market_seed = parse_hex::<32>("market seed", &args.market_seed)?;
    let date = args.date.unwrap_or_else(|| SystemClock.today());
    let key = daily_key(&market_seed, date);
    emit(&json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "key": hex::encode(key.as_slice()),
    }))
}

fn inspect_offer(args: cli::InspectOfferArgs) -> Result<()> {
    let bytes = hex::decode(args.offer.trim()).context("offer is not valid hex")?;
    let offer = WireOffer::decode(&bytes).context("offer does not decode")?;
    let config = args.transfer.to_config();
    let freshness = match check_offer_freshness(&offer, &config, SystemClock.now()) {
        Ok(()) => "fresh".to_string(),
        Err(e) => e.to_string(),
    };

    let mut out = json!({
        "voucher_id": offer.voucher_id.to_hex(),
        "value": offer.value,
        "issuer_id": offer.issuer_id.to_hex(),
        "issuer_name": offer.issuer_name,
        "timestamp": offer.timestamp,
        "challenge": hex::encode(offer.challenge),
        "signed": offer.is_signed(),
        "freshness": freshness,
    });
    if let Some(sender) = &args.sender {
        let sender = parse_public_key("sender", sender)?;
        out["signed_by_sender"] = json!(offer.verify_signature(&sender));
    }
    emit(&out)
}

fn inspect_ack(args: cli::InspectAckArgs) -> Result<()> {
    let bytes = hex::decode(args.ack.trim()).context("ack is not valid hex")?;
    let ack = WireAck::decode(&bytes).context("ack does not decode")?;

    let mut out = json!({
        "voucher_id": ack.voucher_id.to_hex(),
        "status": format!("{:?}", ack.status),
        "status_byte": ack.status.to_byte(),
        "signature": ack.signature.to_hex(),
    });
    if let Some(challenge) = &args.challenge {
        let challenge = parse_hex::<16>("challenge", challenge)?;
        if ack.signature.is_empty() {
            bail!("ack carries no signature to check");
        }
        let digest = challenge_digest(&ack.voucher_id, &challenge);
        out["signature_valid"] = json!(verify_hash(
            ack.voucher_id.public_key(),
            &digest,
            &ack.signature
        ));
    }
    emit(&out)
}

fn print_version() {
    println!("voucher-cli {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", voucher_protocol::config::PROTOCOL_VERSION);
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
