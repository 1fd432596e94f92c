//! # CLI Interface
//!
//! Defines the command-line argument structure for `voucher-cli` using
//! `clap` derive. Every secret-bearing argument can come from the
//! environment instead of the command line.

use clap::{Args, Parser, Subcommand};

use voucher_protocol::config::{
    TransferConfig, DEFAULT_LOCK_TTL_SECS, DEFAULT_MAX_CLOCK_SKEW_SECS, DEFAULT_OFFER_TTL_SECS,
    SS58_DEFAULT_PREFIX,
};

use crate::logging::LogFormat;

/// Offline voucher protocol tools.
///
/// Derive identity keys, mint demo vouchers, compute daily market keys and
/// decode scanned Offer / ACK payloads.
#[derive(Parser, Debug)]
#[command(
    name = "voucher-cli",
    about = "Offline voucher protocol tools",
    version,
    propagate_version = true
)]
pub struct VoucherCli {
    /// Log output format.
    #[arg(long, global = true, env = "VOUCHER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive an identity key from an identifier and a secret and print its
    /// address forms.
    Keys(KeysArgs),
    /// Issue a demo voucher and print its record and Witness envelope.
    Issue(IssueArgs),
    /// Print the market key for a given day.
    DailyKey(DailyKeyArgs),
    /// Decode a hex-encoded 240-byte Offer.
    InspectOffer(InspectOfferArgs),
    /// Decode a hex-encoded 97-byte ACK.
    InspectAck(InspectAckArgs),
    /// Print the effective transfer configuration.
    Config(TransferArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `keys` subcommand.
#[derive(Args, Debug)]
pub struct KeysArgs {
    /// Public identifier, e.g. a phone number.
    #[arg(long, env = "VOUCHER_IDENTIFIER")]
    pub identifier: String,

    /// Secret, e.g. a PIN.
    #[arg(long, env = "VOUCHER_SECRET", hide_env_values = true)]
    pub secret: String,

    /// SS58 network prefix for the substrate address.
    #[arg(long, default_value_t = SS58_DEFAULT_PREFIX)]
    pub ss58_prefix: u16,

    /// Also print the private key (`vsec1...`).
    #[arg(long)]
    pub show_private: bool,
}

/// Arguments for the `issue` subcommand.
#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Display name of the issuer, at most 20 bytes.
    #[arg(long)]
    pub issuer_name: String,

    /// Face value in minor units.
    #[arg(long)]
    pub value: u32,

    /// Issuer public key (64 hex chars). A throwaway key is used if omitted.
    #[arg(long)]
    pub issuer: Option<String>,

    /// Hex-encoded 32-byte market seed.
    #[arg(long, env = "VOUCHER_MARKET_SEED", hide_env_values = true)]
    pub market_seed: String,

    /// Day whose key seals the Witness envelope (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<chrono::NaiveDate>,

    /// Voucher lifetime in seconds. Never expires if omitted.
    #[arg(long)]
    pub expires_in: Option<u64>,

    /// Print the Anchor and Traveler shares as hex. Anyone holding both owns
    /// the voucher.
    #[arg(long)]
    pub reveal_shares: bool,
}

/// Arguments for the `daily-key` subcommand.
#[derive(Args, Debug)]
pub struct DailyKeyArgs {
    /// Hex-encoded 32-byte market seed.
    #[arg(long, env = "VOUCHER_MARKET_SEED", hide_env_values = true)]
    pub market_seed: String,

    /// Day to derive the key for (YYYY-MM-DD). Defaults to today (UTC).
    #[arg(long)]
    pub date: Option<chrono::NaiveDate>,
}

/// Arguments for the `inspect-offer` subcommand.
#[derive(Args, Debug)]
pub struct InspectOfferArgs {
    /// The Offer payload as hex.
    pub offer: String,

    /// Expected sender identity key; reports whether the Offer is signed by it.
    #[arg(long)]
    pub sender: Option<String>,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Arguments for the `inspect-ack` subcommand.
#[derive(Args, Debug)]
pub struct InspectAckArgs {
    /// The ACK payload as hex.
    pub ack: String,

    /// The 16-byte challenge from the matching Offer, as hex. When given, the
    /// ACK signature is checked against the voucher id.
    #[arg(long)]
    pub challenge: Option<String>,
}

/// Runtime transfer parameters.
#[derive(Args, Debug, Clone)]
pub struct TransferArgs {
    /// TTL of the giver's transfer lock, in seconds.
    #[arg(long, env = "VOUCHER_LOCK_TTL_SECS", default_value_t = DEFAULT_LOCK_TTL_SECS)]
    pub lock_ttl_secs: u64,

    /// How long an Offer stays acceptable after it was built, in seconds.
    #[arg(long, env = "VOUCHER_OFFER_TTL_SECS", default_value_t = DEFAULT_OFFER_TTL_SECS)]
    pub offer_ttl_secs: u64,

    /// Maximum tolerated future skew of an Offer timestamp, in seconds.
    #[arg(long, env = "VOUCHER_MAX_CLOCK_SKEW_SECS", default_value_t = DEFAULT_MAX_CLOCK_SKEW_SECS)]
    pub max_clock_skew_secs: u64,

    /// Do not sign Offers with the identity key.
    #[arg(long, env = "VOUCHER_UNSIGNED_OFFERS")]
    pub unsigned_offers: bool,
}

impl TransferArgs {
    pub fn to_config(&self) -> TransferConfig {
        TransferConfig {
            lock_ttl_secs: self.lock_ttl_secs,
            offer_ttl_secs: self.offer_ttl_secs,
            max_clock_skew_secs: self.max_clock_skew_secs,
            sign_offers: !self.unsigned_offers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        VoucherCli::command().debug_assert();
    }

    #[test]
    fn transfer_args_default_to_protocol_defaults() {
        let cli = VoucherCli::try_parse_from(["voucher-cli", "config"]).unwrap();
        match cli.command {
            Commands::Config(args) => assert_eq!(args.to_config(), TransferConfig::default()),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn shares_stay_hidden_by_default() {
        let parse = |extra: &[&str]| {
            let mut argv = vec![
                "voucher-cli",
                "issue",
                "--issuer-name",
                "Ferme",
                "--value",
                "100",
                "--market-seed",
                "00",
            ];
            argv.extend_from_slice(extra);
            match VoucherCli::try_parse_from(argv).unwrap().command {
                Commands::Issue(args) => args.reveal_shares,
                other => panic!("unexpected command {other:?}"),
            }
        };
        assert!(!parse(&[]));
        assert!(parse(&["--reveal-shares"]));
    }

    #[test]
    fn parses_daily_key_date() {
        let cli = VoucherCli::try_parse_from([
            "voucher-cli",
            "daily-key",
            "--market-seed",
            "00",
            "--date",
            "2026-05-01",
        ])
        .unwrap();
        match cli.command {
            Commands::DailyKey(args) => {
                assert_eq!(args.date, chrono::NaiveDate::from_ymd_opt(2026, 5, 1))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
