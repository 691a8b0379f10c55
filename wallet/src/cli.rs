//! # CLI Interface
//!
//! Defines the command-line argument structure for `nova-wallet` using
//! `clap` derive. Supports two subcommands: `sync` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// NOVA wallet state sync.
///
/// Loads balances, token metadata and transaction history for one or more
/// accounts into the wallet store, then prints what the store holds.
#[derive(Parser, Debug)]
#[command(
    name = "nova-wallet",
    about = "NOVA wallet state sync",
    version,
    propagate_version = true
)]
pub struct NovaWalletCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the wallet binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync the given accounts against a service fixture and print the
    /// resulting state as JSON.
    Sync(SyncArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `sync` subcommand.
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// JSON fixture describing the simulated token and explorer services.
    #[arg(long, short = 'f', env = "NOVA_WALLET_FIXTURE")]
    pub fixture: PathBuf,

    /// Account to sync. Repeat for several accounts.
    ///
    /// When omitted, every account the fixture knows about is synced.
    #[arg(long = "account", short = 'a')]
    pub accounts: Vec<String>,

    /// Extra contract always queried for balances. Repeat for several.
    ///
    /// When omitted, the built-in whitelist is used.
    #[arg(long = "whitelist")]
    pub whitelist: Vec<String>,

    /// Duplicate-fetch policy: strict or soft.
    #[arg(long, env = "NOVA_WALLET_DEDUP", default_value = "strict")]
    pub dedup: String,

    /// Poll the status of every transaction that is not final yet.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub poll_status: bool,

    /// Log format: pretty or json.
    #[arg(long, env = "NOVA_WALLET_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Print Prometheus metrics after the report.
    #[arg(long)]
    pub metrics: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        NovaWalletCli::command().debug_assert();
    }

    #[test]
    fn sync_collects_repeated_accounts() {
        let cli = NovaWalletCli::parse_from([
            "nova-wallet",
            "sync",
            "--fixture",
            "fixtures/sample.json",
            "-a",
            "alice.near",
            "--account",
            "bob.near",
            "--dedup",
            "soft",
        ]);

        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.accounts, vec!["alice.near", "bob.near"]);
                assert_eq!(args.dedup, "soft");
                assert!(args.poll_status);
                assert!(!args.metrics);
                assert!(args.whitelist.is_empty());
            }
            other => panic!("expected sync, got {other:?}"),
        }
    }
}
