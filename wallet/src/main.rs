// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NOVA Wallet
//!
//! Entry point for the `nova-wallet` binary. Runs the wallet state layer
//! against a fixture-backed service and prints what the store holds.
//!
//! ## Subcommands
//!
//! - `sync`    — Sync accounts from a fixture and print a JSON report.
//! - `version` — Print version information.
//!
//! ## Example
//!
//! ```text
//! nova-wallet sync --fixture wallet/fixtures/sample.json -a alice.near --metrics
//! ```

mod cli;
mod fixture;
mod logging;
mod metrics;
mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use nova_state::{DedupPolicy, ScopeKey, StoreConfig, Wallet};

use cli::{Commands, NovaWalletCli};
use fixture::FixtureService;
use logging::LogFormat;
use metrics::SyncMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = NovaWalletCli::parse();

    match cli.command {
        Commands::Sync(args) => run_sync(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Syncs the requested accounts and writes the report to stdout.
async fn run_sync(args: cli::SyncArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&args.log_format),
    );

    // --- Services ---
    let service = Arc::new(FixtureService::from_path(&args.fixture)?);
    let accounts: Vec<ScopeKey> = if args.accounts.is_empty() {
        service.accounts().into_iter().map(ScopeKey::from).collect()
    } else {
        args.accounts.iter().map(|a| ScopeKey::from(a.as_str())).collect()
    };
    if accounts.is_empty() {
        anyhow::bail!("no accounts to sync: pass --account or add some to the fixture");
    }

    // --- Store ---
    let mut config = StoreConfig {
        dedup: DedupPolicy::from_str_lossy(&args.dedup),
        ..StoreConfig::default()
    };
    if !args.whitelist.is_empty() {
        config.whitelisted_contracts = args.whitelist.clone();
    }
    tracing::info!(
        fixture = %args.fixture.display(),
        accounts = accounts.len(),
        dedup = ?config.dedup,
        "starting sync"
    );

    let wallet = Wallet::new(config, service.clone(), service);
    let metrics = SyncMetrics::new().context("failed to register metrics")?;

    // --- Sync ---
    let report = sync::sync_all(&wallet, &metrics, &accounts, args.poll_status).await;

    let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
    println!("{json}");

    if args.metrics {
        let text = metrics.encode().context("failed to encode metrics")?;
        println!("{text}");
    }

    tracing::info!(
        accounts = metrics.accounts_synced.get(),
        tokens = metrics.tokens_held.get(),
        transactions = metrics.transactions_cached.get(),
        "sync finished"
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("nova-wallet {}", env!("CARGO_PKG_VERSION"));
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
