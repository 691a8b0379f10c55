//! # Account Sync
//!
//! Drives the wallet operations for a set of accounts and collects what the
//! store ends up holding.
//!
//! ```text
//! per account, concurrently:
//!   fetch_tokens ──────────┐
//!                          ├──► poll pending statuses ──► report
//!   fetch_transactions ────┘
//! ```

use std::collections::BTreeMap;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use nova_state::slices::tokens::{TokenWithMetadata, FETCH_TOKENS};
use nova_state::slices::transactions::{Transaction, FETCH_TRANSACTIONS, FETCH_TRANSACTION_STATUS};
use nova_state::{RunOutcome, ScopeKey, Wallet, WalletState};

use crate::metrics::SyncMetrics;

/// What one account looks like after a sync.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountReport {
    pub account_id: ScopeKey,
    pub tokens: Vec<TokenWithMetadata>,
    pub tokens_loading: bool,
    pub transactions: Vec<Transaction>,
    pub transactions_loading: bool,
    /// Operation id → outcome label of its last run for this account.
    pub outcomes: BTreeMap<&'static str, &'static str>,
}

/// The full output of `nova-wallet sync`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub accounts: Vec<AccountReport>,
    pub state: WalletState,
}

/// Syncs one account: tokens and transactions side by side, then the
/// status of every transaction that is not final yet.
pub async fn sync_account(
    wallet: &Wallet,
    metrics: &SyncMetrics,
    account_id: &ScopeKey,
    poll_status: bool,
) -> BTreeMap<&'static str, &'static str> {
    let started = Instant::now();
    let mut outcomes = BTreeMap::new();

    let (tokens, transactions) = tokio::join!(
        wallet.fetch_tokens(account_id),
        wallet.fetch_transactions(account_id)
    );
    note(
        metrics,
        &mut outcomes,
        account_id,
        FETCH_TOKENS.as_str(),
        &tokens,
    );
    note(
        metrics,
        &mut outcomes,
        account_id,
        FETCH_TRANSACTIONS.as_str(),
        &transactions,
    );

    if poll_status {
        let pending: Vec<Transaction> = wallet
            .transactions(account_id)
            .into_iter()
            .filter(|tx| !tx.check_status)
            .collect();

        let polls = join_all(
            pending
                .iter()
                .map(|tx| wallet.fetch_transaction_status(account_id, tx)),
        )
        .await;
        for poll in &polls {
            note(
                metrics,
                &mut outcomes,
                account_id,
                FETCH_TRANSACTION_STATUS.as_str(),
                poll,
            );
        }
    }

    metrics
        .account_sync_seconds
        .observe(started.elapsed().as_secs_f64());
    info!(
        account = %account_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "account synced"
    );
    outcomes
}

fn note<T>(
    metrics: &SyncMetrics,
    outcomes: &mut BTreeMap<&'static str, &'static str>,
    account_id: &ScopeKey,
    operation: &'static str,
    outcome: &RunOutcome<T>,
) {
    metrics.record(operation, outcome.label());
    outcomes.insert(operation, outcome.label());

    if let RunOutcome::Failed(failure) = outcome {
        warn!(account = %account_id, operation, error = %failure, "operation failed");
    }
}

/// Syncs every account concurrently and reads the results back.
pub async fn sync_all(
    wallet: &Wallet,
    metrics: &SyncMetrics,
    accounts: &[ScopeKey],
    poll_status: bool,
) -> SyncReport {
    let outcomes = join_all(
        accounts
            .iter()
            .map(|account| sync_account(wallet, metrics, account, poll_status)),
    )
    .await;

    let accounts: Vec<AccountReport> = accounts
        .iter()
        .zip(outcomes)
        .map(|(account_id, outcomes)| AccountReport {
            account_id: account_id.clone(),
            tokens: wallet.tokens_with_metadata(account_id).as_ref().clone(),
            tokens_loading: wallet.tokens_loading(account_id),
            transactions: wallet.transactions(account_id),
            transactions_loading: wallet.transactions_loading(account_id),
            outcomes,
        })
        .collect();

    metrics.accounts_synced.set(accounts.len() as i64);
    metrics
        .tokens_held
        .set(accounts.iter().map(|a| a.tokens.len() as i64).sum());
    metrics
        .transactions_cached
        .set(accounts.iter().map(|a| a.transactions.len() as i64).sum());

    SyncReport {
        accounts,
        state: wallet.snapshot(),
    }
}
