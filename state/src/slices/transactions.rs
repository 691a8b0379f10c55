//! # Transactions Slice — Per-Account Transaction History
//!
//! One scope entry per account, holding the account's transactions newest
//! first. The scope status tracks the history fetch; each status poll is
//! tracked under the transaction's `hash_with_index`.
//!
//! The first successful fetch replaces the collection, later ones upsert
//! into it. Upserts keep a status that was already polled when the explorer
//! sends the transaction again without one.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{STATUS_FAILURE, STATUS_NOT_AVAILABLE, STATUS_SUCCESS_VALUE, TRANSACTIONS_SLICE};
use crate::entity::{Entity, EntityAdapter, EntityCollection};
use crate::lifecycle::{LifecycleEvent, OperationFailure, OperationId, OperationMeta, ScopeKey};
use crate::ports::ExplorerService;
use crate::runtime::{Operation, OperationContext, Reducer};
use crate::scope::{ScopeLifecycle, ScopeSeed, ScopeStore};
use crate::selectors::{select_loading, select_resource_status, CollectionSelectors};
use crate::status::{StatusPath, StatusTracker};

pub const FETCH_TRANSACTIONS: OperationId = OperationId::new("transactions/fetchTransactions");
pub const FETCH_TRANSACTION_STATUS: OperationId =
    OperationId::new("transactions/fetchTransactionStatus");

// ---------------------------------------------------------------------------
// TransactionStatus
// ---------------------------------------------------------------------------

/// Execution outcome reported by the explorer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    SuccessValue,
    Failure,
    /// The explorer could not be asked, or did not know.
    NotAvailable,
    /// Any other key the explorer reports (e.g. `"SuccessReceiptId"`).
    Other(String),
}

impl TransactionStatus {
    /// Maps an explorer status key.
    pub fn from_key(key: &str) -> Self {
        match key {
            STATUS_SUCCESS_VALUE => TransactionStatus::SuccessValue,
            STATUS_FAILURE => TransactionStatus::Failure,
            STATUS_NOT_AVAILABLE => TransactionStatus::NotAvailable,
            other => TransactionStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::SuccessValue => STATUS_SUCCESS_VALUE,
            TransactionStatus::Failure => STATUS_FAILURE,
            TransactionStatus::NotAvailable => STATUS_NOT_AVAILABLE,
            TransactionStatus::Other(key) => key,
        }
    }

    /// `true` once the outcome can no longer change, so polling can stop.
    pub fn is_final(&self) -> bool {
        matches!(self, TransactionStatus::SuccessValue | TransactionStatus::Failure)
    }
}

impl From<String> for TransactionStatus {
    fn from(key: String) -> Self {
        Self::from_key(&key)
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// One transaction as listed by the explorer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    /// `hash` plus the action index; unique per listed row.
    pub hash_with_index: String,
    pub signer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    /// Nanoseconds since the epoch.
    pub block_timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
    /// Set once `status` is final.
    #[serde(default)]
    pub check_status: bool,
}

impl Entity for Transaction {
    type Id = String;

    fn id(&self) -> String {
        self.hash_with_index.clone()
    }

    fn merge(&mut self, incoming: Self) {
        let polled = (self.status.take(), self.check_status);
        *self = incoming;
        if self.status.is_none() {
            (self.status, self.check_status) = polled;
        }
    }
}

fn newest_first(a: &Transaction, b: &Transaction) -> Ordering {
    b.block_timestamp.cmp(&a.block_timestamp)
}

/// Keyed by `hash_with_index`, sorted by block timestamp, newest first.
pub const TRANSACTIONS: EntityAdapter<Transaction> = EntityAdapter::sorted_by(newest_first);

const TRANSACTION_SELECTORS: CollectionSelectors<Transaction> =
    CollectionSelectors::new(TRANSACTIONS);

// ---------------------------------------------------------------------------
// State & actions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsState {
    pub by_account_id: ScopeStore<(), Transaction>,
    #[serde(skip)]
    lifecycle: ScopeLifecycle<(), Transaction>,
    #[serde(skip)]
    tracker: StatusTracker,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionsAction {
    /// Replaces an account's transactions.
    SetTransactions {
        account_id: ScopeKey,
        transactions: Vec<Transaction>,
    },
    /// Upserts into an account's transactions.
    UpdateTransactions {
        account_id: ScopeKey,
        transactions: Vec<Transaction>,
    },
    /// Records a polled status on one transaction.
    UpdateTransactionStatus {
        account_id: ScopeKey,
        hash_with_index: String,
        status: TransactionStatus,
        check_status: bool,
    },
    /// Forgets an account's transactions and resets its statuses.
    ClearTransactions { account_id: ScopeKey },
}

impl TransactionsState {
    pub fn new() -> Self {
        Self {
            by_account_id: ScopeStore::new(),
            lifecycle: ScopeLifecycle::new(ScopeSeed::new(()).with_items(TRANSACTIONS))
                .on(FETCH_TRANSACTIONS)
                .on(FETCH_TRANSACTION_STATUS),
            tracker: StatusTracker::new()
                .track(FETCH_TRANSACTIONS, |meta: &OperationMeta| {
                    StatusPath::Scope(meta.scope.clone())
                })
                .track(FETCH_TRANSACTION_STATUS, |meta: &OperationMeta| {
                    StatusPath::Resource {
                        scope: meta.scope.clone(),
                        resource: meta.resource.clone().unwrap_or_default(),
                    }
                }),
        }
    }

    pub fn on_lifecycle(&mut self, event: &LifecycleEvent) {
        self.lifecycle.apply(&mut self.by_account_id, event);
        self.tracker.apply(&mut self.by_account_id, event);
    }

    pub fn reduce(&mut self, action: TransactionsAction) {
        match action {
            TransactionsAction::SetTransactions {
                account_id,
                transactions,
            } => self.with_items(&account_id, |items| items.set_all(transactions)),
            TransactionsAction::UpdateTransactions {
                account_id,
                transactions,
            } => self.with_items(&account_id, |items| items.upsert_many(transactions)),
            TransactionsAction::UpdateTransactionStatus {
                account_id,
                hash_with_index,
                status,
                check_status,
            } => self.with_items(&account_id, |items| {
                let updated = items.update_one(&hash_with_index, |tx| {
                    tx.status = Some(status);
                    tx.check_status = check_status;
                });
                if let Err(err) = updated {
                    warn!(
                        slice = TRANSACTIONS_SLICE,
                        error = %err,
                        "status for unknown transaction dropped"
                    );
                }
            }),
            TransactionsAction::ClearTransactions { account_id } => {
                let cleared = self.by_account_id.update(&account_id, |entry| {
                    entry.items = Some(TRANSACTIONS.initial_state());
                    entry.status.reset();
                    entry.resources.clear();
                });
                if cleared.is_err() {
                    debug!(slice = TRANSACTIONS_SLICE, account = %account_id, "nothing to clear");
                }
            }
        }
    }

    fn with_items(
        &mut self,
        account_id: &ScopeKey,
        f: impl FnOnce(&mut EntityCollection<Transaction>),
    ) {
        if let Err(err) = self.by_account_id.update_items(account_id, &TRANSACTIONS, f) {
            warn!(
                slice = TRANSACTIONS_SLICE,
                account = %account_id,
                error = %err,
                "transactions dropped"
            );
        }
    }
}

impl Default for TransactionsState {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<TransactionsState> for TransactionsState {
    fn as_ref(&self) -> &TransactionsState {
        self
    }
}

impl PartialEq for TransactionsState {
    fn eq(&self, other: &Self) -> bool {
        self.by_account_id == other.by_account_id
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTransactionsArgs {
    pub account_id: ScopeKey,
}

/// Loads an account's recent transactions from the explorer.
#[derive(Clone)]
pub struct FetchTransactions {
    explorer: Arc<dyn ExplorerService>,
}

impl FetchTransactions {
    pub fn new(explorer: Arc<dyn ExplorerService>) -> Self {
        Self { explorer }
    }
}

#[async_trait]
impl<S> Operation<S> for FetchTransactions
where
    S: Reducer + AsRef<TransactionsState>,
    S::Action: From<TransactionsAction>,
{
    type Args = FetchTransactionsArgs;
    /// Number of transactions the explorer returned.
    type Output = usize;

    fn id(&self) -> OperationId {
        FETCH_TRANSACTIONS
    }

    fn scope_key(&self, args: &FetchTransactionsArgs) -> ScopeKey {
        args.account_id.clone()
    }

    fn condition(&self, args: &FetchTransactionsArgs, state: &S) -> bool {
        !select_transactions_loading(state, &args.account_id)
    }

    async fn start(
        &self,
        args: FetchTransactionsArgs,
        ctx: &OperationContext<'_, S>,
    ) -> Result<usize, OperationFailure> {
        let transactions = self.explorer.transactions(args.account_id.as_str()).await?;
        let fetched = transactions.len();

        let known = ctx.read(|state| select_transactions_total(state, &args.account_id));
        let action = if known == 0 {
            TransactionsAction::SetTransactions {
                account_id: args.account_id,
                transactions,
            }
        } else {
            TransactionsAction::UpdateTransactions {
                account_id: args.account_id,
                transactions,
            }
        };
        ctx.dispatch(action);
        Ok(fetched)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTransactionStatusArgs {
    pub account_id: ScopeKey,
    pub hash: String,
    pub signer_id: String,
    pub hash_with_index: String,
}

impl FetchTransactionStatusArgs {
    /// Poll arguments for `transaction`, listed under `account_id`.
    pub fn for_transaction(account_id: ScopeKey, transaction: &Transaction) -> Self {
        Self {
            account_id,
            hash: transaction.hash.clone(),
            signer_id: transaction.signer_id.clone(),
            hash_with_index: transaction.hash_with_index.clone(),
        }
    }
}

/// Polls the explorer for one transaction's execution status.
///
/// Never fails: an explorer error is recorded as
/// [`TransactionStatus::NotAvailable`].
#[derive(Clone)]
pub struct FetchTransactionStatus {
    explorer: Arc<dyn ExplorerService>,
}

impl FetchTransactionStatus {
    pub fn new(explorer: Arc<dyn ExplorerService>) -> Self {
        Self { explorer }
    }
}

#[async_trait]
impl<S> Operation<S> for FetchTransactionStatus
where
    S: Reducer + AsRef<TransactionsState>,
    S::Action: From<TransactionsAction>,
{
    type Args = FetchTransactionStatusArgs;
    type Output = TransactionStatus;

    fn id(&self) -> OperationId {
        FETCH_TRANSACTION_STATUS
    }

    fn scope_key(&self, args: &FetchTransactionStatusArgs) -> ScopeKey {
        args.account_id.clone()
    }

    fn resource_key(&self, args: &FetchTransactionStatusArgs) -> Option<String> {
        Some(args.hash_with_index.clone())
    }

    fn condition(&self, args: &FetchTransactionStatusArgs, state: &S) -> bool {
        !select_resource_status(
            &state.as_ref().by_account_id,
            &args.account_id,
            &args.hash_with_index,
        )
        .loading
    }

    async fn start(
        &self,
        args: FetchTransactionStatusArgs,
        ctx: &OperationContext<'_, S>,
    ) -> Result<TransactionStatus, OperationFailure> {
        let status = match self
            .explorer
            .transaction_extra_info(&args.hash, &args.signer_id)
            .await
        {
            Ok(details) => TransactionStatus::from_key(&details.status),
            Err(err) => {
                debug!(hash = %args.hash, error = %err, "status not available");
                TransactionStatus::NotAvailable
            }
        };

        ctx.dispatch(TransactionsAction::UpdateTransactionStatus {
            account_id: args.account_id,
            hash_with_index: args.hash_with_index,
            status: status.clone(),
            check_status: status.is_final(),
        });
        Ok(status)
    }
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// An account's transactions, newest first. Empty for unknown accounts.
pub fn select_transactions_by_account<S: AsRef<TransactionsState>>(
    state: &S,
    account_id: &ScopeKey,
) -> Vec<Transaction> {
    TRANSACTION_SELECTORS.select_all(&state.as_ref().by_account_id, Some(account_id))
}

pub fn select_transactions_total<S: AsRef<TransactionsState>>(
    state: &S,
    account_id: &ScopeKey,
) -> usize {
    TRANSACTION_SELECTORS.select_total(&state.as_ref().by_account_id, Some(account_id))
}

/// One transaction by `hash_with_index`.
pub fn select_transaction_by_identity<S: AsRef<TransactionsState>>(
    state: &S,
    account_id: &ScopeKey,
    hash_with_index: &str,
) -> Option<Transaction> {
    TRANSACTION_SELECTORS.select_by_id(
        &state.as_ref().by_account_id,
        Some(account_id),
        &hash_with_index.to_string(),
    )
}

pub fn select_transactions_loading<S: AsRef<TransactionsState>>(
    state: &S,
    account_id: &ScopeKey,
) -> bool {
    select_loading(&state.as_ref().by_account_id, account_id)
}
