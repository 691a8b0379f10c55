//! # Wallet Slices
//!
//! The three slices the wallet front end keeps, combined into one reducer:
//!
//! ```text
//! WalletState
//! ├── tokens           — per-account balances      (scoped)
//! ├── tokens_metadata  — contract metadata         (flat)
//! └── transactions     — per-account history       (scoped)
//! ```
//!
//! Lifecycle events go to every slice; each slice decides from the
//! operation id whether it cares. Slice actions go to their own slice only.
//!
//! [`Wallet`] wires the operations to their services and to each other, and
//! is the entry point the binary and integration tests use.

pub mod tokens;
pub mod tokens_metadata;
pub mod transactions;

use std::sync::Arc;

use serde::Serialize;

use crate::config::StoreConfig;
use crate::lifecycle::{LifecycleEvent, ScopeKey};
use crate::ports::{ExplorerService, FungibleTokenService};
use crate::runtime::{Reducer, RunOutcome, Store};
use crate::selectors::Memoized;

use tokens::{
    ContractLoader, FetchOwnedTokensForContract, FetchToken, FetchTokens, FetchTokensArgs,
    OwnedTokenArgs, TokenBalance, TokenWithMetadata, TokensAction, TokensState,
};
use tokens_metadata::{
    ContractMetadataProvider, MetadataCache, TokensMetadataAction, TokensMetadataState,
};
use transactions::{
    FetchTransactionStatus, FetchTransactionStatusArgs, FetchTransactions, FetchTransactionsArgs,
    Transaction, TransactionStatus, TransactionsAction, TransactionsState,
};

// ---------------------------------------------------------------------------
// WalletState
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub tokens: TokensState,
    pub tokens_metadata: TokensMetadataState,
    pub transactions: TransactionsState,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Lifecycle(LifecycleEvent),
    Tokens(TokensAction),
    TokensMetadata(TokensMetadataAction),
    Transactions(TransactionsAction),
}

impl From<LifecycleEvent> for Action {
    fn from(event: LifecycleEvent) -> Self {
        Action::Lifecycle(event)
    }
}

impl From<TokensAction> for Action {
    fn from(action: TokensAction) -> Self {
        Action::Tokens(action)
    }
}

impl From<TokensMetadataAction> for Action {
    fn from(action: TokensMetadataAction) -> Self {
        Action::TokensMetadata(action)
    }
}

impl From<TransactionsAction> for Action {
    fn from(action: TransactionsAction) -> Self {
        Action::Transactions(action)
    }
}

impl Reducer for WalletState {
    type Action = Action;

    fn reduce(&mut self, action: Action) {
        match action {
            Action::Lifecycle(event) => {
                self.tokens.on_lifecycle(&event);
                self.transactions.on_lifecycle(&event);
            }
            Action::Tokens(action) => self.tokens.reduce(action),
            Action::TokensMetadata(action) => self.tokens_metadata.reduce(action),
            Action::Transactions(action) => self.transactions.reduce(action),
        }
    }
}

impl AsRef<TokensState> for WalletState {
    fn as_ref(&self) -> &TokensState {
        &self.tokens
    }
}

impl AsRef<TokensMetadataState> for WalletState {
    fn as_ref(&self) -> &TokensMetadataState {
        &self.tokens_metadata
    }
}

impl AsRef<TransactionsState> for WalletState {
    fn as_ref(&self) -> &TransactionsState {
        &self.transactions
    }
}

pub type WalletStore = Store<WalletState>;

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// The wallet store with every operation wired to its services.
pub struct Wallet {
    store: WalletStore,
    fetch_owned: FetchOwnedTokensForContract,
    fetch_tokens: FetchTokens<WalletState>,
    fetch_token: FetchToken<WalletState>,
    fetch_transactions: FetchTransactions,
    fetch_transaction_status: FetchTransactionStatus,
    tokens_view: Memoized<ScopeKey, Vec<TokenWithMetadata>>,
}

impl Wallet {
    pub fn new(
        config: StoreConfig,
        tokens: Arc<dyn FungibleTokenService>,
        explorer: Arc<dyn ExplorerService>,
    ) -> Self {
        let metadata: Arc<dyn ContractMetadataProvider<WalletState>> =
            Arc::new(MetadataCache::new(Arc::clone(&tokens)));
        let fetch_owned = FetchOwnedTokensForContract::new(Arc::clone(&tokens));
        let loader = ContractLoader::new(metadata, fetch_owned.clone());

        Self {
            fetch_tokens: FetchTokens::new(
                Arc::clone(&tokens),
                loader.clone(),
                config.whitelisted_contracts.clone(),
            ),
            fetch_token: FetchToken::new(loader),
            fetch_owned,
            fetch_transactions: FetchTransactions::new(Arc::clone(&explorer)),
            fetch_transaction_status: FetchTransactionStatus::new(explorer),
            store: Store::new(WalletState::default(), config),
            tokens_view: Memoized::new(),
        }
    }

    pub fn store(&self) -> &WalletStore {
        &self.store
    }

    // -- operations ---------------------------------------------------------

    /// Discovers and loads every token `account_id` may hold.
    pub async fn fetch_tokens(&self, account_id: &ScopeKey) -> RunOutcome<Vec<String>> {
        let args = FetchTokensArgs {
            account_id: account_id.clone(),
        };
        self.store.run(&self.fetch_tokens, args).await
    }

    /// Loads one contract's metadata, and the balance if `account_id` is
    /// given. Returns `true` if it loaded.
    pub async fn fetch_token(&self, contract_name: &str, account_id: Option<&ScopeKey>) -> bool {
        self.fetch_token
            .run(&self.store, contract_name, account_id.cloned())
            .await
    }

    pub async fn fetch_owned_tokens_for_contract(
        &self,
        account_id: &ScopeKey,
        contract_name: &str,
    ) -> RunOutcome<String> {
        let args = OwnedTokenArgs {
            account_id: account_id.clone(),
            contract_name: contract_name.to_string(),
        };
        self.store.run(&self.fetch_owned, args).await
    }

    pub async fn fetch_transactions(&self, account_id: &ScopeKey) -> RunOutcome<usize> {
        let args = FetchTransactionsArgs {
            account_id: account_id.clone(),
        };
        self.store.run(&self.fetch_transactions, args).await
    }

    pub async fn fetch_transaction_status(
        &self,
        account_id: &ScopeKey,
        transaction: &Transaction,
    ) -> RunOutcome<TransactionStatus> {
        let args = FetchTransactionStatusArgs::for_transaction(account_id.clone(), transaction);
        self.store.run(&self.fetch_transaction_status, args).await
    }

    /// Cancels everything in flight for `account_id`.
    pub fn cancel(&self, account_id: &ScopeKey) -> usize {
        self.store.cancel_scope(account_id)
    }

    pub fn clear_transactions(&self, account_id: &ScopeKey) {
        self.store.dispatch(TransactionsAction::ClearTransactions {
            account_id: account_id.clone(),
        });
    }

    // -- reads --------------------------------------------------------------

    /// Held tokens with metadata. Repeated calls with no store change in
    /// between return the same `Arc`.
    pub fn tokens_with_metadata(&self, account_id: &ScopeKey) -> Arc<Vec<TokenWithMetadata>> {
        self.tokens_view
            .get_or_compute(self.store.revision(), account_id, || {
                self.store.read(|state| {
                    tokens::select_tokens_with_metadata_for_account(state, account_id)
                })
            })
    }

    pub fn token(&self, account_id: &ScopeKey, contract_name: &str) -> TokenBalance {
        self.store.read(|state| {
            tokens::select_one_token_from_owned_tokens(state, account_id, contract_name)
        })
    }

    pub fn tokens_loading(&self, account_id: &ScopeKey) -> bool {
        self.store
            .read(|state| tokens::select_tokens_loading(state, account_id))
    }

    pub fn transactions(&self, account_id: &ScopeKey) -> Vec<Transaction> {
        self.store.read(|state| {
            transactions::select_transactions_by_account(state, account_id)
        })
    }

    pub fn transactions_loading(&self, account_id: &ScopeKey) -> bool {
        self.store
            .read(|state| transactions::select_transactions_loading(state, account_id))
    }

    /// A copy of the whole state, for reporting.
    pub fn snapshot(&self) -> WalletState {
        self.store.snapshot()
    }
}
