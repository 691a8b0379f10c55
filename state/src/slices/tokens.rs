//! # Tokens Slice — Per-Account Fungible Token Balances
//!
//! Each account gets a scope entry whose nested collection holds one
//! [`OwnedToken`] per contract. The balance fetch for a contract is tracked
//! under that contract's resource slot, so one slow or broken contract never
//! hides the others:
//!
//! ```text
//! tokens.by_account_id
//! └── "alice.near"
//!     ├── status               ◄── FetchTokens
//!     ├── resources["usn"]     ◄── FetchOwnedTokensForContract(usn)
//!     ├── domain.likely_contracts
//!     └── items["usn"] = { balance: "100" }
//! ```
//!
//! Contract metadata lives in the flat tokens-metadata slice. This slice
//! reaches it only through the [`ContractMetadataProvider`] it is handed at
//! construction.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::tokens_metadata::{
    select_one_contract_metadata, ContractMetadata, ContractMetadataProvider, TokensMetadataState,
};
use crate::config::TOKENS_SLICE;
use crate::entity::{Entity, EntityAdapter};
use crate::lifecycle::{LifecycleEvent, OperationFailure, OperationId, OperationMeta, ScopeKey};
use crate::ports::FungibleTokenService;
use crate::runtime::{
    join_tolerant, CancellationToken, Operation, OperationContext, Reducer, RunOutcome, StateError,
    Store,
};
use crate::scope::{ScopeLifecycle, ScopeSeed, ScopeStore};
use crate::selectors::{
    select_any_resource_loading, select_loading, select_resource_status, CollectionSelectors,
};
use crate::status::{Status, StatusPath, StatusTracker};

pub const FETCH_OWNED_TOKENS_FOR_CONTRACT: OperationId =
    OperationId::new("tokens/fetchOwnedTokensForContract");
pub const FETCH_TOKENS: OperationId = OperationId::new("tokens/fetchTokens");

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A balance held by an account on one token contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedToken {
    pub contract_name: String,
    /// Smallest units, as a decimal string.
    pub balance: String,
}

impl Entity for OwnedToken {
    type Id = String;

    fn id(&self) -> String {
        self.contract_name.clone()
    }
}

pub const OWNED_TOKENS: EntityAdapter<OwnedToken> = EntityAdapter::new();

const OWNED_TOKEN_SELECTORS: CollectionSelectors<OwnedToken> =
    CollectionSelectors::new(OWNED_TOKENS);

/// Per-account domain state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensScope {
    /// Contracts queried by the last `FetchTokens` run.
    pub likely_contracts: Vec<String>,
}

// ---------------------------------------------------------------------------
// State & actions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensState {
    pub by_account_id: ScopeStore<TokensScope, OwnedToken>,
    #[serde(skip)]
    lifecycle: ScopeLifecycle<TokensScope, OwnedToken>,
    #[serde(skip)]
    tracker: StatusTracker,
}

fn contract_status_path(meta: &OperationMeta) -> StatusPath {
    StatusPath::Resource {
        scope: meta.scope.clone(),
        resource: meta.resource.clone().unwrap_or_default(),
    }
}

fn account_status_path(meta: &OperationMeta) -> StatusPath {
    StatusPath::Scope(meta.scope.clone())
}

impl TokensState {
    pub fn new() -> Self {
        Self {
            by_account_id: ScopeStore::new(),
            lifecycle: ScopeLifecycle::new(ScopeSeed::default().with_items(OWNED_TOKENS))
                .on(FETCH_OWNED_TOKENS_FOR_CONTRACT)
                .on(FETCH_TOKENS),
            tracker: StatusTracker::new()
                .track(FETCH_OWNED_TOKENS_FOR_CONTRACT, contract_status_path)
                .track(FETCH_TOKENS, account_status_path),
        }
    }

    /// Scope creation first, then the status transition.
    pub fn on_lifecycle(&mut self, event: &LifecycleEvent) {
        self.lifecycle.apply(&mut self.by_account_id, event);
        self.tracker.apply(&mut self.by_account_id, event);
    }

    pub fn reduce(&mut self, action: TokensAction) {
        match action {
            TokensAction::AddTokenBalance {
                account_id,
                contract_name,
                balance,
            } => {
                let token = OwnedToken {
                    contract_name,
                    balance,
                };
                if let Err(err) = self
                    .by_account_id
                    .update_items(&account_id, &OWNED_TOKENS, |items| items.upsert_one(token))
                {
                    warn!(
                        slice = TOKENS_SLICE,
                        account = %account_id,
                        error = %err,
                        "balance dropped"
                    );
                }
            }
            TokensAction::SetLikelyContracts {
                account_id,
                contracts,
            } => {
                if let Err(err) = self
                    .by_account_id
                    .update_domain(&account_id, |scope| scope.likely_contracts = contracts)
                {
                    warn!(
                        slice = TOKENS_SLICE,
                        account = %account_id,
                        error = %err,
                        "likely contracts dropped"
                    );
                }
            }
        }
    }
}

impl Default for TokensState {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<TokensState> for TokensState {
    fn as_ref(&self) -> &TokensState {
        self
    }
}

impl PartialEq for TokensState {
    fn eq(&self, other: &Self) -> bool {
        self.by_account_id == other.by_account_id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokensAction {
    /// Records the balance of one contract for one account.
    AddTokenBalance {
        account_id: ScopeKey,
        contract_name: String,
        balance: String,
    },
    /// Records which contracts were queried for an account.
    SetLikelyContracts {
        account_id: ScopeKey,
        contracts: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedTokenArgs {
    pub account_id: ScopeKey,
    pub contract_name: String,
}

/// Fetches one account's balance on one contract.
#[derive(Clone)]
pub struct FetchOwnedTokensForContract {
    service: Arc<dyn FungibleTokenService>,
}

impl FetchOwnedTokensForContract {
    pub fn new(service: Arc<dyn FungibleTokenService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> Operation<S> for FetchOwnedTokensForContract
where
    S: Reducer + AsRef<TokensState>,
    S::Action: From<TokensAction>,
{
    type Args = OwnedTokenArgs;
    type Output = String;

    fn id(&self) -> OperationId {
        FETCH_OWNED_TOKENS_FOR_CONTRACT
    }

    fn scope_key(&self, args: &OwnedTokenArgs) -> ScopeKey {
        args.account_id.clone()
    }

    fn resource_key(&self, args: &OwnedTokenArgs) -> Option<String> {
        Some(args.contract_name.clone())
    }

    /// Skip while this contract is already loading for this account.
    fn condition(&self, args: &OwnedTokenArgs, state: &S) -> bool {
        !select_resource_status(
            &state.as_ref().by_account_id,
            &args.account_id,
            &args.contract_name,
        )
        .loading
    }

    async fn start(
        &self,
        args: OwnedTokenArgs,
        ctx: &OperationContext<'_, S>,
    ) -> Result<String, OperationFailure> {
        let balance = self
            .service
            .balance_of(&args.contract_name, args.account_id.as_str())
            .await?;

        ctx.dispatch(TokensAction::AddTokenBalance {
            account_id: args.account_id,
            contract_name: args.contract_name,
            balance: balance.clone(),
        });
        Ok(balance)
    }
}

/// Metadata then (optionally) balance for one contract. Shared by
/// [`FetchTokens`] and [`FetchToken`].
pub struct ContractLoader<S: Reducer> {
    metadata: Arc<dyn ContractMetadataProvider<S>>,
    fetch_owned: FetchOwnedTokensForContract,
}

impl<S: Reducer> Clone for ContractLoader<S> {
    fn clone(&self) -> Self {
        Self {
            metadata: Arc::clone(&self.metadata),
            fetch_owned: self.fetch_owned.clone(),
        }
    }
}

impl<S> ContractLoader<S>
where
    S: Reducer + AsRef<TokensState>,
    S::Action: From<TokensAction>,
{
    pub fn new(
        metadata: Arc<dyn ContractMetadataProvider<S>>,
        fetch_owned: FetchOwnedTokensForContract,
    ) -> Self {
        Self {
            metadata,
            fetch_owned,
        }
    }

    /// Ensures the contract's metadata is recorded, then fetches the
    /// account's balance if an account is given. A suppressed balance fetch
    /// counts as loaded: another run already has it in hand.
    ///
    /// With a `parent`, the balance fetch runs as its child and is dropped
    /// once the parent is cancelled.
    ///
    /// # Errors
    ///
    /// The metadata fetch failure, or the balance run's failure.
    pub async fn load(
        &self,
        store: &Store<S>,
        contract_name: String,
        account_id: Option<ScopeKey>,
        parent: Option<&CancellationToken>,
    ) -> Result<String, StateError> {
        self.metadata
            .ensure_metadata(store, &contract_name)
            .await
            .map_err(OperationFailure::from)?;

        let Some(account_id) = account_id else {
            return Ok(contract_name);
        };
        let args = OwnedTokenArgs {
            account_id,
            contract_name,
        };
        match store.run_under(&self.fetch_owned, args.clone(), parent).await {
            RunOutcome::Completed(_) | RunOutcome::Suppressed => Ok(args.contract_name),
            RunOutcome::Failed(failure) => Err(StateError::Failed(failure)),
            RunOutcome::Cancelled => Err(StateError::Cancelled),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTokensArgs {
    pub account_id: ScopeKey,
}

/// Discovers an account's tokens and loads each of them.
///
/// The candidate list is the indexer's likely contracts followed by the
/// whitelist, deduplicated with first-seen order kept. Every candidate is
/// loaded concurrently; a failing candidate is logged and skipped.
pub struct FetchTokens<S: Reducer> {
    service: Arc<dyn FungibleTokenService>,
    loader: ContractLoader<S>,
    whitelisted_contracts: Vec<String>,
}

impl<S> FetchTokens<S>
where
    S: Reducer + AsRef<TokensState>,
    S::Action: From<TokensAction>,
{
    pub fn new(
        service: Arc<dyn FungibleTokenService>,
        loader: ContractLoader<S>,
        whitelisted_contracts: Vec<String>,
    ) -> Self {
        Self {
            service,
            loader,
            whitelisted_contracts,
        }
    }
}

/// `likely` then `whitelist`, each contract once, first occurrence wins.
pub fn merge_contracts(likely: Vec<String>, whitelist: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(likely.len() + whitelist.len());
    for contract in likely.into_iter().chain(whitelist.iter().cloned()) {
        if !merged.contains(&contract) {
            merged.push(contract);
        }
    }
    merged
}

#[async_trait]
impl<S> Operation<S> for FetchTokens<S>
where
    S: Reducer + AsRef<TokensState>,
    S::Action: From<TokensAction>,
{
    type Args = FetchTokensArgs;
    /// Contracts that loaded.
    type Output = Vec<String>;

    fn id(&self) -> OperationId {
        FETCH_TOKENS
    }

    fn scope_key(&self, args: &FetchTokensArgs) -> ScopeKey {
        args.account_id.clone()
    }

    fn condition(&self, args: &FetchTokensArgs, state: &S) -> bool {
        !select_loading(&state.as_ref().by_account_id, &args.account_id)
    }

    async fn start(
        &self,
        args: FetchTokensArgs,
        ctx: &OperationContext<'_, S>,
    ) -> Result<Vec<String>, OperationFailure> {
        let likely = self
            .service
            .likely_token_contracts(args.account_id.as_str())
            .await?;
        if ctx.is_cancelled() {
            return Ok(Vec::new());
        }
        let contracts = merge_contracts(likely, &self.whitelisted_contracts);

        ctx.dispatch(TokensAction::SetLikelyContracts {
            account_id: args.account_id.clone(),
            contracts: contracts.clone(),
        });

        let store = ctx.store();
        let tasks = contracts.iter().map(|contract| {
            let load = self.loader.load(
                store,
                contract.clone(),
                Some(args.account_id.clone()),
                Some(ctx.token()),
            );
            (contract.clone(), load)
        });
        let loaded = join_tolerant("fetch_tokens", tasks).await;

        info!(
            account = %args.account_id,
            candidates = contracts.len(),
            loaded = loaded.len(),
            "tokens fetched"
        );
        Ok(loaded)
    }
}

/// Loads a single contract: its metadata, and the account's balance when an
/// account is given. Failures are logged, never returned.
pub struct FetchToken<S: Reducer> {
    loader: ContractLoader<S>,
}

impl<S> FetchToken<S>
where
    S: Reducer + AsRef<TokensState>,
    S::Action: From<TokensAction>,
{
    pub fn new(loader: ContractLoader<S>) -> Self {
        Self { loader }
    }

    /// Returns `true` if the contract loaded.
    pub async fn run(
        &self,
        store: &Store<S>,
        contract_name: &str,
        account_id: Option<ScopeKey>,
    ) -> bool {
        match self
            .loader
            .load(store, contract_name.to_string(), account_id, None)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    slice = TOKENS_SLICE,
                    contract = contract_name,
                    error = %err,
                    "failed to load token"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// One contract's balance for one account, with the balance fetch status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub contract_name: String,
    /// Empty until the first successful fetch.
    pub balance: String,
    pub status: Status,
}

/// A held token joined with its contract metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenWithMetadata {
    pub contract_name: String,
    pub balance: String,
    pub status: Status,
    #[serde(rename = "onChainFTMetadata")]
    pub on_chain_ft_metadata: Option<ContractMetadata>,
}

/// The balance of `contract_name` for `account_id`. Unknown accounts and
/// contracts read as an empty balance with an idle status.
pub fn select_one_token_from_owned_tokens<S: AsRef<TokensState>>(
    state: &S,
    account_id: &ScopeKey,
    contract_name: &str,
) -> TokenBalance {
    let tokens = &state.as_ref().by_account_id;
    let balance = OWNED_TOKEN_SELECTORS
        .select_by_id(tokens, Some(account_id), &contract_name.to_string())
        .map(|token| token.balance)
        .unwrap_or_default();

    TokenBalance {
        contract_name: contract_name.to_string(),
        balance,
        status: select_resource_status(tokens, account_id, contract_name),
    }
}

fn is_zero_balance(balance: &str) -> bool {
    balance.trim().trim_start_matches('0').is_empty()
}

fn by_metadata_name(a: &TokenWithMetadata, b: &TokenWithMetadata) -> Ordering {
    match (&a.on_chain_ft_metadata, &b.on_chain_ft_metadata) {
        (Some(a), Some(b)) => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Tokens `account_id` actually holds (non-zero balance), joined with their
/// metadata and sorted by token name. Tokens without metadata go last.
pub fn select_tokens_with_metadata_for_account<S>(
    state: &S,
    account_id: &ScopeKey,
) -> Vec<TokenWithMetadata>
where
    S: AsRef<TokensState> + AsRef<TokensMetadataState>,
{
    let tokens: &TokensState = state.as_ref();
    let metadata: &TokensMetadataState = state.as_ref();

    let mut held: Vec<TokenWithMetadata> = OWNED_TOKEN_SELECTORS
        .resolve(&tokens.by_account_id, Some(account_id))
        .iter()
        .filter(|token| !is_zero_balance(&token.balance))
        .map(|token| TokenWithMetadata {
            contract_name: token.contract_name.clone(),
            balance: token.balance.clone(),
            status: select_resource_status(
                &tokens.by_account_id,
                account_id,
                &token.contract_name,
            ),
            on_chain_ft_metadata: select_one_contract_metadata(metadata, &token.contract_name),
        })
        .collect();
    held.sort_by(by_metadata_name);
    held
}

/// `true` while a token discovery or any balance fetch is in flight for
/// `account_id`.
pub fn select_tokens_loading<S: AsRef<TokensState>>(state: &S, account_id: &ScopeKey) -> bool {
    let tokens = &state.as_ref().by_account_id;
    select_loading(tokens, account_id) || select_any_resource_loading(tokens, account_id)
}
