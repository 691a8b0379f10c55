//! Token contract metadata, shared by every account.
//!
//! A flat collection keyed by contract name. Nothing here is tracked per
//! scope: once a contract's metadata is known, every account reads the same
//! record.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TOKENS_METADATA_SLICE;
use crate::entity::{Entity, EntityAdapter, EntityCollection};
use crate::ports::{FungibleTokenService, ServiceError};
use crate::runtime::{Reducer, Store};
use crate::selectors::CollectionSelectors;

/// On-chain fungible token metadata (NEP-148 shape) plus the contract it
/// belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetadata {
    pub contract_name: String,
    pub spec: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Entity for ContractMetadata {
    type Id = String;

    fn id(&self) -> String {
        self.contract_name.clone()
    }
}

/// Insertion-ordered collection keyed by contract name.
pub const CONTRACT_METADATA: EntityAdapter<ContractMetadata> = EntityAdapter::new();

const METADATA_SELECTORS: CollectionSelectors<ContractMetadata> =
    CollectionSelectors::new(CONTRACT_METADATA);

// ---------------------------------------------------------------------------
// State & actions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensMetadataState {
    pub by_contract_name: EntityCollection<ContractMetadata>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokensMetadataAction {
    /// Records (or replaces) one contract's metadata.
    SetContractMetadata(ContractMetadata),
}

impl AsRef<TokensMetadataState> for TokensMetadataState {
    fn as_ref(&self) -> &TokensMetadataState {
        self
    }
}

impl TokensMetadataState {
    pub fn reduce(&mut self, action: TokensMetadataAction) {
        match action {
            TokensMetadataAction::SetContractMetadata(metadata) => {
                debug!(
                    slice = TOKENS_METADATA_SLICE,
                    contract = %metadata.contract_name,
                    "contract metadata set"
                );
                self.by_contract_name.upsert_one(metadata);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// All known contract metadata, in the order it was first recorded.
pub fn select_contracts_metadata<S: AsRef<TokensMetadataState>>(
    state: &S,
) -> Vec<ContractMetadata> {
    METADATA_SELECTORS.select_all(&state.as_ref().by_contract_name, None)
}

/// Metadata of one contract, if known.
pub fn select_one_contract_metadata<S: AsRef<TokensMetadataState>>(
    state: &S,
    contract_name: &str,
) -> Option<ContractMetadata> {
    METADATA_SELECTORS.select_by_id(
        &state.as_ref().by_contract_name,
        None,
        &contract_name.to_string(),
    )
}

// ---------------------------------------------------------------------------
// Metadata provider
// ---------------------------------------------------------------------------

/// What the tokens slice needs from this one: "make sure this contract's
/// metadata is in the store, and give it to me".
#[async_trait]
pub trait ContractMetadataProvider<S: Reducer>: Send + Sync {
    /// Returns the metadata of `contract_name`, fetching and recording it if
    /// it is not cached yet.
    async fn ensure_metadata(
        &self,
        store: &Store<S>,
        contract_name: &str,
    ) -> Result<ContractMetadata, ServiceError>;
}

/// Store-backed metadata cache in front of a [`FungibleTokenService`].
#[derive(Clone)]
pub struct MetadataCache {
    service: Arc<dyn FungibleTokenService>,
}

impl MetadataCache {
    pub fn new(service: Arc<dyn FungibleTokenService>) -> Self {
        Self { service }
    }

    /// The cached record, or whatever the service returns. Does not write to
    /// the store.
    pub async fn cached_contract_metadata_or_fetch<S>(
        &self,
        store: &Store<S>,
        contract_name: &str,
    ) -> Result<ContractMetadata, ServiceError>
    where
        S: Reducer + AsRef<TokensMetadataState>,
    {
        let cached = store.read(|state| select_one_contract_metadata(state, contract_name));
        if let Some(cached) = cached {
            return Ok(cached);
        }
        self.service.contract_metadata(contract_name).await
    }
}

#[async_trait]
impl<S> ContractMetadataProvider<S> for MetadataCache
where
    S: Reducer + AsRef<TokensMetadataState>,
    S::Action: From<TokensMetadataAction>,
{
    async fn ensure_metadata(
        &self,
        store: &Store<S>,
        contract_name: &str,
    ) -> Result<ContractMetadata, ServiceError> {
        let metadata = self
            .cached_contract_metadata_or_fetch(store, contract_name)
            .await?;

        // Another run may have recorded it while we were fetching.
        let known =
            store.read(|state| select_one_contract_metadata(state, contract_name).is_some());
        if !known {
            store.dispatch(TokensMetadataAction::SetContractMetadata(metadata.clone()));
        }
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::lifecycle::LifecycleEvent;

    fn metadata(contract: &str, name: &str) -> ContractMetadata {
        ContractMetadata {
            contract_name: contract.into(),
            spec: "ft-1.0.0".into(),
            name: name.into(),
            symbol: name.to_uppercase(),
            decimals: 18,
            icon: None,
        }
    }

    #[derive(Default)]
    struct OnlyMetadata(TokensMetadataState);

    #[derive(Debug)]
    enum MetaAction {
        Lifecycle,
        Metadata(TokensMetadataAction),
    }

    impl From<LifecycleEvent> for MetaAction {
        fn from(_: LifecycleEvent) -> Self {
            MetaAction::Lifecycle
        }
    }

    impl From<TokensMetadataAction> for MetaAction {
        fn from(action: TokensMetadataAction) -> Self {
            MetaAction::Metadata(action)
        }
    }

    impl Reducer for OnlyMetadata {
        type Action = MetaAction;
        fn reduce(&mut self, action: MetaAction) {
            if let MetaAction::Metadata(action) = action {
                self.0.reduce(action);
            }
        }
    }

    impl AsRef<TokensMetadataState> for OnlyMetadata {
        fn as_ref(&self) -> &TokensMetadataState {
            &self.0
        }
    }

    /// Answers metadata requests and counts them.
    #[derive(Default)]
    struct CountingService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FungibleTokenService for CountingService {
        async fn likely_token_contracts(&self, _: &str) -> Result<Vec<String>, ServiceError> {
            Ok(Vec::new())
        }

        async fn balance_of(&self, _: &str, _: &str) -> Result<String, ServiceError> {
            Ok("0".into())
        }

        async fn contract_metadata(
            &self,
            contract: &str,
        ) -> Result<ContractMetadata, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if contract == "broken.near" {
                return Err(ServiceError::Unavailable("rpc timeout".into()));
            }
            Ok(metadata(contract, "Fetched"))
        }
    }

    #[test]
    fn set_contract_metadata_replaces_by_name() {
        let mut state = TokensMetadataState::default();
        state.reduce(TokensMetadataAction::SetContractMetadata(metadata("usn", "USN")));
        state.reduce(TokensMetadataAction::SetContractMetadata(metadata("usn", "USN v2")));

        let all = select_contracts_metadata(&OnlyMetadata(state.clone()));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "USN v2");
    }

    #[test]
    fn unknown_contract_selects_none() {
        assert_eq!(select_one_contract_metadata(&OnlyMetadata::default(), "usn"), None);
    }

    #[tokio::test]
    async fn ensure_metadata_fetches_once_then_serves_cache() {
        let service = Arc::new(CountingService::default());
        let cache = MetadataCache::new(service.clone());
        let store = Store::<OnlyMetadata>::default();

        let first = cache.ensure_metadata(&store, "usn").await.unwrap();
        let second = cache.ensure_metadata(&store, "usn").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(store.read(|s| select_one_contract_metadata(s, "usn")).is_some());
    }

    #[tokio::test]
    async fn cached_record_wins_over_service() {
        let service = Arc::new(CountingService::default());
        let cache = MetadataCache::new(service.clone());
        let store = Store::<OnlyMetadata>::default();
        store.dispatch(TokensMetadataAction::SetContractMetadata(metadata("usn", "Cached")));

        let got = cache.cached_contract_metadata_or_fetch(&store, "usn").await.unwrap();

        assert_eq!(got.name, "Cached");
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn service_failure_records_nothing() {
        let cache = MetadataCache::new(Arc::new(CountingService::default()));
        let store = Store::<OnlyMetadata>::default();

        let err = cache.ensure_metadata(&store, "broken.near").await.unwrap_err();

        assert_eq!(err.code(), "UNAVAILABLE");
        assert!(store.read(|s| select_contracts_metadata(s)).is_empty());
    }

    #[test]
    fn metadata_deserializes_without_icon() {
        let json = r#"{
            "contractName": "usn",
            "spec": "ft-1.0.0",
            "name": "USN",
            "symbol": "USN",
            "decimals": 18
        }"#;
        let parsed: ContractMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.icon, None);
    }
}
