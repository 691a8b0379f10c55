//! # Fixture-Backed Services
//!
//! A JSON file standing in for the token contracts and the transaction
//! explorer. [`FixtureService`] implements both service ports, so the
//! wallet runs end to end without a network.
//!
//! ```text
//! {
//!   "latencyMs": 5,
//!   "likelyContracts": { "alice.near": ["usn"] },
//!   "balances":        { "usn": { "alice.near": "100" } },
//!   "metadata":        [ { "contractName": "usn", ... } ],
//!   "transactions":    { "alice.near": [ { "hash": ..., ... } ] },
//!   "statuses":        { "<hash>": "SuccessValue" },
//!   "unavailable":     [ "broken.near" ]
//! }
//! ```
//!
//! Anything listed in `unavailable` (an account, a contract or a
//! transaction hash) answers with [`ServiceError::Unavailable`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use nova_state::ports::{ExplorerService, FungibleTokenService, ServiceError, TransactionDetails};
use nova_state::slices::tokens_metadata::ContractMetadata;
use nova_state::slices::transactions::Transaction;

/// The parsed fixture file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    /// Delay applied to every call.
    #[serde(default)]
    pub latency_ms: u64,
    /// Account → contracts the indexer reports.
    #[serde(default)]
    pub likely_contracts: BTreeMap<String, Vec<String>>,
    /// Contract → account → raw balance. Missing entries read as `"0"`.
    #[serde(default)]
    pub balances: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub metadata: Vec<ContractMetadata>,
    /// Account → transactions the explorer lists.
    #[serde(default)]
    pub transactions: BTreeMap<String, Vec<Transaction>>,
    /// Transaction hash → explorer status key.
    #[serde(default)]
    pub statuses: BTreeMap<String, String>,
    #[serde(default)]
    pub unavailable: BTreeSet<String>,
}

/// Serves a [`Fixture`] through the service ports.
#[derive(Debug, Clone)]
pub struct FixtureService {
    fixture: Fixture,
}

impl FixtureService {
    pub fn new(fixture: Fixture) -> Self {
        Self { fixture }
    }

    /// Parses a fixture from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json).context("invalid fixture JSON")?;
        Ok(Self::new(fixture))
    }

    /// Reads and parses a fixture file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("in fixture {}", path.display()))
    }

    /// Every account the fixture mentions, sorted.
    pub fn accounts(&self) -> Vec<String> {
        let mut accounts: BTreeSet<&String> = self.fixture.likely_contracts.keys().collect();
        accounts.extend(self.fixture.transactions.keys());
        accounts.extend(
            self.fixture
                .balances
                .values()
                .flat_map(|by_account| by_account.keys()),
        );
        accounts.into_iter().cloned().collect()
    }

    async fn answer(&self, key: &str) -> Result<(), ServiceError> {
        if self.fixture.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.fixture.latency_ms)).await;
        }
        if self.fixture.unavailable.contains(key) {
            return Err(ServiceError::Unavailable(format!("{key} did not answer")));
        }
        Ok(())
    }
}

#[async_trait]
impl FungibleTokenService for FixtureService {
    async fn likely_token_contracts(&self, account_id: &str) -> Result<Vec<String>, ServiceError> {
        self.answer(account_id).await?;
        Ok(self
            .fixture
            .likely_contracts
            .get(account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn balance_of(
        &self,
        contract_name: &str,
        account_id: &str,
    ) -> Result<String, ServiceError> {
        self.answer(contract_name).await?;
        Ok(self
            .fixture
            .balances
            .get(contract_name)
            .and_then(|by_account| by_account.get(account_id))
            .cloned()
            .unwrap_or_else(|| "0".to_string()))
    }

    async fn contract_metadata(
        &self,
        contract_name: &str,
    ) -> Result<ContractMetadata, ServiceError> {
        self.answer(contract_name).await?;
        self.fixture
            .metadata
            .iter()
            .find(|m| m.contract_name == contract_name)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("no metadata for {contract_name}")))
    }
}

#[async_trait]
impl ExplorerService for FixtureService {
    async fn transactions(&self, account_id: &str) -> Result<Vec<Transaction>, ServiceError> {
        self.answer(account_id).await?;
        Ok(self
            .fixture
            .transactions
            .get(account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn transaction_extra_info(
        &self,
        hash: &str,
        _signer_id: &str,
    ) -> Result<TransactionDetails, ServiceError> {
        self.answer(hash).await?;
        self.fixture
            .statuses
            .get(hash)
            .map(|status| TransactionDetails {
                status: status.clone(),
            })
            .ok_or_else(|| ServiceError::NotFound(format!("transaction {hash}")))
    }
}
