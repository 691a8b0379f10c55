//! Outbound Ports
//!
//! The remote services the slices fetch through. Implementations live
//! outside this crate (the HTTP clients in the app, fixture-backed fakes in
//! the `nova-wallet` binary and in tests); the core never knows how the data
//! is fetched.

use async_trait::async_trait;
use thiserror::Error;

use crate::slices::tokens_metadata::ContractMetadata;
use crate::slices::transactions::Transaction;

/// Errors a service implementation may return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service could not be reached or timed out.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The requested contract, account or transaction does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service answered with something we could not make sense of.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Stable machine-readable code, recorded as a status `error_code`.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unavailable(_) => "UNAVAILABLE",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::InvalidResponse(_) => "INVALID_RESPONSE",
        }
    }
}

/// Fungible token contracts: discovery, balances, metadata.
#[async_trait]
pub trait FungibleTokenService: Send + Sync {
    /// Contracts the indexer believes `account_id` has interacted with.
    async fn likely_token_contracts(&self, account_id: &str) -> Result<Vec<String>, ServiceError>;

    /// Raw balance (smallest units, decimal string) of `account_id` on
    /// `contract_name`.
    async fn balance_of(&self, contract_name: &str, account_id: &str)
        -> Result<String, ServiceError>;

    /// On-chain metadata of a token contract.
    async fn contract_metadata(&self, contract_name: &str)
        -> Result<ContractMetadata, ServiceError>;
}

/// Details the explorer reports for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetails {
    /// The execution status key (`"SuccessValue"`, `"Failure"`, ...).
    pub status: String,
}

/// The transaction explorer.
#[async_trait]
pub trait ExplorerService: Send + Sync {
    /// Recent transactions involving `account_id`.
    async fn transactions(&self, account_id: &str) -> Result<Vec<Transaction>, ServiceError>;

    /// Execution details of one transaction.
    async fn transaction_extra_info(
        &self,
        hash: &str,
        signer_id: &str,
    ) -> Result<TransactionDetails, ServiceError>;
}
