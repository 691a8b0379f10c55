//! # Store Configuration & Constants
//!
//! Slice names, the status keys the explorer reports, and the handful of
//! knobs the store exposes. Anything a caller may want to tune lives in
//! [`StoreConfig`]; everything else is a constant.

// ---------------------------------------------------------------------------
// Slice Names
// ---------------------------------------------------------------------------

/// Name of the per-account token balances slice.
pub const TOKENS_SLICE: &str = "tokens";

/// Name of the flat contract metadata slice.
pub const TOKENS_METADATA_SLICE: &str = "tokensMetadata";

/// Name of the per-account transaction history slice.
pub const TRANSACTIONS_SLICE: &str = "transactions";

// ---------------------------------------------------------------------------
// Explorer Status Keys
// ---------------------------------------------------------------------------

/// Explorer status key for a transaction that executed and returned a value.
pub const STATUS_SUCCESS_VALUE: &str = "SuccessValue";

/// Explorer status key for a transaction that executed and failed.
pub const STATUS_FAILURE: &str = "Failure";

/// Sentinel recorded when the explorer cannot tell us anything definitive.
pub const STATUS_NOT_AVAILABLE: &str = "notAvailable";

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Contracts checked for every account on top of whatever the indexer
/// reports as "likely". Keeps well-known tokens visible even when the
/// indexer lags behind.
pub const DEFAULT_WHITELISTED_CONTRACTS: &[&str] =
    &["wrap.near", "usn", "token.v2.ref-finance.near"];

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// How strictly the runner keeps duplicate fetches out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    /// Only the operation's own condition is consulted (typically "is the
    /// status already loading?"). Two starts in the same tick can both pass.
    Soft,
    /// The condition is consulted and the `(operation, scope, resource)` key
    /// is claimed in the in-flight registry. At most one run per key.
    #[default]
    Strict,
}

impl DedupPolicy {
    /// Parses `"soft"` or `"strict"` (case-insensitive). Anything else is
    /// treated as `Strict`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "soft" => DedupPolicy::Soft,
            _ => DedupPolicy::Strict,
        }
    }
}

/// Tunable parameters for a [`Store`](crate::runtime::Store) and the slices
/// running on it.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Duplicate-fetch policy for the operation runner.
    pub dedup: DedupPolicy,

    /// Contracts always queried by `FetchTokens`, merged after the likely
    /// contracts reported by the indexer.
    pub whitelisted_contracts: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dedup: DedupPolicy::default(),
            whitelisted_contracts: DEFAULT_WHITELISTED_CONTRACTS
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}
