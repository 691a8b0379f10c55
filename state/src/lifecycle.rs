//! # Operation Lifecycle Events
//!
//! Async work never writes to the store directly. Each run of an operation
//! reports back through discrete events that the reducer applies in the
//! order it receives them:
//!
//! ```text
//! Started ──► Succeeded
//!    │
//!    ├──────► Failed(OperationFailure)
//!    │
//!    └──────► Cancelled          (result discarded)
//! ```
//!
//! Every event carries an [`OperationMeta`]: which operation, which run,
//! which scope, and optionally which resource inside that scope. The status
//! tracker and the scope matcher key off this metadata only, never off the
//! operation's payload.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ports::ServiceError;

// ---------------------------------------------------------------------------
// ScopeKey
// ---------------------------------------------------------------------------

/// The partition key of the store: an account identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Wraps an account identifier.
    pub fn new(account_id: impl Into<String>) -> Self {
        Self(account_id.into())
    }

    /// Returns the account identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeKey({})", self.0)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ScopeKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ScopeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// OperationId
// ---------------------------------------------------------------------------

/// Identifies an operation type (not a run of it), e.g.
/// `"transactions/fetchTransactions"`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(&'static str);

impl OperationId {
    /// Creates an operation id. Ids are compared by value, so two slices must
    /// never reuse the same string.
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    /// Returns the id string.
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// ---------------------------------------------------------------------------
// OperationMeta
// ---------------------------------------------------------------------------

/// Metadata describing a single run of an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationMeta {
    /// The operation type.
    pub operation: OperationId,
    /// Unique id of this run.
    pub request_id: Uuid,
    /// The scope the run populates.
    pub scope: ScopeKey,
    /// The resource inside the scope, when the operation is per-resource
    /// (a token contract, a transaction hash).
    pub resource: Option<String>,
}

impl OperationMeta {
    /// Creates metadata for a fresh run with a random request id.
    pub fn new(operation: OperationId, scope: ScopeKey, resource: Option<String>) -> Self {
        Self {
            operation,
            request_id: Uuid::new_v4(),
            scope,
            resource,
        }
    }
}

// ---------------------------------------------------------------------------
// OperationFailure
// ---------------------------------------------------------------------------

/// Why an operation run rejected.
///
/// Recorded verbatim into the run's [`Status`](crate::status::Status); never
/// retried.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationFailure {
    /// Human-readable description.
    pub message: String,
    /// Machine-readable code, when the failing side provided one.
    pub code: Option<String>,
}

impl OperationFailure {
    /// A failure with a message and no code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// A failure with a message and a code.
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

impl From<ServiceError> for OperationFailure {
    fn from(err: ServiceError) -> Self {
        Self {
            message: err.to_string(),
            code: Some(err.code().to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// The phase a run reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// The run passed the dedup gate and is about to start.
    Started,
    /// The run resolved.
    Succeeded,
    /// The run rejected.
    Failed(OperationFailure),
    /// The run was cancelled; its result was discarded.
    Cancelled,
}

/// A lifecycle event for one run, as fed into the reducer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub meta: OperationMeta,
    pub phase: LifecyclePhase,
}

impl LifecycleEvent {
    pub fn started(meta: OperationMeta) -> Self {
        Self {
            meta,
            phase: LifecyclePhase::Started,
        }
    }

    pub fn succeeded(meta: OperationMeta) -> Self {
        Self {
            meta,
            phase: LifecyclePhase::Succeeded,
        }
    }

    pub fn failed(meta: OperationMeta, failure: OperationFailure) -> Self {
        Self {
            meta,
            phase: LifecyclePhase::Failed(failure),
        }
    }

    pub fn cancelled(meta: OperationMeta) -> Self {
        Self {
            meta,
            phase: LifecyclePhase::Cancelled,
        }
    }

    /// Returns `true` for `Started` events.
    pub fn is_start(&self) -> bool {
        matches!(self.phase, LifecyclePhase::Started)
    }
}
