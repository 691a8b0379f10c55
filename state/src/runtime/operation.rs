//! Operation descriptors, the context they run in, and how a run ends.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::in_flight::CancellationToken;
use super::store::{Reducer, Store};
use crate::lifecycle::{OperationFailure, OperationId, OperationMeta, ScopeKey};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// An async unit of work whose lifecycle is tracked by a [`Store`].
///
/// The descriptor is pure: it names the operation, derives the scope and
/// resource a run populates, and decides whether a run may start given the
/// current state. [`start`](Operation::start) does the actual work and
/// reports data back through the context.
#[async_trait]
pub trait Operation<S: Reducer>: Send + Sync {
    /// Input of one run.
    type Args: Clone + Send + Sync + fmt::Debug + 'static;

    /// Value a successful run resolves with.
    type Output: Send;

    /// Stable identifier, used by status trackers and scope matchers.
    fn id(&self) -> OperationId;

    /// The scope (account) a run populates.
    fn scope_key(&self, args: &Self::Args) -> ScopeKey;

    /// The resource inside the scope, for per-resource operations.
    fn resource_key(&self, _args: &Self::Args) -> Option<String> {
        None
    }

    /// Soft gate. Returning `false` suppresses the run before anything is
    /// dispatched.
    fn condition(&self, _args: &Self::Args, _state: &S) -> bool {
        true
    }

    /// Performs the run.
    async fn start(
        &self,
        args: Self::Args,
        ctx: &OperationContext<'_, S>,
    ) -> Result<Self::Output, OperationFailure>;
}

// ---------------------------------------------------------------------------
// OperationContext
// ---------------------------------------------------------------------------

/// What a running operation can see and do.
pub struct OperationContext<'a, S: Reducer> {
    store: &'a Store<S>,
    meta: OperationMeta,
    token: CancellationToken,
}

impl<'a, S: Reducer> OperationContext<'a, S> {
    pub(crate) fn new(store: &'a Store<S>, meta: OperationMeta, token: CancellationToken) -> Self {
        Self { store, meta, token }
    }

    /// Metadata of this run.
    pub fn meta(&self) -> &OperationMeta {
        &self.meta
    }

    /// The store, for reading or running nested operations.
    pub fn store(&self) -> &'a Store<S> {
        self.store
    }

    /// Reads the current state.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.store.read(f)
    }

    /// Dispatches `action` unless this run has been cancelled. Returns
    /// whether the action was applied.
    pub fn dispatch(&self, action: impl Into<S::Action>) -> bool {
        if self.is_cancelled() {
            debug!(
                operation = %self.meta.operation,
                request_id = %self.meta.request_id,
                "run cancelled; action dropped"
            );
            return false;
        }
        self.store.dispatch(action);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// This run's cancel flag.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Runs `op` as a child of this run: cancelling this run (or its scope)
    /// cancels the child, even if the child starts afterwards.
    pub async fn run<O>(&self, op: &O, args: O::Args) -> RunOutcome<O::Output>
    where
        O: Operation<S> + ?Sized,
    {
        self.store.run_under(op, args, Some(&self.token)).await
    }
}

// ---------------------------------------------------------------------------
// RunOutcome
// ---------------------------------------------------------------------------

/// How a call to [`Store::run`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<T> {
    /// The run resolved.
    Completed(T),
    /// The run rejected; the failure was recorded in its status.
    Failed(OperationFailure),
    /// The dedup gate refused the run. Nothing was dispatched.
    Suppressed,
    /// The run was cancelled; its result was discarded.
    Cancelled,
}

impl<T> RunOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, RunOutcome::Suppressed)
    }

    /// Short label, used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed(_) => "completed",
            RunOutcome::Failed(_) => "failed",
            RunOutcome::Suppressed => "suppressed",
            RunOutcome::Cancelled => "cancelled",
        }
    }

    /// The output of a completed run.
    pub fn completed(self) -> Option<T> {
        match self {
            RunOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Converts into a `Result`, treating anything but completion as an error.
    ///
    /// # Errors
    ///
    /// The matching [`StateError`] variant for failed, suppressed and
    /// cancelled runs.
    pub fn into_result(self) -> Result<T, StateError> {
        match self {
            RunOutcome::Completed(value) => Ok(value),
            RunOutcome::Failed(failure) => Err(StateError::Failed(failure)),
            RunOutcome::Suppressed => Err(StateError::Suppressed),
            RunOutcome::Cancelled => Err(StateError::Cancelled),
        }
    }
}

/// A run that did not complete, as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("operation failed: {0}")]
    Failed(#[from] OperationFailure),

    #[error("operation suppressed: already in flight or condition not met")]
    Suppressed,

    #[error("operation cancelled")]
    Cancelled,
}
