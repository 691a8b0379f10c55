//! The store: single-writer state plus the operation runner.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, info_span, trace, warn, Instrument};

use super::in_flight::{CancellationToken, InFlightRegistry};
use super::operation::{Operation, OperationContext, RunOutcome};
use crate::config::StoreConfig;
use crate::lifecycle::{LifecycleEvent, OperationMeta, ScopeKey};

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

/// State that evolves by applying actions, one at a time.
///
/// Every action type must be able to carry a [`LifecycleEvent`]; that is how
/// the runner reports `Started` / `Succeeded` / `Failed` / `Cancelled`.
pub trait Reducer: Send + Sync + 'static {
    type Action: From<LifecycleEvent> + Send + fmt::Debug;

    fn reduce(&mut self, action: Self::Action);
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Owns the state and serializes every mutation.
///
/// Reads take a shared lock, dispatches an exclusive one. No lock is held
/// across an `.await`: operations run outside and come back through
/// [`dispatch`](Store::dispatch).
pub struct Store<S: Reducer> {
    state: RwLock<S>,
    revision: AtomicU64,
    in_flight: InFlightRegistry,
    config: StoreConfig,
}

impl<S: Reducer> Store<S> {
    pub fn new(state: S, config: StoreConfig) -> Self {
        Self {
            state: RwLock::new(state),
            revision: AtomicU64::new(0),
            in_flight: InFlightRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Applies one action. Bumps the revision.
    pub fn dispatch(&self, action: impl Into<S::Action>) {
        let action = action.into();
        trace!(?action, "dispatch");
        let mut state = self.state.write();
        state.reduce(action);
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    /// Runs `f` against the current state.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.read())
    }

    /// Number of actions applied so far. Memoized selectors key off this.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> S
    where
        S: Clone,
    {
        self.state.read().clone()
    }

    /// Number of runs currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Cancels every in-flight run populating `scope`. Their results will be
    /// discarded and their statuses returned to idle. Returns how many runs
    /// were flagged.
    pub fn cancel_scope(&self, scope: &ScopeKey) -> usize {
        let cancelled = self.in_flight.cancel_scope(scope);
        if cancelled > 0 {
            info!(scope = %scope, cancelled, "scope cancelled");
        }
        cancelled
    }

    /// Runs `op` with `args` through the full lifecycle:
    ///
    /// ```text
    /// condition ─► in-flight claim ─► Started ─► start().await
    ///                                               │
    ///            Cancelled ◄── cancelled? ──────────┤
    ///            Succeeded / Failed ◄───────────────┘
    /// ```
    ///
    /// A refused gate returns [`RunOutcome::Suppressed`] without dispatching
    /// anything.
    pub async fn run<O>(&self, op: &O, args: O::Args) -> RunOutcome<O::Output>
    where
        O: Operation<S> + ?Sized,
    {
        self.run_under(op, args, None).await
    }

    /// Runs `op` as a child of the run owning `parent`. The child reads as
    /// cancelled whenever the parent does, including when the parent was
    /// cancelled before the child started.
    pub(crate) async fn run_under<O>(
        &self,
        op: &O,
        args: O::Args,
        parent: Option<&CancellationToken>,
    ) -> RunOutcome<O::Output>
    where
        O: Operation<S> + ?Sized,
    {
        let meta = OperationMeta::new(op.id(), op.scope_key(&args), op.resource_key(&args));
        let span = info_span!(
            "operation",
            operation = %meta.operation,
            scope = %meta.scope,
            resource = meta.resource.as_deref().unwrap_or(""),
            request_id = %meta.request_id,
        );
        self.run_with_meta(op, args, meta, parent)
            .instrument(span)
            .await
    }

    async fn run_with_meta<O>(
        &self,
        op: &O,
        args: O::Args,
        meta: OperationMeta,
        parent: Option<&CancellationToken>,
    ) -> RunOutcome<O::Output>
    where
        O: Operation<S> + ?Sized,
    {
        if parent.map_or(false, CancellationToken::is_cancelled) {
            debug!(?args, "parent run cancelled; not started");
            return RunOutcome::Cancelled;
        }

        if !self.read(|state| op.condition(&args, state)) {
            debug!(?args, "condition not met; run suppressed");
            return RunOutcome::Suppressed;
        }

        let Some(guard) = self
            .in_flight
            .claim_under(&meta, self.config.dedup, parent)
        else {
            debug!(?args, "already in flight; run suppressed");
            return RunOutcome::Suppressed;
        };

        let ctx = OperationContext::new(self, meta.clone(), guard.token());
        self.dispatch(LifecycleEvent::started(meta.clone()));
        let pending = PendingSettlement {
            store: self,
            meta: Some(meta),
        };

        let result = op.start(args, &ctx).await;

        let outcome = if ctx.is_cancelled() {
            info!("run cancelled; result discarded");
            pending.settle(LifecycleEvent::cancelled);
            RunOutcome::Cancelled
        } else {
            match result {
                Ok(output) => {
                    pending.settle(LifecycleEvent::succeeded);
                    RunOutcome::Completed(output)
                }
                Err(failure) => {
                    warn!(error = %failure, code = ?failure.code, "run failed");
                    let recorded = failure.clone();
                    pending.settle(move |meta| LifecycleEvent::failed(meta, recorded));
                    RunOutcome::Failed(failure)
                }
            }
        };

        drop(guard);
        outcome
    }
}

/// The terminal event a started run still owes the store.
///
/// Settled explicitly when the run finishes. If the run's future is dropped
/// first (a timeout, a `select!`, an aborted task), `Drop` dispatches
/// `Cancelled` so the status does not stay loading forever.
struct PendingSettlement<'a, S: Reducer> {
    store: &'a Store<S>,
    meta: Option<OperationMeta>,
}

impl<S: Reducer> PendingSettlement<'_, S> {
    fn settle(mut self, event: impl FnOnce(OperationMeta) -> LifecycleEvent) {
        if let Some(meta) = self.meta.take() {
            self.store.dispatch(event(meta));
        }
    }
}

impl<S: Reducer> Drop for PendingSettlement<'_, S> {
    fn drop(&mut self) {
        if let Some(meta) = self.meta.take() {
            warn!(
                operation = %meta.operation,
                scope = %meta.scope,
                request_id = %meta.request_id,
                "run dropped before settling; status reset"
            );
            self.store.dispatch(LifecycleEvent::cancelled(meta));
        }
    }
}

impl<S: Reducer + Default> Default for Store<S> {
    fn default() -> Self {
        Self::new(S::default(), StoreConfig::default())
    }
}

impl<S: Reducer> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("revision", &self.revision())
            .field("in_flight", &self.in_flight.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
