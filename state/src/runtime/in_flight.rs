//! In-flight registry: the strict dedup gate and per-run cancellation.
//!
//! Every run registers a [`CancellationToken`] under its request id so that
//! [`InFlightRegistry::cancel_scope`] can reach it. Under
//! [`DedupPolicy::Strict`] a run additionally claims its
//! `(operation, scope, resource)` key; a second run for a key that is already
//! claimed is refused. Both registrations are released when the returned
//! [`InFlightGuard`] drops, whatever way the run settled.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::config::DedupPolicy;
use crate::lifecycle::{OperationId, OperationMeta, ScopeKey};

// ---------------------------------------------------------------------------
// CancellationToken
// ---------------------------------------------------------------------------

/// Shared cancel flag for one run.
///
/// A token made with [`child`](CancellationToken::child) also reads as
/// cancelled once any of its ancestors is, so runs started from inside a
/// cancelled run never apply their results either.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancellationToken>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh token linked to this one.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::default(),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self
                .parent
                .as_ref()
                .map_or(false, |parent| parent.is_cancelled())
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancellationToken")
            .field(&self.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// InFlightKey
// ---------------------------------------------------------------------------

/// What the strict gate deduplicates on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InFlightKey {
    pub operation: OperationId,
    pub scope: ScopeKey,
    pub resource: Option<String>,
}

impl From<&OperationMeta> for InFlightKey {
    fn from(meta: &OperationMeta) -> Self {
        Self {
            operation: meta.operation,
            scope: meta.scope.clone(),
            resource: meta.resource.clone(),
        }
    }
}

impl fmt::Display for InFlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.operation, self.scope)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InFlightRegistry
// ---------------------------------------------------------------------------

/// Runs currently between `Started` and settlement.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    /// Strict-gate claims: key → request id of the owning run.
    claims: DashMap<InFlightKey, Uuid>,
    /// Every live run: request id → (scope, cancel flag).
    runs: DashMap<Uuid, (ScopeKey, CancellationToken)>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the run described by `meta`.
    ///
    /// Returns `None` if `policy` is strict and the run's key is already
    /// claimed by another run.
    pub fn claim(&self, meta: &OperationMeta, policy: DedupPolicy) -> Option<InFlightGuard<'_>> {
        self.claim_under(meta, policy, None)
    }

    /// Like [`claim`](Self::claim), but the run's token is a child of
    /// `parent`: cancelling the parent cancels this run too.
    pub fn claim_under(
        &self,
        meta: &OperationMeta,
        policy: DedupPolicy,
        parent: Option<&CancellationToken>,
    ) -> Option<InFlightGuard<'_>> {
        let claimed = match policy {
            DedupPolicy::Soft => None,
            DedupPolicy::Strict => match self.claims.entry(InFlightKey::from(meta)) {
                Entry::Occupied(_) => return None,
                Entry::Vacant(slot) => {
                    let key = slot.key().clone();
                    slot.insert(meta.request_id);
                    Some(key)
                }
            },
        };

        let token = parent.map(CancellationToken::child).unwrap_or_default();
        self.runs
            .insert(meta.request_id, (meta.scope.clone(), token.clone()));

        Some(InFlightGuard {
            registry: self,
            request_id: meta.request_id,
            claimed,
            token,
        })
    }

    /// Flags every live run in `scope` as cancelled. Returns how many were
    /// flagged.
    pub fn cancel_scope(&self, scope: &ScopeKey) -> usize {
        let mut cancelled = 0;
        for run in self.runs.iter() {
            let (run_scope, token) = run.value();
            if run_scope == scope {
                token.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Returns `true` if some run holds the strict claim for `key`.
    pub fn is_claimed(&self, key: &InFlightKey) -> bool {
        self.claims.contains_key(key)
    }

    /// Number of live runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Registration of one live run. Dropping it releases the run's claim and
/// unregisters its cancel flag.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    registry: &'a InFlightRegistry,
    request_id: Uuid,
    claimed: Option<InFlightKey>,
    token: CancellationToken,
}

impl InFlightGuard<'_> {
    /// The run's cancel flag.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.claimed.take() {
            let request_id = self.request_id;
            self.registry
                .claims
                .remove_if(&key, |_, owner| *owner == request_id);
        }
        self.registry.runs.remove(&self.request_id);
    }
}
