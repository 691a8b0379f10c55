//! Status tracker: one registry, one dispatch loop.
//!
//! A slice registers each operation it wants tracked together with a pure
//! resolver `&OperationMeta -> StatusPath`. For every lifecycle event the
//! reducer sees, [`StatusTracker::apply`] looks the operation up by id and
//! writes the transition at the resolved path. Operations that were never
//! registered are ignored.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use super::{Status, StatusPath};
use crate::lifecycle::{LifecycleEvent, LifecyclePhase, OperationId, OperationMeta};

/// Resolves where a run's status is recorded.
pub type StatusPathResolver = fn(&OperationMeta) -> StatusPath;

/// Anything that can hand out status slots by path.
pub trait StatusHost {
    /// Mutable slot at `path`, or `None` if the path cannot be resolved (the
    /// scope does not exist).
    fn status_mut(&mut self, path: &StatusPath) -> Option<&mut Status>;

    /// Read-only slot at `path`, if one exists.
    fn status_at(&self, path: &StatusPath) -> Option<&Status>;
}

/// Registry mapping operation ids to status path resolvers.
#[derive(Clone, Default)]
pub struct StatusTracker {
    bindings: HashMap<OperationId, StatusPathResolver>,
}

impl fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.bindings.keys()).finish()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `operation`, recording its status wherever `resolver` points.
    pub fn track(mut self, operation: OperationId, resolver: StatusPathResolver) -> Self {
        self.bindings.insert(operation, resolver);
        self
    }

    /// Returns `true` if `operation` is tracked.
    pub fn tracks(&self, operation: &OperationId) -> bool {
        self.bindings.contains_key(operation)
    }

    /// Resolves the status path for `meta`, if its operation is tracked.
    pub fn path_for(&self, meta: &OperationMeta) -> Option<StatusPath> {
        self.bindings.get(&meta.operation).map(|resolve| resolve(meta))
    }

    /// Applies a lifecycle event to `host`.
    ///
    /// Returns `true` if a status slot was written.
    pub fn apply<H: StatusHost>(&self, host: &mut H, event: &LifecycleEvent) -> bool {
        let Some(path) = self.path_for(&event.meta) else {
            return false;
        };

        let Some(status) = host.status_mut(&path) else {
            warn!(
                operation = %event.meta.operation,
                path = %path,
                "status path does not resolve; transition dropped"
            );
            return false;
        };

        match &event.phase {
            LifecyclePhase::Started => status.begin_loading(),
            LifecyclePhase::Succeeded => status.mark_success(),
            LifecyclePhase::Failed(failure) => {
                status.mark_error(failure.message.clone(), failure.code.clone())
            }
            LifecyclePhase::Cancelled => status.reset(),
        }

        debug!(
            operation = %event.meta.operation,
            request_id = %event.meta.request_id,
            path = %path,
            phase = ?status.phase(),
            "status updated"
        );
        true
    }
}
