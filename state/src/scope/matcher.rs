//! # Scope Lifecycle Matcher
//!
//! Subscribes to a set of operation ids. On every `Started` event for one of
//! them, makes sure the event's scope has an entry, planting one from the
//! seed if not. An existing entry is left exactly as it is, which is what
//! lets "fetch tokens" and "fetch transactions" share an account without
//! resetting each other's state.

use std::collections::HashSet;

use tracing::info;

use super::entry::ScopeSeed;
use super::store::ScopeStore;
use crate::entity::Entity;
use crate::lifecycle::{LifecycleEvent, OperationId};

/// Idempotent scope creation on operation start.
#[derive(Clone, Debug)]
pub struct ScopeLifecycle<D, E: Entity> {
    operations: HashSet<OperationId>,
    seed: ScopeSeed<D, E>,
}

impl<D: Clone, E: Entity> ScopeLifecycle<D, E> {
    /// A matcher planting new scopes from `seed`. Subscribe it to operations
    /// with [`on`](Self::on).
    pub fn new(seed: ScopeSeed<D, E>) -> Self {
        Self {
            operations: HashSet::new(),
            seed,
        }
    }

    /// Subscribes to `operation`.
    pub fn on(mut self, operation: OperationId) -> Self {
        self.operations.insert(operation);
        self
    }

    pub fn matches(&self, operation: &OperationId) -> bool {
        self.operations.contains(operation)
    }

    /// Reacts to a lifecycle event. Returns `true` if a scope was created.
    pub fn apply(&self, store: &mut ScopeStore<D, E>, event: &LifecycleEvent) -> bool {
        if !event.is_start() || !self.matches(&event.meta.operation) {
            return false;
        }
        if store.contains(&event.meta.scope) {
            return false;
        }

        let created = store.seed(event.meta.scope.clone(), &self.seed);
        if created {
            info!(
                scope = %event.meta.scope,
                operation = %event.meta.operation,
                "scope created"
            );
        }
        created
    }
}
