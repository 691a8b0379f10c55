//! Scope entries and the seeds they are created from.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::{Entity, EntityAdapter, EntityCollection};
use crate::lifecycle::ScopeKey;
use crate::status::Status;

/// Everything cached for one account in one slice.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", bound(serialize = "D: Serialize, E: Serialize"))]
pub struct ScopeEntry<D, E: Entity> {
    /// The account this entry belongs to.
    pub scope_id: ScopeKey,

    /// Status of the scope-wide operation (e.g. "fetch all transactions").
    pub status: Status,

    /// Status of per-resource operations, keyed by resource (e.g. one slot
    /// per token contract).
    pub resources: BTreeMap<String, Status>,

    /// Slice-specific state seeded at creation.
    pub domain: D,

    /// The nested collection, if this slice keeps one.
    pub items: Option<EntityCollection<E>>,
}

impl<D: Default, E: Entity> ScopeEntry<D, E> {
    /// The documented default for a scope that was never populated: idle
    /// status, no resources, default domain state, no items.
    pub fn empty(scope_id: ScopeKey) -> Self {
        Self {
            scope_id,
            status: Status::idle(),
            resources: BTreeMap::new(),
            domain: D::default(),
            items: None,
        }
    }
}

impl<D, E: Entity> ScopeEntry<D, E> {
    /// Status of one resource; idle if it was never tracked.
    pub fn resource_status(&self, resource: &str) -> Status {
        self.resources.get(resource).cloned().unwrap_or_default()
    }

    /// Returns `true` if any per-resource operation is loading.
    pub fn any_resource_loading(&self) -> bool {
        self.resources.values().any(|status| status.loading)
    }
}

impl<D: Clone, E: Entity> Entity for ScopeEntry<D, E> {
    type Id = ScopeKey;

    fn id(&self) -> ScopeKey {
        self.scope_id.clone()
    }
}

/// Initial state for scopes created by a [`ScopeLifecycle`](super::ScopeLifecycle).
#[derive(Clone, Debug)]
pub struct ScopeSeed<D, E: Entity> {
    domain: D,
    items: Option<EntityAdapter<E>>,
}

impl<D: Clone, E: Entity> ScopeSeed<D, E> {
    /// A seed with the given domain state and no nested collection.
    pub fn new(domain: D) -> Self {
        Self {
            domain,
            items: None,
        }
    }

    /// Adds an empty nested collection of the adapter's shape.
    pub fn with_items(mut self, adapter: EntityAdapter<E>) -> Self {
        self.items = Some(adapter);
        self
    }

    /// Builds a fresh entry for `scope_id`.
    pub fn plant(&self, scope_id: ScopeKey) -> ScopeEntry<D, E> {
        ScopeEntry {
            scope_id,
            status: Status::idle(),
            resources: BTreeMap::new(),
            domain: self.domain.clone(),
            items: self.items.map(|adapter| adapter.initial_state()),
        }
    }
}

impl<D: Clone + Default, E: Entity> Default for ScopeSeed<D, E> {
    fn default() -> Self {
        Self::new(D::default())
    }
}
