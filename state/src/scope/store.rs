//! # Scope Store
//!
//! An [`EntityCollection`] of [`ScopeEntry`] keyed by account. Reads go
//! through [`get`](ScopeStore::get) or the selector layer; writes go through
//! the matcher (creation) and the closure-based update helpers below, which
//! all route through the collection's `update_one`.

use serde::{Serialize, Serializer};

use super::entry::{ScopeEntry, ScopeSeed};
use crate::entity::{CollectionError, Entity, EntityAdapter, EntityCollection};
use crate::lifecycle::ScopeKey;
use crate::status::{Status, StatusHost, StatusPath};

/// Per-account entries for one slice.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeStore<D: Clone, E: Entity> {
    entries: EntityCollection<ScopeEntry<D, E>>,
}

impl<D: Clone, E: Entity> ScopeStore<D, E> {
    pub fn new() -> Self {
        Self {
            entries: EntityCollection::new(),
        }
    }

    /// The entry for `scope`, if one was ever created.
    pub fn get(&self, scope: &ScopeKey) -> Option<&ScopeEntry<D, E>> {
        self.entries.select_by_id(scope)
    }

    pub fn contains(&self, scope: &ScopeKey) -> bool {
        self.entries.contains(scope)
    }

    /// Accounts with an entry, in creation order.
    pub fn scope_ids(&self) -> &[ScopeKey] {
        self.entries.select_ids()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.select_total()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates an entry from `seed` unless one already exists.
    ///
    /// Returns `true` if an entry was created. Only the scope matcher calls
    /// this.
    pub(crate) fn seed(&mut self, scope: ScopeKey, seed: &ScopeSeed<D, E>) -> bool {
        if self.entries.contains(&scope) {
            return false;
        }
        self.entries.add_one(seed.plant(scope))
    }

    /// Applies `changes` to an existing entry.
    ///
    /// # Errors
    ///
    /// [`CollectionError::NotFound`] if the scope has no entry.
    pub fn update<R>(
        &mut self,
        scope: &ScopeKey,
        changes: impl FnOnce(&mut ScopeEntry<D, E>) -> R,
    ) -> Result<R, CollectionError> {
        self.entries.update_one(scope, |entry| {
            let scope_id = entry.scope_id.clone();
            let result = changes(entry);
            // The key is owned by the store, not by the slice.
            entry.scope_id = scope_id;
            result
        })
    }

    /// Applies `changes` to the scope's nested collection, creating an empty
    /// one of the adapter's shape if the entry has none yet.
    ///
    /// # Errors
    ///
    /// [`CollectionError::NotFound`] if the scope has no entry.
    pub fn update_items<R>(
        &mut self,
        scope: &ScopeKey,
        adapter: &EntityAdapter<E>,
        changes: impl FnOnce(&mut EntityCollection<E>) -> R,
    ) -> Result<R, CollectionError> {
        self.update(scope, |entry| {
            let items = entry.items.get_or_insert_with(|| adapter.initial_state());
            changes(items)
        })
    }

    /// Applies `changes` to the scope's domain state.
    ///
    /// # Errors
    ///
    /// [`CollectionError::NotFound`] if the scope has no entry.
    pub fn update_domain<R>(
        &mut self,
        scope: &ScopeKey,
        changes: impl FnOnce(&mut D) -> R,
    ) -> Result<R, CollectionError> {
        self.update(scope, |entry| changes(&mut entry.domain))
    }
}

impl<D: Clone, E: Entity> Default for ScopeStore<D, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Clone, E: Entity> StatusHost for ScopeStore<D, E> {
    fn status_mut(&mut self, path: &StatusPath) -> Option<&mut Status> {
        let entry = self.entries.entity_mut(path.scope())?;
        match path {
            StatusPath::Scope(_) => Some(&mut entry.status),
            StatusPath::Resource { resource, .. } => {
                Some(entry.resources.entry(resource.clone()).or_default())
            }
        }
    }

    fn status_at(&self, path: &StatusPath) -> Option<&Status> {
        let entry = self.entries.select_by_id(path.scope())?;
        match path {
            StatusPath::Scope(_) => Some(&entry.status),
            StatusPath::Resource { resource, .. } => entry.resources.get(resource),
        }
    }
}

/// Serializes as an object keyed by account, in creation order.
impl<D, E> Serialize for ScopeStore<D, E>
where
    D: Clone + Serialize,
    E: Entity + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.entries
                .iter()
                .map(|entry| (entry.scope_id.as_str(), entry)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Balance {
        contract: String,
        amount: u64,
    }

    impl Entity for Balance {
        type Id = String;
        fn id(&self) -> String {
            self.contract.clone()
        }
    }

    fn store_with(scope: &str) -> ScopeStore<Vec<String>, Balance> {
        let mut store = ScopeStore::new();
        let seed = ScopeSeed::new(vec!["seeded".to_string()]);
        assert!(store.seed(scope.into(), &seed));
        store
    }

    #[test]
    fn seed_is_idempotent() {
        let mut store = store_with("alice");
        store
            .update_domain(&"alice".into(), |d| d.push("written".into()))
            .unwrap();

        let seed = ScopeSeed::new(Vec::new());
        assert!(!store.seed("alice".into(), &seed));

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&"alice".into()).unwrap().domain,
            vec!["seeded".to_string(), "written".to_string()]
        );
    }

    #[test]
    fn update_items_creates_collection_on_demand() {
        let mut store = store_with("alice");
        let adapter = EntityAdapter::new();

        store
            .update_items(&"alice".into(), &adapter, |items| {
                items.upsert_one(Balance {
                    contract: "usn".into(),
                    amount: 5,
                })
            })
            .unwrap();

        let items = store.get(&"alice".into()).unwrap().items.as_ref().unwrap();
        assert_eq!(items.select_total(), 1);
    }

    #[test]
    fn update_unknown_scope_is_not_found() {
        let mut store: ScopeStore<(), Balance> = ScopeStore::new();
        let result = store.update(&"ghost".into(), |_| ());
        assert!(matches!(result, Err(CollectionError::NotFound(_))));
    }

    #[test]
    fn update_cannot_rekey_entry() {
        let mut store = store_with("alice");
        store
            .update(&"alice".into(), |entry| entry.scope_id = "mallory".into())
            .unwrap();

        assert!(store.contains(&"alice".into()));
        assert!(!store.contains(&"mallory".into()));
    }

    #[test]
    fn status_host_resolves_scope_and_resource_paths() {
        let mut store = store_with("alice");
        let scope_path = StatusPath::Scope("alice".into());
        let resource_path = StatusPath::Resource {
            scope: "alice".into(),
            resource: "usn".into(),
        };

        store.status_mut(&scope_path).unwrap().begin_loading();
        store.status_mut(&resource_path).unwrap().mark_success();

        assert!(store.status_at(&scope_path).unwrap().loading);
        assert!(store.status_at(&resource_path).unwrap().success);
        assert!(store
            .status_mut(&StatusPath::Scope("bob".into()))
            .is_none());
    }
}
