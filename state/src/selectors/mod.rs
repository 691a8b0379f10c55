//! # Selector Composition Layer
//!
//! Pure, total reads. Nothing here mutates state, nothing here fails: an
//! unknown account reads as [`ScopeEntry::empty`], a scope without a nested
//! collection reads as an empty collection of the *selected* shape.
//!
//! Flat and nested collections share one interface through
//! [`CollectionSource`]: a flat [`EntityCollection`] answers for every scope,
//! a [`ScopeStore`] answers with the scope's nested collection. A
//! [`CollectionSelectors`] built from an [`EntityAdapter`] then reads either
//! one the same way.
//!
//! ```text
//! mod.rs  — select_scope, status selectors, CollectionSource, CollectionSelectors
//! memo.rs — Memoized: last-input cache keyed by store revision
//! ```

pub mod memo;

use std::borrow::Cow;

use crate::entity::{Entity, EntityAdapter, EntityCollection};
use crate::lifecycle::ScopeKey;
use crate::scope::{ScopeEntry, ScopeStore};
use crate::status::Status;

pub use memo::Memoized;

// ---------------------------------------------------------------------------
// Scope selectors
// ---------------------------------------------------------------------------

/// The entry for `scope`, or the documented empty default.
pub fn select_scope<'a, D, E>(
    store: &'a ScopeStore<D, E>,
    scope: &ScopeKey,
) -> Cow<'a, ScopeEntry<D, E>>
where
    D: Clone + Default,
    E: Entity,
{
    match store.get(scope) {
        Some(entry) => Cow::Borrowed(entry),
        None => Cow::Owned(ScopeEntry::empty(scope.clone())),
    }
}

/// Scope-wide status; idle for unknown scopes.
pub fn select_status<D: Clone, E: Entity>(store: &ScopeStore<D, E>, scope: &ScopeKey) -> Status {
    store
        .get(scope)
        .map(|entry| entry.status.clone())
        .unwrap_or_default()
}

/// `true` while the scope-wide operation is in flight.
pub fn select_loading<D: Clone, E: Entity>(store: &ScopeStore<D, E>, scope: &ScopeKey) -> bool {
    store.get(scope).is_some_and(|entry| entry.status.loading)
}

/// Status of one resource inside a scope; idle if unknown.
pub fn select_resource_status<D: Clone, E: Entity>(
    store: &ScopeStore<D, E>,
    scope: &ScopeKey,
    resource: &str,
) -> Status {
    store
        .get(scope)
        .map(|entry| entry.resource_status(resource))
        .unwrap_or_default()
}

/// `true` while any per-resource operation in the scope is in flight.
pub fn select_any_resource_loading<D: Clone, E: Entity>(
    store: &ScopeStore<D, E>,
    scope: &ScopeKey,
) -> bool {
    store
        .get(scope)
        .is_some_and(|entry| entry.any_resource_loading())
}

// ---------------------------------------------------------------------------
// Collection sources
// ---------------------------------------------------------------------------

/// Something that can hand out an entity collection for a scope.
pub trait CollectionSource<E: Entity> {
    /// The collection to read for `scope`, or `None` if there is none.
    fn collection_for(&self, scope: Option<&ScopeKey>) -> Option<&EntityCollection<E>>;
}

/// A flat collection is the same for every scope.
impl<E: Entity> CollectionSource<E> for EntityCollection<E> {
    fn collection_for(&self, _scope: Option<&ScopeKey>) -> Option<&EntityCollection<E>> {
        Some(self)
    }
}

/// A scope store answers with the scope's nested collection.
impl<D: Clone, E: Entity> CollectionSource<E> for ScopeStore<D, E> {
    fn collection_for(&self, scope: Option<&ScopeKey>) -> Option<&EntityCollection<E>> {
        self.get(scope?)?.items.as_ref()
    }
}

// ---------------------------------------------------------------------------
// CollectionSelectors
// ---------------------------------------------------------------------------

/// Nested-or-root selector factory for one collection shape.
#[derive(Debug, Clone, Copy)]
pub struct CollectionSelectors<E> {
    adapter: EntityAdapter<E>,
}

impl<E: Entity> CollectionSelectors<E> {
    /// Selectors for collections of `adapter`'s shape. The adapter's empty
    /// initial state is the fallback for missing collections.
    pub const fn new(adapter: EntityAdapter<E>) -> Self {
        Self { adapter }
    }

    /// The collection `source` holds for `scope`, or an empty one of this
    /// shape.
    pub fn resolve<'a, S>(
        &self,
        source: &'a S,
        scope: Option<&ScopeKey>,
    ) -> Cow<'a, EntityCollection<E>>
    where
        S: CollectionSource<E>,
    {
        match source.collection_for(scope) {
            Some(collection) => Cow::Borrowed(collection),
            None => Cow::Owned(self.adapter.initial_state()),
        }
    }

    /// Every record in collection order.
    pub fn select_all<S: CollectionSource<E>>(
        &self,
        source: &S,
        scope: Option<&ScopeKey>,
    ) -> Vec<E> {
        self.resolve(source, scope).iter().cloned().collect()
    }

    /// One record by id.
    pub fn select_by_id<S: CollectionSource<E>>(
        &self,
        source: &S,
        scope: Option<&ScopeKey>,
        id: &E::Id,
    ) -> Option<E> {
        self.resolve(source, scope).select_by_id(id).cloned()
    }

    /// Ids in collection order.
    pub fn select_ids<S: CollectionSource<E>>(
        &self,
        source: &S,
        scope: Option<&ScopeKey>,
    ) -> Vec<E::Id> {
        self.resolve(source, scope).select_ids().to_vec()
    }

    /// Number of records.
    pub fn select_total<S: CollectionSource<E>>(
        &self,
        source: &S,
        scope: Option<&ScopeKey>,
    ) -> usize {
        self.resolve(source, scope).select_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{LifecycleEvent, OperationId, OperationMeta};
    use crate::scope::{ScopeLifecycle, ScopeSeed};

    const FETCH: OperationId = OperationId::new("test/fetch");

    #[derive(Clone, Debug, PartialEq)]
    struct Tx {
        hash: String,
        ts: u64,
    }

    impl Entity for Tx {
        type Id = String;
        fn id(&self) -> String {
            self.hash.clone()
        }
    }

    fn newest_first(a: &Tx, b: &Tx) -> std::cmp::Ordering {
        b.ts.cmp(&a.ts)
    }

    const TXS: EntityAdapter<Tx> = EntityAdapter::sorted_by(newest_first);

    fn tx(hash: &str, ts: u64) -> Tx {
        Tx {
            hash: hash.into(),
            ts,
        }
    }

    fn store_with_alice(seed: ScopeSeed<(), Tx>) -> ScopeStore<(), Tx> {
        let mut store = ScopeStore::new();
        ScopeLifecycle::new(seed).on(FETCH).apply(
            &mut store,
            &LifecycleEvent::started(OperationMeta::new(FETCH, "alice".into(), None)),
        );
        store
    }

    #[test]
    fn unknown_scope_reads_as_empty_default() {
        let store: ScopeStore<Vec<u8>, Tx> = ScopeStore::new();
        let entry = select_scope(&store, &"nobody".into());

        assert_eq!(entry.scope_id.as_str(), "nobody");
        assert!(entry.status.is_idle());
        assert!(entry.domain.is_empty());
        assert!(entry.items.is_none());
        assert!(!select_loading(&store, &"nobody".into()));
        assert!(select_resource_status(&store, &"nobody".into(), "usn").is_idle());
    }

    #[test]
    fn known_scope_is_borrowed() {
        let store = store_with_alice(ScopeSeed::default());
        assert!(matches!(select_scope(&store, &"alice".into()), Cow::Borrowed(_)));
    }

    #[test]
    fn nested_collection_is_selected_per_scope() {
        let mut store = store_with_alice(ScopeSeed::new(()).with_items(TXS));
        store
            .update_items(&"alice".into(), &TXS, |items| {
                items.upsert_many(vec![tx("a", 1), tx("b", 2)])
            })
            .unwrap();

        let selectors = CollectionSelectors::new(TXS);
        let alice = ScopeKey::from("alice");

        let all = selectors.select_all(&store, Some(&alice));
        assert_eq!(all, vec![tx("b", 2), tx("a", 1)]);
        assert_eq!(
            selectors.select_by_id(&store, Some(&alice), &"a".into()),
            Some(tx("a", 1))
        );
        assert_eq!(selectors.select_total(&store, Some(&alice)), 2);
    }

    #[test]
    fn missing_nested_collection_falls_back_to_empty_of_same_shape() {
        // Scope exists but was seeded without items.
        let store = store_with_alice(ScopeSeed::default());
        let selectors = CollectionSelectors::new(TXS);
        let alice = ScopeKey::from("alice");

        let resolved = selectors.resolve(&store, Some(&alice));
        assert!(resolved.is_empty());
        assert!(matches!(resolved, Cow::Owned(_)));
        assert!(selectors.select_all(&store, Some(&"bob".into())).is_empty());
        assert_eq!(selectors.select_by_id(&store, None, &"a".into()), None);
    }

    #[test]
    fn flat_collection_answers_for_any_scope() {
        let mut flat = TXS.initial_state();
        flat.add_one(tx("root", 9));
        let selectors = CollectionSelectors::new(TXS);

        assert_eq!(selectors.select_total(&flat, None), 1);
        assert_eq!(selectors.select_ids(&flat, Some(&"alice".into())), vec!["root"]);
    }

    #[test]
    fn repeated_reads_are_equal_by_value() {
        let store = store_with_alice(ScopeSeed::new(()).with_items(TXS));
        let selectors = CollectionSelectors::new(TXS);
        let alice = ScopeKey::from("alice");

        assert_eq!(
            selectors.select_all(&store, Some(&alice)),
            selectors.select_all(&store, Some(&alice))
        );
        assert_eq!(select_scope(&store, &alice), select_scope(&store, &alice));
    }
}
