//! Entity trait and collection definitions.
//!
//! An [`EntityAdapter`] describes a collection shape: how records are
//! ordered. It hands out empty collections of that shape via
//! [`EntityAdapter::initial_state`], which is also what selectors fall back
//! to when a scope has no collection yet.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;

use super::collection::EntityCollection;

/// A record that can live in an [`EntityCollection`].
pub trait Entity: Clone {
    /// The identifier type. Must be unique within a collection.
    type Id: Clone + Eq + Hash + fmt::Debug;

    /// Returns this record's identifier.
    fn id(&self) -> Self::Id;

    /// Shallow-merges `incoming` into an existing record with the same id.
    ///
    /// Called by upserts when the id is already present. The default
    /// replaces the record wholesale; records that carry locally-derived
    /// fields (a polled status, say) override this to keep them.
    fn merge(&mut self, incoming: Self) {
        *self = incoming;
    }
}

/// Comparator used to keep a collection's order sorted.
pub type SortComparer<E> = fn(&E, &E) -> Ordering;

/// Definition of a collection shape.
pub struct EntityAdapter<E> {
    sort_comparer: Option<SortComparer<E>>,
}

impl<E: Entity> EntityAdapter<E> {
    /// An adapter whose collections keep insertion order.
    pub const fn new() -> Self {
        Self {
            sort_comparer: None,
        }
    }

    /// An adapter whose collections stay sorted by `comparer`.
    ///
    /// The sort is stable: records that compare equal keep their relative
    /// insertion order.
    pub const fn sorted_by(comparer: SortComparer<E>) -> Self {
        Self {
            sort_comparer: Some(comparer),
        }
    }

    /// Returns an empty collection of this shape.
    pub fn initial_state(&self) -> EntityCollection<E> {
        EntityCollection::with_comparer(self.sort_comparer)
    }

    /// Returns `true` if collections of this shape are sorted.
    pub fn is_sorted(&self) -> bool {
        self.sort_comparer.is_some()
    }
}

impl<E: Entity> Default for EntityAdapter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EntityAdapter<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EntityAdapter<E> {}

impl<E> fmt::Debug for EntityAdapter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityAdapter")
            .field("sorted", &self.sort_comparer.is_some())
            .finish()
    }
}
