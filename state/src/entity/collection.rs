//! # Entity Collection
//!
//! `ids` holds the iteration order, `entities` holds the records. The two
//! always describe the same set of ids: every mutation below keeps them in
//! lockstep, and a configured comparator re-sorts `ids` after each one.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use super::adapter::{Entity, SortComparer};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by collection mutations.
///
/// Only contract violations surface here. Reads never fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// `update_one` was called for an id the collection does not hold.
    #[error("no entity with id {0}")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// EntityCollection
// ---------------------------------------------------------------------------

/// An ordered, deduplicated id → record mapping.
///
/// Obtain one from [`EntityAdapter::initial_state`](super::EntityAdapter::initial_state)
/// so that it carries the adapter's sort order.
#[derive(Clone)]
pub struct EntityCollection<E: Entity> {
    ids: Vec<E::Id>,
    entities: HashMap<E::Id, E>,
    sort_comparer: Option<SortComparer<E>>,
}

impl<E: Entity> EntityCollection<E> {
    /// Creates an empty, insertion-ordered collection.
    pub fn new() -> Self {
        Self::with_comparer(None)
    }

    pub(crate) fn with_comparer(sort_comparer: Option<SortComparer<E>>) -> Self {
        Self {
            ids: Vec::new(),
            entities: HashMap::new(),
            sort_comparer,
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Inserts `entity` if its id is not present yet.
    ///
    /// Returns `false` (and leaves the existing record untouched) when the id
    /// is already taken.
    pub fn add_one(&mut self, entity: E) -> bool {
        let inserted = self.insert_absent(entity);
        if inserted {
            self.resort();
        }
        inserted
    }

    /// Inserts every entity whose id is not present yet.
    pub fn add_many(&mut self, entities: impl IntoIterator<Item = E>) {
        for entity in entities {
            self.insert_absent(entity);
        }
        self.resort();
    }

    /// Inserts `entity`, or merges it into the existing record with the same
    /// id via [`Entity::merge`]. An existing record keeps its position unless
    /// the comparator moves it.
    pub fn upsert_one(&mut self, entity: E) {
        self.upsert_unsorted(entity);
        self.resort();
    }

    /// Upserts every entity, then re-sorts once.
    pub fn upsert_many(&mut self, entities: impl IntoIterator<Item = E>) {
        for entity in entities {
            self.upsert_unsorted(entity);
        }
        self.resort();
    }

    /// Replaces the whole contents with `entities`: a [`remove_all`] then an
    /// [`add_many`], so for duplicate ids in the input the first occurrence
    /// wins.
    ///
    /// [`remove_all`]: Self::remove_all
    /// [`add_many`]: Self::add_many
    pub fn set_all(&mut self, entities: impl IntoIterator<Item = E>) {
        self.remove_all();
        self.add_many(entities);
    }

    /// Applies `changes` to the record with the given id.
    ///
    /// If the closure changes the record's id, the record is re-keyed in
    /// place; a record already holding the new id is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::NotFound`] if `id` is absent. Callers are
    /// expected to check first.
    pub fn update_one<R>(
        &mut self,
        id: &E::Id,
        changes: impl FnOnce(&mut E) -> R,
    ) -> Result<R, CollectionError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| CollectionError::NotFound(format!("{:?}", id)))?;

        let result = changes(entity);

        let new_id = entity.id();
        if &new_id != id {
            self.rekey(id, new_id);
        }
        self.resort();

        Ok(result)
    }

    /// Removes a record, returning it if it was present.
    pub fn remove_one(&mut self, id: &E::Id) -> Option<E> {
        let removed = self.entities.remove(id)?;
        self.ids.retain(|existing| existing != id);
        Some(removed)
    }

    /// Removes every record.
    pub fn remove_all(&mut self) {
        self.ids.clear();
        self.entities.clear();
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Returns every record in collection order.
    pub fn select_all(&self) -> Vec<&E> {
        self.iter().collect()
    }

    /// Iterates records in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.ids.iter().filter_map(|id| self.entities.get(id))
    }

    /// Returns the record with the given id, or `None`.
    pub fn select_by_id(&self, id: &E::Id) -> Option<&E> {
        self.entities.get(id)
    }

    /// Returns the ids in collection order.
    pub fn select_ids(&self) -> &[E::Id] {
        &self.ids
    }

    /// Returns the number of records.
    pub fn select_total(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if the collection holds a record with this id.
    pub fn contains(&self, id: &E::Id) -> bool {
        self.entities.contains_key(id)
    }

    /// Returns `true` if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Mutable access for crate-internal bookkeeping fields.
    ///
    /// The closure-based [`update_one`](Self::update_one) is the public
    /// mutation path; callers of this must not change the record's id.
    pub(crate) fn entity_mut(&mut self, id: &E::Id) -> Option<&mut E> {
        self.entities.get_mut(id)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn insert_absent(&mut self, entity: E) -> bool {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return false;
        }
        self.ids.push(id.clone());
        self.entities.insert(id, entity);
        true
    }

    fn upsert_unsorted(&mut self, entity: E) {
        let id = entity.id();
        match self.entities.get_mut(&id) {
            Some(existing) => existing.merge(entity),
            None => {
                self.ids.push(id.clone());
                self.entities.insert(id, entity);
            }
        }
    }

    fn rekey(&mut self, old_id: &E::Id, new_id: E::Id) {
        let Some(entity) = self.entities.remove(old_id) else {
            return;
        };
        let displaced = self.entities.insert(new_id.clone(), entity).is_some();
        if displaced {
            self.ids.retain(|existing| existing != &new_id);
        }
        if let Some(pos) = self.ids.iter().position(|existing| existing == old_id) {
            self.ids[pos] = new_id;
        }
    }

    fn resort(&mut self) {
        let Some(comparer) = self.sort_comparer else {
            return;
        };
        let entities = &self.entities;
        // `sort_by` is stable, so ties keep their previous relative order.
        self.ids.sort_by(|a, b| match (entities.get(a), entities.get(b)) {
            (Some(a), Some(b)) => comparer(a, b),
            _ => std::cmp::Ordering::Equal,
        });
    }
}

impl<E: Entity> Default for EntityCollection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity + PartialEq> PartialEq for EntityCollection<E> {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids && self.entities == other.entities
    }
}

impl<E: Entity + fmt::Debug> fmt::Debug for EntityCollection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCollection")
            .field("ids", &self.ids)
            .field("sorted", &self.sort_comparer.is_some())
            .field("entities", &self.select_all())
            .finish()
    }
}

/// Serializes as an ordered sequence of records.
impl<E: Entity + Serialize> Serialize for EntityCollection<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
