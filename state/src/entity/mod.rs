//! # Entity Module — Normalized Collections
//!
//! Every list the wallet caches (transactions for an account, token
//! balances, contract metadata, the accounts themselves) is stored the same
//! way: an ordered list of ids plus an id → record map. No duplicates, no
//! linear scans for lookups, and an optional comparator when the order
//! should follow the data rather than insertion.
//!
//! ```text
//! adapter.rs    — Entity trait, EntityAdapter (collection definition)
//! collection.rs — EntityCollection: the mutation and read operations
//! ```

pub mod adapter;
pub mod collection;

pub use adapter::{Entity, EntityAdapter, SortComparer};
pub use collection::{CollectionError, EntityCollection};
