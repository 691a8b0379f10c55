//! # Scope Module — Per-Account Partitioning
//!
//! The wallet can watch several accounts at once. Everything fetched for an
//! account lives in that account's [`ScopeEntry`]: its status, per-resource
//! statuses, slice-specific domain state, and an optional nested entity
//! collection. The [`ScopeStore`] is itself an entity collection of those
//! entries, keyed by account id.
//!
//! Entries are created in exactly one place: the [`ScopeLifecycle`] matcher,
//! when the first operation for an unknown account starts. After that they
//! are updated in place and never recreated.
//!
//! ```text
//! entry.rs   — ScopeEntry, ScopeSeed
//! store.rs   — ScopeStore (entity collection of entries + StatusHost)
//! matcher.rs — ScopeLifecycle (idempotent creation on operation start)
//! ```

pub mod entry;
pub mod matcher;
pub mod store;

pub use entry::{ScopeEntry, ScopeSeed};
pub use matcher::ScopeLifecycle;
pub use store::ScopeStore;
