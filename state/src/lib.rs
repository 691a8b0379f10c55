// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NOVA Wallet State — Scoped Normalized Cache
//!
//! The wallet front end talks to a handful of remote services (balances,
//! token metadata, the transaction explorer) and has to keep whatever comes
//! back in memory, partitioned per account, with a clear picture of which
//! fetches are loading, done, or broken. This crate is that picture.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **entity** — Normalized, deduplicated collections keyed by id, with an
//!   optional sort order. Everything else is built out of these.
//! - **status** — The idle/loading/success/error lifecycle of one async
//!   operation, recorded at a path derived from the operation's metadata.
//! - **scope** — Per-account entries (the "scope store") and the matcher
//!   that creates them exactly once when the first fetch for an account starts.
//! - **selectors** — Pure, total reads over flat or scope-nested collections.
//! - **runtime** — The store (single-writer reducer), the operation runner
//!   with its dedup gate and cancellation, and batch fan-out.
//! - **slices** — Tokens, tokens metadata and transactions, built on all of
//!   the above.
//! - **ports** — The service traits the slices fetch through.
//!
//! ## Design Philosophy
//!
//! 1. Mutation is synchronous and serialized. Async work never touches state
//!    directly; it reports back through lifecycle events.
//! 2. Reads never fail. An account we have never heard of reads as empty.
//! 3. One fetch per account/resource at a time. A second one is dropped, not
//!    queued.

pub mod config;
pub mod entity;
pub mod lifecycle;
pub mod ports;
pub mod runtime;
pub mod scope;
pub mod selectors;
pub mod slices;
pub mod status;

pub use config::{DedupPolicy, StoreConfig};
pub use entity::{CollectionError, Entity, EntityAdapter, EntityCollection};
pub use lifecycle::{
    LifecycleEvent, LifecyclePhase, OperationFailure, OperationId, OperationMeta, ScopeKey,
};
pub use runtime::{Operation, OperationContext, Reducer, RunOutcome, StateError, Store};
pub use scope::{ScopeEntry, ScopeLifecycle, ScopeSeed, ScopeStore};
pub use slices::{Action, Wallet, WalletState, WalletStore};
pub use status::{Status, StatusPath, StatusTracker};
