//! # Runtime — Store, Operation Runner, Batches
//!
//! ## Architecture
//!
//! ```text
//!   caller ──► Store::run(op, args)
//!                 │  condition(args, &state)        soft gate
//!                 │  InFlightRegistry::claim        strict gate
//!                 │  dispatch(Started)
//!                 │  op.start(args, ctx).await ───► services
//!                 │        └─ ctx.dispatch(slice action)
//!                 │  dispatch(Succeeded | Failed | Cancelled)
//!                 ▼
//!             RunOutcome
//! ```
//!
//! All state lives in one [`Store`] behind a `parking_lot::RwLock`. Reducers
//! run synchronously under the write lock, so two mutations never overlap.
//! Async work happens outside the lock and only ever comes back as actions.

pub mod batch;
pub mod in_flight;
pub mod operation;
pub mod store;

pub use batch::join_tolerant;
pub use in_flight::{CancellationToken, InFlightKey, InFlightRegistry};
pub use operation::{Operation, OperationContext, RunOutcome, StateError};
pub use store::{Reducer, Store};
