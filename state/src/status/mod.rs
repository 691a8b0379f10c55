//! # Status Module — Async Lifecycle Tracking
//!
//! A [`Status`] is the idle/loading/success/error snapshot of one async
//! operation. Where that snapshot lives is not fixed: the
//! [`StatusTracker`] resolves a [`StatusPath`] from each lifecycle event and
//! asks a [`StatusHost`] (the scope store, usually) for the slot at that path.
//!
//! ```text
//! mod.rs     — Status, StatusPhase, StatusPath
//! tracker.rs — StatusHost, StatusTracker (operation id → path registry)
//! ```

pub mod tracker;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lifecycle::ScopeKey;

pub use tracker::{StatusHost, StatusPathResolver, StatusTracker};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle snapshot of one async operation.
///
/// At most one of `loading`, `success`, `error` is set; all three clear means
/// idle. Transitions replace the whole snapshot, so a stale `error_message`
/// never survives into a later `loading` or `success`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub loading: bool,
    pub success: bool,
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// The four states a [`Status`] can be in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusPhase {
    Idle,
    Loading,
    Success,
    Error,
}

impl Status {
    /// The snapshot of an operation that never ran.
    pub fn idle() -> Self {
        Self::default()
    }

    /// The snapshot of an operation in flight.
    pub fn pending() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    /// The snapshot of an operation that resolved.
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// The snapshot of an operation that rejected.
    pub fn failed(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            error: true,
            error_message: Some(message.into()),
            error_code: code,
            ..Self::default()
        }
    }

    pub fn begin_loading(&mut self) {
        *self = Self::pending();
    }

    pub fn mark_success(&mut self) {
        *self = Self::succeeded();
    }

    pub fn mark_error(&mut self, message: impl Into<String>, code: Option<String>) {
        *self = Self::failed(message, code);
    }

    /// Returns the snapshot to idle.
    pub fn reset(&mut self) {
        *self = Self::idle();
    }

    /// Returns which of the four states this snapshot is in.
    pub fn phase(&self) -> StatusPhase {
        if self.loading {
            StatusPhase::Loading
        } else if self.success {
            StatusPhase::Success
        } else if self.error {
            StatusPhase::Error
        } else {
            StatusPhase::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == StatusPhase::Idle
    }
}

// ---------------------------------------------------------------------------
// StatusPath
// ---------------------------------------------------------------------------

/// Where a status snapshot lives inside a [`StatusHost`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StatusPath {
    /// The status of a whole scope entry (e.g. "transactions for alice").
    Scope(ScopeKey),
    /// The status of one resource inside a scope (e.g. "alice's balance on
    /// `wrap.near`").
    Resource { scope: ScopeKey, resource: String },
}

impl StatusPath {
    /// The scope this path points into.
    pub fn scope(&self) -> &ScopeKey {
        match self {
            StatusPath::Scope(scope) => scope,
            StatusPath::Resource { scope, .. } => scope,
        }
    }
}

impl fmt::Display for StatusPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusPath::Scope(scope) => write!(f, "{}", scope),
            StatusPath::Resource { scope, resource } => write!(f, "{}/{}", scope, resource),
        }
    }
}
