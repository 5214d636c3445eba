//! Error types for Tierflow operations.
//!
//! The layout pipeline recovers from structural and numeric anomalies on its
//! own; [`LayoutError`] covers the conditions a caller can observe.

use std::time::Duration;

use thiserror::Error;

/// The main error type for Tierflow operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// The graph has nothing to lay out.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// The graph contains a directed cycle.
    #[error("Cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// A coordinate conversion kept producing unusable values.
    #[error("Coordinate transform failed after {attempts} attempt(s): {reason}")]
    TransformFailed { attempts: usize, reason: String },

    /// A required collaborator is missing.
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// An endpoint mutation was attempted while a layout holds the refresh lock.
    #[error("Preview refresh is locked ({reason}, held for {held_for:?})")]
    RefreshLocked { reason: String, held_for: Duration },
}

impl LayoutError {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyInput(_) => "empty_input",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::TransformFailed { .. } => "transform_failed",
            Self::CollaboratorUnavailable(_) => "collaborator_unavailable",
            Self::RefreshLocked { .. } => "refresh_locked",
        }
    }
}
