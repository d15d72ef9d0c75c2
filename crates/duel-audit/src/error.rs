//! Error types for the auditor's collaborators and the monitor.

use std::time::Duration;

/// A logical model or rendering projection could not be queried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator is not ready (no game loaded, scene torn down).
    #[error("not available: {reason}")]
    Unavailable {
        /// Why the snapshot could not be taken.
        reason: String,
    },
}

impl CollaboratorError {
    /// Build a [`CollaboratorError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Errors from the diagnostic monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The requested interval is shorter than the allowed minimum.
    #[error("monitor interval {interval:?} is below the {minimum:?} minimum")]
    IntervalTooShort {
        /// The requested interval.
        interval: Duration,
        /// The smallest accepted interval.
        minimum: Duration,
    },
}
