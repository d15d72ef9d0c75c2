//! Error types for the command controller.
//!
//! Two families exist. [`ControlError`] covers configuration mistakes
//! (unknown command or phase); those are logged and the operation becomes
//! a no-op. [`DispatchError`] is the only error a dispatch ever returns,
//! and only once a handler keeps failing.

use duel_types::{CommandId, PhaseName};

use crate::handler::HandlerError;

/// A command or phase id that the controller was not configured with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// The command id has no descriptor.
    #[error("unknown command `{command}`")]
    UnknownCommand {
        /// The offending id.
        command: CommandId,
    },

    /// The phase name has no declaration.
    #[error("unknown phase `{phase}`")]
    UnknownPhase {
        /// The offending name.
        phase: PhaseName,
    },
}

/// Caller-visible dispatch failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The handler failed on this and the preceding consecutive attempts.
    #[error("command `{command}` failed {failures} times in a row: {source}")]
    RepeatedFailure {
        /// The failing command.
        command: CommandId,
        /// Consecutive failures so far.
        failures: u32,
        /// The latest failure.
        source: HandlerError,
    },
}
