//! Action dispatch controller for the duel client.
//!
//! This crate decides which user actions are live at any moment and makes
//! sure each accepted action reaches its handler exactly once, no matter
//! how fast or how often the player clicks.
//!
//! # Architecture
//!
//! - [`registry`] -- [`CommandRegistry`]: descriptors, bindings, and the
//!   guarded dispatcher (single flight, debounce, stale-completion guard)
//! - [`presenter`] -- [`PhasePresenter`]: applies a phase's declared command
//!   set to the registry
//! - [`handler`] -- [`CommandHandler`] seam for externally supplied game
//!   mutators
//! - [`config`] -- `duel-config.yaml` loading and validation
//! - [`error`] -- [`ControlError`] and [`DispatchError`]

pub mod config;
pub mod error;
pub mod handler;
pub mod presenter;
pub mod registry;

pub use config::{ClientConfig, ConfigError};
pub use error::{ControlError, DispatchError};
pub use handler::{
    CommandHandler, HandlerError, HandlerFuture, HandlerMap, Invocation, SharedHandler, handler_fn,
};
pub use presenter::{PhasePresenter, PhaseTransition};
pub use registry::{CommandRegistry, CommandState, DispatchOutcome, Rejection};

/// Build a registry and presenter from a loaded configuration.
pub fn build_controller(config: &ClientConfig) -> PhasePresenter {
    let registry = CommandRegistry::new(config.commands.iter().cloned(), config.dispatch);
    PhasePresenter::new(registry, config.phases.iter().cloned())
}
