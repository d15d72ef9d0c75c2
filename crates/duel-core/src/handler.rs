//! Command handler seam.
//!
//! A [`CommandHandler`] is the externally supplied game-state mutator that
//! the dispatcher invokes for an accepted input event. Handlers are
//! asynchronous: the dispatcher holds the command in flight until the
//! returned future resolves, whatever the outcome.

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use duel_types::CommandId;
use futures::future::BoxFuture;
use futures::FutureExt as _;
use tokio::time::Instant;

/// Context handed to a handler for one accepted dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The command being executed.
    pub command: CommandId,
    /// The input timestamp that was accepted.
    pub invoked_at: Instant,
}

/// Failure reported by a handler, or a panic caught while running it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("{message}")]
    Failed {
        /// Handler-supplied description.
        message: String,
    },

    /// The handler panicked.
    #[error("handler panicked: {message}")]
    Panicked {
        /// The panic payload, when it was a string.
        message: String,
    },
}

impl HandlerError {
    /// Build a [`HandlerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Convert a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self::Panicked { message }
    }
}

/// Future returned by a handler.
pub type HandlerFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// An externally supplied command handler.
pub trait CommandHandler: Send + Sync {
    /// Start executing the command.
    fn handle(&self, invocation: Invocation) -> HandlerFuture;
}

/// Shared, type-erased handler reference stored in a binding.
pub type SharedHandler = Arc<dyn CommandHandler>;

/// Adapter that turns an async closure into a [`CommandHandler`].
pub struct FnHandler<F>(F);

impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn handle(&self, invocation: Invocation) -> HandlerFuture {
        (self.0)(invocation).boxed()
    }
}

/// Wrap an async closure as a [`SharedHandler`].
pub fn handler_fn<F, Fut>(f: F) -> SharedHandler
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Handlers keyed by command, supplied to the phase presenter.
#[derive(Clone, Default)]
pub struct HandlerMap {
    handlers: BTreeMap<CommandId, SharedHandler>,
}

impl HandlerMap {
    /// Create an empty map.
    pub const fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Add or replace the handler for `command`.
    pub fn insert(&mut self, command: impl Into<CommandId>, handler: SharedHandler) {
        self.handlers.insert(command.into(), handler);
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, command: impl Into<CommandId>, handler: SharedHandler) -> Self {
        self.insert(command, handler);
        self
    }

    /// Look up the handler for `command`.
    pub fn get(&self, command: &CommandId) -> Option<SharedHandler> {
        self.handlers.get(command).cloned()
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl core::fmt::Debug for HandlerMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
