//! Command registry and dispatcher.
//!
//! The [`CommandRegistry`] owns the fixed set of [`CommandDescriptor`]s and
//! the live binding table. A binding exists exactly while its command is
//! active and carries the guard state that makes dispatch safe under rapid
//! or duplicated input:
//!
//! - **Single flight**: at most one invocation per command runs at a time.
//!   Input arriving while the handler runs is dropped, never queued.
//! - **Debounce**: an invocation is accepted only if at least the debounce
//!   window has passed since the last accepted one.
//! - **Generations**: every activation gets a fresh generation number. A
//!   handler that completes after its binding was replaced or removed
//!   finds a different generation (or none) and its completion is ignored.
//!
//! # State machine
//!
//! ```text
//! INACTIVE --activate--> ACTIVE(IDLE) --dispatch--> ACTIVE(BUSY)
//!     ^                       ^                          |
//!     |                       +-------- completion ------+
//!     +------------------ deactivate (from any state)
//! ```
//!
//! The binding table sits behind a private mutex that is never held across
//! an await point, so the registry can be cloned into spawned tasks while
//! remaining its only writer.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use duel_types::{CommandDescriptor, CommandId, DisplayOptions};
use futures::FutureExt as _;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::error::{ControlError, DispatchError};
use crate::handler::{HandlerError, Invocation, SharedHandler};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a dispatch was dropped without invoking anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The command id has no descriptor.
    UnknownCommand,
    /// The command is not active in the current phase.
    Inactive,
    /// The command is shown but has no handler bound.
    DisplayOnly,
    /// A previous invocation has not completed yet.
    InFlight,
    /// The previous accepted invocation was too recent.
    Debounced,
}

/// Result of a single dispatch that did not escalate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran to completion.
    Completed,
    /// The handler failed; the control is idle again.
    Failed(HandlerError),
    /// The handler finished after its binding was replaced or removed.
    Superseded,
    /// The input was dropped.
    Rejected(Rejection),
}

impl DispatchOutcome {
    /// Whether the handler was invoked.
    pub const fn was_invoked(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Observable per-command state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// No binding.
    Inactive,
    /// Bound and ready for input.
    Idle,
    /// Bound with an invocation in flight.
    Busy,
}

// ---------------------------------------------------------------------------
// Binding table
// ---------------------------------------------------------------------------

/// Live association between an active command and its handler.
struct Binding {
    handler: Option<SharedHandler>,
    last_invocation: Option<Instant>,
    in_flight: bool,
    generation: u64,
    consecutive_failures: u32,
}

impl Binding {
    const fn new(handler: Option<SharedHandler>, generation: u64) -> Self {
        Self {
            handler,
            last_invocation: None,
            in_flight: false,
            generation,
            consecutive_failures: 0,
        }
    }
}

struct RegistryInner {
    /// Descriptors as configured; activation starts from these.
    defaults: BTreeMap<CommandId, CommandDescriptor>,
    /// Descriptors as currently displayed.
    descriptors: BTreeMap<CommandId, CommandDescriptor>,
    bindings: BTreeMap<CommandId, Binding>,
    next_generation: u64,
}

impl RegistryInner {
    const fn take_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        generation
    }
}

/// Held by an accepted dispatch while its handler runs.
///
/// If the dispatch future is dropped before the handler finishes (a
/// timeout, a losing `select!` branch) the flag is cleared here instead of
/// in `finish`.
struct PendingFlight<'a> {
    registry: &'a CommandRegistry,
    command: &'a CommandId,
    generation: u64,
    armed: bool,
}

impl Drop for PendingFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.registry.release(self.command, self.generation);
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owner of command descriptors and bindings; dispatches input to handlers.
///
/// Cloning is cheap and yields a handle to the same table.
#[derive(Clone)]
pub struct CommandRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    config: DispatchConfig,
}

impl CommandRegistry {
    /// Create a registry over a fixed descriptor set.
    ///
    /// Every descriptor starts inactive: hidden and disabled.
    pub fn new(
        descriptors: impl IntoIterator<Item = CommandDescriptor>,
        config: DispatchConfig,
    ) -> Self {
        let defaults: BTreeMap<CommandId, CommandDescriptor> = descriptors
            .into_iter()
            .map(|mut d| {
                d.enabled = false;
                d.visible = false;
                (d.id.clone(), d)
            })
            .collect();

        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                descriptors: defaults.clone(),
                defaults,
                bindings: BTreeMap::new(),
                next_generation: 0,
            })),
            config,
        }
    }

    /// The dispatcher guard settings.
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Activation
    // -----------------------------------------------------------------------

    /// Bind `handler` to `command` and show it.
    ///
    /// Any existing binding is replaced: its handler is detached and its
    /// in-flight guard dropped with it. A `None` handler installs a
    /// display-only binding that is visible but disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownCommand`] (after logging it) if the
    /// command has no descriptor; nothing changes in that case.
    pub fn activate(
        &self,
        command: &CommandId,
        handler: Option<SharedHandler>,
        options: &DisplayOptions,
    ) -> Result<(), ControlError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let Some(base) = inner.defaults.get(command) else {
            warn!(command = %command, "Cannot activate unknown command");
            return Err(ControlError::UnknownCommand {
                command: command.clone(),
            });
        };

        let mut descriptor = base.clone();
        descriptor.apply(options);
        descriptor.visible = true;
        descriptor.enabled = handler.is_some();
        let display_only = handler.is_none();
        inner.descriptors.insert(command.clone(), descriptor);

        let generation = inner.take_generation();
        let replaced = inner
            .bindings
            .insert(command.clone(), Binding::new(handler, generation));

        if let Some(old) = replaced {
            debug!(
                command = %command,
                old_generation = old.generation,
                was_in_flight = old.in_flight,
                "Replaced existing binding"
            );
        }
        debug!(command = %command, generation, display_only, "Command activated");

        Ok(())
    }

    /// Remove the binding for `command` and hide it.
    ///
    /// Clears the in-flight guard and debounce state unconditionally; an
    /// outstanding handler that completes later is ignored. Deactivating
    /// an inactive command does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownCommand`] (after logging it) if the
    /// command has no descriptor.
    pub fn deactivate(&self, command: &CommandId) -> Result<(), ControlError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let Some(descriptor) = inner.descriptors.get_mut(command) else {
            warn!(command = %command, "Cannot deactivate unknown command");
            return Err(ControlError::UnknownCommand {
                command: command.clone(),
            });
        };
        descriptor.enabled = false;
        descriptor.visible = false;

        match inner.bindings.remove(command) {
            Some(old) => debug!(
                command = %command,
                generation = old.generation,
                was_in_flight = old.in_flight,
                "Command deactivated"
            ),
            None => debug!(command = %command, "Command already inactive"),
        }

        Ok(())
    }

    /// Deactivate every active command, returning the ids that were active.
    pub fn deactivate_all(&self) -> Vec<CommandId> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let removed: Vec<CommandId> = std::mem::take(&mut inner.bindings).into_keys().collect();
        for command in &removed {
            if let Some(descriptor) = inner.descriptors.get_mut(command) {
                descriptor.enabled = false;
                descriptor.visible = false;
            }
        }
        if !removed.is_empty() {
            debug!(count = removed.len(), "All commands deactivated");
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Handle one discrete input event for `command` at time `now`.
    ///
    /// Rejected input returns `Ok(DispatchOutcome::Rejected(_))` and is only
    /// debug-logged. Accepted input marks the command busy, awaits the
    /// handler, and returns the command to idle whatever the handler did,
    /// including panicking.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RepeatedFailure`] once the handler has
    /// failed `failure_escalation_threshold` times in a row. The command is
    /// idle again by then.
    pub async fn dispatch(
        &self,
        command: &CommandId,
        now: Instant,
    ) -> Result<DispatchOutcome, DispatchError> {
        let (handler, generation) = match self.begin(command, now) {
            Ok(accepted) => accepted,
            Err(rejection) => {
                if rejection == Rejection::UnknownCommand {
                    warn!(command = %command, "Dispatch for unknown command");
                } else {
                    debug!(command = %command, ?rejection, "Dispatch rejected");
                }
                return Ok(DispatchOutcome::Rejected(rejection));
            }
        };

        debug!(command = %command, generation, "Dispatch accepted");
        let mut pending = PendingFlight {
            registry: self,
            command,
            generation,
            armed: true,
        };

        let invocation = Invocation {
            command: command.clone(),
            invoked_at: now,
        };
        let run = async move { handler.handle(invocation).await };
        let result = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(HandlerError::from_panic(payload.as_ref())),
        };

        pending.armed = false;
        self.finish(command, generation, result)
    }

    /// [`dispatch`](Self::dispatch) stamped with the current time.
    pub async fn dispatch_now(&self, command: &CommandId) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch(command, Instant::now()).await
    }

    /// Check the guards and, if they pass, mark the command busy.
    fn begin(&self, command: &CommandId, now: Instant) -> Result<(SharedHandler, u64), Rejection> {
        let window = self.config.debounce_window();
        let mut guard = self.lock();
        let inner = &mut *guard;

        if !inner.defaults.contains_key(command) {
            return Err(Rejection::UnknownCommand);
        }
        let Some(binding) = inner.bindings.get_mut(command) else {
            return Err(Rejection::Inactive);
        };
        let Some(handler) = binding.handler.clone() else {
            return Err(Rejection::DisplayOnly);
        };
        if binding.in_flight {
            return Err(Rejection::InFlight);
        }
        // A timestamp older than the last accepted one measures as zero
        // elapsed, so the recorded time never moves backwards.
        if let Some(last) = binding.last_invocation
            && now.saturating_duration_since(last) < window
        {
            return Err(Rejection::Debounced);
        }

        binding.in_flight = true;
        binding.last_invocation = Some(now);
        Ok((handler, binding.generation))
    }

    /// Clear the in-flight flag of a dispatch that was dropped mid-handler.
    fn release(&self, command: &CommandId, generation: u64) {
        let mut guard = self.lock();
        if let Some(binding) = guard
            .bindings
            .get_mut(command)
            .filter(|b| b.generation == generation)
        {
            binding.in_flight = false;
            debug!(command = %command, generation, "Dispatch cancelled before completion");
        }
    }

    /// Return the command to idle if its binding is still the one that ran.
    fn finish(
        &self,
        command: &CommandId,
        generation: u64,
        result: Result<(), HandlerError>,
    ) -> Result<DispatchOutcome, DispatchError> {
        if let Err(error) = &result {
            warn!(command = %command, error = %error, "Command handler failed");
        }

        let threshold = self.config.failure_escalation_threshold;
        let mut guard = self.lock();
        let Some(binding) = guard
            .bindings
            .get_mut(command)
            .filter(|b| b.generation == generation)
        else {
            debug!(command = %command, generation, "Ignoring completion of a detached binding");
            return Ok(DispatchOutcome::Superseded);
        };

        binding.in_flight = false;
        match result {
            Ok(()) => {
                binding.consecutive_failures = 0;
                Ok(DispatchOutcome::Completed)
            }
            Err(error) => {
                binding.consecutive_failures = binding.consecutive_failures.saturating_add(1);
                let failures = binding.consecutive_failures;
                if threshold > 0 && failures >= threshold {
                    info!(command = %command, failures, "Escalating repeated handler failure");
                    Err(DispatchError::RepeatedFailure {
                        command: command.clone(),
                        failures,
                        source: error,
                    })
                } else {
                    Ok(DispatchOutcome::Failed(error))
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether `command` has a descriptor.
    pub fn is_known(&self, command: &CommandId) -> bool {
        self.lock().defaults.contains_key(command)
    }

    /// Current descriptor for `command`.
    pub fn descriptor(&self, command: &CommandId) -> Option<CommandDescriptor> {
        self.lock().descriptors.get(command).cloned()
    }

    /// All descriptors in id order.
    pub fn descriptors(&self) -> Vec<CommandDescriptor> {
        self.lock().descriptors.values().cloned().collect()
    }

    /// Ids of every command with a binding.
    pub fn active_commands(&self) -> BTreeSet<CommandId> {
        self.lock().bindings.keys().cloned().collect()
    }

    /// Whether `command` has a binding.
    pub fn is_active(&self, command: &CommandId) -> bool {
        self.lock().bindings.contains_key(command)
    }

    /// Whether `command` has an invocation in flight.
    pub fn is_in_flight(&self, command: &CommandId) -> bool {
        self.lock()
            .bindings
            .get(command)
            .is_some_and(|b| b.in_flight)
    }

    /// Observable state of `command`.
    pub fn state(&self, command: &CommandId) -> CommandState {
        match self.lock().bindings.get(command) {
            None => CommandState::Inactive,
            Some(b) if b.in_flight => CommandState::Busy,
            Some(_) => CommandState::Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
