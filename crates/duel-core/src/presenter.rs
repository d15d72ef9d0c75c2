//! Phase presenter.
//!
//! Maps a game phase to its declared command set and applies it to the
//! registry. A transition always deactivates every active command before
//! activating the new set, so nothing bound in the previous phase survives
//! into the next one unless the new phase declares it again. Re-declared
//! commands are rebound from scratch with the handlers supplied for the
//! new phase.

use std::collections::{BTreeMap, BTreeSet};

use duel_types::{CommandId, PhaseDescriptor, PhaseName};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ControlError;
use crate::handler::HandlerMap;
use crate::registry::CommandRegistry;

/// Summary of one applied phase transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTransition {
    /// The phase that is now current.
    pub phase: PhaseName,
    /// The phase that was current before, if any.
    pub previous: Option<PhaseName>,
    /// Commands active now that were not active before.
    pub added: BTreeSet<CommandId>,
    /// Commands active before that are not active now.
    pub removed: BTreeSet<CommandId>,
    /// Commands active in both phases (rebound).
    pub retained: BTreeSet<CommandId>,
    /// Declared commands that had no handler and are shown disabled.
    pub display_only: BTreeSet<CommandId>,
}

/// Applies phase declarations to a [`CommandRegistry`].
pub struct PhasePresenter {
    registry: CommandRegistry,
    phases: BTreeMap<PhaseName, PhaseDescriptor>,
    current: Option<PhaseName>,
}

impl PhasePresenter {
    /// Create a presenter over the given phase declarations.
    ///
    /// A later declaration with the same name replaces an earlier one.
    pub fn new(registry: CommandRegistry, phases: impl IntoIterator<Item = PhaseDescriptor>) -> Self {
        let phases = phases
            .into_iter()
            .map(|phase| (phase.name.clone(), phase))
            .collect();
        Self {
            registry,
            phases,
            current: None,
        }
    }

    /// Make `phase` current.
    ///
    /// Deactivates every active command, then activates each command the
    /// phase declares with its handler from `handlers`. A declared command
    /// without a handler is shown but disabled. Commands the registry does
    /// not know are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownPhase`] (after logging it) if the
    /// phase has no declaration. The registry is left untouched.
    pub fn activate_phase(
        &mut self,
        phase: &PhaseName,
        handlers: &HandlerMap,
    ) -> Result<PhaseTransition, ControlError> {
        let Some(descriptor) = self.phases.get(phase) else {
            warn!(phase = %phase, "Cannot activate undeclared phase");
            return Err(ControlError::UnknownPhase {
                phase: phase.clone(),
            });
        };

        let before: BTreeSet<CommandId> = self.registry.deactivate_all().into_iter().collect();

        let mut after = BTreeSet::new();
        let mut display_only = BTreeSet::new();
        for declared in &descriptor.commands {
            let handler = handlers.get(&declared.id);
            let has_handler = handler.is_some();
            if self
                .registry
                .activate(&declared.id, handler, &declared.options)
                .is_err()
            {
                // Already logged by the registry.
                continue;
            }
            if !has_handler {
                debug!(phase = %phase, command = %declared.id, "No handler, showing disabled");
                display_only.insert(declared.id.clone());
            }
            after.insert(declared.id.clone());
        }

        let transition = PhaseTransition {
            phase: phase.clone(),
            previous: self.current.replace(phase.clone()),
            added: after.difference(&before).cloned().collect(),
            removed: before.difference(&after).cloned().collect(),
            retained: after.intersection(&before).cloned().collect(),
            display_only,
        };

        info!(
            phase = %phase,
            previous = ?transition.previous.as_ref().map(PhaseName::as_str),
            active = after.len(),
            added = transition.added.len(),
            removed = transition.removed.len(),
            "Phase activated"
        );

        Ok(transition)
    }

    /// The most recently activated phase.
    pub const fn current_phase(&self) -> Option<&PhaseName> {
        self.current.as_ref()
    }

    /// Command ids `phase` declares, in display order.
    pub fn declared_commands(&self, phase: &PhaseName) -> Option<Vec<CommandId>> {
        self.phases
            .get(phase)
            .map(|d| d.commands.iter().map(|c| c.id.clone()).collect())
    }

    /// Names of all declared phases.
    pub fn phase_names(&self) -> impl Iterator<Item = &PhaseName> {
        self.phases.keys()
    }

    /// The registry this presenter drives.
    pub const fn registry(&self) -> &CommandRegistry {
        &self.registry
    }
}
