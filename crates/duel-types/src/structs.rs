//! Core structs shared by the controller, the auditor, and the card service.
//!
//! Covers command and phase descriptors, the entity and node snapshots the
//! auditor compares, divergence records, and persisted card definitions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Attribute, CardKind, DivergenceCategory, Owner, Zone};
use crate::ids::{CommandId, EntityId, PhaseName};

// ---------------------------------------------------------------------------
// Commands and phases
// ---------------------------------------------------------------------------

/// Optional display overrides applied when a command is activated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DisplayOptions {
    /// Replacement label for the affordance.
    #[serde(default)]
    pub label: Option<String>,
    /// Replacement icon name for the affordance.
    #[serde(default)]
    pub icon: Option<String>,
}

impl DisplayOptions {
    /// Options that only override the label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            icon: None,
        }
    }
}

/// A registry entry representing one dispatchable user action.
///
/// The set of descriptors is fixed when the controller starts. Only the
/// registry flips `enabled` and `visible`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CommandDescriptor {
    /// Stable command identifier.
    pub id: CommandId,
    /// Label shown on the affordance.
    #[serde(alias = "label")]
    pub display_label: String,
    /// Icon name shown on the affordance.
    #[serde(default)]
    pub icon: Option<String>,
    /// Whether the affordance accepts input.
    #[serde(default)]
    pub enabled: bool,
    /// Whether the affordance is shown at all.
    #[serde(default)]
    pub visible: bool,
}

impl CommandDescriptor {
    /// Create a hidden, disabled descriptor.
    pub fn new(id: impl Into<CommandId>, display_label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_label: display_label.into(),
            icon: None,
            enabled: false,
            visible: false,
        }
    }

    /// Set the icon.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Apply display overrides. Absent fields keep their current value.
    pub fn apply(&mut self, options: &DisplayOptions) {
        if let Some(label) = &options.label {
            self.display_label.clone_from(label);
        }
        if let Some(icon) = &options.icon {
            self.icon = Some(icon.clone());
        }
    }
}

/// One command declared by a phase, with its display overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PhaseCommand {
    /// The command to activate.
    pub id: CommandId,
    /// Display overrides for this phase.
    #[serde(default)]
    pub options: DisplayOptions,
}

impl PhaseCommand {
    /// Declare a command with no display overrides.
    pub fn new(id: impl Into<CommandId>) -> Self {
        Self {
            id: id.into(),
            options: DisplayOptions::default(),
        }
    }
}

/// Static declaration of the commands that are live during one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PhaseDescriptor {
    /// Phase name.
    pub name: PhaseName,
    /// Commands active during the phase, in display order.
    #[serde(default)]
    pub commands: Vec<PhaseCommand>,
}

impl PhaseDescriptor {
    /// Declare a phase from a list of command ids.
    pub fn new<I, C>(name: impl Into<PhaseName>, commands: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CommandId>,
    {
        Self {
            name: name.into(),
            commands: commands.into_iter().map(PhaseCommand::new).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Board snapshots
// ---------------------------------------------------------------------------

/// A slot on the board that a card occupies or a node hangs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SlotRef {
    /// Side of the table.
    pub owner: Owner,
    /// Ownership group.
    pub zone: Zone,
    /// Position within the group (always 0 for the active slot).
    pub index: u8,
}

/// An id-bearing card instance as the logical model sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EntityRecord {
    /// Instance identifier shared with the projection.
    pub id: EntityId,
    /// Card definition this instance was created from.
    pub card_id: String,
    /// Where the card sits.
    pub slot: SlotRef,
    /// Comparable scalar attributes.
    #[serde(default)]
    pub attributes: BTreeMap<Attribute, i32>,
}

/// A materialized node in the rendering projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RenderNode {
    /// The entity this node draws.
    pub entity_id: EntityId,
    /// The slot the node is attached under, if any.
    pub parent: Option<SlotRef>,
    /// Numeric annotations the renderer tracks for the card.
    #[serde(default)]
    pub annotations: BTreeMap<Attribute, i32>,
}

// ---------------------------------------------------------------------------
// Divergences
// ---------------------------------------------------------------------------

/// A detected mismatch between the logical model and its rendered
/// projection.
///
/// Fields are private: a record never changes after the auditor creates
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DivergenceRecord {
    category: DivergenceCategory,
    subtype: String,
    subject_id: Option<EntityId>,
    message: String,
    detected_at: DateTime<Utc>,
}

impl DivergenceRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        category: DivergenceCategory,
        subtype: impl Into<String>,
        subject_id: Option<EntityId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            subtype: subtype.into(),
            subject_id,
            message: message.into(),
            detected_at: Utc::now(),
        }
    }

    /// The divergence category.
    pub const fn category(&self) -> DivergenceCategory {
        self.category
    }

    /// Category-specific refinement (zone, attribute, collaborator name).
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// The entity the finding is about, when there is one.
    pub const fn subject_id(&self) -> Option<EntityId> {
        self.subject_id
    }

    /// Human-readable description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// When the finding was made.
    pub const fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }
}

// ---------------------------------------------------------------------------
// Card definitions
// ---------------------------------------------------------------------------

/// An attack printed on a creature card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AttackDefinition {
    /// Attack name.
    pub name: String,
    /// Energy types required, one entry per energy.
    #[serde(default)]
    pub cost: Vec<String>,
    /// Base damage.
    #[serde(default)]
    pub damage: u32,
    /// Rules text.
    #[serde(default)]
    pub text: Option<String>,
}

/// A persisted card definition served by the card service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CardDefinition {
    /// Unique definition id (e.g. `pikachu-base-58`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Broad card kind.
    pub kind: CardKind,
    /// Printed hit points (creatures only).
    #[serde(default)]
    pub hp: Option<u32>,
    /// Elemental types.
    #[serde(default)]
    pub types: Vec<String>,
    /// Printed attacks.
    #[serde(default)]
    pub attacks: Vec<AttackDefinition>,
    /// Image file name relative to the asset directory.
    #[serde(default)]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_apply_keeps_absent_fields() {
        let mut descriptor = CommandDescriptor::new("attack", "Attack").with_icon("sword");
        descriptor.apply(&DisplayOptions::labeled("Thunder Shock"));
        assert_eq!(descriptor.display_label, "Thunder Shock");
        assert_eq!(descriptor.icon.as_deref(), Some("sword"));
    }

    #[test]
    fn descriptor_accepts_label_alias() {
        let json = r#"{"id":"retreat","label":"Retreat"}"#;
        let descriptor: Result<CommandDescriptor, _> = serde_json::from_str(json);
        assert!(descriptor.is_ok());
        let descriptor = descriptor.ok();
        assert_eq!(
            descriptor.as_ref().map(|d| d.display_label.as_str()),
            Some("Retreat")
        );
        assert_eq!(descriptor.map(|d| d.enabled), Some(false));
    }

    #[test]
    fn divergence_serializes_category_kebab_case() {
        let record = DivergenceRecord::new(
            DivergenceCategory::MissingInRender,
            "bench",
            Some(EntityId::new()),
            "card missing",
        );
        let json = serde_json::to_value(&record).unwrap_or_default();
        assert_eq!(json["category"], "missing-in-render");
        assert_eq!(json["subtype"], "bench");
    }
}
