//! Enumeration types shared across the client crates.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Board geometry
// ---------------------------------------------------------------------------

/// Which side of the table a card belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Owner {
    /// The local human player.
    Player,
    /// The computer opponent.
    Cpu,
}

impl Owner {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Cpu => "cpu",
        }
    }
}

/// An ownership group on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Zone {
    /// The single active slot facing the opponent.
    Active,
    /// The bench row behind the active slot.
    Bench,
    /// The face-down prize pile.
    Prize,
}

impl Zone {
    /// Stable lowercase name used in divergence subtypes and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Bench => "bench",
            Self::Prize => "prize",
        }
    }
}

/// A scalar attribute that both the logical model and the rendering
/// projection carry for a card and that can be compared directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Attribute {
    /// Damage counters placed on the card.
    Damage,
    /// Number of energy cards attached.
    AttachedEnergy,
    /// Printed hit points.
    MaxHp,
}

impl Attribute {
    /// Stable lowercase name used in divergence subtypes and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Damage => "damage",
            Self::AttachedEnergy => "attached_energy",
            Self::MaxHp => "max_hp",
        }
    }
}

// ---------------------------------------------------------------------------
// Divergences
// ---------------------------------------------------------------------------

/// Category of a divergence between the logical model and the rendering
/// projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum DivergenceCategory {
    /// An entity exists in the model but nothing renders it.
    MissingInRender,
    /// A rendered node refers to an entity the model does not know.
    MissingInModel,
    /// A comparable scalar attribute differs between the two sides.
    AttributeMismatch,
    /// The same entity id is materialized more than once in the projection.
    DuplicateId,
    /// A rendered node is not attached to any parent slot.
    DetachedNode,
    /// The projection holds far more objects than the model has entities.
    ResourceAnomaly,
    /// A collaborator could not be queried during the pass.
    AuditorUnavailable,
}

impl DivergenceCategory {
    /// Every category, in report order.
    pub const ALL: [Self; 7] = [
        Self::MissingInRender,
        Self::MissingInModel,
        Self::AttributeMismatch,
        Self::DuplicateId,
        Self::DetachedNode,
        Self::ResourceAnomaly,
        Self::AuditorUnavailable,
    ];

    /// The kebab-case name, identical to the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingInRender => "missing-in-render",
            Self::MissingInModel => "missing-in-model",
            Self::AttributeMismatch => "attribute-mismatch",
            Self::DuplicateId => "duplicate-id",
            Self::DetachedNode => "detached-node",
            Self::ResourceAnomaly => "resource-anomaly",
            Self::AuditorUnavailable => "auditor-unavailable",
        }
    }

    /// Parse a kebab-case category name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl core::fmt::Display for DivergenceCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Card definitions
// ---------------------------------------------------------------------------

/// Broad kind of a card definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CardKind {
    /// A creature that occupies the active slot or the bench.
    Creature,
    /// An energy card attached to creatures.
    Energy,
    /// A one-shot trainer card.
    Trainer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_match_serde() {
        for category in DivergenceCategory::ALL {
            let json = serde_json::to_string(&category).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn category_parse_roundtrips_names() {
        assert_eq!(
            DivergenceCategory::parse("missing-in-render"),
            Some(DivergenceCategory::MissingInRender)
        );
        assert_eq!(DivergenceCategory::parse("bogus"), None);
    }
}
