//! Shared type definitions for the duel card-game client.
//!
//! This crate is the single source of truth for the types that cross crate
//! boundaries: the command controller, the consistency auditor, and the
//! card definition service all speak in these types. They flow downstream
//! to `TypeScript` via `ts-rs` for the rendering layer.
//!
//! # Modules
//!
//! - [`ids`] -- [`EntityId`] shared by model, projection and UI, plus
//!   configured [`CommandId`] and [`PhaseName`] names
//! - [`enums`] -- Board geometry, attributes, divergence categories
//! - [`structs`] -- Descriptors, board snapshots, divergence records, card
//!   definitions

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Attribute, CardKind, DivergenceCategory, Owner, Zone};
pub use ids::{CommandId, EntityId, PhaseName};
pub use structs::{
    AttackDefinition, CardDefinition, CommandDescriptor, DisplayOptions, DivergenceRecord,
    EntityRecord, PhaseCommand, PhaseDescriptor, RenderNode, SlotRef,
};

#[cfg(test)]
mod tests {
    //! Type export and `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes the bindings to `bindings/` relative to the crate
        // root when export_all runs.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::EntityId::export_all();
        let _ = crate::ids::CommandId::export_all();
        let _ = crate::ids::PhaseName::export_all();

        // Enums
        let _ = crate::enums::Owner::export_all();
        let _ = crate::enums::Zone::export_all();
        let _ = crate::enums::Attribute::export_all();
        let _ = crate::enums::DivergenceCategory::export_all();
        let _ = crate::enums::CardKind::export_all();

        // Structs
        let _ = crate::structs::DisplayOptions::export_all();
        let _ = crate::structs::CommandDescriptor::export_all();
        let _ = crate::structs::PhaseCommand::export_all();
        let _ = crate::structs::PhaseDescriptor::export_all();
        let _ = crate::structs::SlotRef::export_all();
        let _ = crate::structs::EntityRecord::export_all();
        let _ = crate::structs::RenderNode::export_all();
        let _ = crate::structs::DivergenceRecord::export_all();
        let _ = crate::structs::AttackDefinition::export_all();
        let _ = crate::structs::CardDefinition::export_all();
    }
}
