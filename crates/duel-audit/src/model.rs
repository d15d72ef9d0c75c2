//! Collaborator seams the auditor reads from.
//!
//! Both sides are owned elsewhere. The auditor only ever takes snapshots
//! through these traits and never holds on to them between passes.

use duel_types::{EntityRecord, PhaseName, RenderNode};

use crate::error::CollaboratorError;

/// The authoritative game state.
pub trait LogicalModel: Send + Sync {
    /// The current game phase.
    ///
    /// # Errors
    ///
    /// Returns a [`CollaboratorError`] if the model cannot be read.
    fn phase(&self) -> Result<PhaseName, CollaboratorError>;

    /// Every id-bearing card across the active slots, benches and prize
    /// piles of both sides.
    ///
    /// # Errors
    ///
    /// Returns a [`CollaboratorError`] if the model cannot be read.
    fn entities(&self) -> Result<Vec<EntityRecord>, CollaboratorError>;
}

/// The rendering layer's view of the board.
pub trait RenderProjection: Send + Sync {
    /// Every materialized card node. The same entity may appear more than
    /// once when the renderer leaked a node.
    ///
    /// # Errors
    ///
    /// Returns a [`CollaboratorError`] if the scene cannot be read.
    fn nodes(&self) -> Result<Vec<RenderNode>, CollaboratorError>;

    /// Total number of live scene objects, card nodes included.
    ///
    /// Defaults to the number of card nodes.
    ///
    /// # Errors
    ///
    /// Returns a [`CollaboratorError`] if the scene cannot be read.
    fn object_count(&self) -> Result<usize, CollaboratorError> {
        self.nodes().map(|nodes| nodes.len())
    }
}
