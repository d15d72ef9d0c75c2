//! Cross-model consistency auditing for the duel client.
//!
//! The client keeps two independently owned views of the game: the
//! authoritative logical model and the rendering projection derived from
//! it. This crate checks that they agree and reports every disagreement
//! as a structured [`DivergenceRecord`](duel_types::DivergenceRecord).
//!
//! # Modules
//!
//! - [`model`] -- [`LogicalModel`] and [`RenderProjection`] collaborator seams
//! - [`auditor`] -- [`ConsistencyAuditor`], the read-only comparator
//! - [`reporter`] -- [`compile`] and [`AuditReport`]
//! - [`monitor`] -- [`DiagnosticMonitor`] for on-demand and interval passes
//! - [`error`] -- [`CollaboratorError`] and [`MonitorError`]

pub mod auditor;
pub mod error;
pub mod model;
pub mod monitor;
pub mod reporter;

pub use auditor::ConsistencyAuditor;
pub use error::{CollaboratorError, MonitorError};
pub use model::{LogicalModel, RenderProjection};
pub use monitor::DiagnosticMonitor;
pub use reporter::{AuditReport, compile};
