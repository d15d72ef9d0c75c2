//! Cross-model consistency auditor.
//!
//! Compares the authoritative [`LogicalModel`] with the derived
//! [`RenderProjection`] and reports every way they disagree. The auditor
//! never mutates either side and keeps nothing between passes, so running
//! it twice on the same snapshots gives the same findings.
//!
//! # Checks
//!
//! Cross-model (need both sides):
//!
//! - `missing-in-render` -- model entity with no render node (subtype: zone)
//! - `missing-in-model` -- render node with no model entity
//! - `attribute-mismatch` -- compared attribute differs (subtype: attribute)
//! - `detached-node` -- node hung under a different slot than the model
//!   assigns (subtype: `wrong-parent`), when the detached check is enabled
//!
//! Structural (projection only, each individually enabled):
//!
//! - `duplicate-id` -- an entity drawn more often than allowed
//! - `detached-node` -- nodes with no parent slot beyond the tolerance
//!   (subtype: `no-parent`)
//! - `resource-anomaly` -- scene object count out of proportion to the
//!   number of entities
//!
//! The two missing categories are suppressed while the model reports a
//! phase listed in `suppress_missing_in_phases`.
//!
//! A collaborator that cannot be read yields a single `auditor-unavailable`
//! finding naming it, ahead of all other findings. Checks that do not need
//! it still run.

use std::collections::{BTreeMap, BTreeSet};

use duel_core::config::AuditConfig;
use duel_types::{
    Attribute, DivergenceCategory, DivergenceRecord, EntityId, EntityRecord, PhaseName, RenderNode,
    SlotRef,
};
use tracing::debug;

use crate::error::CollaboratorError;
use crate::model::{LogicalModel, RenderProjection};

/// Subtype naming the logical model in `auditor-unavailable` findings.
pub const LOGICAL_MODEL: &str = "logical-model";

/// Subtype naming the rendering projection in `auditor-unavailable`
/// findings.
pub const RENDER_PROJECTION: &str = "render-projection";

/// Subtype of `detached-node` findings for a node hung under a slot other
/// than the one the model assigns.
pub const WRONG_PARENT: &str = "wrong-parent";

/// Stateless comparator between model and projection.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyAuditor {
    config: AuditConfig,
}

impl ConsistencyAuditor {
    /// Create an auditor with the given check settings.
    pub const fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    /// The check settings.
    pub const fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Run every check once and return the findings in report order.
    pub fn run_audit(
        &self,
        model: &dyn LogicalModel,
        projection: &dyn RenderProjection,
    ) -> Vec<DivergenceRecord> {
        let mut findings = Vec::new();

        let phase = model.phase();
        let entities = model.entities();
        if let Some(err) = phase.as_ref().err().or_else(|| entities.as_ref().err()) {
            findings.push(unavailable(LOGICAL_MODEL, err));
        }

        let nodes = projection.nodes();
        let object_count = projection.object_count();
        if let Some(err) = nodes.as_ref().err().or_else(|| object_count.as_ref().err()) {
            findings.push(unavailable(RENDER_PROJECTION, err));
        }

        if let (Ok(entities), Ok(nodes)) = (&entities, &nodes) {
            let suppress = phase.as_ref().is_ok_and(|p| self.is_suppressed(p));
            self.cross_check(entities, nodes, suppress, &mut findings);
        }

        if let Ok(nodes) = &nodes {
            if self.config.duplicates.enabled {
                self.check_duplicates(nodes, &mut findings);
            }
            if self.config.detached.enabled {
                self.check_detached(nodes, &mut findings);
            }
        }

        if self.config.resources.enabled
            && let (Ok(entities), Ok(objects)) = (&entities, &object_count)
        {
            self.check_resources(entities.len(), *objects, &mut findings);
        }

        debug!(findings = findings.len(), "Audit pass complete");
        findings
    }

    fn is_suppressed(&self, phase: &PhaseName) -> bool {
        self.config.suppress_missing_in_phases.contains(phase)
    }

    // -----------------------------------------------------------------------
    // Cross-model checks
    // -----------------------------------------------------------------------

    fn cross_check(
        &self,
        entities: &[EntityRecord],
        nodes: &[RenderNode],
        suppress_missing: bool,
        findings: &mut Vec<DivergenceRecord>,
    ) {
        let mut by_model: BTreeMap<EntityId, &EntityRecord> = BTreeMap::new();
        for record in entities {
            by_model.entry(record.id).or_insert(record);
        }
        // First node per id carries the annotations compared below.
        let mut by_render: BTreeMap<EntityId, &RenderNode> = BTreeMap::new();
        for node in nodes {
            by_render.entry(node.entity_id).or_insert(node);
        }

        if !suppress_missing {
            for (id, record) in &by_model {
                if !by_render.contains_key(id) {
                    findings.push(DivergenceRecord::new(
                        DivergenceCategory::MissingInRender,
                        record.slot.zone.as_str(),
                        Some(*id),
                        format!(
                            "card `{}` in {} {} slot {} has no render node",
                            record.card_id,
                            record.slot.owner.as_str(),
                            record.slot.zone.as_str(),
                            record.slot.index,
                        ),
                    ));
                }
            }
            for id in by_render.keys() {
                if !by_model.contains_key(id) {
                    findings.push(DivergenceRecord::new(
                        DivergenceCategory::MissingInModel,
                        "orphan-node",
                        Some(*id),
                        format!("render node for {id} has no model entity"),
                    ));
                }
            }
        }

        let compared: BTreeSet<Attribute> = self.config.compared_attributes.iter().copied().collect();
        for (id, record) in &by_model {
            let Some(node) = by_render.get(id) else {
                continue;
            };
            for attribute in &compared {
                let Some(&rendered) = node.annotations.get(attribute) else {
                    continue;
                };
                let expected = record.attributes.get(attribute).copied().unwrap_or(0);
                if rendered != expected {
                    findings.push(DivergenceRecord::new(
                        DivergenceCategory::AttributeMismatch,
                        attribute.as_str(),
                        Some(*id),
                        format!(
                            "card `{}` {}: model {expected}, render {rendered}",
                            record.card_id,
                            attribute.as_str(),
                        ),
                    ));
                }
            }

            if self.config.detached.enabled
                && let Some(parent) = node.parent
                && parent != record.slot
            {
                findings.push(DivergenceRecord::new(
                    DivergenceCategory::DetachedNode,
                    WRONG_PARENT,
                    Some(*id),
                    format!(
                        "card `{}` belongs in {} but is drawn under {}",
                        record.card_id,
                        slot_label(&record.slot),
                        slot_label(&parent),
                    ),
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Structural heuristics
    // -----------------------------------------------------------------------

    fn check_duplicates(&self, nodes: &[RenderNode], findings: &mut Vec<DivergenceRecord>) {
        let mut occurrences: BTreeMap<EntityId, u32> = BTreeMap::new();
        for node in nodes {
            let count = occurrences.entry(node.entity_id).or_insert(0);
            *count = count.saturating_add(1);
        }

        let allowed = self.config.duplicates.max_occurrences;
        for (id, count) in occurrences {
            if count > allowed {
                findings.push(DivergenceRecord::new(
                    DivergenceCategory::DuplicateId,
                    "duplicate-node",
                    Some(id),
                    format!("{id} is drawn {count} times (allowed {allowed})"),
                ));
            }
        }
    }

    fn check_detached(&self, nodes: &[RenderNode], findings: &mut Vec<DivergenceRecord>) {
        let detached: Vec<&RenderNode> = nodes.iter().filter(|n| n.parent.is_none()).collect();
        let tolerance = usize::try_from(self.config.detached.tolerance).unwrap_or(usize::MAX);
        if detached.len() <= tolerance {
            return;
        }

        for node in detached {
            findings.push(DivergenceRecord::new(
                DivergenceCategory::DetachedNode,
                "no-parent",
                Some(node.entity_id),
                format!("render node for {} is not attached to a slot", node.entity_id),
            ));
        }
    }

    fn check_resources(
        &self,
        entity_count: usize,
        object_count: usize,
        findings: &mut Vec<DivergenceRecord>,
    ) {
        let settings = &self.config.resources;
        let per_entity = usize::try_from(settings.max_objects_per_entity).unwrap_or(usize::MAX);
        let floor = usize::try_from(settings.min_objects).unwrap_or(usize::MAX);
        let limit = per_entity.saturating_mul(entity_count.max(1));

        if object_count > limit && object_count > floor {
            findings.push(DivergenceRecord::new(
                DivergenceCategory::ResourceAnomaly,
                "object-count",
                None,
                format!(
                    "scene holds {object_count} objects for {entity_count} entities (limit {limit})"
                ),
            ));
        }
    }
}

fn slot_label(slot: &SlotRef) -> String {
    format!(
        "{} {} slot {}",
        slot.owner.as_str(),
        slot.zone.as_str(),
        slot.index
    )
}

fn unavailable(collaborator: &str, err: &CollaboratorError) -> DivergenceRecord {
    DivergenceRecord::new(
        DivergenceCategory::AuditorUnavailable,
        collaborator,
        None,
        format!("{collaborator} could not be read: {err}"),
    )
}
