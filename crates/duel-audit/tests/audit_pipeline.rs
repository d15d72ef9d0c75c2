//! Audit passes over a board that changes between passes.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use duel_audit::{
    CollaboratorError, ConsistencyAuditor, DiagnosticMonitor, LogicalModel, RenderProjection,
};
use duel_core::config::AuditConfig;
use duel_types::{
    Attribute, DivergenceCategory, EntityId, EntityRecord, Owner, PhaseName, RenderNode, SlotRef,
    Zone,
};

#[derive(Default)]
struct Table {
    phase: String,
    entities: Vec<EntityRecord>,
    nodes: Vec<RenderNode>,
}

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Table>>);

impl LogicalModel for Shared {
    fn phase(&self) -> Result<PhaseName, CollaboratorError> {
        Ok(PhaseName::from(self.0.lock().unwrap().phase.clone()))
    }

    fn entities(&self) -> Result<Vec<EntityRecord>, CollaboratorError> {
        Ok(self.0.lock().unwrap().entities.clone())
    }
}

impl RenderProjection for Shared {
    fn nodes(&self) -> Result<Vec<RenderNode>, CollaboratorError> {
        Ok(self.0.lock().unwrap().nodes.clone())
    }
}

fn active(owner: Owner) -> SlotRef {
    SlotRef {
        owner,
        zone: Zone::Active,
        index: 0,
    }
}

fn setup_table(shared: &Shared) -> (EntityId, EntityId) {
    let mine = EntityRecord {
        id: EntityId::new(),
        card_id: "pikachu".to_owned(),
        slot: active(Owner::Player),
        attributes: BTreeMap::from([(Attribute::Damage, 0), (Attribute::AttachedEnergy, 1)]),
    };
    let theirs = EntityRecord {
        id: EntityId::new(),
        card_id: "machop".to_owned(),
        slot: active(Owner::Cpu),
        attributes: BTreeMap::from([(Attribute::Damage, 0)]),
    };
    let ids = (mine.id, theirs.id);

    let mut table = shared.0.lock().unwrap();
    table.phase = "setup".to_owned();
    table.entities = vec![mine, theirs];
    (ids.0, ids.1)
}

fn render_all(shared: &Shared) {
    let mut table = shared.0.lock().unwrap();
    table.nodes = table
        .entities
        .iter()
        .map(|e| RenderNode {
            entity_id: e.id,
            parent: Some(e.slot),
            annotations: e.attributes.clone(),
        })
        .collect();
}

fn monitor_for(shared: &Shared) -> DiagnosticMonitor {
    DiagnosticMonitor::new(
        ConsistencyAuditor::new(AuditConfig::default()),
        Arc::new(shared.clone()),
        Arc::new(shared.clone()),
    )
}

#[tokio::test]
async fn unrendered_cards_are_tolerated_only_during_setup() {
    let shared = Shared::default();
    setup_table(&shared);
    let monitor = monitor_for(&shared);

    assert!(monitor.run_once().await.is_clean());

    shared.0.lock().unwrap().phase = "player-main".to_owned();
    let report = monitor.run_once().await;
    assert_eq!(report.count(DivergenceCategory::MissingInRender), 2);
    assert_eq!(report.total_count(), 2);

    render_all(&shared);
    assert!(monitor.run_once().await.is_clean());
}

#[tokio::test]
async fn damage_lag_is_reported_until_render_catches_up() {
    let shared = Shared::default();
    let (_, theirs) = setup_table(&shared);
    render_all(&shared);
    shared.0.lock().unwrap().phase = "player-main".to_owned();
    let monitor = monitor_for(&shared);

    {
        let mut table = shared.0.lock().unwrap();
        let target = table.entities.iter_mut().find(|e| e.id == theirs).unwrap();
        target.attributes.insert(Attribute::Damage, 30);
    }

    let report = monitor.run_once().await;
    assert_eq!(report.total_count(), 1);
    let finding = &report.divergences()[0];
    assert_eq!(finding.category(), DivergenceCategory::AttributeMismatch);
    assert_eq!(finding.subject_id(), Some(theirs));
    assert_eq!(finding.subtype(), "damage");

    render_all(&shared);
    assert!(monitor.run_once().await.is_clean());
}

#[tokio::test]
async fn knocked_out_card_left_on_screen() {
    let shared = Shared::default();
    let (_, theirs) = setup_table(&shared);
    render_all(&shared);
    {
        let mut table = shared.0.lock().unwrap();
        table.phase = "prize-selection".to_owned();
        table.entities.retain(|e| e.id != theirs);
    }

    let report = monitor_for(&shared).run_once().await;
    assert_eq!(report.count(DivergenceCategory::MissingInModel), 1);
    assert_eq!(report.divergences()[0].subject_id(), Some(theirs));
    assert_eq!(
        report.counts_by_category().values().sum::<usize>(),
        report.total_count()
    );
}
