//! In-memory game board and its rendered scene.
//!
//! [`Board`] is the authoritative logical model: every card on the table
//! with its slot and counters. [`Scene`] is the renderer's copy, rebuilt
//! from the board after each animation. Between a board change and the
//! next [`Scene::render`] the two legitimately disagree, which is exactly
//! what the auditor watches for.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use duel_audit::{CollaboratorError, LogicalModel, RenderProjection};
use duel_types::{Attribute, EntityId, EntityRecord, Owner, PhaseName, RenderNode, SlotRef, Zone};

/// Largest bench a side may hold.
const BENCH_SIZE: u8 = 5;

/// Prize cards dealt to each side.
const PRIZE_COUNT: u8 = 3;

/// Non-card scene objects (mats, labels, backdrop).
const SCENE_DECORATIONS: usize = 12;

/// Card drawn onto the bench by the draw command.
const DRAWN_CARD: &str = "rattata-61";

/// A board operation that the rules do not allow right now.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// The side has no active card.
    #[error("{owner} has no active card")]
    NoActive {
        /// Side name.
        owner: &'static str,
    },
    /// The bench is full.
    #[error("{owner}'s bench is full")]
    BenchFull {
        /// Side name.
        owner: &'static str,
    },
    /// The bench is empty.
    #[error("{owner}'s bench is empty")]
    BenchEmpty {
        /// Side name.
        owner: &'static str,
    },
    /// The active card has no energy to spend.
    #[error("{card} has no energy attached")]
    NoEnergy {
        /// Card definition id.
        card: String,
    },
    /// The active card has no evolution.
    #[error("{card} cannot evolve")]
    CannotEvolve {
        /// Card definition id.
        card: String,
    },
    /// No prize cards are left.
    #[error("{owner} has no prizes left")]
    NoPrizes {
        /// Side name.
        owner: &'static str,
    },
}

#[derive(Debug)]
struct Table {
    phase: PhaseName,
    cards: Vec<EntityRecord>,
}

fn card(card_id: &str, owner: Owner, zone: Zone, index: u8, max_hp: i32) -> EntityRecord {
    let mut attributes = BTreeMap::from([(Attribute::Damage, 0), (Attribute::AttachedEnergy, 0)]);
    if max_hp > 0 {
        attributes.insert(Attribute::MaxHp, max_hp);
    }
    EntityRecord {
        id: EntityId::new(),
        card_id: card_id.to_owned(),
        slot: SlotRef { owner, zone, index },
        attributes,
    }
}

fn opening_layout() -> Vec<EntityRecord> {
    let mut cards = vec![
        card("pikachu-58", Owner::Player, Zone::Active, 0, 60),
        card("bulbasaur-44", Owner::Player, Zone::Bench, 0, 40),
        card("machop-52", Owner::Cpu, Zone::Active, 0, 50),
        card("geodude-47", Owner::Cpu, Zone::Bench, 0, 50),
    ];
    for owner in [Owner::Player, Owner::Cpu] {
        for index in 0..PRIZE_COUNT {
            cards.push(card("prize", owner, Zone::Prize, index, 0));
        }
    }
    cards
}

fn evolution(card_id: &str) -> Option<(&'static str, i32)> {
    match card_id {
        "pikachu-58" => Some(("raichu-14", 30)),
        "bulbasaur-44" => Some(("ivysaur-30", 20)),
        "machop-52" => Some(("machoke-34", 30)),
        _ => None,
    }
}

fn attr(record: &EntityRecord, attribute: Attribute) -> i32 {
    record.attributes.get(&attribute).copied().unwrap_or(0)
}

fn bump(record: &mut EntityRecord, attribute: Attribute, delta: i32) {
    let value = attr(record, attribute).saturating_add(delta).max(0);
    record.attributes.insert(attribute, value);
}

impl Table {
    fn active_mut(&mut self, owner: Owner) -> Result<&mut EntityRecord, BoardError> {
        self.cards
            .iter_mut()
            .find(|c| c.slot.owner == owner && c.slot.zone == Zone::Active)
            .ok_or(BoardError::NoActive {
                owner: owner.as_str(),
            })
    }

    fn zone_count(&self, owner: Owner, zone: Zone) -> usize {
        self.cards
            .iter()
            .filter(|c| c.slot.owner == owner && c.slot.zone == zone)
            .count()
    }

    /// Move bench slot 0 up to active and close the gap.
    fn promote(&mut self, owner: Owner) -> Result<(), BoardError> {
        let first = self
            .cards
            .iter()
            .position(|c| c.slot.owner == owner && c.slot.zone == Zone::Bench && c.slot.index == 0)
            .ok_or(BoardError::BenchEmpty {
                owner: owner.as_str(),
            })?;
        for c in &mut self.cards {
            if c.slot.owner == owner && c.slot.zone == Zone::Bench {
                c.slot.index = c.slot.index.saturating_sub(1);
            }
        }
        if let Some(promoted) = self.cards.get_mut(first) {
            promoted.slot.zone = Zone::Active;
            promoted.slot.index = 0;
        }
        Ok(())
    }
}

/// The authoritative logical model. Cloning shares the same table.
#[derive(Debug, Clone)]
pub struct Board {
    table: Arc<Mutex<Table>>,
}

impl Board {
    /// A freshly dealt board in the setup phase.
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                phase: PhaseName::from("setup"),
                cards: opening_layout(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the current phase.
    pub fn set_phase(&self, phase: PhaseName) {
        self.lock().phase = phase;
    }

    /// The current phase.
    pub fn current_phase(&self) -> PhaseName {
        self.lock().phase.clone()
    }

    /// Copy of every card on the table.
    pub fn snapshot(&self) -> Vec<EntityRecord> {
        self.lock().cards.clone()
    }

    /// Re-deal the opening layout with fresh ids.
    pub fn deal(&self) {
        self.lock().cards = opening_layout();
    }

    /// Put a drawn card on the next free bench slot.
    pub fn draw(&self, owner: Owner) -> Result<EntityId, BoardError> {
        let mut table = self.lock();
        let benched = table.zone_count(owner, Zone::Bench);
        let index = u8::try_from(benched)
            .ok()
            .filter(|i| *i < BENCH_SIZE)
            .ok_or(BoardError::BenchFull {
                owner: owner.as_str(),
            })?;
        let drawn = card(DRAWN_CARD, owner, Zone::Bench, index, 40);
        let id = drawn.id;
        table.cards.push(drawn);
        Ok(id)
    }

    /// Attach one energy to the active card.
    pub fn attach_energy(&self, owner: Owner) -> Result<(), BoardError> {
        let mut table = self.lock();
        bump(table.active_mut(owner)?, Attribute::AttachedEnergy, 1);
        Ok(())
    }

    /// Evolve the active card in place.
    pub fn evolve(&self, owner: Owner) -> Result<(), BoardError> {
        let mut table = self.lock();
        let active = table.active_mut(owner)?;
        let (next, extra_hp) = evolution(&active.card_id).ok_or_else(|| BoardError::CannotEvolve {
            card: active.card_id.clone(),
        })?;
        next.clone_into(&mut active.card_id);
        bump(active, Attribute::MaxHp, extra_hp);
        Ok(())
    }

    /// Remove up to `amount` damage from the active card.
    pub fn heal(&self, owner: Owner, amount: i32) -> Result<(), BoardError> {
        let mut table = self.lock();
        bump(table.active_mut(owner)?, Attribute::Damage, amount.saturating_neg());
        Ok(())
    }

    /// Swap the active card with bench slot 0, discarding one energy.
    pub fn retreat(&self, owner: Owner) -> Result<(), BoardError> {
        let mut table = self.lock();
        if table.zone_count(owner, Zone::Bench) == 0 {
            return Err(BoardError::BenchEmpty {
                owner: owner.as_str(),
            });
        }
        let active = table.active_mut(owner)?;
        if attr(active, Attribute::AttachedEnergy) < 1 {
            return Err(BoardError::NoEnergy {
                card: active.card_id.clone(),
            });
        }
        bump(active, Attribute::AttachedEnergy, -1);
        let active_id = active.id;

        table.promote(owner)?;
        let bench_len = table.zone_count(owner, Zone::Bench);
        if let Some(old) = table.cards.iter_mut().find(|c| c.id == active_id) {
            old.slot.zone = Zone::Bench;
            old.slot.index = u8::try_from(bench_len).unwrap_or(BENCH_SIZE);
        }
        Ok(())
    }

    /// Hit the defender's active card. Returns whether it was knocked out.
    ///
    /// A knocked-out card leaves the table and the defender's first bench
    /// card becomes active, if there is one.
    pub fn attack(&self, attacker: Owner, damage: i32) -> Result<bool, BoardError> {
        let defender = match attacker {
            Owner::Player => Owner::Cpu,
            Owner::Cpu => Owner::Player,
        };
        let mut table = self.lock();

        let striker = table.active_mut(attacker)?;
        if attr(striker, Attribute::AttachedEnergy) < 1 {
            return Err(BoardError::NoEnergy {
                card: striker.card_id.clone(),
            });
        }

        let target = table.active_mut(defender)?;
        bump(target, Attribute::Damage, damage);
        let knocked_out = attr(target, Attribute::Damage) >= attr(target, Attribute::MaxHp);
        if knocked_out {
            let gone = target.id;
            table.cards.retain(|c| c.id != gone);
            // An empty bench just leaves the slot empty.
            let _ = table.promote(defender);
        }
        Ok(knocked_out)
    }

    /// Take the highest remaining prize card.
    pub fn take_prize(&self, owner: Owner) -> Result<(), BoardError> {
        let mut table = self.lock();
        let last = table
            .cards
            .iter()
            .filter(|c| c.slot.owner == owner && c.slot.zone == Zone::Prize)
            .max_by_key(|c| c.slot.index)
            .map(|c| c.id)
            .ok_or(BoardError::NoPrizes {
                owner: owner.as_str(),
            })?;
        table.cards.retain(|c| c.id != last);
        Ok(())
    }

    /// One line per side: active card, bench size, prizes left.
    pub fn summary(&self) -> Vec<String> {
        let table = self.lock();
        [Owner::Player, Owner::Cpu]
            .into_iter()
            .map(|owner| {
                let active = table
                    .cards
                    .iter()
                    .find(|c| c.slot.owner == owner && c.slot.zone == Zone::Active)
                    .map_or_else(
                        || "(none)".to_owned(),
                        |c| {
                            format!(
                                "{} {}/{} hp, {} energy",
                                c.card_id,
                                attr(c, Attribute::MaxHp).saturating_sub(attr(c, Attribute::Damage)),
                                attr(c, Attribute::MaxHp),
                                attr(c, Attribute::AttachedEnergy),
                            )
                        },
                    );
                format!(
                    "{:<6} active: {active}; bench {}; prizes {}",
                    owner.as_str(),
                    table.zone_count(owner, Zone::Bench),
                    table.zone_count(owner, Zone::Prize),
                )
            })
            .collect()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalModel for Board {
    fn phase(&self) -> Result<PhaseName, CollaboratorError> {
        Ok(self.current_phase())
    }

    fn entities(&self) -> Result<Vec<EntityRecord>, CollaboratorError> {
        Ok(self.snapshot())
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SceneGraph {
    nodes: Vec<RenderNode>,
}

/// The renderer's view of the board. Cloning shares the same scene.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    graph: Arc<Mutex<SceneGraph>>,
}

impl Scene {
    /// An empty scene; nothing is drawn until the first [`render`](Self::render).
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SceneGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild every card node from the board.
    pub fn render(&self, board: &Board) {
        let nodes = board
            .snapshot()
            .into_iter()
            .map(|record| RenderNode {
                entity_id: record.id,
                parent: Some(record.slot),
                annotations: record.attributes,
            })
            .collect();
        self.lock().nodes = nodes;
    }

    /// Number of card nodes drawn.
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }
}

impl RenderProjection for Scene {
    fn nodes(&self) -> Result<Vec<RenderNode>, CollaboratorError> {
        Ok(self.lock().nodes.clone())
    }

    fn object_count(&self) -> Result<usize, CollaboratorError> {
        Ok(self.lock().nodes.len().saturating_add(SCENE_DECORATIONS))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use duel_audit::ConsistencyAuditor;
    use duel_core::config::AuditConfig;
    use duel_types::DivergenceRecord;

    use super::*;

    fn active(board: &Board, owner: Owner) -> EntityRecord {
        board
            .snapshot()
            .into_iter()
            .find(|c| c.slot.owner == owner && c.slot.zone == Zone::Active)
            .unwrap()
    }

    #[test]
    fn rendered_scene_matches_board() {
        let board = Board::new();
        let scene = Scene::new();
        board.set_phase(PhaseName::from("player-main"));
        scene.render(&board);

        let findings = ConsistencyAuditor::new(AuditConfig::default()).run_audit(&board, &scene);
        assert!(findings.is_empty());
        assert_eq!(scene.node_count(), board.snapshot().len());
    }

    #[test]
    fn attack_needs_energy() {
        let board = Board::new();
        assert!(matches!(
            board.attack(Owner::Player, 20),
            Err(BoardError::NoEnergy { .. })
        ));
        board.attach_energy(Owner::Player).unwrap();
        assert_eq!(board.attack(Owner::Player, 20), Ok(false));
        assert_eq!(attr(&active(&board, Owner::Cpu), Attribute::Damage), 20);
    }

    #[test]
    fn knockout_promotes_bench() {
        let board = Board::new();
        board.attach_energy(Owner::Player).unwrap();
        let bench_card = board
            .snapshot()
            .into_iter()
            .find(|c| c.slot.owner == Owner::Cpu && c.slot.zone == Zone::Bench)
            .unwrap();

        assert_eq!(board.attack(Owner::Player, 50), Ok(true));
        assert_eq!(active(&board, Owner::Cpu).id, bench_card.id);
    }

    #[test]
    fn retreat_swaps_and_spends_energy() {
        let board = Board::new();
        let starter = active(&board, Owner::Player);
        assert!(board.retreat(Owner::Player).is_err());

        board.attach_energy(Owner::Player).unwrap();
        board.retreat(Owner::Player).unwrap();

        let now_active = active(&board, Owner::Player);
        assert_eq!(now_active.card_id, "bulbasaur-44");
        let benched = board
            .snapshot()
            .into_iter()
            .find(|c| c.id == starter.id)
            .unwrap();
        assert_eq!(benched.slot.zone, Zone::Bench);
        assert_eq!(benched.slot.index, 0);
        assert_eq!(attr(&benched, Attribute::AttachedEnergy), 0);
    }

    #[test]
    fn bench_fills_up() {
        let board = Board::new();
        for _ in 0..4 {
            board.draw(Owner::Player).unwrap();
        }
        assert!(matches!(
            board.draw(Owner::Player),
            Err(BoardError::BenchFull { .. })
        ));
    }

    #[test]
    fn evolve_and_prizes() {
        let board = Board::new();
        board.evolve(Owner::Player).unwrap();
        let evolved = active(&board, Owner::Player);
        assert_eq!(evolved.card_id, "raichu-14");
        assert_eq!(attr(&evolved, Attribute::MaxHp), 90);
        assert!(board.evolve(Owner::Player).is_err());

        for _ in 0..PRIZE_COUNT {
            board.take_prize(Owner::Player).unwrap();
        }
        assert!(board.take_prize(Owner::Player).is_err());
    }

    #[test]
    fn unrendered_retreat_leaves_nodes_in_old_slots() {
        let board = Board::new();
        let scene = Scene::new();
        board.set_phase(PhaseName::from("player-main"));
        board.attach_energy(Owner::Player).unwrap();
        scene.render(&board);
        let starter = active(&board, Owner::Player);
        board.retreat(Owner::Player).unwrap();

        let auditor = ConsistencyAuditor::new(AuditConfig::default());
        let findings = auditor.run_audit(&board, &scene);
        let moved: Vec<_> = findings
            .iter()
            .filter(|f| f.subtype() == duel_audit::auditor::WRONG_PARENT)
            .filter_map(DivergenceRecord::subject_id)
            .collect();
        assert_eq!(moved.len(), 2);
        assert!(moved.contains(&starter.id));

        scene.render(&board);
        assert!(auditor.run_audit(&board, &scene).is_empty());
    }

    #[test]
    fn unrendered_change_is_detected() {
        let board = Board::new();
        let scene = Scene::new();
        board.set_phase(PhaseName::from("player-main"));
        scene.render(&board);
        board.attach_energy(Owner::Player).unwrap();

        let findings = ConsistencyAuditor::new(AuditConfig::default()).run_audit(&board, &scene);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings.first().map(|f| f.subtype()), Some("attached_energy"));
    }
}
