//! Demo command handlers that drive the board.
//!
//! Each handler applies its rule to the [`Board`] immediately, then waits
//! for the animation to finish before redrawing the [`Scene`]. The command
//! stays in flight for the whole animation, so repeated presses during it
//! are dropped.

use std::time::Duration;

use duel_core::{HandlerError, HandlerMap, SharedHandler, handler_fn};
use duel_types::Owner;
use tracing::debug;

use crate::board::{Board, BoardError, Scene};

/// Damage dealt by the player's attack.
const PLAYER_ATTACK_DAMAGE: i32 = 20;

/// Damage dealt by the opponent when the player ends the turn.
const CPU_ATTACK_DAMAGE: i32 = 10;

/// Damage removed by a potion.
const POTION_HEAL: i32 = 20;

/// Wrap a board rule as an animated handler.
fn animated<F>(board: &Board, scene: &Scene, animation: Duration, rule: F) -> SharedHandler
where
    F: Fn(&Board) -> Result<(), BoardError> + Send + Sync + 'static,
{
    let board = board.clone();
    let scene = scene.clone();
    handler_fn(move |_| {
        let applied = rule(&board).map_err(|e| HandlerError::failed(e.to_string()));
        let board = board.clone();
        let scene = scene.clone();
        async move {
            applied?;
            tokio::time::sleep(animation).await;
            scene.render(&board);
            Ok(())
        }
    })
}

/// Handlers for every command in the default configuration.
pub fn demo_handlers(board: &Board, scene: &Scene, animation: Duration) -> HandlerMap {
    HandlerMap::new()
        .with("confirm-setup", animated(board, scene, animation, |_| Ok(())))
        .with("draw", animated(board, scene, animation, |b| b.draw(Owner::Player).map(drop)))
        .with("attach-energy", animated(board, scene, animation, |b| b.attach_energy(Owner::Player)))
        .with("evolve", animated(board, scene, animation, |b| b.evolve(Owner::Player)))
        .with("play-trainer", animated(board, scene, animation, |b| b.heal(Owner::Player, POTION_HEAL)))
        .with("retreat", animated(board, scene, animation, |b| b.retreat(Owner::Player)))
        .with("attack", animated(board, scene, animation, |b| {
            b.attack(Owner::Player, PLAYER_ATTACK_DAMAGE).map(drop)
        }))
        .with("end-turn", animated(board, scene, animation, |b| {
            // The opponent answers with a draw and, if it can, an attack.
            if let Err(e) = b.draw(Owner::Cpu) {
                debug!(error = %e, "Opponent skips its draw");
            }
            b.attach_energy(Owner::Cpu)?;
            b.attack(Owner::Cpu, CPU_ATTACK_DAMAGE).map(drop)
        }))
        .with("take-prize", animated(board, scene, animation, |b| b.take_prize(Owner::Player)))
        .with("rematch", animated(board, scene, animation, |b| {
            b.deal();
            Ok(())
        }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use duel_audit::{ConsistencyAuditor, RenderProjection};
    use duel_core::config::AuditConfig;
    use duel_core::{ClientConfig, DispatchOutcome, Rejection, build_controller};
    use duel_types::{CommandId, PhaseName};

    use super::*;

    #[test]
    fn covers_every_default_command() {
        let handlers = demo_handlers(&Board::new(), &Scene::new(), Duration::ZERO);
        for descriptor in ClientConfig::default().commands {
            assert!(handlers.get(&descriptor.id).is_some(), "{} has no handler", descriptor.id);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scene_lags_board_until_animation_ends() {
        let board = Board::new();
        let scene = Scene::new();
        board.set_phase(PhaseName::from("player-main"));
        scene.render(&board);

        let config = ClientConfig::default();
        let mut presenter = build_controller(&config);
        let handlers = demo_handlers(&board, &scene, Duration::from_millis(800));
        presenter
            .activate_phase(&PhaseName::from("player-main"), &handlers)
            .unwrap();
        let registry = presenter.registry().clone();
        let energy = CommandId::from("attach-energy");

        let background = registry.clone();
        let press = tokio::spawn(async move {
            background.dispatch_now(&CommandId::from("attach-energy")).await
        });
        while !registry.is_in_flight(&energy) {
            tokio::task::yield_now().await;
        }

        let auditor = ConsistencyAuditor::new(AuditConfig::default());
        assert_eq!(auditor.run_audit(&board, &scene).len(), 1);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(
            registry.dispatch_now(&energy).await.unwrap(),
            DispatchOutcome::Rejected(Rejection::InFlight)
        );

        assert_eq!(press.await.unwrap().unwrap(), DispatchOutcome::Completed);
        assert!(auditor.run_audit(&board, &scene).is_empty());
        assert_eq!(scene.nodes().unwrap().len(), board.snapshot().len());
    }

    #[tokio::test]
    async fn end_turn_survives_a_full_cpu_bench() {
        let board = Board::new();
        board.attach_energy(Owner::Cpu).unwrap();
        while board.draw(Owner::Cpu).is_ok() {}
        let cards = board.snapshot().len();

        let handlers = demo_handlers(&board, &Scene::new(), Duration::ZERO);
        let end_turn = handlers.get(&CommandId::from("end-turn")).unwrap();
        let result = end_turn
            .handle(duel_core::Invocation {
                command: CommandId::from("end-turn"),
                invoked_at: tokio::time::Instant::now(),
            })
            .await;
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(board.snapshot().len(), cards);
    }

    #[tokio::test]
    async fn rule_violation_fails_the_handler() {
        let board = Board::new();
        let handlers = demo_handlers(&board, &Scene::new(), Duration::ZERO);
        let attack = handlers.get(&CommandId::from("attack")).unwrap();
        let result = attack
            .handle(duel_core::Invocation {
                command: CommandId::from("attack"),
                invoked_at: tokio::time::Instant::now(),
            })
            .await;
        assert!(matches!(result, Err(HandlerError::Failed { .. })));
    }
}
