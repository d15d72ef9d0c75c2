//! Line-oriented console standing in for the UI input surface.
//!
//! Each line is one discrete input event:
//!
//! ```text
//! phase <name>      switch to a phase and rebind its commands
//! press <command>   click a command's button
//! audit             run one consistency audit now
//! status            show phase, buttons and board
//! help              list these commands
//! quit              leave
//! ```
//!
//! Presses are dispatched on their own task so the console keeps reading
//! while a handler animates; a second press during that time is dropped by
//! the dispatcher.

use std::sync::Arc;

use duel_audit::DiagnosticMonitor;
use duel_core::{CommandRegistry, CommandState, DispatchOutcome, HandlerMap, PhasePresenter};
use duel_types::{CommandId, PhaseName};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::board::Board;
use crate::error::ClientError;

const HELP: &str = "commands: phase <name> | press <command> | audit | status | help | quit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Switch phase.
    Phase(PhaseName),
    /// Press a command button.
    Press(CommandId),
    /// Run one audit pass.
    Audit,
    /// Print the current state.
    Status,
    /// Print usage.
    Help,
    /// Exit the console.
    Quit,
}

fn usage(message: impl Into<String>) -> ClientError {
    ClientError::Console {
        message: message.into(),
    }
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ClientError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();
    if words.next().is_some() {
        return Err(usage(format!("too many arguments to `{verb}`")));
    }

    let command = match (verb, argument) {
        ("phase", Some(name)) => ConsoleCommand::Phase(PhaseName::from(name)),
        ("press", Some(id)) => ConsoleCommand::Press(CommandId::from(id)),
        ("phase" | "press", None) => return Err(usage(format!("`{verb}` needs a name"))),
        ("audit", None) => ConsoleCommand::Audit,
        ("status", None) => ConsoleCommand::Status,
        ("help", None) => ConsoleCommand::Help,
        ("quit" | "exit", None) => ConsoleCommand::Quit,
        (_, Some(_)) if matches!(verb, "audit" | "status" | "help" | "quit" | "exit") => {
            return Err(usage(format!("`{verb}` takes no argument")));
        }
        _ => return Err(usage(format!("unknown command `{verb}`; {HELP}"))),
    };
    Ok(Some(command))
}

/// The interactive session.
pub struct Console {
    presenter: PhasePresenter,
    handlers: HandlerMap,
    board: Board,
    monitor: Arc<DiagnosticMonitor>,
}

impl Console {
    /// Create a session.
    pub const fn new(
        presenter: PhasePresenter,
        handlers: HandlerMap,
        board: Board,
        monitor: Arc<DiagnosticMonitor>,
    ) -> Self {
        Self {
            presenter,
            handlers,
            board,
            monitor,
        }
    }

    /// Read stdin until `quit` or end of input.
    pub async fn run(mut self) -> Result<(), ClientError> {
        println!("{HELP}");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            match parse(&line) {
                Ok(Some(ConsoleCommand::Quit)) => break,
                Ok(Some(command)) => self.execute(command).await,
                Ok(None) => {}
                Err(e) => println!("{e}"),
            }
        }
        debug!("Console input closed");
        Ok(())
    }

    /// Apply one command.
    pub async fn execute(&mut self, command: ConsoleCommand) {
        match command {
            ConsoleCommand::Phase(phase) => self.change_phase(&phase),
            ConsoleCommand::Press(id) => {
                self.press(id);
            }
            ConsoleCommand::Audit => {
                let report = self.monitor.run_once().await;
                println!("{report}");
                for divergence in report.divergences() {
                    println!(
                        "  [{}/{}] {}",
                        divergence.category(),
                        divergence.subtype(),
                        divergence.message()
                    );
                }
            }
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => {}
        }
    }

    fn change_phase(&mut self, phase: &PhaseName) {
        match self.presenter.activate_phase(phase, &self.handlers) {
            Ok(transition) => {
                self.board.set_phase(phase.clone());
                let names = |set: &std::collections::BTreeSet<CommandId>| {
                    set.iter().map(CommandId::as_str).collect::<Vec<_>>().join(", ")
                };
                println!(
                    "phase {phase}: +[{}] -[{}] ={}",
                    names(&transition.added),
                    names(&transition.removed),
                    names(&transition.retained),
                );
            }
            Err(e) => {
                let known: Vec<&str> = self.presenter.phase_names().map(PhaseName::as_str).collect();
                println!("{e}; known phases: {}", known.join(", "));
            }
        }
    }

    /// Dispatch on a background task. Ids with no descriptor are answered
    /// here and never reach the dispatcher.
    fn press(&self, id: CommandId) -> Option<JoinHandle<()>> {
        let registry: CommandRegistry = self.presenter.registry().clone();
        if !registry.is_known(&id) {
            let known: Vec<String> = registry
                .descriptors()
                .into_iter()
                .filter(|d| d.visible)
                .map(|d| d.id.to_string())
                .collect();
            println!("unknown command `{id}`; available: {}", known.join(", "));
            return None;
        }
        Some(tokio::spawn(async move {
            match registry.dispatch_now(&id).await {
                Ok(DispatchOutcome::Completed) => println!("{id}: done"),
                Ok(DispatchOutcome::Failed(e)) => println!("{id}: failed: {e}"),
                Ok(DispatchOutcome::Superseded) => println!("{id}: finished after the phase changed"),
                Ok(DispatchOutcome::Rejected(reason)) => println!("{id}: ignored ({reason:?})"),
                Err(e) => {
                    warn!(command = %id, error = %e, "Command keeps failing");
                    println!("{id}: {e}");
                }
            }
        }))
    }

    fn print_status(&self) {
        let registry = self.presenter.registry();
        let phase = self
            .presenter
            .current_phase()
            .map_or("(none)", PhaseName::as_str);
        println!("phase: {phase}");

        for descriptor in registry.descriptors().iter().filter(|d| d.visible) {
            let state = match registry.state(&descriptor.id) {
                CommandState::Busy => "busy",
                CommandState::Idle if descriptor.enabled => "ready",
                CommandState::Idle | CommandState::Inactive => "disabled",
            };
            println!("  [{state:^8}] {} ({})", descriptor.id, descriptor.display_label);
        }
        for line in self.board.summary() {
            println!("  {line}");
        }
        println!(
            "  monitoring: {}",
            if self.monitor.is_running() { "on" } else { "off" }
        );
    }
}
