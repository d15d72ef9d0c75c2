//! Configuration loading and typed config structures for the duel client.
//!
//! The canonical configuration lives in `duel-config.yaml` next to the
//! client binary. This module defines strongly-typed structs that mirror
//! the YAML structure, and provides a loader that reads and validates the
//! file. Every section falls back to defaults when absent.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use duel_types::{Attribute, CommandDescriptor, CommandId, PhaseDescriptor, PhaseName};
use serde::Deserialize;

/// Smallest monitoring interval accepted by validation.
pub const MIN_MONITOR_INTERVAL_MS: u64 = 100;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// What is wrong with it.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level client configuration.
///
/// Mirrors the structure of `duel-config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Dispatcher guard settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// The fixed command descriptor set.
    #[serde(default = "default_commands")]
    pub commands: Vec<CommandDescriptor>,

    /// Phase declarations.
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseDescriptor>,

    /// Consistency auditor settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Continuous monitoring settings.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Card definition service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            commands: default_commands(),
            phases: default_phases(),
            audit: AuditConfig::default(),
            monitor: MonitorConfig::default(),
            service: ServiceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for the service:
    /// - `DUEL_SERVER_PORT` overrides `service.port`
    /// - `DUEL_CARDS_PATH` overrides `service.cards_path`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a map.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.service.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-section consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on a zero debounce window, a
    /// duplicate command id, a phase that names an unknown command, or a
    /// monitor interval below [`MIN_MONITOR_INTERVAL_MS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.debounce_ms == 0 {
            return Err(invalid("dispatch.debounce_ms must be greater than zero"));
        }
        if self.monitor.interval_ms < MIN_MONITOR_INTERVAL_MS {
            return Err(invalid(format!(
                "monitor.interval_ms must be at least {MIN_MONITOR_INTERVAL_MS}"
            )));
        }

        let mut known: BTreeSet<&CommandId> = BTreeSet::new();
        for command in &self.commands {
            if !known.insert(&command.id) {
                return Err(invalid(format!("duplicate command id `{}`", command.id)));
            }
        }

        let mut phase_names: BTreeSet<&PhaseName> = BTreeSet::new();
        for phase in &self.phases {
            if !phase_names.insert(&phase.name) {
                return Err(invalid(format!("duplicate phase `{}`", phase.name)));
            }
            if let Some(unknown) = phase.commands.iter().find(|c| !known.contains(&c.id)) {
                return Err(invalid(format!(
                    "phase `{}` declares unknown command `{}`",
                    phase.name, unknown.id
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

/// Dispatcher guard settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DispatchConfig {
    /// Minimum milliseconds between two accepted invocations of a command.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Consecutive handler failures after which dispatch reports an error
    /// to the caller.
    #[serde(default = "default_failure_escalation_threshold")]
    pub failure_escalation_threshold: u32,
}

impl DispatchConfig {
    /// The debounce window as a [`Duration`].
    pub const fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            failure_escalation_threshold: default_failure_escalation_threshold(),
        }
    }
}

/// Consistency auditor settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuditConfig {
    /// Phases during which `missing-in-render` and `missing-in-model`
    /// findings are suppressed because entities are still being built.
    ///
    /// Nothing outside this list is ever suppressed.
    #[serde(default = "default_suppressed_phases")]
    pub suppress_missing_in_phases: BTreeSet<PhaseName>,

    /// Scalar attributes compared for entities present on both sides.
    #[serde(default = "default_compared_attributes")]
    pub compared_attributes: Vec<Attribute>,

    /// Duplicate identifier heuristic.
    #[serde(default)]
    pub duplicates: DuplicateCheckConfig,

    /// Detached node heuristic.
    #[serde(default)]
    pub detached: DetachedCheckConfig,

    /// Resource count heuristic.
    #[serde(default)]
    pub resources: ResourceCheckConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            suppress_missing_in_phases: default_suppressed_phases(),
            compared_attributes: default_compared_attributes(),
            duplicates: DuplicateCheckConfig::default(),
            detached: DetachedCheckConfig::default(),
            resources: ResourceCheckConfig::default(),
        }
    }
}

/// Duplicate identifier heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DuplicateCheckConfig {
    /// Whether the check runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Occurrences of one id tolerated before it is flagged.
    #[serde(default = "default_max_occurrences")]
    pub max_occurrences: u32,
}

impl Default for DuplicateCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_occurrences: default_max_occurrences(),
        }
    }
}

/// Detached node heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DetachedCheckConfig {
    /// Whether the check runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of detached nodes tolerated before any is flagged.
    ///
    /// Renderers briefly detach nodes while animating them between slots.
    #[serde(default)]
    pub tolerance: u32,
}

impl Default for DetachedCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: 0,
        }
    }
}

/// Resource count heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ResourceCheckConfig {
    /// Whether the check runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scene objects allowed per model entity.
    #[serde(default = "default_max_objects_per_entity")]
    pub max_objects_per_entity: u32,

    /// Object count below which the check never fires.
    #[serde(default = "default_min_objects")]
    pub min_objects: u32,
}

impl Default for ResourceCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_objects_per_entity: default_max_objects_per_entity(),
            min_objects: default_min_objects(),
        }
    }
}

/// Continuous monitoring settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MonitorConfig {
    /// Start monitoring when the client boots.
    #[serde(default)]
    pub enabled: bool,

    /// Milliseconds between audit passes.
    #[serde(default = "default_monitor_interval_ms")]
    pub interval_ms: u64,
}

impl MonitorConfig {
    /// The interval as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_monitor_interval_ms(),
        }
    }
}

/// Card definition service settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// Whether the HTTP service starts with the client.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// JSON file holding the card definitions.
    #[serde(default = "default_cards_path")]
    pub cards_path: PathBuf,
}

impl ServiceConfig {
    /// Override service settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DUEL_SERVER_PORT")
            && let Ok(port) = val.parse::<u16>()
        {
            self.port = port;
        }
        if let Ok(val) = std::env::var("DUEL_CARDS_PATH") {
            self.cards_path = PathBuf::from(val);
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            cards_path: default_cards_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_debounce_ms() -> u64 {
    500
}

const fn default_failure_escalation_threshold() -> u32 {
    3
}

fn default_commands() -> Vec<CommandDescriptor> {
    [
        ("confirm-setup", "Ready", "check"),
        ("draw", "Draw", "deck"),
        ("attach-energy", "Attach Energy", "bolt"),
        ("evolve", "Evolve", "arrow-up"),
        ("play-trainer", "Play Trainer", "card"),
        ("retreat", "Retreat", "arrow-left"),
        ("attack", "Attack", "sword"),
        ("end-turn", "End Turn", "hourglass"),
        ("take-prize", "Take Prize", "star"),
        ("rematch", "Rematch", "refresh"),
    ]
    .into_iter()
    .map(|(id, label, icon)| CommandDescriptor::new(id, label).with_icon(icon))
    .collect()
}

fn default_phases() -> Vec<PhaseDescriptor> {
    let declared: BTreeMap<&str, Vec<&str>> = BTreeMap::from([
        ("setup", vec!["confirm-setup"]),
        ("player-draw", vec!["draw"]),
        (
            "player-main",
            vec![
                "attach-energy",
                "evolve",
                "play-trainer",
                "retreat",
                "attack",
                "end-turn",
            ],
        ),
        ("attack-declared", vec!["attack"]),
        ("prize-selection", vec!["take-prize"]),
        ("cpu-turn", Vec::new()),
        ("game-over", vec!["rematch"]),
    ]);
    declared
        .into_iter()
        .map(|(name, commands)| PhaseDescriptor::new(name, commands))
        .collect()
}

fn default_suppressed_phases() -> BTreeSet<PhaseName> {
    BTreeSet::from([PhaseName::from("setup")])
}

fn default_compared_attributes() -> Vec<Attribute> {
    vec![Attribute::Damage, Attribute::AttachedEnergy]
}

const fn default_max_occurrences() -> u32 {
    1
}

const fn default_max_objects_per_entity() -> u32 {
    8
}

const fn default_min_objects() -> u32 {
    64
}

const fn default_monitor_interval_ms() -> u64 {
    5000
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_port() -> u16 {
    8787
}

fn default_cards_path() -> PathBuf {
    PathBuf::from("data/cards.json")
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
