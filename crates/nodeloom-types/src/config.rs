//! Engine configuration types.
//!
//! `EngineConfig` represents the `nodeloom.toml` file that tunes layout
//! spacing, safety thresholds, and the external script runner.

use serde::{Deserialize, Serialize};

use crate::graph::Position;

/// Top-level engine configuration.
///
/// Loaded from `~/.config/nodeloom/nodeloom.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Padding added around member nodes when computing group bounds.
    #[serde(default = "default_group_padding")]
    pub group_padding: f64,

    /// Padding between rectangles used by collision avoidance.
    #[serde(default = "default_collision_padding")]
    pub collision_padding: f64,

    /// Default step for collision shifts and spacing normalisation.
    #[serde(default = "default_spacing")]
    pub default_spacing: f64,

    /// Offset applied to duplicated nodes when none is given.
    #[serde(default = "default_duplicate_offset")]
    pub duplicate_offset: Position,

    /// Number of deletions in one command list that counts as a mass delete.
    #[serde(default = "default_mass_delete_threshold")]
    pub mass_delete_threshold: usize,

    /// Capacity of the broadcast channel backing the event bus.
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Upper bound on blueprint instances in one procedural generation call.
    #[serde(default = "default_max_generated_instances")]
    pub max_generated_instances: usize,

    /// External sandboxed script runner.
    #[serde(default)]
    pub script: ScriptConfig,
}

fn default_group_padding() -> f64 {
    24.0
}

fn default_collision_padding() -> f64 {
    16.0
}

fn default_spacing() -> f64 {
    80.0
}

fn default_duplicate_offset() -> Position {
    Position::new(40.0, 40.0)
}

fn default_mass_delete_threshold() -> usize {
    10
}

fn default_event_bus_capacity() -> usize {
    256
}

fn default_max_generated_instances() -> usize {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            group_padding: default_group_padding(),
            collision_padding: default_collision_padding(),
            default_spacing: default_spacing(),
            duplicate_offset: default_duplicate_offset(),
            mass_delete_threshold: default_mass_delete_threshold(),
            event_bus_capacity: default_event_bus_capacity(),
            max_generated_instances: default_max_generated_instances(),
            script: ScriptConfig::default(),
        }
    }
}

/// How scripts are handed to the external runner process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Interpreter executable, resolved through `PATH`.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Extra arguments passed before the script path.
    #[serde(default)]
    pub args: Vec<String>,
    /// Wall-clock limit for one script run.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_interpreter() -> String {
    "node".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
