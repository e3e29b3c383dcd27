use familiar_lua::ScriptLimits;
use serde::Deserialize;
use std::path::Path;

use crate::demo::SpawnConfig;

#[derive(Debug, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub scripts: ScriptsSection,
    #[serde(default)]
    pub companions: CompanionsSection,
    #[serde(default)]
    pub demo: DemoSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct HostSection {
    /// Fixed tick period in milliseconds. Default: 50 (20 ticks per second).
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// Companion tick cadence, in host ticks.
    #[serde(default = "default_companion_interval")]
    pub companion_interval: u64,
}

fn default_tick_millis() -> u64 {
    50
}

fn default_companion_interval() -> u64 {
    20
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
            companion_interval: default_companion_interval(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScriptsSection {
    #[serde(default = "default_scripts_directory")]
    pub directory: String,
    #[serde(default = "default_behavior")]
    pub default_behavior: String,
    /// Lua heap limit per document VM, in megabytes.
    #[serde(default = "default_memory_mb")]
    pub memory_mb: usize,
    /// Instructions one script load or hook call may run before it is aborted.
    #[serde(default = "default_instruction_limit")]
    pub instruction_limit: u32,
    /// Write the embedded default.lua when the directory lacks one.
    #[serde(default = "default_true")]
    pub write_default: bool,
}

fn default_scripts_directory() -> String {
    "scripts".into()
}

fn default_behavior() -> String {
    "default".into()
}

fn default_memory_mb() -> usize {
    16
}

fn default_instruction_limit() -> u32 {
    1_000_000
}

fn default_true() -> bool {
    true
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self {
            directory: default_scripts_directory(),
            default_behavior: default_behavior(),
            memory_mb: default_memory_mb(),
            instruction_limit: default_instruction_limit(),
            write_default: true,
        }
    }
}

impl ScriptsSection {
    pub fn limits(&self) -> ScriptLimits {
        ScriptLimits {
            memory_mb: self.memory_mb,
            instruction_limit: self.instruction_limit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CompanionsSection {
    /// Mirror `ctx:debug()` lines to the owner as chat messages.
    #[serde(default)]
    pub debug_messages: bool,
}

#[derive(Debug, Deserialize)]
pub struct DemoSection {
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default = "default_hostile_cap")]
    pub hostile_cap: usize,
    /// Host ticks between spawn attempts.
    #[serde(default = "default_spawn_interval")]
    pub spawn_interval: u64,
    #[serde(default = "default_min_spawn_distance")]
    pub min_spawn_distance: f64,
    #[serde(default = "default_max_spawn_distance")]
    pub max_spawn_distance: f64,
    #[serde(default = "default_despawn_distance")]
    pub despawn_distance: f64,
}

fn default_owner() -> String {
    "Alex".into()
}

fn default_hostile_cap() -> usize {
    6
}

fn default_spawn_interval() -> u64 {
    100
}

fn default_min_spawn_distance() -> f64 {
    6.0
}

fn default_max_spawn_distance() -> f64 {
    16.0
}

fn default_despawn_distance() -> f64 {
    48.0
}

impl Default for DemoSection {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            hostile_cap: default_hostile_cap(),
            spawn_interval: default_spawn_interval(),
            min_spawn_distance: default_min_spawn_distance(),
            max_spawn_distance: default_max_spawn_distance(),
            despawn_distance: default_despawn_distance(),
        }
    }
}

impl DemoSection {
    pub fn spawn_config(&self) -> SpawnConfig {
        SpawnConfig {
            hostile_cap: self.hostile_cap,
            spawn_interval: self.spawn_interval.max(1),
            min_distance: self.min_spawn_distance,
            max_distance: self.max_spawn_distance.max(self.min_spawn_distance),
            despawn_distance: self.despawn_distance,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    pub level: String,
}

impl HostConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}
