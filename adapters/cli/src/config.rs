//! TOML session file describing the arena, the pools and the waves.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use arena_rush_core::{Placement, ResourceKey, WaveDefinition};
use arena_rush_session::PhaseConfig;
use arena_rush_system_pool::{EntryConfig, PoolDefaults, PoolSettings};
use arena_rush_system_spawn_gate::SpawnGateConfig;
use glam::Vec2;
use serde::Deserialize;

/// Session file bundled with the binary.
pub(crate) const BUNDLED_SESSION: &str = include_str!("../assets/arena.toml");

/// Errors raised while loading a session file.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    /// The file could not be read.
    #[error("failed to read session file {}: {source}", .path.display())]
    Read {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for a session.
    #[error("failed to parse session file: {0}")]
    Parse(#[from] toml::de::Error),
    /// A duration field holds a negative or non-finite number.
    #[error("{field} must be a non-negative number of seconds, got {value}")]
    InvalidDuration {
        /// Name of the offending field.
        field: &'static str,
        /// Value found in the file.
        value: f64,
    },
    /// The simulation tick would never advance time.
    #[error("simulation.tick_seconds must be positive, got {0}")]
    NonPositiveTick(f64),
    /// Strict mode: no waves are defined.
    #[error("session file defines no waves")]
    EmptyWaves,
    /// Strict mode: no spawn locations are defined.
    #[error("session file defines no spawn locations")]
    EmptyLocations,
}

/// Parsed session file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SessionFile {
    pub(crate) phase: PhaseConfig,
    pub(crate) pool: PoolSection,
    pub(crate) spawn: SpawnSection,
    pub(crate) simulation: SimulationSection,
    pub(crate) pools: Vec<PoolEntrySection>,
    pub(crate) waves: Vec<WaveDefinition>,
}

impl SessionFile {
    /// Reads and parses the session file at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parses a session file from its TOML text.
    pub(crate) fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Rejects files that would leave a subsystem disabled.
    pub(crate) fn validate_strict(&self) -> Result<(), ConfigError> {
        if self.waves.is_empty() {
            return Err(ConfigError::EmptyWaves);
        }
        if self.spawn.locations.is_empty() {
            return Err(ConfigError::EmptyLocations);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct PoolSection {
    log_warnings: bool,
    auto_cull_interval: Option<f64>,
    pub(crate) defaults: PoolDefaults,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            log_warnings: true,
            auto_cull_interval: None,
            defaults: PoolDefaults::default(),
        }
    }
}

impl PoolSection {
    pub(crate) fn settings(&self) -> Result<PoolSettings, ConfigError> {
        let auto_cull_interval = self
            .auto_cull_interval
            .map(|value| seconds("pool.auto_cull_interval", value))
            .transpose()?;
        Ok(PoolSettings {
            log_warnings: self.log_warnings,
            auto_cull_interval,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct PoolEntrySection {
    pub(crate) key: ResourceKey,
    #[serde(flatten)]
    pub(crate) config: EntryConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct SpawnSection {
    locations: Vec<[f32; 2]>,
    min_distance: f32,
    shuffle_each_wave: bool,
    use_pooling: bool,
    seed: u64,
}

impl Default for SpawnSection {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            min_distance: 6.0,
            shuffle_each_wave: true,
            use_pooling: true,
            seed: 0,
        }
    }
}

impl SpawnSection {
    /// Builds the gate configuration; every location faces the arena centre.
    pub(crate) fn gate_config(&self) -> SpawnGateConfig {
        let locations = self
            .locations
            .iter()
            .map(|&coords| {
                let position = Vec2::from(coords);
                Placement::at(position).with_rotation((-position.y).atan2(-position.x))
            })
            .collect();
        SpawnGateConfig::new(locations, self.seed)
            .with_min_distance(self.min_distance)
            .with_shuffle_each_wave(self.shuffle_each_wave)
            .with_pooling(self.use_pooling)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct SimulationSection {
    pub(crate) seed: u64,
    pub(crate) tick_seconds: f64,
    pub(crate) enemy_lifetime: [f64; 2],
    pub(crate) corpse_seconds: f64,
    pub(crate) confirm_after: f64,
    pub(crate) die_at: Option<f64>,
    pub(crate) max_seconds: f64,
    pub(crate) player_orbit_radius: f32,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            seed: 7,
            tick_seconds: 1.0 / 60.0,
            enemy_lifetime: [1.5, 4.0],
            corpse_seconds: 0.25,
            confirm_after: 1.0,
            die_at: None,
            max_seconds: 600.0,
            player_orbit_radius: 4.0,
        }
    }
}

/// Converts a floating number of seconds into a [`Duration`].
pub(crate) fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { field, value })
}
