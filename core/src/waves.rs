//! Immutable wave configuration loaded once per session.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::ResourceKey;

const DEFAULT_WAVE_START_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_GROUP_COUNT: u32 = 5;
const DEFAULT_GROUP_INTERVAL: Duration = Duration::from_millis(200);
const DEFAULT_BOSS_COUNT: u32 = 1;
const DEFAULT_BOSS_INTERVAL: Duration = Duration::from_millis(500);

/// One ordered batch of timed spawn groups plus an optional boss group.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WaveDefinition {
    /// Human-readable name used in diagnostics.
    #[serde(default = "default_wave_name")]
    pub name: String,
    /// Delay on the scaled clock before the wave starts spawning.
    #[serde(
        default = "default_wave_start_delay",
        deserialize_with = "seconds"
    )]
    pub start_delay: Duration,
    /// Spawn groups that run concurrently once the wave starts.
    #[serde(default)]
    pub groups: Vec<SpawnGroup>,
    /// Optional boss batch that runs alongside the groups.
    #[serde(default)]
    pub boss: Option<BossGroup>,
}

impl WaveDefinition {
    /// Creates a wave definition without a boss group.
    #[must_use]
    pub fn new(name: impl Into<String>, start_delay: Duration, groups: Vec<SpawnGroup>) -> Self {
        Self {
            name: name.into(),
            start_delay,
            groups,
            boss: None,
        }
    }

    /// Returns a copy of the definition with the provided boss group.
    #[must_use]
    pub fn with_boss(mut self, boss: BossGroup) -> Self {
        self.boss = Some(boss);
        self
    }

    /// Total number of spawn requests the wave issues.
    #[must_use]
    pub fn total_spawns(&self) -> u64 {
        self.groups
            .iter()
            .map(|group| group.count)
            .chain(self.boss.as_ref().map(|boss| boss.count))
            .map(u64::from)
            .sum()
    }
}

/// Homogeneous spawn task: `count` requests at a fixed `interval`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SpawnGroup {
    /// Resource type spawned by the group.
    pub resource_key: ResourceKey,
    /// Number of spawn requests issued.
    #[serde(default = "default_group_count")]
    pub count: u32,
    /// Delay between consecutive requests on the scaled clock.
    #[serde(default = "default_group_interval", deserialize_with = "seconds")]
    pub interval: Duration,
    /// Delay before the first request, measured from the wave start.
    #[serde(default, deserialize_with = "seconds")]
    pub start_delay: Duration,
}

impl SpawnGroup {
    /// Creates a group that starts as soon as its wave starts.
    #[must_use]
    pub fn new(resource_key: impl Into<ResourceKey>, count: u32, interval: Duration) -> Self {
        Self {
            resource_key: resource_key.into(),
            count,
            interval,
            start_delay: Duration::ZERO,
        }
    }

    /// Returns a copy of the group that waits `start_delay` before spawning.
    #[must_use]
    pub fn with_start_delay(mut self, start_delay: Duration) -> Self {
        self.start_delay = start_delay;
        self
    }
}

/// Boss batch spawned alongside a wave's regular groups.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BossGroup {
    /// Resource type spawned as the boss.
    pub resource_key: ResourceKey,
    /// Number of bosses spawned.
    #[serde(default = "default_boss_count")]
    pub count: u32,
    /// Delay between consecutive bosses on the scaled clock.
    #[serde(default = "default_boss_interval", deserialize_with = "seconds")]
    pub interval: Duration,
}

impl BossGroup {
    /// Creates a boss group.
    #[must_use]
    pub fn new(resource_key: impl Into<ResourceKey>, count: u32, interval: Duration) -> Self {
        Self {
            resource_key: resource_key.into(),
            count,
            interval,
        }
    }
}

fn default_wave_name() -> String {
    "Wave".to_owned()
}

fn default_wave_start_delay() -> Duration {
    DEFAULT_WAVE_START_DELAY
}

fn default_group_count() -> u32 {
    DEFAULT_GROUP_COUNT
}

fn default_group_interval() -> Duration {
    DEFAULT_GROUP_INTERVAL
}

fn default_boss_count() -> u32 {
    DEFAULT_BOSS_COUNT
}

fn default_boss_interval() -> Duration {
    DEFAULT_BOSS_INTERVAL
}

/// Reads a non-negative floating number of seconds.
fn seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(value).map_err(serde::de::Error::custom)
}
