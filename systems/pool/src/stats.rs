use std::fmt;

use arena_rush_core::ResourceKey;

/// Snapshot of a single pool entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Resource type the entry pools.
    pub key: ResourceKey,
    /// Instances currently handed out.
    pub active: usize,
    /// Instances parked for reuse.
    pub inactive: usize,
    /// Maximum number of instances the entry may hold.
    pub max_size: usize,
    /// Whether the entry may grow past `max_size`.
    pub auto_expand: bool,
    /// Inactive instances retained when culling.
    pub reserve: usize,
}

impl PoolStats {
    /// Active plus inactive instances.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.active + self.inactive
    }
}

/// Per-key statistics ordered by resource key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolReport {
    entries: Vec<PoolStats>,
}

impl PoolReport {
    pub(crate) fn new(mut entries: Vec<PoolStats>) -> Self {
        entries.sort_by(|left, right| left.key.cmp(&right.key));
        Self { entries }
    }

    /// Statistics for every known key.
    #[must_use]
    pub fn entries(&self) -> &[PoolStats] {
        &self.entries
    }

    /// Statistics for a single key.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<&PoolStats> {
        self.entries.iter().find(|stats| &stats.key == key)
    }

    /// Sum of active instances across all keys.
    #[must_use]
    pub fn total_active(&self) -> usize {
        self.entries.iter().map(|stats| stats.active).sum()
    }
}

impl fmt::Display for PoolReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(f, "pool: no entries");
        }
        writeln!(f, "{:<16} {:>6} {:>8} {:>6} {:>6} {:>7}", "key", "active", "inactive", "total", "max", "reserve")?;
        for stats in &self.entries {
            let max = if stats.auto_expand {
                format!("{}+", stats.max_size)
            } else {
                stats.max_size.to_string()
            };
            writeln!(
                f,
                "{:<16} {:>6} {:>8} {:>6} {:>6} {:>7}",
                stats.key.as_str(),
                stats.active,
                stats.inactive,
                stats.total(),
                max,
                stats.reserve
            )?;
        }
        Ok(())
    }
}
