use std::time::Duration;

use arena_rush_core::{BossGroup, ResourceKey, SpawnGroup};

/// One concurrent spawn sub-task of a running wave.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GroupTask {
    key: ResourceKey,
    remaining: u32,
    interval: Duration,
    wait: Duration,
}

impl GroupTask {
    pub(crate) fn from_group(group: &SpawnGroup) -> Self {
        Self {
            key: group.resource_key.clone(),
            remaining: group.count,
            interval: group.interval,
            wait: group.start_delay,
        }
    }

    pub(crate) fn from_boss(boss: &BossGroup) -> Self {
        Self {
            key: boss.resource_key.clone(),
            remaining: boss.count,
            interval: boss.interval,
            wait: Duration::ZERO,
        }
    }

    pub(crate) fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Spends up to `budget` of scaled time and returns how many requests
    /// became due. Every request is followed by a wait of one interval; a
    /// zero interval still yields until the next tick.
    pub(crate) fn advance(&mut self, budget: Duration) -> u32 {
        let mut budget = budget;
        let mut issued = 0;
        loop {
            if self.wait > budget {
                self.wait -= budget;
                break;
            }
            budget -= self.wait;
            self.wait = Duration::ZERO;

            if self.remaining == 0 {
                break;
            }
            self.remaining -= 1;
            issued += 1;

            if self.interval.is_zero() {
                break;
            }
            self.wait = self.interval;
        }
        issued
    }

    pub(crate) fn is_done(&self) -> bool {
        self.remaining == 0 && self.wait.is_zero()
    }
}
