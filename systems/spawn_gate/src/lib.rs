#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Phase-aware spawn location selection.
//!
//! The gate vetoes every spawn outside the playable phase, picks a candidate
//! location that keeps a minimum distance to a reference point when one is
//! available, and hands the actual materialization to the resource pool.

use arena_rush_core::{PhaseView, Placement, ResourceKey};
use arena_rush_system_pool::{InstanceFactory, PooledHandle, ResourcePool};
use glam::Vec2;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

const DEFAULT_MIN_DISTANCE: f32 = 6.0;

/// Configuration parameters required to construct the spawn gate.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnGateConfig {
    locations: Vec<Placement>,
    min_distance: f32,
    shuffle_each_wave: bool,
    use_pooling: bool,
    rng_seed: u64,
}

impl SpawnGateConfig {
    /// Creates a configuration over the candidate locations using the
    /// provided random seed.
    #[must_use]
    pub fn new(locations: Vec<Placement>, rng_seed: u64) -> Self {
        Self {
            locations,
            min_distance: DEFAULT_MIN_DISTANCE,
            shuffle_each_wave: true,
            use_pooling: true,
            rng_seed,
        }
    }

    /// Minimum distance kept from the reference point. Zero or less disables
    /// the filter.
    #[must_use]
    pub fn with_min_distance(mut self, min_distance: f32) -> Self {
        self.min_distance = min_distance;
        self
    }

    /// Whether the candidate list is reshuffled at every wave start.
    #[must_use]
    pub fn with_shuffle_each_wave(mut self, shuffle_each_wave: bool) -> Self {
        self.shuffle_each_wave = shuffle_each_wave;
        self
    }

    /// Whether spawns go through the pool or are instantiated directly.
    #[must_use]
    pub fn with_pooling(mut self, use_pooling: bool) -> Self {
        self.use_pooling = use_pooling;
        self
    }
}

/// Spawn front door that enforces phase backpressure.
#[derive(Debug)]
pub struct SpawnGate {
    locations: Vec<Placement>,
    reference: Option<Vec2>,
    min_distance: f32,
    shuffle_each_wave: bool,
    use_pooling: bool,
    rng: ChaCha8Rng,
}

impl SpawnGate {
    /// Creates a gate from its configuration. An empty location list leaves
    /// the gate permanently unable to spawn.
    #[must_use]
    pub fn new(config: SpawnGateConfig) -> Self {
        if config.locations.is_empty() {
            warn!("spawn gate has no spawn locations; spawning disabled");
        }
        Self {
            locations: config.locations,
            reference: None,
            min_distance: config.min_distance,
            shuffle_each_wave: config.shuffle_each_wave,
            use_pooling: config.use_pooling,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Reshuffles the candidate locations for a new wave.
    pub fn init_for_wave(&mut self) {
        if !self.shuffle_each_wave || self.locations.len() <= 1 {
            return;
        }
        self.locations.shuffle(&mut self.rng);
    }

    /// Sets or clears the point spawns keep their distance from.
    pub fn set_reference_point(&mut self, reference: Option<Vec2>) {
        self.reference = reference;
    }

    /// Changes the minimum distance kept from the reference point.
    pub fn set_min_distance(&mut self, min_distance: f32) {
        self.min_distance = min_distance;
    }

    /// Candidate locations in their current order.
    #[must_use]
    pub fn locations(&self) -> &[Placement] {
        &self.locations
    }

    /// Picks a spawn location.
    ///
    /// With a reference point and a positive minimum distance, the choice is
    /// uniform over locations at or beyond that distance. When none qualify,
    /// or no filter applies, the choice is uniform over every location.
    /// Returns `None` only when there are no locations at all.
    pub fn pick_location(&mut self) -> Option<Placement> {
        if self.locations.is_empty() {
            return None;
        }

        if let Some(reference) = self.reference.filter(|_| self.min_distance > 0.0) {
            let min_distance_sq = self.min_distance * self.min_distance;
            let mut chosen = None;
            let mut eligible = 0_u32;
            for location in &self.locations {
                if location.position.distance_squared(reference) < min_distance_sq {
                    continue;
                }
                eligible += 1;
                if self.rng.gen_range(0..eligible) == 0 {
                    chosen = Some(*location);
                }
            }
            if chosen.is_some() {
                return chosen;
            }
        }

        let index = self.rng.gen_range(0..self.locations.len());
        Some(self.locations[index])
    }

    /// Spawns an instance of `key` unless the phase forbids it.
    ///
    /// Returns `None` outside the playable phase, while input is locked, when
    /// there is nowhere to spawn, or when the pool entry is exhausted.
    pub fn spawn<F, P>(
        &mut self,
        key: &ResourceKey,
        phase: &P,
        pool: &mut ResourcePool<F>,
    ) -> Option<PooledHandle>
    where
        F: InstanceFactory,
        P: PhaseView + ?Sized,
    {
        if !phase.is_playable() || phase.is_input_locked() {
            debug!(key = %key, phase = %phase.current_phase(), "spawn vetoed");
            return None;
        }

        let placement = self.pick_location()?;
        if self.use_pooling {
            pool.acquire(key, placement)
        } else {
            Some(pool.instantiate_detached(key, placement))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_location_is_never_shuffled() {
        let only = Placement::at(Vec2::new(1.0, 2.0));
        let mut gate = SpawnGate::new(SpawnGateConfig::new(vec![only], 3));
        gate.init_for_wave();
        assert_eq!(gate.locations(), &[only]);
        assert_eq!(gate.pick_location(), Some(only));
    }

    #[test]
    fn empty_gate_picks_nothing() {
        let mut gate = SpawnGate::new(SpawnGateConfig::new(Vec::new(), 3));
        gate.set_reference_point(Some(Vec2::ZERO));
        assert_eq!(gate.pick_location(), None);
    }
}
