//! Scaled and unscaled simulation clocks driven by the host tick.

use std::time::Duration;

use arena_rush_core::{ClockStep, Phase};
use serde::Deserialize;

/// Time-scale policy applied on every phase transition.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Freezes the scaled clock while the phase locks input.
    pub time_scale_pause: bool,
    /// Rate of the scaled clock while gameplay runs.
    pub playing_time_scale: f32,
    /// Rate of the scaled clock while the simulation is frozen.
    pub paused_time_scale: f32,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            time_scale_pause: true,
            playing_time_scale: 1.0,
            paused_time_scale: 0.0,
        }
    }
}

impl PhaseConfig {
    /// Scaled clock rate that applies while `phase` is active.
    #[must_use]
    pub fn time_scale_for(&self, phase: Phase) -> f32 {
        let scale = if self.time_scale_pause && phase.freezes_simulation() {
            self.paused_time_scale
        } else {
            self.playing_time_scale
        };
        // Rejects negative and NaN scales.
        scale.max(0.0)
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct SimulationClock {
    scaled: Duration,
    unscaled: Duration,
    time_scale: f32,
}

impl SimulationClock {
    pub(crate) fn new(time_scale: f32) -> Self {
        Self {
            scaled: Duration::ZERO,
            unscaled: Duration::ZERO,
            time_scale,
        }
    }

    pub(crate) fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale;
    }

    pub(crate) fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub(crate) fn scaled(&self) -> Duration {
        self.scaled
    }

    pub(crate) fn unscaled(&self) -> Duration {
        self.unscaled
    }

    pub(crate) fn advance(&mut self, dt: Duration) -> ClockStep {
        let scaled = if self.time_scale == 1.0 {
            dt
        } else {
            dt.mul_f32(self.time_scale)
        };
        self.scaled = self.scaled.saturating_add(scaled);
        self.unscaled = self.unscaled.saturating_add(dt);
        ClockStep::new(scaled, dt)
    }
}

#[cfg(test)]
mod tests {
    use super::{PhaseConfig, SimulationClock};
    use arena_rush_core::Phase;
    use std::time::Duration;

    #[test]
    fn frozen_phases_use_paused_scale() {
        let config = PhaseConfig::default();
        assert_eq!(config.time_scale_for(Phase::Playing), 1.0);
        assert_eq!(config.time_scale_for(Phase::Boot), 1.0);
        assert_eq!(config.time_scale_for(Phase::Intermission), 0.0);
        assert_eq!(config.time_scale_for(Phase::GameOver), 0.0);
    }

    #[test]
    fn disabled_pause_policy_keeps_playing_scale() {
        let config = PhaseConfig {
            time_scale_pause: false,
            playing_time_scale: 0.5,
            paused_time_scale: 0.0,
        };
        assert_eq!(config.time_scale_for(Phase::Paused), 0.5);
    }

    #[test]
    fn negative_scales_clamp_to_zero() {
        let config = PhaseConfig {
            time_scale_pause: true,
            playing_time_scale: -2.0,
            paused_time_scale: f32::NAN,
        };
        assert_eq!(config.time_scale_for(Phase::Playing), 0.0);
        assert_eq!(config.time_scale_for(Phase::Paused), 0.0);
    }

    #[test]
    fn advance_splits_scaled_and_unscaled_time() {
        let mut clock = SimulationClock::new(0.5);
        let step = clock.advance(Duration::from_millis(100));
        assert_eq!(step.scaled(), Duration::from_millis(50));
        assert_eq!(step.unscaled(), Duration::from_millis(100));

        clock.set_time_scale(0.0);
        let frozen = clock.advance(Duration::from_millis(100));
        assert_eq!(frozen.scaled(), Duration::ZERO);
        assert_eq!(clock.scaled(), Duration::from_millis(50));
        assert_eq!(clock.unscaled(), Duration::from_millis(200));
        assert_eq!(clock.time_scale(), 0.0);
    }
}
