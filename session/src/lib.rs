#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative session phase state for Arena Rush.
//!
//! [`PhaseStateMachine`] exclusively owns the session state: the current and
//! previous [`Phase`], run bookkeeping, the wave and alive counters, and both
//! simulation clocks. Every accepted transition updates the input lock,
//! applies the clock policy and publishes exactly one
//! [`Event::PhaseChanged`] before control returns to the caller. Requests
//! that the transition table does not allow are ignored.

mod clock;
mod records;

use std::{fmt, time::Duration};

use arena_rush_core::{
    ClockStep, Command, Event, EventBus, GameOverInfo, Phase, PhaseView,
};
use tracing::{debug, error, info};

use crate::clock::SimulationClock;

pub use crate::clock::PhaseConfig;
pub use crate::records::{BestRecordStore, MemoryRecordStore, RecordStoreError};

/// Wave number used when a run is restarted after game over.
pub const RESTART_WAVE: u32 = 1;

/// Reason reported by [`Command::TriggerGameOver`] when the player dies.
pub const PLAYER_DIED: &str = "PlayerDied";

#[derive(Clone, Copy, Debug, Default)]
struct SessionState {
    phase: Phase,
    previous_phase: Phase,
    input_locked: bool,
    run_active: bool,
    current_wave: u32,
    enemies_alive: u32,
    run_started_at: Option<Duration>,
}

/// Owner of the session phase, counters and clocks.
pub struct PhaseStateMachine {
    config: PhaseConfig,
    state: SessionState,
    clock: SimulationClock,
    records: Box<dyn BestRecordStore>,
    game_over_triggered: bool,
}

impl PhaseStateMachine {
    /// Creates a machine in [`Phase::Boot`] backed by the provided record store.
    #[must_use]
    pub fn new(config: PhaseConfig, records: Box<dyn BestRecordStore>) -> Self {
        let clock = SimulationClock::new(config.time_scale_for(Phase::Boot));
        Self {
            config,
            state: SessionState::default(),
            clock,
            records,
            game_over_triggered: false,
        }
    }

    /// Starts a run from [`Phase::Boot`], resetting the run counters.
    pub fn start_run(&mut self, start_wave: u32, bus: &mut EventBus) {
        if self.state.phase != Phase::Boot {
            debug!(phase = %self.state.phase, "start run ignored outside boot");
            return;
        }

        self.state.run_active = true;
        self.game_over_triggered = false;
        self.state.current_wave = start_wave;
        self.state.enemies_alive = 0;
        self.state.run_started_at = Some(self.clock.scaled());
        let _ = self.change_phase(Phase::Playing, bus);
        info!(start_wave, "run started");
        bus.publish(Event::RunStarted);
    }

    /// Pauses from playing or intermission, or resumes from pause to playing.
    pub fn set_paused(&mut self, paused: bool, bus: &mut EventBus) {
        let next = match (paused, self.state.phase) {
            (true, Phase::Playing | Phase::Intermission) => Phase::Paused,
            (true, Phase::Paused) | (false, Phase::Playing) => return,
            (false, Phase::Paused) => Phase::Playing,
            (_, phase) => {
                debug!(%phase, paused, "pause request ignored");
                return;
            }
        };
        let _ = self.change_phase(next, bus);
    }

    /// Enters the intermission after a cleared wave.
    ///
    /// Returns `true` when the session is in [`Phase::Intermission`] afterwards.
    pub fn request_intermission(&mut self, bus: &mut EventBus) -> bool {
        match self.state.phase {
            Phase::Intermission => true,
            Phase::Playing => {
                let _ = self.change_phase(Phase::Intermission, bus);
                bus.publish(Event::IntermissionOpened);
                true
            }
            phase => {
                debug!(%phase, "intermission request ignored");
                false
            }
        }
    }

    /// Confirms the intermission and resumes play.
    pub fn confirm_intermission(&mut self, bus: &mut EventBus) {
        if self.state.phase != Phase::Intermission {
            debug!(phase = %self.state.phase, "intermission confirmation ignored");
            return;
        }
        let _ = self.change_phase(Phase::Playing, bus);
    }

    /// Ends the run, persisting any new best record. Fires once per run.
    pub fn trigger_game_over(&mut self, reason: &str, bus: &mut EventBus) {
        if self.game_over_triggered || self.state.phase.is_terminal() {
            return;
        }
        self.game_over_triggered = true;

        let survived = self
            .state
            .run_started_at
            .map_or(Duration::ZERO, |started| {
                self.clock.scaled().saturating_sub(started)
            })
            .as_secs_f32();
        let wave = self.state.current_wave;

        let mut record = self.records.load();
        let is_new_best_wave = wave > record.best_wave;
        let is_new_best_time = survived > record.best_survived_seconds;
        if is_new_best_wave {
            record.best_wave = wave;
        }
        if is_new_best_time {
            record.best_survived_seconds = survived;
        }
        if is_new_best_wave || is_new_best_time {
            if let Err(err) = self.records.save(&record) {
                error!(%err, "failed to persist best records");
            }
        }

        let info = GameOverInfo {
            wave,
            survived_seconds: survived,
            reason: reason.to_owned(),
            best_wave: record.best_wave,
            best_seconds: record.best_survived_seconds,
            is_new_best_wave,
            is_new_best_time,
        };
        info!(wave, survived, reason, "game over");

        let _ = self.change_phase(Phase::GameOver, bus);
        bus.publish(Event::GameOver { info });

        self.state.run_active = false;
        bus.publish(Event::RunEnded);
    }

    /// Resets the session after game over and starts a fresh run.
    pub fn restart_run(&mut self, bus: &mut EventBus) {
        if self.state.phase != Phase::GameOver {
            debug!(phase = %self.state.phase, "restart ignored before game over");
            return;
        }

        self.state.run_active = false;
        self.state.current_wave = 0;
        self.state.enemies_alive = 0;
        self.state.run_started_at = None;
        let _ = self.change_phase(Phase::Boot, bus);
        self.start_run(RESTART_WAVE, bus);
    }

    /// Records the wave number reached by the run.
    pub fn set_wave(&mut self, wave: u32) {
        self.state.current_wave = wave;
    }

    /// Counts a successful spawn, returning the new alive count.
    pub fn note_enemy_spawned(&mut self) -> u32 {
        self.state.enemies_alive = self.state.enemies_alive.saturating_add(1);
        self.state.enemies_alive
    }

    /// Counts a death, returning the new alive count. Never drops below zero.
    pub fn note_enemy_despawned(&mut self) -> u32 {
        self.state.enemies_alive = self.state.enemies_alive.saturating_sub(1);
        self.state.enemies_alive
    }

    /// Advances both clocks by the host delta and reports what each accrued.
    pub fn advance_clock(&mut self, dt: Duration) -> ClockStep {
        self.clock.advance(dt)
    }

    fn change_phase(&mut self, next: Phase, bus: &mut EventBus) -> bool {
        let current = self.state.phase;
        if current == next {
            return false;
        }

        self.state.previous_phase = current;
        self.state.phase = next;
        self.state.input_locked = next.locks_input();
        self.clock.set_time_scale(self.config.time_scale_for(next));

        debug!(
            previous = %current,
            current = %next,
            wave = self.state.current_wave,
            alive = self.state.enemies_alive,
            "phase changed"
        );
        bus.publish(Event::PhaseChanged {
            previous: current,
            current: next,
        });
        true
    }
}

impl PhaseView for PhaseStateMachine {
    fn current_phase(&self) -> Phase {
        self.state.phase
    }

    fn is_input_locked(&self) -> bool {
        self.state.input_locked
    }
}

impl fmt::Debug for PhaseStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseStateMachine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("clock", &self.clock)
            .field("game_over_triggered", &self.game_over_triggered)
            .finish_non_exhaustive()
    }
}

/// Applies the provided command to the session, publishing resulting events.
pub fn apply(machine: &mut PhaseStateMachine, command: Command, bus: &mut EventBus) {
    match command {
        Command::StartRun { start_wave } => machine.start_run(start_wave, bus),
        Command::SetPaused { paused } => machine.set_paused(paused, bus),
        Command::RequestIntermission => {
            let _ = machine.request_intermission(bus);
        }
        Command::ConfirmIntermission => machine.confirm_intermission(bus),
        Command::TriggerGameOver { reason } => machine.trigger_game_over(&reason, bus),
        Command::RestartRun => machine.restart_run(bus),
    }
}

/// Query functions that provide read-only access to the session state.
pub mod query {
    use std::time::Duration;

    use super::PhaseStateMachine;
    use arena_rush_core::{BestRecord, Phase};

    /// Phase that is currently active.
    #[must_use]
    pub fn current_phase(machine: &PhaseStateMachine) -> Phase {
        machine.state.phase
    }

    /// Phase that was active before the most recent transition.
    #[must_use]
    pub fn previous_phase(machine: &PhaseStateMachine) -> Phase {
        machine.state.previous_phase
    }

    /// Reports whether gameplay is currently permitted.
    #[must_use]
    pub fn is_playable(machine: &PhaseStateMachine) -> bool {
        machine.state.phase.is_playable()
    }

    /// Reports whether player input is locked.
    #[must_use]
    pub fn is_input_locked(machine: &PhaseStateMachine) -> bool {
        machine.state.input_locked
    }

    /// Reports whether a run is in progress.
    #[must_use]
    pub fn is_run_active(machine: &PhaseStateMachine) -> bool {
        machine.state.run_active
    }

    /// Wave number the run has reached.
    #[must_use]
    pub fn current_wave(machine: &PhaseStateMachine) -> u32 {
        machine.state.current_wave
    }

    /// Number of spawned enemies that have not died yet.
    #[must_use]
    pub fn enemies_alive(machine: &PhaseStateMachine) -> u32 {
        machine.state.enemies_alive
    }

    /// Scaled-clock timestamp at which the current run started.
    #[must_use]
    pub fn run_started_at(machine: &PhaseStateMachine) -> Option<Duration> {
        machine.state.run_started_at
    }

    /// Total time accrued on the scaled clock.
    #[must_use]
    pub fn scaled_elapsed(machine: &PhaseStateMachine) -> Duration {
        machine.clock.scaled()
    }

    /// Total time accrued on the unscaled clock.
    #[must_use]
    pub fn unscaled_elapsed(machine: &PhaseStateMachine) -> Duration {
        machine.clock.unscaled()
    }

    /// Rate currently applied to the scaled clock.
    #[must_use]
    pub fn time_scale(machine: &PhaseStateMachine) -> f32 {
        machine.clock.time_scale()
    }

    /// Best record currently held by the persistence backend.
    #[must_use]
    pub fn best_record(machine: &PhaseStateMachine) -> BestRecord {
        machine.records.load()
    }
}
