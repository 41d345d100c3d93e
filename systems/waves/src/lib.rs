#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tick-driven wave sequencing.
//!
//! [`WaveOrchestrator`] walks the configured [`WaveDefinition`]s in order. It
//! never blocks: the host calls [`WaveOrchestrator::tick`] once per frame with
//! the [`ClockStep`] produced by the session, and the orchestrator advances its
//! explicit [`WaveStep`] as far as the elapsed scaled time and the session
//! phase allow. Enemy deaths are reported back through
//! [`WaveOrchestrator::report_death`].

mod task;

use std::{collections::HashSet, time::Duration};

use arena_rush_core::{
    ClockStep, Event, EventBus, EventKind, Phase, WaveDefinition,
};
use arena_rush_session::{query, PhaseStateMachine};
use arena_rush_system_pool::{InstanceFactory, PooledHandle, ResourcePool};
use arena_rush_system_spawn_gate::SpawnGate;
use tracing::{debug, info, warn};

use crate::task::GroupTask;

/// Suspension point the wave sequence is currently parked at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WaveStep {
    /// No sequence is running.
    #[default]
    Idle,
    /// Waiting out the wave's start delay on the scaled clock.
    WaitingStartDelay {
        /// Scaled time left before the wave starts.
        remaining: Duration,
    },
    /// Spawn groups are issuing requests.
    Spawning,
    /// Every request was issued; waiting for the alive count to reach zero.
    WaitingClear,
    /// The wave was cleared; waiting for the intermission to be confirmed.
    WaitingIntermission {
        /// Whether the session has entered the intermission yet.
        opened: bool,
    },
    /// The sequence ended, either after the last wave or on game over.
    Finished,
}

/// Sequencer that turns wave definitions into timed spawn requests.
#[derive(Debug)]
pub struct WaveOrchestrator {
    waves: Vec<WaveDefinition>,
    step: WaveStep,
    wave_index: Option<usize>,
    tasks: Vec<GroupTask>,
    tracked: HashSet<PooledHandle>,
}

impl WaveOrchestrator {
    /// Creates an idle orchestrator over the provided waves.
    #[must_use]
    pub fn new(waves: Vec<WaveDefinition>) -> Self {
        if waves.is_empty() {
            warn!("wave list is empty; wave orchestration disabled");
        }
        Self {
            waves,
            step: WaveStep::Idle,
            wave_index: None,
            tasks: Vec::new(),
            tracked: HashSet::new(),
        }
    }

    /// Starts the sequence from the first wave.
    ///
    /// Returns `false` and stays idle when no waves are configured.
    pub fn begin_run(&mut self) -> bool {
        let Some(first) = self.waves.first() else {
            warn!("cannot begin waves without any wave definitions");
            return false;
        };
        self.step = WaveStep::WaitingStartDelay {
            remaining: first.start_delay,
        };
        self.wave_index = Some(0);
        self.tasks.clear();
        self.tracked.clear();
        info!(waves = self.waves.len(), "wave sequence started");
        true
    }

    /// Cancels the sequence and every in-flight spawn group.
    ///
    /// Instances that were already spawned stay tracked so their deaths are
    /// still counted.
    pub fn stop_all(&mut self) {
        if self.is_running() {
            info!(wave = ?self.wave_index, "wave sequence stopped");
        }
        self.step = WaveStep::Idle;
        self.tasks.clear();
    }

    /// Advances the sequence by one host tick.
    ///
    /// Successful spawns are appended to `spawned` so the host can drive the
    /// instances and later report their deaths.
    pub fn tick<F: InstanceFactory>(
        &mut self,
        step: ClockStep,
        phase: &mut PhaseStateMachine,
        gate: &mut SpawnGate,
        pool: &mut ResourcePool<F>,
        bus: &mut EventBus,
        spawned: &mut Vec<PooledHandle>,
    ) {
        if !self.is_running() {
            return;
        }
        if query::current_phase(phase).is_terminal() {
            self.terminate();
            return;
        }

        let mut budget = step.scaled();
        loop {
            match self.step {
                WaveStep::Idle | WaveStep::Finished => return,
                WaveStep::WaitingStartDelay { remaining } => {
                    if remaining > budget {
                        self.step = WaveStep::WaitingStartDelay {
                            remaining: remaining - budget,
                        };
                        return;
                    }
                    budget -= remaining;
                    self.start_wave(phase, gate, bus);
                }
                WaveStep::Spawning => {
                    if query::current_phase(phase).freezes_simulation() {
                        return;
                    }
                    for index in 0..self.tasks.len() {
                        let issued = self.tasks[index].advance(budget);
                        for _ in 0..issued {
                            let key = self.tasks[index].key().clone();
                            if let Some(handle) = gate.spawn(&key, &*phase, pool) {
                                let _ = self.tracked.insert(handle);
                                let alive = phase.note_enemy_spawned();
                                bus.publish(Event::EnemySpawned { alive });
                                spawned.push(handle);
                            }
                        }
                    }
                    budget = Duration::ZERO;
                    if !self.tasks.iter().all(GroupTask::is_done) {
                        return;
                    }
                    self.tasks.clear();
                    debug!(wave = ?self.wave_index, "wave finished spawning");
                    self.step = WaveStep::WaitingClear;
                }
                WaveStep::WaitingClear => {
                    if query::enemies_alive(phase) > 0 {
                        return;
                    }
                    let index = self.wave_index.unwrap_or_default();
                    info!(index, "wave cleared");
                    bus.publish(Event::WaveCleared { index });
                    if bus.has_consumers(EventKind::WaveCleared) {
                        self.step = WaveStep::WaitingIntermission { opened: false };
                    } else {
                        self.advance_wave();
                    }
                }
                WaveStep::WaitingIntermission { opened: false } => {
                    match query::current_phase(phase) {
                        Phase::Intermission => {}
                        Phase::Playing => {
                            if !phase.request_intermission(bus) {
                                return;
                            }
                        }
                        Phase::GameOver => {
                            self.terminate();
                            return;
                        }
                        Phase::Boot | Phase::Paused => return,
                    }
                    self.step = WaveStep::WaitingIntermission { opened: true };
                }
                WaveStep::WaitingIntermission { opened: true } => {
                    match query::current_phase(phase) {
                        Phase::Playing => self.advance_wave(),
                        Phase::GameOver => {
                            self.terminate();
                            return;
                        }
                        Phase::Boot | Phase::Intermission | Phase::Paused => return,
                    }
                }
            }
        }
    }

    /// Records the death of a spawned enemy.
    ///
    /// Each spawn is counted once. Later reports through the same handle,
    /// reports for an earlier spawn of a since-reused instance, and reports
    /// for handles this orchestrator never spawned return `false` without
    /// touching the alive count.
    pub fn report_death(
        &mut self,
        handle: PooledHandle,
        phase: &mut PhaseStateMachine,
        bus: &mut EventBus,
    ) -> bool {
        if !self.tracked.remove(&handle) {
            return false;
        }
        let alive = phase.note_enemy_despawned();
        bus.publish(Event::EnemyDespawned { alive });
        true
    }

    /// Reports whether the sequence is between [`WaveOrchestrator::begin_run`]
    /// and its end.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !matches!(self.step, WaveStep::Idle | WaveStep::Finished)
    }

    /// Reports whether the sequence ended after the last wave or on game over.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.step == WaveStep::Finished
    }

    /// Current suspension point.
    #[must_use]
    pub fn step(&self) -> WaveStep {
        self.step
    }

    /// Zero-based index of the wave being processed.
    #[must_use]
    pub fn current_wave_index(&self) -> Option<usize> {
        self.wave_index
    }

    /// Number of spawns whose death has not been reported.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Number of configured waves.
    #[must_use]
    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    fn start_wave(&mut self, phase: &mut PhaseStateMachine, gate: &mut SpawnGate, bus: &mut EventBus) {
        let index = self.wave_index.unwrap_or_default();
        let Some(wave) = self.waves.get(index) else {
            self.step = WaveStep::Finished;
            return;
        };

        gate.init_for_wave();
        phase.set_wave(u32::try_from(index + 1).unwrap_or(u32::MAX));
        info!(index, name = %wave.name, spawns = wave.total_spawns(), "wave started");
        bus.publish(Event::WaveStarted { index });

        self.tasks = wave
            .groups
            .iter()
            .filter(|group| group.count > 0)
            .map(GroupTask::from_group)
            .chain(
                wave.boss
                    .iter()
                    .filter(|boss| boss.count > 0)
                    .map(GroupTask::from_boss),
            )
            .collect();
        self.step = WaveStep::Spawning;
    }

    fn advance_wave(&mut self) {
        let next = self.wave_index.map_or(0, |index| index + 1);
        match self.waves.get(next) {
            Some(wave) => {
                self.wave_index = Some(next);
                self.step = WaveStep::WaitingStartDelay {
                    remaining: wave.start_delay,
                };
            }
            None => {
                info!(waves = self.waves.len(), "all waves finished");
                self.step = WaveStep::Finished;
            }
        }
    }

    fn terminate(&mut self) {
        info!(wave = ?self.wave_index, "wave sequence terminated by game over");
        self.step = WaveStep::Finished;
        self.tasks.clear();
    }
}
