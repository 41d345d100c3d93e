//! Headless arena run that drives every subsystem from a fixed host tick.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

use arena_rush_core::{
    Command, Event, EventBus, EventKind, GameOverInfo, InstanceId, Phase, Placement, ResourceKey,
};
use arena_rush_session::{apply, query, BestRecordStore, PhaseStateMachine, PLAYER_DIED};
use arena_rush_system_pool::{InstanceFactory, PoolReport, Poolable, PooledHandle, ResourcePool};
use arena_rush_system_spawn_gate::SpawnGate;
use arena_rush_system_waves::WaveOrchestrator;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::{seconds, ConfigError, SessionFile, SimulationSection};

/// Angular speed of the simulated player, in radians per scaled second.
const ORBIT_SPEED: f32 = 0.6;

/// Validated knobs for a headless run.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SimulationOptions {
    seed: u64,
    tick: Duration,
    lifetime_min: Duration,
    lifetime_max: Duration,
    corpse: Duration,
    confirm_after: Duration,
    die_at: Option<Duration>,
    time_limit: Duration,
    orbit_radius: f32,
}

impl SimulationOptions {
    pub(crate) fn from_section(section: &SimulationSection) -> Result<Self, ConfigError> {
        if section.tick_seconds.is_nan() || section.tick_seconds <= 0.0 {
            return Err(ConfigError::NonPositiveTick(section.tick_seconds));
        }
        let [low, high] = section.enemy_lifetime;
        let low = seconds("simulation.enemy_lifetime", low)?;
        let high = seconds("simulation.enemy_lifetime", high)?;

        Ok(Self {
            seed: section.seed,
            tick: seconds("simulation.tick_seconds", section.tick_seconds)?,
            lifetime_min: low.min(high),
            lifetime_max: low.max(high),
            corpse: seconds("simulation.corpse_seconds", section.corpse_seconds)?,
            confirm_after: seconds("simulation.confirm_after", section.confirm_after)?,
            die_at: section
                .die_at
                .map(|value| seconds("simulation.die_at", value))
                .transpose()?,
            time_limit: seconds("simulation.max_seconds", section.max_seconds)?,
            orbit_radius: section.player_orbit_radius,
        })
    }
}

/// Pooled enemy body.
#[derive(Debug)]
pub(crate) struct Enemy {
    key: ResourceKey,
    id: InstanceId,
    placement: Placement,
    deployments: u32,
}

impl Poolable for Enemy {
    fn apply_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    fn on_acquire(&mut self) {
        self.deployments += 1;
        debug!(
            key = %self.key,
            id = self.id.get(),
            deployments = self.deployments,
            x = self.placement.position.x,
            y = self.placement.position.y,
            "enemy deployed"
        );
    }
}

/// Counts how many enemy bodies were built and torn down.
#[derive(Debug, Default)]
pub(crate) struct EnemyFactory {
    created: usize,
    destroyed: usize,
}

impl InstanceFactory for EnemyFactory {
    type Instance = Enemy;

    fn create(&mut self, key: &ResourceKey, id: InstanceId) -> Enemy {
        self.created += 1;
        Enemy {
            key: key.clone(),
            id,
            placement: Placement::default(),
            deployments: 0,
        }
    }

    fn destroy(&mut self, key: &ResourceKey, instance: Enemy) {
        self.destroyed += 1;
        debug!(key = %key, id = instance.id.get(), "enemy body destroyed");
    }
}

/// Summary of a finished headless run.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) info: Option<GameOverInfo>,
    pub(crate) waves_cleared: usize,
    pub(crate) spawned: u32,
    pub(crate) events: usize,
    pub(crate) report: PoolReport,
    pub(crate) created: usize,
    pub(crate) destroyed: usize,
    pub(crate) pending_releases: usize,
    pub(crate) elapsed: Duration,
}

#[derive(Debug)]
struct LiveEnemy {
    handle: PooledHandle,
    remaining: Duration,
}

/// Plays one run to game over.
pub(crate) fn run(
    file: &SessionFile,
    options: &SimulationOptions,
    records: Box<dyn BestRecordStore>,
) -> Result<Outcome, ConfigError> {
    let mut bus = EventBus::new();

    let cleared = Rc::new(Cell::new(0_usize));
    let cleared_sink = Rc::clone(&cleared);
    let _ = bus.subscribe_to(EventKind::WaveCleared, move |_| {
        cleared_sink.set(cleared_sink.get() + 1);
    });

    let game_over = Rc::new(RefCell::new(None));
    let game_over_sink = Rc::clone(&game_over);
    let _ = bus.subscribe_to(EventKind::GameOver, move |event| {
        if let Event::GameOver { info } = event {
            *game_over_sink.borrow_mut() = Some(info.clone());
        }
    });

    let events = Rc::new(Cell::new(0_usize));
    let events_sink = Rc::clone(&events);
    let _ = bus.subscribe(move |event| {
        events_sink.set(events_sink.get() + 1);
        debug!(?event, "event");
    });

    let mut machine = PhaseStateMachine::new(file.phase, records);
    let mut pool = ResourcePool::new(
        EnemyFactory::default(),
        file.pool.settings()?,
        file.pool.defaults,
    );
    for entry in &file.pools {
        let ready = pool.configure(&entry.key, entry.config);
        debug!(key = %entry.key, ready, "pool entry configured");
    }
    let mut gate = SpawnGate::new(file.spawn.gate_config());
    let mut orchestrator = WaveOrchestrator::new(file.waves.clone());
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);

    apply(&mut machine, Command::StartRun { start_wave: 1 }, &mut bus);
    if !orchestrator.begin_run() {
        warn!("nothing to play; ending the run");
        end_run(&mut machine, "NoWaves", &mut bus);
    }

    let mut live: Vec<LiveEnemy> = Vec::new();
    let mut spawned = Vec::new();
    let mut total_spawned = 0_u32;
    let mut intermission_wait = Duration::ZERO;

    while !query::current_phase(&machine).is_terminal() {
        let step = machine.advance_clock(options.tick);
        pool.tick(step);

        let angle = query::scaled_elapsed(&machine).as_secs_f32() * ORBIT_SPEED;
        let player = Vec2::from_angle(angle) * options.orbit_radius;
        gate.set_reference_point(Some(player));

        live.retain_mut(|enemy| {
            enemy.remaining = enemy.remaining.saturating_sub(step.scaled());
            if !enemy.remaining.is_zero() {
                return true;
            }
            if let Some(body) = pool.get(enemy.handle) {
                debug!(
                    key = %body.key,
                    distance = body.placement.position.distance(player),
                    "enemy died"
                );
            }
            let _ = orchestrator.report_death(enemy.handle, &mut machine, &mut bus);
            pool.release_after(enemy.handle, options.corpse);
            false
        });

        if let Some(die_at) = options.die_at {
            if query::scaled_elapsed(&machine) >= die_at {
                end_run(&mut machine, PLAYER_DIED, &mut bus);
            }
        }

        if query::current_phase(&machine) == Phase::Intermission {
            intermission_wait += step.unscaled();
            if intermission_wait >= options.confirm_after {
                intermission_wait = Duration::ZERO;
                apply(&mut machine, Command::ConfirmIntermission, &mut bus);
            }
        }

        orchestrator.tick(step, &mut machine, &mut gate, &mut pool, &mut bus, &mut spawned);
        for handle in spawned.drain(..) {
            total_spawned += 1;
            let remaining = rng.gen_range(options.lifetime_min..=options.lifetime_max);
            live.push(LiveEnemy { handle, remaining });
        }

        if orchestrator.is_finished() {
            end_run(&mut machine, "AllWavesCleared", &mut bus);
        }
        if query::unscaled_elapsed(&machine) >= options.time_limit {
            end_run(&mut machine, "TimeLimit", &mut bus);
        }
    }

    orchestrator.stop_all();
    for enemy in live.drain(..) {
        let _ = pool.release(enemy.handle);
    }
    let culled = pool.cull();
    info!(
        culled,
        pending = pool.pending_releases(),
        detached = pool.detached_count(),
        "arena cleaned up"
    );

    let info = game_over.borrow_mut().take();
    Ok(Outcome {
        info,
        waves_cleared: cleared.get(),
        spawned: total_spawned,
        events: events.get(),
        report: pool.stats(),
        created: pool.factory().created,
        destroyed: pool.factory().destroyed,
        pending_releases: pool.pending_releases(),
        elapsed: query::unscaled_elapsed(&machine),
    })
}

fn end_run(machine: &mut PhaseStateMachine, reason: &str, bus: &mut EventBus) {
    apply(
        machine,
        Command::TriggerGameOver {
            reason: reason.to_owned(),
        },
        bus,
    );
}
