use std::{cell::RefCell, rc::Rc, time::Duration};

use arena_rush_core::{
    BossGroup, Event, EventBus, EventKind, InstanceId, Phase, Placement, ResourceKey,
    SpawnGroup, WaveDefinition,
};
use arena_rush_session::{query, MemoryRecordStore, PhaseConfig, PhaseStateMachine};
use arena_rush_system_pool::{
    EntryConfig, InstanceFactory, PoolDefaults, PoolSettings, Poolable, PooledHandle, ResourcePool,
};
use arena_rush_system_spawn_gate::{SpawnGate, SpawnGateConfig};
use arena_rush_system_waves::{WaveOrchestrator, WaveStep};
use glam::Vec2;

#[derive(Debug)]
struct Grunt;

impl Poolable for Grunt {
    fn apply_placement(&mut self, _placement: Placement) {}
}

#[derive(Debug, Default)]
struct GruntFactory;

impl InstanceFactory for GruntFactory {
    type Instance = Grunt;

    fn create(&mut self, _key: &ResourceKey, _id: InstanceId) -> Grunt {
        Grunt
    }
}

struct Harness {
    machine: PhaseStateMachine,
    bus: EventBus,
    gate: SpawnGate,
    pool: ResourcePool<GruntFactory>,
    waves: WaveOrchestrator,
    spawned: Vec<PooledHandle>,
    events: Rc<RefCell<Vec<Event>>>,
}

impl Harness {
    fn new(waves: Vec<WaveDefinition>) -> Self {
        let mut bus = EventBus::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let _ = bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        let locations = vec![
            Placement::at(Vec2::new(10.0, 0.0)),
            Placement::at(Vec2::new(-10.0, 0.0)),
        ];
        Self {
            machine: PhaseStateMachine::new(
                PhaseConfig::default(),
                Box::new(MemoryRecordStore::new()),
            ),
            bus,
            gate: SpawnGate::new(SpawnGateConfig::new(locations, 17)),
            pool: ResourcePool::new(GruntFactory, PoolSettings::default(), PoolDefaults::default()),
            waves: WaveOrchestrator::new(waves),
            spawned: Vec::new(),
            events,
        }
    }

    fn with_intermission(mut self) -> Self {
        let _ = self.bus.subscribe_to(EventKind::WaveCleared, |_| {});
        self
    }

    fn start(&mut self) {
        self.machine.start_run(1, &mut self.bus);
        assert!(self.waves.begin_run());
    }

    fn tick(&mut self, dt: Duration) {
        let step = self.machine.advance_clock(dt);
        self.pool.tick(step);
        self.waves.tick(
            step,
            &mut self.machine,
            &mut self.gate,
            &mut self.pool,
            &mut self.bus,
            &mut self.spawned,
        );
    }

    fn kill_all(&mut self) {
        for handle in std::mem::take(&mut self.spawned) {
            assert!(self
                .waves
                .report_death(handle, &mut self.machine, &mut self.bus));
            let _ = self.pool.release(handle);
        }
    }

    fn count(&self, kind: EventKind) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }

    fn phase(&self) -> Phase {
        query::current_phase(&self.machine)
    }
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn single_wave(count: u32, interval: Duration) -> Vec<WaveDefinition> {
    vec![WaveDefinition::new(
        "Opening",
        Duration::ZERO,
        vec![SpawnGroup::new("chaser", count, interval)],
    )]
}

fn two_waves() -> Vec<WaveDefinition> {
    vec![
        WaveDefinition::new("First", Duration::ZERO, vec![SpawnGroup::new("chaser", 2, ms(100))]),
        WaveDefinition::new("Second", ms(500), vec![SpawnGroup::new("chaser", 1, ms(100))]),
    ]
}

#[test]
fn cleared_wave_opens_intermission() {
    let mut harness = Harness::new(single_wave(3, ms(100))).with_intermission();
    harness.start();
    assert_eq!(harness.phase(), Phase::Playing);
    assert_eq!(query::current_wave(&harness.machine), 1);
    assert_eq!(query::enemies_alive(&harness.machine), 0);

    for _ in 0..4 {
        harness.tick(ms(100));
    }
    assert_eq!(harness.spawned.len(), 3);
    assert_eq!(query::enemies_alive(&harness.machine), 3);
    assert_eq!(harness.waves.step(), WaveStep::WaitingClear);
    assert_eq!(harness.count(EventKind::WaveCleared), 0);

    harness.kill_all();
    assert_eq!(query::enemies_alive(&harness.machine), 0);
    harness.tick(Duration::ZERO);

    assert!(harness
        .events
        .borrow()
        .contains(&Event::WaveCleared { index: 0 }));
    assert_eq!(harness.phase(), Phase::Intermission);
    assert!(query::is_input_locked(&harness.machine));
    assert_eq!(
        harness.waves.step(),
        WaveStep::WaitingIntermission { opened: true }
    );
}

#[test]
fn wave_never_clears_before_spawning_completes() {
    let mut harness = Harness::new(single_wave(3, ms(100))).with_intermission();
    harness.start();

    // First two requests: at wave start and 100ms later.
    harness.tick(ms(100));
    harness.kill_all();
    harness.tick(Duration::ZERO);
    assert_eq!(query::enemies_alive(&harness.machine), 0);
    assert_eq!(harness.count(EventKind::WaveCleared), 0);

    // Last request, followed by its trailing interval.
    harness.tick(ms(100));
    harness.kill_all();
    harness.tick(Duration::ZERO);
    assert_eq!(harness.count(EventKind::WaveCleared), 0);

    harness.tick(ms(100));
    assert_eq!(harness.count(EventKind::WaveCleared), 1);
    assert_eq!(harness.count(EventKind::EnemySpawned), 3);
    assert_eq!(harness.count(EventKind::EnemyDespawned), 3);
}

#[test]
fn waves_wait_for_intermission_confirmation() {
    let mut harness = Harness::new(two_waves()).with_intermission();
    harness.start();
    for _ in 0..3 {
        harness.tick(ms(100));
    }
    harness.kill_all();
    harness.tick(Duration::ZERO);
    assert_eq!(harness.phase(), Phase::Intermission);

    for _ in 0..20 {
        harness.tick(ms(100));
    }
    assert_eq!(harness.count(EventKind::WaveStarted), 1);
    assert_eq!(harness.waves.current_wave_index(), Some(0));

    harness.machine.confirm_intermission(&mut harness.bus);
    harness.tick(Duration::ZERO);
    assert_eq!(
        harness.waves.step(),
        WaveStep::WaitingStartDelay { remaining: ms(500) }
    );

    harness.tick(ms(499));
    assert_eq!(harness.count(EventKind::WaveStarted), 1);
    harness.tick(ms(1));
    assert!(harness
        .events
        .borrow()
        .contains(&Event::WaveStarted { index: 1 }));
    assert_eq!(query::current_wave(&harness.machine), 2);
    assert_eq!(harness.spawned.len(), 1);
}

#[test]
fn without_consumers_waves_advance_directly() {
    let mut harness = Harness::new(two_waves());
    harness.start();
    for _ in 0..3 {
        harness.tick(ms(100));
    }
    harness.kill_all();
    harness.tick(Duration::ZERO);

    assert_eq!(harness.count(EventKind::WaveCleared), 1);
    assert_eq!(harness.count(EventKind::IntermissionOpened), 0);
    assert_eq!(harness.phase(), Phase::Playing);
    assert_eq!(harness.waves.current_wave_index(), Some(1));
}

#[test]
fn last_wave_finishes_the_sequence() {
    let mut harness = Harness::new(single_wave(1, ms(100)));
    harness.start();
    harness.tick(ms(100));
    harness.kill_all();
    harness.tick(Duration::ZERO);

    assert!(harness.waves.is_finished());
    assert!(!harness.waves.is_running());
    assert_eq!(harness.phase(), Phase::Playing);
}

#[test]
fn game_over_terminates_the_sequence() {
    let mut harness = Harness::new(single_wave(10, ms(100)));
    harness.start();
    harness.tick(ms(100));
    harness.tick(ms(100));
    let issued = harness.spawned.len();

    harness.machine.trigger_game_over("PlayerDied", &mut harness.bus);
    harness.tick(ms(100));
    assert!(harness.waves.is_finished());

    harness.tick(ms(1_000));
    assert_eq!(harness.spawned.len(), issued);
}

#[test]
fn game_over_during_intermission_terminates() {
    let mut harness = Harness::new(two_waves()).with_intermission();
    harness.start();
    for _ in 0..3 {
        harness.tick(ms(100));
    }
    harness.kill_all();
    harness.tick(Duration::ZERO);
    assert_eq!(harness.phase(), Phase::Intermission);

    harness.machine.trigger_game_over("PlayerDied", &mut harness.bus);
    harness.tick(Duration::ZERO);
    assert!(harness.waves.is_finished());
    assert_eq!(harness.count(EventKind::WaveStarted), 1);
}

#[test]
fn stop_all_halts_scheduling_without_rollback() {
    let mut harness = Harness::new(single_wave(5, ms(100)));
    harness.start();
    harness.tick(ms(100));
    harness.tick(ms(100));
    let issued = harness.spawned.len();
    assert!(issued > 0);

    harness.waves.stop_all();
    assert_eq!(harness.waves.step(), WaveStep::Idle);
    harness.tick(ms(1_000));
    assert_eq!(harness.spawned.len(), issued);
    assert_eq!(harness.waves.tracked_count(), issued);

    harness.kill_all();
    assert_eq!(query::enemies_alive(&harness.machine), 0);
}

#[test]
fn pause_suspends_spawning() {
    let mut harness = Harness::new(single_wave(5, ms(100)));
    harness.start();
    harness.tick(ms(100));
    let before = harness.spawned.len();

    harness.machine.set_paused(true, &mut harness.bus);
    for _ in 0..10 {
        harness.tick(ms(100));
    }
    assert_eq!(harness.spawned.len(), before);

    harness.machine.set_paused(false, &mut harness.bus);
    harness.tick(ms(100));
    assert!(harness.spawned.len() > before);
}

#[test]
fn boss_runs_alongside_groups() {
    let wave = WaveDefinition::new(
        "Boss",
        Duration::ZERO,
        vec![
            SpawnGroup::new("chaser", 2, ms(100)),
            SpawnGroup::new("idle", 0, ms(100)),
        ],
    )
    .with_boss(BossGroup::new("brute", 1, ms(500)));
    let mut harness = Harness::new(vec![wave]);
    harness.start();

    harness.tick(Duration::ZERO);
    assert_eq!(harness.spawned.len(), 2, "first chaser and the boss");
    assert!(harness.pool.entry(&ResourceKey::new("brute")).is_some());
    assert!(harness.pool.entry(&ResourceKey::new("idle")).is_none());

    harness.tick(ms(100));
    assert_eq!(harness.spawned.len(), 3);
    assert_eq!(harness.waves.step(), WaveStep::Spawning);

    harness.tick(ms(400));
    assert_eq!(harness.waves.step(), WaveStep::WaitingClear);
}

#[test]
fn zero_interval_spawns_once_per_tick() {
    let mut harness = Harness::new(single_wave(3, Duration::ZERO));
    harness.start();

    harness.tick(ms(100));
    assert_eq!(harness.spawned.len(), 1);
    harness.tick(Duration::ZERO);
    assert_eq!(harness.spawned.len(), 2);
    harness.tick(Duration::ZERO);
    assert_eq!(harness.spawned.len(), 3);
}

#[test]
fn duplicate_death_reports_are_ignored() {
    let mut harness = Harness::new(single_wave(2, ms(100)));
    harness.start();
    harness.tick(ms(100));
    harness.tick(ms(100));
    let first = harness.spawned[0];
    let stranger = harness
        .pool
        .instantiate_detached(&ResourceKey::new("chaser"), Placement::default());

    let (machine, bus) = (&mut harness.machine, &mut harness.bus);
    assert!(harness.waves.report_death(first, machine, bus));
    assert!(!harness.waves.report_death(first, machine, bus));
    assert!(!harness.waves.report_death(stranger, machine, bus));
    assert_eq!(query::enemies_alive(&harness.machine), 1);
}

#[test]
fn late_report_for_a_reused_instance_is_ignored() {
    let mut harness = Harness::new(single_wave(2, ms(100)));
    let _ = harness
        .pool
        .configure(&ResourceKey::new("chaser"), EntryConfig::new(0, 1, false, 1));
    harness.start();

    harness.tick(ms(100));
    assert_eq!(harness.spawned.len(), 1);
    let first = harness.spawned[0];
    assert!(harness
        .waves
        .report_death(first, &mut harness.machine, &mut harness.bus));
    let _ = harness.pool.release(first);

    harness.tick(ms(100));
    assert_eq!(harness.spawned.len(), 2);
    let second = harness.spawned[1];
    assert_eq!(second.instance(), first.instance());
    assert_eq!(query::enemies_alive(&harness.machine), 1);

    assert!(!harness
        .waves
        .report_death(first, &mut harness.machine, &mut harness.bus));
    assert_eq!(query::enemies_alive(&harness.machine), 1);

    harness.tick(ms(100));
    harness.tick(ms(100));
    assert_eq!(harness.count(EventKind::WaveCleared), 0);
    assert!(harness.pool.is_active(second));
}

#[test]
fn empty_wave_list_disables_orchestration() {
    let mut harness = Harness::new(Vec::new());
    harness.machine.start_run(1, &mut harness.bus);
    assert!(!harness.waves.begin_run());
    assert!(!harness.waves.is_running());

    harness.tick(ms(1_000));
    assert!(harness.spawned.is_empty());
    assert_eq!(harness.count(EventKind::WaveStarted), 0);
}

#[test]
fn exhausted_pool_drops_requests() {
    let mut harness = Harness::new(single_wave(3, ms(100)));
    let _ = harness
        .pool
        .configure(&ResourceKey::new("chaser"), EntryConfig::new(0, 1, false, 1));
    harness.start();

    for _ in 0..4 {
        harness.tick(ms(100));
    }
    assert_eq!(harness.spawned.len(), 1);
    assert_eq!(harness.count(EventKind::EnemySpawned), 1);
    assert_eq!(harness.waves.step(), WaveStep::WaitingClear);
}

#[test]
fn new_run_forgets_previous_instances() {
    let mut harness = Harness::new(single_wave(2, ms(100)));
    harness.start();
    harness.tick(ms(100));
    assert_eq!(harness.spawned.len(), 2);

    harness.machine.trigger_game_over("x", &mut harness.bus);
    harness.tick(Duration::ZERO);
    assert!(harness.waves.is_finished());

    harness.machine.restart_run(&mut harness.bus);
    assert!(harness.waves.begin_run());
    assert_eq!(harness.waves.tracked_count(), 0);

    let stale = harness.spawned[0];
    assert!(!harness
        .waves
        .report_death(stale, &mut harness.machine, &mut harness.bus));
    assert_eq!(query::enemies_alive(&harness.machine), 0);
}
