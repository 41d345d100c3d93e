#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Arena Rush session engine.
//!
//! This crate defines the message surface that connects the host loop, the
//! authoritative session state, and the pure systems. The host submits
//! [`Command`] values describing desired phase changes, the session executes
//! them through its `apply` entry point, and every accepted change is
//! published as an [`Event`] on the [`EventBus`]. Systems read the current
//! [`Phase`] through [`PhaseView`] and advance only when the host hands them a
//! [`ClockStep`].

use std::{fmt, time::Duration};

use glam::Vec2;
use serde::{Deserialize, Serialize};

mod bus;
mod waves;

pub use bus::{EventBus, SubscriberId};
pub use waves::{BossGroup, SpawnGroup, WaveDefinition};

/// Session-wide phase governing whether spawning and input are legal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Initial phase before a run has been started.
    #[default]
    Boot,
    /// Active combat where spawning and input are permitted.
    Playing,
    /// Upgrade-selection pause between two waves.
    Intermission,
    /// Player-requested pause.
    Paused,
    /// Terminal phase entered once the run has ended.
    GameOver,
}

impl Phase {
    /// Reports whether player input is locked while the phase is active.
    #[must_use]
    pub const fn locks_input(self) -> bool {
        matches!(self, Self::Intermission | Self::Paused | Self::GameOver)
    }

    /// Reports whether the scaled simulation clock freezes in this phase.
    #[must_use]
    pub const fn freezes_simulation(self) -> bool {
        self.locks_input()
    }

    /// Reports whether gameplay (and therefore spawning) is permitted.
    #[must_use]
    pub const fn is_playable(self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Reports whether the phase only exits through an explicit restart.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::GameOver)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Boot => "Boot",
            Self::Playing => "Playing",
            Self::Intermission => "Intermission",
            Self::Paused => "Paused",
            Self::GameOver => "GameOver",
        };
        f.write_str(label)
    }
}

/// Read-only access to the session phase used by systems that must respect it.
pub trait PhaseView {
    /// Phase currently active in the session.
    fn current_phase(&self) -> Phase;

    /// Reports whether player input is currently locked.
    fn is_input_locked(&self) -> bool;

    /// Reports whether gameplay is currently permitted.
    fn is_playable(&self) -> bool {
        self.current_phase().is_playable()
    }
}

/// Identifies which virtual clock a timed operation is measured on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClockKind {
    /// Clock that freezes during intermission, pause, and game over.
    #[default]
    Scaled,
    /// Clock that keeps advancing regardless of phase.
    Unscaled,
}

/// Simulated time that elapsed on both virtual clocks during one host tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockStep {
    scaled: Duration,
    unscaled: Duration,
}

impl ClockStep {
    /// Creates a step from explicit scaled and unscaled deltas.
    #[must_use]
    pub const fn new(scaled: Duration, unscaled: Duration) -> Self {
        Self { scaled, unscaled }
    }

    /// Creates a step where both clocks advanced by the same amount.
    #[must_use]
    pub const fn uniform(dt: Duration) -> Self {
        Self::new(dt, dt)
    }

    /// Time elapsed on the scaled clock.
    #[must_use]
    pub const fn scaled(&self) -> Duration {
        self.scaled
    }

    /// Time elapsed on the unscaled clock.
    #[must_use]
    pub const fn unscaled(&self) -> Duration {
        self.unscaled
    }

    /// Time elapsed on the requested clock.
    #[must_use]
    pub const fn on(&self, clock: ClockKind) -> Duration {
        match clock {
            ClockKind::Scaled => self.scaled,
            ClockKind::Unscaled => self.unscaled,
        }
    }
}

/// Commands that express all permissible session phase mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Starts a run from the boot phase.
    StartRun {
        /// Wave number recorded as the run's starting wave.
        start_wave: u32,
    },
    /// Pauses or resumes gameplay.
    SetPaused {
        /// `true` to pause, `false` to resume.
        paused: bool,
    },
    /// Opens the upgrade-selection intermission after a cleared wave.
    RequestIntermission,
    /// Confirms the intermission so gameplay resumes.
    ConfirmIntermission,
    /// Ends the run.
    TriggerGameOver {
        /// Free-form description of why the run ended.
        reason: String,
    },
    /// Resets the session after game over and starts a fresh run.
    RestartRun,
}

/// Notifications published on the [`EventBus`].
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A run started and the session entered the playing phase.
    RunStarted,
    /// The run ended; published right after [`Event::GameOver`].
    RunEnded,
    /// A wave began spawning.
    WaveStarted {
        /// Zero-based index of the wave definition.
        index: usize,
    },
    /// Every enemy of a wave has died after spawning completed.
    WaveCleared {
        /// Zero-based index of the wave definition.
        index: usize,
    },
    /// The upgrade-selection intermission opened.
    IntermissionOpened,
    /// An enemy spawned successfully.
    EnemySpawned {
        /// Number of enemies alive after the spawn.
        alive: u32,
    },
    /// A tracked enemy died.
    EnemyDespawned {
        /// Number of enemies alive after the death.
        alive: u32,
    },
    /// The session moved between two phases.
    PhaseChanged {
        /// Phase that was active before the transition.
        previous: Phase,
        /// Phase that is active after the transition.
        current: Phase,
    },
    /// The run ended; carries the final tally and best records.
    GameOver {
        /// Summary of the finished run.
        info: GameOverInfo,
    },
}

impl Event {
    /// Discriminant used to filter subscriptions.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::RunStarted => EventKind::RunStarted,
            Self::RunEnded => EventKind::RunEnded,
            Self::WaveStarted { .. } => EventKind::WaveStarted,
            Self::WaveCleared { .. } => EventKind::WaveCleared,
            Self::IntermissionOpened => EventKind::IntermissionOpened,
            Self::EnemySpawned { .. } => EventKind::EnemySpawned,
            Self::EnemyDespawned { .. } => EventKind::EnemyDespawned,
            Self::PhaseChanged { .. } => EventKind::PhaseChanged,
            Self::GameOver { .. } => EventKind::GameOver,
        }
    }
}

/// Payload-free tag for each [`Event`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Tag for [`Event::RunStarted`].
    RunStarted,
    /// Tag for [`Event::RunEnded`].
    RunEnded,
    /// Tag for [`Event::WaveStarted`].
    WaveStarted,
    /// Tag for [`Event::WaveCleared`].
    WaveCleared,
    /// Tag for [`Event::IntermissionOpened`].
    IntermissionOpened,
    /// Tag for [`Event::EnemySpawned`].
    EnemySpawned,
    /// Tag for [`Event::EnemyDespawned`].
    EnemyDespawned,
    /// Tag for [`Event::PhaseChanged`].
    PhaseChanged,
    /// Tag for [`Event::GameOver`].
    GameOver,
}

/// Final tally of a run published with [`Event::GameOver`].
#[derive(Clone, Debug, PartialEq)]
pub struct GameOverInfo {
    /// Wave the run reached.
    pub wave: u32,
    /// Seconds survived, measured on the scaled clock.
    pub survived_seconds: f32,
    /// Reason supplied to the game-over request.
    pub reason: String,
    /// Best wave after this run was taken into account.
    pub best_wave: u32,
    /// Best survival time after this run was taken into account.
    pub best_seconds: f32,
    /// Indicates whether this run set a new best wave.
    pub is_new_best_wave: bool,
    /// Indicates whether this run set a new best survival time.
    pub is_new_best_time: bool,
}

/// The two persisted best-record scalars.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BestRecord {
    /// Highest wave ever reached.
    pub best_wave: u32,
    /// Longest survival time ever recorded, in seconds.
    pub best_survived_seconds: f32,
}

/// Identifies a pooled resource type, e.g. an enemy archetype.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Creates a new resource key from the provided name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name backing the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier assigned to every materialized instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Creates a new instance identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Position and facing applied to an instance when it becomes active.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Placement {
    /// Arena position in world units.
    pub position: Vec2,
    /// Facing angle in radians.
    pub rotation: f32,
}

impl Placement {
    /// Creates a placement at the provided position with no rotation.
    #[must_use]
    pub const fn at(position: Vec2) -> Self {
        Self {
            position,
            rotation: 0.0,
        }
    }

    /// Returns a copy of the placement facing the provided angle.
    #[must_use]
    pub fn with_rotation(self, rotation: f32) -> Self {
        Self { rotation, ..self }
    }
}
