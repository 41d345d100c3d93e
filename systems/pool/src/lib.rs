#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Bounded, keyed reuse of short-lived instances.
//!
//! A [`ResourcePool`] keeps one entry per [`ResourceKey`]. Each entry tracks
//! its active instances as a set and its inactive instances as a stack, so the
//! most recently released instance is the first one handed out again. Entries
//! are created lazily and live as long as the pool; they survive session
//! restarts. Exhaustion is reported as `None`, never as an error.

mod stats;

use std::{
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use arena_rush_core::{ClockKind, ClockStep, InstanceId, Placement, ResourceKey};
use serde::Deserialize;
use tracing::{debug, warn};

pub use crate::stats::{PoolReport, PoolStats};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

/// Behaviour required from anything the pool manages.
pub trait Poolable {
    /// Moves the instance to the placement it is being handed out at.
    fn apply_placement(&mut self, placement: Placement);

    /// Called after the instance became active.
    fn on_acquire(&mut self) {}

    /// Called before the instance leaves the active set.
    fn on_release(&mut self) {}
}

/// Materializes and tears down pooled instances.
pub trait InstanceFactory {
    /// Concrete instance type produced by the factory.
    type Instance: Poolable;

    /// Creates a fresh instance for `key`.
    fn create(&mut self, key: &ResourceKey, id: InstanceId) -> Self::Instance;

    /// Permanently destroys an instance the pool decided not to keep.
    fn destroy(&mut self, _key: &ResourceKey, _instance: Self::Instance) {}
}

/// Pool-wide behaviour switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    /// Logs a warning whenever an acquisition fails on a full entry.
    pub log_warnings: bool,
    /// Period of the automatic cull on the scaled clock, if any.
    pub auto_cull_interval: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            log_warnings: true,
            auto_cull_interval: None,
        }
    }
}

/// Limits applied to entries created lazily on first acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolDefaults {
    /// Maximum number of instances per entry.
    pub max_size: usize,
    /// Whether lazily-created entries may grow past `max_size`.
    pub auto_expand: bool,
    /// Inactive floor retained when culling.
    pub reserve: usize,
}

impl Default for PoolDefaults {
    fn default() -> Self {
        Self {
            max_size: 128,
            auto_expand: true,
            reserve: 0,
        }
    }
}

/// Explicit configuration for one resource key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Number of inactive instances materialized up front.
    pub prewarm: usize,
    /// Maximum number of instances; values below one are raised to one.
    pub max_size: usize,
    /// Whether the entry may grow past `max_size`.
    pub auto_expand: bool,
    /// Inactive floor retained when culling.
    pub reserve: usize,
}

impl EntryConfig {
    /// Creates a configuration from its four parameters.
    #[must_use]
    pub const fn new(prewarm: usize, max_size: usize, auto_expand: bool, reserve: usize) -> Self {
        Self {
            prewarm,
            max_size,
            auto_expand,
            reserve,
        }
    }
}

impl Default for EntryConfig {
    fn default() -> Self {
        let defaults = PoolDefaults::default();
        Self::new(0, defaults.max_size, defaults.auto_expand, defaults.reserve)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Owner {
    Entry(usize),
    Detached,
}

/// A live instance together with the pool and entry that own it.
///
/// Every acquisition carries a fresh lease, so a handle names one hand-out of
/// an instance rather than the instance itself. Once released, a handle no
/// longer resolves and any further release through it is ignored, even after
/// the same instance has been handed out again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PooledHandle {
    pool: u64,
    lease: u64,
    instance: InstanceId,
    owner: Owner,
}

impl PooledHandle {
    /// Identifier of the referenced instance.
    #[must_use]
    pub const fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Lease number of this hand-out; unique within the issuing pool.
    #[must_use]
    pub const fn lease(&self) -> u64 {
        self.lease
    }

    /// Reports whether the instance was created outside of any pool entry.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        matches!(self.owner, Owner::Detached)
    }
}

/// What a release did with the instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The instance was parked on the inactive stack.
    Pooled,
    /// The instance was handed back to the factory for destruction.
    Destroyed,
    /// The handle was not active; nothing happened.
    Ignored,
}

struct PoolEntry<T> {
    key: ResourceKey,
    max_size: usize,
    auto_expand: bool,
    reserve: usize,
    active: HashMap<InstanceId, u64>,
    inactive: Vec<InstanceId>,
    instances: HashMap<InstanceId, T>,
}

impl<T> PoolEntry<T> {
    fn new(key: ResourceKey, defaults: PoolDefaults) -> Self {
        Self {
            key,
            max_size: defaults.max_size.max(1),
            auto_expand: defaults.auto_expand,
            reserve: defaults.reserve,
            active: HashMap::new(),
            inactive: Vec::new(),
            instances: HashMap::new(),
        }
    }

    fn total(&self) -> usize {
        self.active.len() + self.inactive.len()
    }

    fn can_grow(&self) -> bool {
        self.auto_expand || self.total() < self.max_size
    }

    fn should_destroy_released(&self) -> bool {
        let pooled = self.inactive.len() + 1;
        pooled > self.max_size || (pooled > self.reserve && !self.auto_expand)
    }

    fn holds(&self, handle: &PooledHandle) -> bool {
        self.active.get(&handle.instance) == Some(&handle.lease)
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            key: self.key.clone(),
            active: self.active.len(),
            inactive: self.inactive.len(),
            max_size: self.max_size,
            auto_expand: self.auto_expand,
            reserve: self.reserve,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct PendingRelease {
    handle: PooledHandle,
    remaining: Duration,
    clock: ClockKind,
}

/// Keyed pool of reusable instances produced by an [`InstanceFactory`].
pub struct ResourcePool<F: InstanceFactory> {
    id: u64,
    factory: F,
    settings: PoolSettings,
    defaults: PoolDefaults,
    entries: Vec<PoolEntry<F::Instance>>,
    index: HashMap<ResourceKey, usize>,
    detached: HashMap<InstanceId, (ResourceKey, F::Instance)>,
    pending: Vec<PendingRelease>,
    next_instance: u64,
    next_lease: u64,
    cull_elapsed: Duration,
}

impl<F: InstanceFactory> ResourcePool<F> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(factory: F, settings: PoolSettings, defaults: PoolDefaults) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            factory,
            settings,
            defaults,
            entries: Vec::new(),
            index: HashMap::new(),
            detached: HashMap::new(),
            pending: Vec::new(),
            next_instance: 0,
            next_lease: 0,
            cull_elapsed: Duration::ZERO,
        }
    }

    /// Creates or updates the entry for `key` and tops up its inactive stack
    /// to `config.prewarm` instances.
    pub fn configure(&mut self, key: &ResourceKey, config: EntryConfig) -> usize {
        let slot = self.slot_for(key);
        let entry = &mut self.entries[slot];
        entry.max_size = config.max_size.max(1);
        entry.auto_expand = config.auto_expand;
        entry.reserve = config.reserve;

        if !entry.auto_expand {
            while entry.total() > entry.max_size {
                let Some(id) = entry.inactive.pop() else {
                    break;
                };
                if let Some(instance) = entry.instances.remove(&id) {
                    self.factory.destroy(&entry.key, instance);
                }
            }
        }

        debug!(
            key = %key,
            prewarm = config.prewarm,
            max_size = entry.max_size,
            auto_expand = entry.auto_expand,
            reserve = entry.reserve,
            "pool entry configured"
        );
        self.prewarm(key, config.prewarm)
    }

    /// Materializes inactive instances until `count` are parked for `key`,
    /// respecting the entry's capacity. Returns how many were created.
    pub fn prewarm(&mut self, key: &ResourceKey, count: usize) -> usize {
        let slot = self.slot_for(key);
        let entry = &mut self.entries[slot];
        let mut created = 0;
        while entry.inactive.len() < count && entry.can_grow() {
            let id = InstanceId::new(self.next_instance);
            self.next_instance += 1;
            let instance = self.factory.create(&entry.key, id);
            let _ = entry.instances.insert(id, instance);
            entry.inactive.push(id);
            created += 1;
        }
        created
    }

    /// Hands out an instance for `key` at `placement`, reusing the most
    /// recently released one when available. Returns `None` when the entry is
    /// full and may not expand.
    pub fn acquire(&mut self, key: &ResourceKey, placement: Placement) -> Option<PooledHandle> {
        let slot = self.slot_for(key);
        let entry = &mut self.entries[slot];

        let id = if let Some(id) = entry.inactive.pop() {
            id
        } else if entry.can_grow() {
            let id = InstanceId::new(self.next_instance);
            self.next_instance += 1;
            let instance = self.factory.create(&entry.key, id);
            let _ = entry.instances.insert(id, instance);
            id
        } else {
            if self.settings.log_warnings {
                warn!(key = %key, total = entry.total(), max = entry.max_size, "pool exhausted");
            }
            return None;
        };

        let lease = self.next_lease;
        self.next_lease += 1;
        let _ = entry.active.insert(id, lease);
        if let Some(instance) = entry.instances.get_mut(&id) {
            instance.apply_placement(placement);
            instance.on_acquire();
        }

        Some(PooledHandle {
            pool: self.id,
            lease,
            instance: id,
            owner: Owner::Entry(slot),
        })
    }

    /// Creates an instance that bypasses every pool entry. Releasing its handle
    /// destroys the instance.
    pub fn instantiate_detached(&mut self, key: &ResourceKey, placement: Placement) -> PooledHandle {
        let id = InstanceId::new(self.next_instance);
        self.next_instance += 1;
        let mut instance = self.factory.create(key, id);
        instance.apply_placement(placement);
        instance.on_acquire();
        let _ = self.detached.insert(id, (key.clone(), instance));
        let lease = self.next_lease;
        self.next_lease += 1;
        PooledHandle {
            pool: self.id,
            lease,
            instance: id,
            owner: Owner::Detached,
        }
    }

    /// Returns an instance to its entry, or destroys it when the entry is at
    /// capacity. Releasing a handle that is not active does nothing.
    pub fn release(&mut self, handle: PooledHandle) -> ReleaseOutcome {
        if !self.owns(&handle) {
            warn!(instance = handle.instance.get(), "release of a handle from another pool");
            return ReleaseOutcome::Ignored;
        }
        let slot = match handle.owner {
            Owner::Detached => return self.release_detached(handle.instance),
            Owner::Entry(slot) => slot,
        };
        let Some(entry) = self.entries.get_mut(slot) else {
            return ReleaseOutcome::Ignored;
        };

        if !entry.holds(&handle) {
            debug!(
                key = %entry.key,
                instance = handle.instance.get(),
                lease = handle.lease,
                "double release ignored"
            );
            return ReleaseOutcome::Ignored;
        }
        let _ = entry.active.remove(&handle.instance);

        if let Some(instance) = entry.instances.get_mut(&handle.instance) {
            instance.on_release();
        }

        if entry.should_destroy_released() {
            if let Some(instance) = entry.instances.remove(&handle.instance) {
                self.factory.destroy(&entry.key, instance);
            }
            ReleaseOutcome::Destroyed
        } else {
            entry.inactive.push(handle.instance);
            ReleaseOutcome::Pooled
        }
    }

    /// Schedules a release once `delay` has elapsed on the scaled clock.
    pub fn release_after(&mut self, handle: PooledHandle, delay: Duration) {
        self.release_after_on(handle, delay, ClockKind::Scaled);
    }

    /// Schedules a release once `delay` has elapsed on the given clock.
    ///
    /// The release is evaluated on the next [`ResourcePool::tick`] at the
    /// earliest, even for a zero delay.
    pub fn release_after_on(&mut self, handle: PooledHandle, delay: Duration, clock: ClockKind) {
        if !self.owns(&handle) {
            warn!(instance = handle.instance.get(), "delayed release of a handle from another pool");
            return;
        }
        self.pending.push(PendingRelease {
            handle,
            remaining: delay,
            clock,
        });
    }

    /// Advances scheduled releases and the automatic cull.
    pub fn tick(&mut self, step: ClockStep) {
        let mut due = Vec::new();
        self.pending.retain_mut(|pending| {
            pending.remaining = pending.remaining.saturating_sub(step.on(pending.clock));
            if pending.remaining.is_zero() {
                due.push(pending.handle);
                false
            } else {
                true
            }
        });
        for handle in due {
            let _ = self.release(handle);
        }

        if let Some(interval) = self.settings.auto_cull_interval.filter(|i| !i.is_zero()) {
            self.cull_elapsed = self.cull_elapsed.saturating_add(step.scaled());
            if self.cull_elapsed >= interval {
                self.cull_elapsed = Duration::ZERO;
                let culled = self.cull();
                if culled > 0 {
                    debug!(culled, "automatic pool cull");
                }
            }
        }
    }

    /// Destroys inactive instances above each entry's reserve. Returns the
    /// number destroyed.
    pub fn cull(&mut self) -> usize {
        let mut destroyed = 0;
        for entry in &mut self.entries {
            while entry.inactive.len() > entry.reserve {
                let Some(id) = entry.inactive.pop() else {
                    break;
                };
                if let Some(instance) = entry.instances.remove(&id) {
                    self.factory.destroy(&entry.key, instance);
                }
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Borrows an active instance.
    #[must_use]
    pub fn get(&self, handle: PooledHandle) -> Option<&F::Instance> {
        if !self.owns(&handle) {
            return None;
        }
        match handle.owner {
            Owner::Detached => self.detached.get(&handle.instance).map(|(_, instance)| instance),
            Owner::Entry(slot) => {
                let entry = self.entries.get(slot)?;
                if entry.holds(&handle) {
                    entry.instances.get(&handle.instance)
                } else {
                    None
                }
            }
        }
    }

    /// Mutably borrows an active instance.
    pub fn get_mut(&mut self, handle: PooledHandle) -> Option<&mut F::Instance> {
        if !self.owns(&handle) {
            return None;
        }
        match handle.owner {
            Owner::Detached => self
                .detached
                .get_mut(&handle.instance)
                .map(|(_, instance)| instance),
            Owner::Entry(slot) => {
                let entry = self.entries.get_mut(slot)?;
                if entry.holds(&handle) {
                    entry.instances.get_mut(&handle.instance)
                } else {
                    None
                }
            }
        }
    }

    /// Reports whether the handle still refers to a handed-out instance.
    #[must_use]
    pub fn is_active(&self, handle: PooledHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of releases waiting on a delay.
    #[must_use]
    pub fn pending_releases(&self) -> usize {
        self.pending.len()
    }

    /// Number of live detached instances.
    #[must_use]
    pub fn detached_count(&self) -> usize {
        self.detached.len()
    }

    /// Statistics for a single key, if an entry exists.
    #[must_use]
    pub fn entry(&self, key: &ResourceKey) -> Option<PoolStats> {
        self.index.get(key).map(|&slot| self.entries[slot].stats())
    }

    /// Per-key statistics for every entry. Has no side effects.
    #[must_use]
    pub fn stats(&self) -> PoolReport {
        PoolReport::new(self.entries.iter().map(PoolEntry::stats).collect())
    }

    /// Factory backing the pool.
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn owns(&self, handle: &PooledHandle) -> bool {
        handle.pool == self.id
    }

    fn slot_for(&mut self, key: &ResourceKey) -> usize {
        if let Some(&slot) = self.index.get(key) {
            return slot;
        }
        let slot = self.entries.len();
        self.entries.push(PoolEntry::new(key.clone(), self.defaults));
        let _ = self.index.insert(key.clone(), slot);
        debug!(key = %key, slot, "pool entry created");
        slot
    }

    fn release_detached(&mut self, id: InstanceId) -> ReleaseOutcome {
        match self.detached.remove(&id) {
            Some((key, mut instance)) => {
                instance.on_release();
                self.factory.destroy(&key, instance);
                ReleaseOutcome::Destroyed
            }
            None => ReleaseOutcome::Ignored,
        }
    }
}

impl<F: InstanceFactory> fmt::Debug for ResourcePool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("settings", &self.settings)
            .field("defaults", &self.defaults)
            .field("entries", &self.entries.len())
            .field("detached", &self.detached.len())
            .field("pending", &self.pending.len())
            .field("id", &self.id)
            .field("next_instance", &self.next_instance)
            .field("next_lease", &self.next_lease)
            .finish_non_exhaustive()
    }
}
