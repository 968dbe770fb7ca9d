/*!
 * Shared Aggregate
 *
 * One distance accumulator shared by every worker in a session, updated through
 * a strategy selected between sessions:
 *
 * - **None**: plain load, optional race amplification, plain store. Concurrent
 *   callers can overwrite each other's contribution (lost updates).
 * - **Mutex**: the whole read-modify-write runs inside a monitor mutex.
 * - **Lock**: the whole read-modify-write runs inside an explicitly acquired
 *   re-entrant lock.
 *
 * The total lives in an `AtomicF64` so the unsynchronized path is a genuine data
 * race on the *value* without being undefined behavior in the language sense.
 *
 * Workers hold a `SessionLease` for as long as their loop is alive. Mode and
 * reset changes are refused while any lease is outstanding.
 */

use crate::core::config::RaceAmplification;
use crate::core::errors::{SimulationError, SimulationResult};
use crate::core::limits::{ANOMALY_EPSILON, SYNC_LOG_INTERVAL};
use crate::core::types::AtomicF64;
use crate::simulation::types::SyncMode;
use parking_lot::{ReentrantMutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Update strategy, one variant per mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateStrategy {
    Unsynchronized(RaceAmplification),
    Monitor,
    ExplicitLock,
}

impl UpdateStrategy {
    fn select(mode: SyncMode, race: RaceAmplification) -> Self {
        match mode {
            SyncMode::None => UpdateStrategy::Unsynchronized(race),
            SyncMode::Mutex => UpdateStrategy::Monitor,
            SyncMode::Lock => UpdateStrategy::ExplicitLock,
        }
    }

    fn mode(&self) -> SyncMode {
        match self {
            UpdateStrategy::Unsynchronized(_) => SyncMode::None,
            UpdateStrategy::Monitor => SyncMode::Mutex,
            UpdateStrategy::ExplicitLock => SyncMode::Lock,
        }
    }
}

/// Point-in-time view of the aggregate for display clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AggregateStatus {
    pub total: f64,
    pub mode: SyncMode,
    pub update_count: u64,
    pub anomaly_count: u64,
    pub active_workers: usize,
}

/// Distance accumulator shared by all workers of a session
pub struct SharedAggregate {
    total: AtomicF64,
    update_count: AtomicU64,
    anomaly_count: AtomicU64,
    strategy: RwLock<UpdateStrategy>,
    race: RwLock<RaceAmplification>,
    monitor: Mutex<()>,
    explicit: ReentrantMutex<()>,
    leases: AtomicUsize,
}

impl SharedAggregate {
    pub fn new(mode: SyncMode) -> Self {
        Self::with_race(mode, RaceAmplification::default())
    }

    pub fn with_race(mode: SyncMode, race: RaceAmplification) -> Self {
        Self {
            total: AtomicF64::zero(),
            update_count: AtomicU64::new(0),
            anomaly_count: AtomicU64::new(0),
            strategy: RwLock::new(UpdateStrategy::select(mode, race)),
            race: RwLock::new(race),
            monitor: Mutex::new(()),
            explicit: ReentrantMutex::new(()),
            leases: AtomicUsize::new(0),
        }
    }

    /// Add `amount` to the total under the active strategy
    pub fn apply_delta(&self, amount: f64) {
        let strategy = *self.strategy.read();
        match strategy {
            UpdateStrategy::Unsynchronized(race) => self.apply_unsynchronized(amount, race),
            UpdateStrategy::Monitor => {
                let _guard = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
                self.apply_exclusive(amount, SyncMode::Mutex);
            }
            UpdateStrategy::ExplicitLock => {
                let guard = self.explicit.lock();
                self.apply_exclusive(amount, SyncMode::Lock);
                drop(guard);
            }
        }
    }

    fn apply_unsynchronized(&self, amount: f64, race: RaceAmplification) {
        let observed = self.total.load(Ordering::Relaxed);
        race.apply();
        let expected = observed + amount;
        self.total.store(expected, Ordering::Relaxed);
        self.update_count.fetch_add(1, Ordering::Relaxed);

        // Approximate detector: another writer landed between our store and this load
        let actual = self.total.load(Ordering::Relaxed);
        if (actual - expected).abs() > ANOMALY_EPSILON {
            self.anomaly_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                expected,
                actual,
                observed,
                amount,
                "Lost update detected on shared aggregate"
            );
        }
    }

    /// Read-modify-write; caller holds the mode's critical section
    fn apply_exclusive(&self, amount: f64, mode: SyncMode) {
        let before = self.total.load(Ordering::Acquire);
        let after = before + amount;
        self.total.store(after, Ordering::Release);
        let count = self.update_count.fetch_add(1, Ordering::Relaxed) + 1;

        if count % SYNC_LOG_INTERVAL == 0 {
            debug!(%mode, update = count, before, after, "Protected aggregate update");
        }
    }

    /// Current total, read under the active mode's discipline
    pub fn snapshot_total(&self) -> f64 {
        let strategy = *self.strategy.read();
        match strategy {
            UpdateStrategy::Unsynchronized(_) => self.total.load(Ordering::Acquire),
            UpdateStrategy::Monitor => {
                let _guard = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
                self.total.load(Ordering::Acquire)
            }
            UpdateStrategy::ExplicitLock => {
                let _guard = self.explicit.lock();
                self.total.load(Ordering::Acquire)
            }
        }
    }

    #[inline]
    pub fn mode(&self) -> SyncMode {
        self.strategy.read().mode()
    }

    #[inline]
    pub fn race_amplification(&self) -> RaceAmplification {
        *self.race.read()
    }

    #[inline]
    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn anomaly_count(&self) -> u64 {
        self.anomaly_count.load(Ordering::Relaxed)
    }

    /// Number of live worker loops holding a lease
    #[inline]
    pub fn active_workers(&self) -> usize {
        self.leases.load(Ordering::Acquire)
    }

    /// Switch strategy; refused while any worker is running or paused
    pub fn set_mode(&self, mode: SyncMode) -> SimulationResult<()> {
        self.ensure_idle("change synchronization mode")?;
        let race = *self.race.read();
        let previous = std::mem::replace(
            &mut *self.strategy.write(),
            UpdateStrategy::select(mode, race),
        );
        info!(from = %previous.mode(), to = %mode, "Synchronization mode changed");
        Ok(())
    }

    /// Tune the unsynchronized window; same precondition as `set_mode`
    pub fn set_race_amplification(&self, race: RaceAmplification) -> SimulationResult<()> {
        self.ensure_idle("change race amplification")?;
        *self.race.write() = race;
        let mut strategy = self.strategy.write();
        if let UpdateStrategy::Unsynchronized(_) = *strategy {
            *strategy = UpdateStrategy::Unsynchronized(race);
        }
        debug!(?race, "Race amplification updated");
        Ok(())
    }

    /// Zero total and counters, keeping the mode
    pub fn reset(&self) -> SimulationResult<()> {
        self.ensure_idle("reset the aggregate")?;
        self.total.store(0.0, Ordering::Release);
        self.update_count.store(0, Ordering::Relaxed);
        self.anomaly_count.store(0, Ordering::Relaxed);
        info!(mode = %self.mode(), "Shared aggregate reset");
        Ok(())
    }

    pub fn status(&self) -> AggregateStatus {
        AggregateStatus {
            total: self.snapshot_total(),
            mode: self.mode(),
            update_count: self.update_count(),
            anomaly_count: self.anomaly_count(),
            active_workers: self.active_workers(),
        }
    }

    /// Register a live worker loop; released when the lease drops
    pub fn acquire_lease(self: &Arc<Self>) -> SessionLease {
        self.leases.fetch_add(1, Ordering::AcqRel);
        SessionLease {
            aggregate: Arc::clone(self),
        }
    }

    fn ensure_idle(&self, action: &str) -> SimulationResult<()> {
        let active = self.active_workers();
        if active > 0 {
            return Err(SimulationError::InvalidState(format!(
                "cannot {} while {} worker(s) are running or paused",
                action, active
            )));
        }
        Ok(())
    }
}

impl Default for SharedAggregate {
    fn default() -> Self {
        Self::new(SyncMode::default())
    }
}

impl std::fmt::Debug for SharedAggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAggregate")
            .field("total", &self.total)
            .field("mode", &self.mode())
            .field("update_count", &self.update_count())
            .field("anomaly_count", &self.anomaly_count())
            .field("active_workers", &self.active_workers())
            .finish()
    }
}

/// Marks one worker loop as active on the aggregate
#[must_use = "the worker counts as active only while the lease is held"]
pub struct SessionLease {
    aggregate: Arc<SharedAggregate>,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.aggregate.leases.fetch_sub(1, Ordering::AcqRel);
    }
}
