/*!
 * Worker Unit
 *
 * Drives one mobile unit on its own OS thread. Every tick the unit advances its
 * own distance, pays for it from its resource (if it has one), and contributes
 * the same distance to the shared aggregate.
 *
 * # State machine
 *
 * ```text
 * Stopped --start--> Running <--pause/resume--> Paused
 *    ^                  |                         |
 *    +------stop--------+-----------stop----------+
 * ```
 *
 * # Suspension points
 *
 * - **Paused**: the loop blocks on the lifecycle condvar until resume or stop.
 * - **Between ticks**: the loop waits on the same condvar with a deadline, so a
 *   stop interrupts the sleep instead of waiting out the interval.
 *
 * A tick is never rolled back. If the debit fails after the unit moved, the
 * unit keeps its distance, the aggregate is skipped, and the unit auto-pauses.
 */

use super::aggregate::{SessionLease, SharedAggregate};
use super::types::{PauseReason, TickOutcome, WorkerState};
use crate::core::config::WorkerConfig;
use crate::core::errors::{SimulationError, SimulationResult};
use crate::core::limits::WORKER_THREAD_PREFIX;
use crate::core::sync::StateCell;
use crate::core::types::AtomicF64;
use crate::fleet::MobileUnit;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Lifecycle state plus the reason for the current pause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Lifecycle {
    state: WorkerState,
    pause_reason: Option<PauseReason>,
}

impl Lifecycle {
    const fn running() -> Self {
        Self {
            state: WorkerState::Running,
            pause_reason: None,
        }
    }

    const fn paused(reason: PauseReason) -> Self {
        Self {
            state: WorkerState::Paused,
            pause_reason: Some(reason),
        }
    }

    const fn stopped() -> Self {
        Self {
            state: WorkerState::Stopped,
            pause_reason: None,
        }
    }
}

/// Point-in-time view of one unit for display clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UnitStatus {
    pub id: String,
    /// Odometer reading of the mobile unit
    pub distance: f64,
    /// Distance travelled since the session baseline
    pub session_distance: f64,
    /// Distance this worker submitted to the aggregate
    pub contributed: f64,
    pub ticks: u64,
    /// `None` when the unit has no resource
    pub resource_level: Option<f64>,
    pub state: WorkerState,
    pub pause_reason: Option<PauseReason>,
}

impl UnitStatus {
    /// Status label as shown by the display client
    pub fn label(&self) -> &'static str {
        match (self.state, self.pause_reason) {
            (WorkerState::Paused, Some(PauseReason::OutOfResource)) => "Out of Fuel",
            (WorkerState::Paused, _) => "Paused",
            (WorkerState::Running, _) => "Running",
            (WorkerState::Stopped, _) => "Stopped",
        }
    }
}

/// State shared between the handle and the loop thread
struct WorkerShared {
    unit: Arc<dyn MobileUnit>,
    aggregate: Arc<SharedAggregate>,
    config: WorkerConfig,
    lifecycle: StateCell<Lifecycle>,
    ticks: AtomicU64,
    contributed: AtomicF64,
    baseline: AtomicF64,
}

impl WorkerShared {
    fn id(&self) -> &str {
        self.unit.id()
    }

    /// One tick body: check resource, move, debit, contribute
    fn tick(&self) -> TickOutcome {
        let unit = &*self.unit;

        if let Some(resource) = unit.resource() {
            let level = resource.level();
            if level <= 0.0 {
                return TickOutcome::OutOfResource { level };
            }
        }

        let step = self.config.distance_per_tick;
        unit.set_distance(unit.distance() + step);

        if let Some(resource) = unit.resource() {
            let debit = self.config.debit_per_tick();
            if debit > 0.0 {
                if let Err(shortfall) = resource.debit(debit) {
                    return TickOutcome::DebitFailed {
                        required: shortfall.required,
                        available: shortfall.available,
                    };
                }
            }
        }

        self.aggregate.apply_delta(step);
        self.contributed.fetch_add(step, Ordering::AcqRel);

        trace!(
            unit = self.id(),
            distance = unit.distance(),
            level = unit.resource().map(|r| r.level()),
            "Tick complete"
        );
        TickOutcome::Advanced { distance: step }
    }

    /// Move Running -> Paused(OutOfResource); a concurrent stop wins
    fn auto_pause(&self, outcome: TickOutcome) {
        let (_, changed) = self.lifecycle.transition(|l| {
            (l.state == WorkerState::Running).then(|| Lifecycle::paused(PauseReason::OutOfResource))
        });
        if !changed {
            return;
        }

        match outcome {
            TickOutcome::DebitFailed { required, available } => {
                let err = SimulationError::ResourceExhausted {
                    unit: self.id().to_string(),
                    required,
                    available,
                };
                warn!(unit = self.id(), error = %err, "Resource debit failed - auto-paused");
            }
            _ => warn!(unit = self.id(), "Out of resource - auto-paused"),
        }
    }

    /// Sleep until the next tick; false if a stop arrived meanwhile
    fn sleep_until_next_tick(&self) -> bool {
        let interval = self.config.tick_interval;
        if interval.is_zero() {
            return self.lifecycle.get().state != WorkerState::Stopped;
        }
        let outcome = self
            .lifecycle
            .wait_while_until(Instant::now() + interval, |l| l.state != WorkerState::Stopped);
        outcome.state().state != WorkerState::Stopped
    }

    fn run_loop(self: Arc<Self>, lease: SessionLease) {
        let _exit = LoopExit {
            shared: self.as_ref(),
            lease: Some(lease),
        };
        let mut completed = 0u64;
        info!(unit = self.id(), "Worker loop started");

        loop {
            let current = self
                .lifecycle
                .wait_while(|l| l.state == WorkerState::Paused);
            if current.state == WorkerState::Stopped {
                break;
            }

            let outcome = self.tick();
            if !outcome.advanced() {
                self.auto_pause(outcome);
                continue;
            }

            completed += 1;
            let limit_reached = self.config.tick_limit.is_some_and(|limit| completed >= limit);

            // A caller that observes the last tick also observes Stopped
            self.lifecycle.update(|lifecycle| {
                self.ticks.fetch_add(1, Ordering::Relaxed);
                if limit_reached {
                    *lifecycle = Lifecycle::stopped();
                }
            });
            if limit_reached {
                debug!(unit = self.id(), ticks = completed, "Tick limit reached");
                break;
            }

            if !self.sleep_until_next_tick() {
                break;
            }
        }

        info!(unit = self.id(), ticks = completed, "Worker loop completed");
    }
}

/// Releases the lease and forces Stopped when the loop exits, including by panic
///
/// A loop that ends on its tick limit has already published Stopped; its lease
/// is released once the thread unwinds, so `start` and `wait_until_stopped` join
/// the thread before relying on the lease count.
struct LoopExit<'a> {
    shared: &'a WorkerShared,
    lease: Option<SessionLease>,
}

impl Drop for LoopExit<'_> {
    fn drop(&mut self) {
        // Release the lease before publishing Stopped
        drop(self.lease.take());
        self.shared.lifecycle.set(Lifecycle::stopped());
        if thread::panicking() {
            let err =
                SimulationError::Interrupted(format!("unit {} loop panicked", self.shared.id()));
            error!(unit = self.shared.id(), error = %err, "Worker loop aborted, unit forced to stopped");
        }
    }
}

/// One autonomous execution unit bound to a mobile unit and the shared aggregate
pub struct WorkerUnit {
    shared: Arc<WorkerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerUnit {
    pub fn new(
        unit: Arc<dyn MobileUnit>,
        aggregate: Arc<SharedAggregate>,
        config: WorkerConfig,
    ) -> Self {
        let baseline = unit.distance();
        Self {
            shared: Arc::new(WorkerShared {
                unit,
                aggregate,
                config,
                lifecycle: StateCell::new(Lifecycle::stopped()),
                ticks: AtomicU64::new(0),
                contributed: AtomicF64::zero(),
                baseline: AtomicF64::new(baseline),
            }),
            thread: Mutex::new(None),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        self.shared.id()
    }

    #[inline]
    pub fn state(&self) -> WorkerState {
        self.shared.lifecycle.get().state
    }

    #[inline]
    pub fn pause_reason(&self) -> Option<PauseReason> {
        self.shared.lifecycle.get().pause_reason
    }

    #[inline]
    pub fn unit(&self) -> &Arc<dyn MobileUnit> {
        &self.shared.unit
    }

    #[inline]
    pub fn config(&self) -> &WorkerConfig {
        &self.shared.config
    }

    /// Ticks that reached the aggregate since the last rebaseline
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    /// Distance submitted to the aggregate since the last rebaseline
    #[inline]
    pub fn contributed(&self) -> f64 {
        self.shared.contributed.load(Ordering::Acquire)
    }

    /// Odometer movement since the last rebaseline
    pub fn session_distance(&self) -> f64 {
        self.shared.unit.distance() - self.shared.baseline.load(Ordering::Acquire)
    }

    /// Start a fresh loop (Stopped) or wake a paused one; no-op when Running
    pub fn start(&self) -> SimulationResult<()> {
        let mut slot = self.thread.lock();

        let (prev, _) = self.shared.lifecycle.transition(|l| match l.state {
            WorkerState::Paused => Some(Lifecycle::running()),
            _ => None,
        });
        match prev.state {
            WorkerState::Running => return Ok(()),
            WorkerState::Paused => {
                info!(unit = self.id(), "Resumed via start");
                return Ok(());
            }
            WorkerState::Stopped => {}
        }

        // A loop that stopped itself may still be unwinding
        if let Some(stale) = slot.take() {
            self.join_loop(stale);
        }

        let lease = self.shared.aggregate.acquire_lease();
        self.shared.lifecycle.set(Lifecycle::running());

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("{}{}", WORKER_THREAD_PREFIX, self.id()))
            .spawn(move || shared.run_loop(lease));

        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                info!(unit = self.id(), mode = %self.shared.aggregate.mode(), "Started");
                Ok(())
            }
            Err(e) => {
                self.shared.lifecycle.set(Lifecycle::stopped());
                Err(SimulationError::Interrupted(format!(
                    "failed to spawn loop for unit {}: {}",
                    self.id(),
                    e
                )))
            }
        }
    }

    /// Request suspension before the next tick; idempotent while paused
    pub fn pause(&self) -> SimulationResult<()> {
        let (prev, changed) = self.shared.lifecycle.transition(|l| {
            (l.state == WorkerState::Running).then(|| Lifecycle::paused(PauseReason::Requested))
        });
        if prev.state == WorkerState::Stopped {
            return Err(SimulationError::invalid_state(format!(
                "cannot pause stopped unit {}",
                self.id()
            )));
        }
        if changed {
            info!(unit = self.id(), "Paused");
        }
        Ok(())
    }

    /// Wake a paused loop; idempotent while running
    pub fn resume(&self) -> SimulationResult<()> {
        let (prev, changed) = self.shared.lifecycle.transition(|l| {
            (l.state == WorkerState::Paused).then(Lifecycle::running)
        });
        if prev.state == WorkerState::Stopped {
            return Err(SimulationError::invalid_state(format!(
                "cannot resume stopped unit {}",
                self.id()
            )));
        }
        if changed {
            info!(unit = self.id(), "Resumed");
        }
        Ok(())
    }

    /// Stop the loop from any state and wait for the thread to exit; idempotent
    pub fn stop(&self) {
        let mut slot = self.thread.lock();
        let prev = self.shared.lifecycle.set(Lifecycle::stopped());

        if let Some(handle) = slot.take() {
            if handle.thread().id() == thread::current().id() {
                // Called from inside the loop; it exits on its own
                *slot = Some(handle);
            } else {
                self.join_loop(handle);
            }
        }

        if prev.state.is_active() {
            info!(unit = self.id(), "Stopped");
        }
    }

    /// Add resource; a unit auto-paused for lack of it resumes
    pub fn refuel(&self, amount: f64) -> SimulationResult<()> {
        let resource = self.shared.unit.resource().ok_or_else(|| {
            SimulationError::invalid_state(format!("unit {} has no resource to refuel", self.id()))
        })?;
        resource.add(amount)?;
        info!(unit = self.id(), amount, level = resource.level(), "Refueled");

        let (_, resumed) = self.shared.lifecycle.transition(|l| {
            (l.pause_reason == Some(PauseReason::OutOfResource)).then(Lifecycle::running)
        });
        if resumed {
            info!(unit = self.id(), "Resumed after refuel");
        }
        Ok(())
    }

    /// Run exactly one tick on the calling thread
    ///
    /// Only valid for a stopped unit with no loop; the unit is Running for the
    /// duration of the tick and Stopped again afterwards. Used for deterministic,
    /// single-threaded stepping.
    pub fn step(&self) -> SimulationResult<TickOutcome> {
        let slot = self.thread.lock();
        let (prev, changed) = self.shared.lifecycle.transition(|l| {
            (l.state == WorkerState::Stopped).then(Lifecycle::running)
        });
        if !changed {
            return Err(SimulationError::invalid_state(format!(
                "cannot step unit {} while {}",
                self.id(),
                prev.state
            )));
        }

        let _lease = self.shared.aggregate.acquire_lease();
        let outcome = self.shared.tick();
        if outcome.advanced() {
            self.shared.ticks.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.lifecycle.set(Lifecycle::stopped());
        drop(slot);

        if !outcome.advanced() {
            debug!(unit = self.id(), ?outcome, "Step did not reach the aggregate");
        }
        Ok(outcome)
    }

    /// Block until the unit is Stopped or `timeout` elapses; true when stopped
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let outcome = self
            .shared
            .lifecycle
            .wait_while_for(timeout, |l| l.state != WorkerState::Stopped);
        if outcome.timed_out() {
            return false;
        }
        if let Some(handle) = self.thread.lock().take() {
            self.join_loop(handle);
        }
        true
    }

    /// Restart session accounting from the current odometer reading
    pub fn rebaseline(&self) {
        self.shared
            .baseline
            .store(self.shared.unit.distance(), Ordering::Release);
        self.shared.contributed.store(0.0, Ordering::Release);
        self.shared.ticks.store(0, Ordering::Relaxed);
    }

    pub fn status(&self) -> UnitStatus {
        let lifecycle = self.shared.lifecycle.get();
        UnitStatus {
            id: self.id().to_string(),
            distance: self.shared.unit.distance(),
            session_distance: self.session_distance(),
            contributed: self.contributed(),
            ticks: self.ticks(),
            resource_level: self.shared.unit.resource().map(|r| r.level()),
            state: lifecycle.state,
            pause_reason: lifecycle.pause_reason,
        }
    }

    fn join_loop(&self, handle: JoinHandle<()>) {
        if handle.join().is_err() {
            let err = SimulationError::Interrupted(format!("unit {} loop panicked", self.id()));
            warn!(unit = self.id(), error = %err, "Joined aborted worker loop");
        }
    }
}

impl Drop for WorkerUnit {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WorkerUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerUnit")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("ticks", &self.ticks())
            .finish()
    }
}
