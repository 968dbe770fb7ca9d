/*!
 * Orchestrator
 *
 * Owns every WorkerUnit of a session and the single SharedAggregate they share.
 * Group commands fan out to the units; per-unit commands address them by id.
 * Display clients only call the read-only snapshot accessors.
 *
 * # Sessions
 *
 * A session opens on the first start (group or per-unit) and closes on
 * `stop_all`. Mode changes and resets are refused while a session is open,
 * even if every unit has since stopped on its own.
 */

use super::aggregate::{AggregateStatus, SharedAggregate};
use super::report::{ReconciliationReport, SimulationSnapshot};
use super::types::{SyncMode, TickOutcome, WorkerState};
use super::worker::{UnitStatus, WorkerUnit};
use crate::core::config::{RaceAmplification, SimulationConfig, WorkerConfig};
use crate::core::errors::{SimulationError, SimulationResult};
use crate::core::types::UnitId;
use crate::fleet::MobileUnit;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// Builder for Orchestrator
pub struct OrchestratorBuilder {
    mode: SyncMode,
    race: RaceAmplification,
    worker: WorkerConfig,
    units: Vec<Arc<dyn MobileUnit>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            mode: SyncMode::default(),
            race: RaceAmplification::default(),
            worker: WorkerConfig::default(),
            units: Vec::new(),
        }
    }

    /// Take mode, race amplification and worker settings from a config
    pub fn with_config(mut self, config: &SimulationConfig) -> Self {
        self.mode = config.mode;
        self.race = config.race;
        self.worker = config.worker;
        self
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_race(mut self, race: RaceAmplification) -> Self {
        self.race = race;
        self
    }

    pub fn with_worker_config(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    pub fn with_unit(mut self, unit: Arc<dyn MobileUnit>) -> Self {
        self.units.push(unit);
        self
    }

    pub fn with_units<I>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn MobileUnit>>,
    {
        self.units.extend(units);
        self
    }

    /// Build the Orchestrator; fails on duplicate unit ids or invalid settings
    pub fn build(self) -> SimulationResult<Orchestrator> {
        self.worker.validate()?;

        let orchestrator = Orchestrator {
            units: DashMap::new(),
            aggregate: Arc::new(SharedAggregate::with_race(self.mode, self.race)),
            worker: self.worker,
            session_active: AtomicBool::new(false),
            session_id: RwLock::new(Uuid::new_v4()),
        };
        for unit in self.units {
            orchestrator.add_unit(unit)?;
        }

        info!(
            units = orchestrator.units.len(),
            mode = %self.mode,
            tick_ms = self.worker.tick_interval.as_millis() as u64,
            "Orchestrator initialized"
        );
        Ok(orchestrator)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of the workers and the shared aggregate of one simulation
pub struct Orchestrator {
    units: DashMap<UnitId, Arc<WorkerUnit>>,
    aggregate: Arc<SharedAggregate>,
    worker: WorkerConfig,
    session_active: AtomicBool,
    session_id: RwLock<Uuid>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Orchestrator with default settings and no units
    pub fn new(mode: SyncMode) -> Self {
        Orchestrator {
            units: DashMap::new(),
            aggregate: Arc::new(SharedAggregate::new(mode)),
            worker: WorkerConfig::default(),
            session_active: AtomicBool::new(false),
            session_id: RwLock::new(Uuid::new_v4()),
        }
    }

    /// Register a mobile unit; its worker starts out Stopped
    pub fn add_unit(&self, unit: Arc<dyn MobileUnit>) -> SimulationResult<()> {
        let id = unit.id().to_string();
        match self.units.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SimulationError::DuplicateUnit(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let worker = WorkerUnit::new(unit, Arc::clone(&self.aggregate), self.worker);
                slot.insert(Arc::new(worker));
                Ok(())
            }
        }
    }

    #[inline]
    pub fn aggregate(&self) -> &Arc<SharedAggregate> {
        &self.aggregate
    }

    pub fn unit(&self, id: &str) -> SimulationResult<Arc<WorkerUnit>> {
        self.units
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SimulationError::UnitNotFound(id.to_string()))
    }

    /// Workers ordered by unit id
    pub fn workers(&self) -> Vec<Arc<WorkerUnit>> {
        let mut workers: Vec<Arc<WorkerUnit>> =
            self.units.iter().map(|entry| Arc::clone(entry.value())).collect();
        workers.sort_by(|a, b| a.id().cmp(b.id()));
        workers
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[inline]
    pub fn is_session_active(&self) -> bool {
        self.session_active.load(Ordering::Acquire)
    }

    pub fn session_id(&self) -> String {
        self.session_id.read().to_string()
    }

    fn open_session(&self) {
        if !self.session_active.swap(true, Ordering::AcqRel) {
            let id = Uuid::new_v4();
            *self.session_id.write() = id;
            info!(session = %id, mode = %self.aggregate.mode(), units = self.len(), "Session started");
        }
    }

    // =========================================================================
    // GROUP LIFECYCLE
    // =========================================================================

    /// Start every Stopped unit and wake every Paused one
    pub fn start_all(&self) -> SimulationResult<()> {
        self.open_session();
        let _span = info_span!("start_all", session = %self.session_id()).entered();

        let mut first_error = None;
        for worker in self.workers() {
            if let Err(e) = worker.start() {
                warn!(unit = worker.id(), error = %e, "Failed to start unit");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Pause every running unit
    pub fn pause_all(&self) {
        info!("Pausing all units");
        for worker in self.active_workers() {
            // A unit may stop on its own between the listing and the command
            let _ = worker.pause();
        }
    }

    /// Resume every paused unit
    pub fn resume_all(&self) {
        info!("Resuming all units");
        for worker in self.active_workers() {
            let _ = worker.resume();
        }
    }

    /// Stop every unit, close the session and reconcile
    pub fn stop_all(&self) -> ReconciliationReport {
        let session = self.session_id();
        let _span = info_span!("stop_all", session = %session).entered();

        for worker in self.workers() {
            worker.stop();
        }
        self.session_active.store(false, Ordering::Release);

        let report = ReconciliationReport::new(session, &self.unit_statuses(), self.aggregate.status());
        info!(
            mode = %report.mode,
            total = report.aggregate_total,
            submitted = report.submitted_sum,
            lost = report.lost_distance,
            updates = report.update_count,
            anomalies = report.anomaly_count,
            "Session stopped"
        );
        report
    }

    /// Block until every unit is Stopped (e.g. after hitting its tick limit)
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.workers().iter().all(|worker| {
            let remaining = deadline.saturating_duration_since(Instant::now());
            worker.wait_until_stopped(remaining)
        })
    }

    /// Run `ticks` rounds of single-threaded steps, one tick per unit per round
    pub fn step_all(&self, ticks: u64) -> SimulationResult<Vec<TickOutcome>> {
        if self.is_session_active() {
            return Err(SimulationError::invalid_state(
                "cannot step units while a session is running",
            ));
        }

        let workers = self.workers();
        if workers.is_empty() {
            return Ok(Vec::new());
        }
        usize::try_from(ticks)
            .ok()
            .and_then(|rounds| rounds.checked_mul(workers.len()))
            .ok_or_else(|| {
                SimulationError::Config(format!(
                    "{} rounds over {} units exceeds the addressable outcome count",
                    ticks,
                    workers.len()
                ))
            })?;

        let mut outcomes = Vec::new();
        for _ in 0..ticks {
            for worker in &workers {
                outcomes.push(worker.step()?);
            }
        }
        Ok(outcomes)
    }

    // =========================================================================
    // PER-UNIT LIFECYCLE
    // =========================================================================

    pub fn start_unit(&self, id: &str) -> SimulationResult<()> {
        let worker = self.unit(id)?;
        self.open_session();
        worker.start()
    }

    pub fn pause_unit(&self, id: &str) -> SimulationResult<()> {
        self.unit(id)?.pause()
    }

    pub fn resume_unit(&self, id: &str) -> SimulationResult<()> {
        self.unit(id)?.resume()
    }

    pub fn stop_unit(&self, id: &str) -> SimulationResult<()> {
        self.unit(id)?.stop();
        Ok(())
    }

    pub fn refuel_unit(&self, id: &str, amount: f64) -> SimulationResult<()> {
        self.unit(id)?.refuel(amount)
    }

    // =========================================================================
    // CONFIGURATION COMMANDS
    // =========================================================================

    /// Change the aggregate's synchronization mode between sessions
    pub fn set_global_mode(&self, mode: SyncMode) -> SimulationResult<()> {
        self.ensure_no_session("change synchronization mode")?;
        self.aggregate.set_mode(mode)
    }

    pub fn set_race_amplification(&self, race: RaceAmplification) -> SimulationResult<()> {
        self.ensure_no_session("change race amplification")?;
        self.aggregate.set_race_amplification(race)
    }

    /// Zero the aggregate and restart per-unit session accounting
    pub fn reset(&self) -> SimulationResult<()> {
        self.ensure_no_session("reset the aggregate")?;
        self.aggregate.reset()?;
        for worker in self.workers() {
            worker.rebaseline();
        }
        Ok(())
    }

    fn ensure_no_session(&self, action: &str) -> SimulationResult<()> {
        if self.is_session_active() {
            return Err(SimulationError::InvalidState(format!(
                "cannot {} during an active session; stop all units first",
                action
            )));
        }
        Ok(())
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    pub fn unit_status(&self, id: &str) -> SimulationResult<UnitStatus> {
        Ok(self.unit(id)?.status())
    }

    pub fn unit_statuses(&self) -> Vec<UnitStatus> {
        self.workers().iter().map(|worker| worker.status()).collect()
    }

    pub fn aggregate_status(&self) -> AggregateStatus {
        self.aggregate.status()
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            session_id: self.session_id(),
            session_active: self.is_session_active(),
            aggregate: self.aggregate.status(),
            units: self.unit_statuses(),
        }
    }

    fn active_workers(&self) -> Vec<Arc<WorkerUnit>> {
        self.workers()
            .into_iter()
            .filter(|worker| worker.state() != WorkerState::Stopped)
            .collect()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for entry in self.units.iter() {
            entry.value().stop();
        }
    }
}
