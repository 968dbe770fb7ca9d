/*!
 * Worker Lifecycle Tests
 * Start, pause, resume, and stop transitions of a single worker unit
 */

use highway_sim::{
    AtomicF64, MobileUnit, SharedAggregate, SimulationError, SyncMode, Vehicle, WorkerConfig,
    WorkerState, WorkerUnit,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Odometer that faults once it would pass `limit`
struct FaultyOdometer {
    distance: AtomicF64,
    limit: f64,
}

impl MobileUnit for FaultyOdometer {
    fn id(&self) -> &str {
        "faulty"
    }

    fn distance(&self) -> f64 {
        self.distance.load(Ordering::Acquire)
    }

    fn set_distance(&self, distance: f64) {
        if distance > self.limit {
            panic!("odometer fault at {}", distance);
        }
        self.distance.store(distance, Ordering::Release);
    }
}

fn fast_config() -> WorkerConfig {
    WorkerConfig::default().with_tick_interval(Duration::from_millis(5))
}

fn spawn_worker(id: &str, config: WorkerConfig) -> (WorkerUnit, Arc<SharedAggregate>) {
    let aggregate = Arc::new(SharedAggregate::new(SyncMode::Lock));
    let unit: Arc<dyn MobileUnit> = Arc::new(Vehicle::new(id));
    (WorkerUnit::new(unit, Arc::clone(&aggregate), config), aggregate)
}

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn test_start_runs_ticks() {
    let (worker, aggregate) = spawn_worker("bike", fast_config());
    worker.start().unwrap();
    assert_eq!(worker.state(), WorkerState::Running);
    assert_eq!(aggregate.active_workers(), 1);

    assert!(wait_for(Duration::from_secs(2), || worker.ticks() >= 3));
    worker.stop();

    assert_eq!(worker.state(), WorkerState::Stopped);
    assert_eq!(aggregate.active_workers(), 0);
    // Every tick went to both the unit and the aggregate
    assert_eq!(worker.unit().distance(), aggregate.snapshot_total());
}

#[test]
fn test_pause_freezes_distance_and_resume_continues() {
    let (worker, aggregate) = spawn_worker("car", fast_config());
    worker.start().unwrap();
    assert!(wait_for(Duration::from_secs(2), || worker.ticks() >= 2));

    worker.pause().unwrap();
    assert_eq!(worker.state(), WorkerState::Paused);
    assert_eq!(worker.status().label(), "Paused");

    // At most one in-flight tick completes after the request
    thread::sleep(Duration::from_millis(20));
    let frozen_distance = worker.unit().distance();
    let frozen_total = aggregate.snapshot_total();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(worker.unit().distance(), frozen_distance);
    assert_eq!(aggregate.snapshot_total(), frozen_total);

    // Pause while paused is a no-op
    worker.pause().unwrap();

    worker.resume().unwrap();
    assert_eq!(worker.state(), WorkerState::Running);
    assert!(wait_for(Duration::from_secs(2), || {
        worker.unit().distance() > frozen_distance
    }));
    worker.stop();
}

#[test]
fn test_start_on_paused_unit_resumes() {
    let (worker, _) = spawn_worker("car", fast_config());
    worker.start().unwrap();
    worker.pause().unwrap();

    worker.start().unwrap();
    assert_eq!(worker.state(), WorkerState::Running);

    // Start while running spawns nothing new
    worker.start().unwrap();
    worker.stop();
}

#[test]
fn test_stop_is_idempotent_from_any_state() {
    let (worker, aggregate) = spawn_worker("truck", fast_config());
    worker.stop();

    worker.start().unwrap();
    worker.pause().unwrap();
    worker.stop();
    worker.stop();

    assert_eq!(worker.state(), WorkerState::Stopped);
    assert_eq!(aggregate.active_workers(), 0);
    assert!(matches!(worker.resume(), Err(SimulationError::InvalidState(_))));
}

#[test]
fn test_restart_after_stop_keeps_counting() {
    let (worker, aggregate) = spawn_worker("bike", fast_config().with_tick_limit(3));

    worker.start().unwrap();
    assert!(worker.wait_until_stopped(Duration::from_secs(2)));
    assert_eq!(worker.ticks(), 3);

    worker.start().unwrap();
    assert!(worker.wait_until_stopped(Duration::from_secs(2)));
    assert_eq!(worker.ticks(), 6);
    assert_eq!(aggregate.snapshot_total(), 6.0);
}

#[test]
fn test_tick_limit_stops_loop_and_releases_lease() {
    let (worker, aggregate) = spawn_worker("car", fast_config().with_tick_limit(4));
    worker.start().unwrap();

    assert!(worker.wait_until_stopped(Duration::from_secs(2)));
    assert_eq!(worker.state(), WorkerState::Stopped);
    assert_eq!(worker.unit().distance(), 4.0);
    assert_eq!(aggregate.active_workers(), 0);
    assert!(aggregate.set_mode(SyncMode::None).is_ok());
}

#[test]
fn test_step_rejected_while_running() {
    let (worker, _) = spawn_worker("car", WorkerConfig::default());
    worker.start().unwrap();
    assert!(matches!(worker.step(), Err(SimulationError::InvalidState(_))));
    worker.stop();
}

#[test]
fn test_rebaseline_resets_session_accounting() {
    let (worker, _) = spawn_worker("car", WorkerConfig::default());
    worker.step().unwrap();
    worker.step().unwrap();
    assert_eq!(worker.session_distance(), 2.0);

    worker.rebaseline();
    assert_eq!(worker.session_distance(), 0.0);
    assert_eq!(worker.contributed(), 0.0);
    assert_eq!(worker.ticks(), 0);
    assert_eq!(worker.unit().distance(), 2.0);
}

#[test]
fn test_pause_then_resume_changes_nothing() {
    let config = WorkerConfig::default().with_tick_interval(Duration::from_secs(30));
    let (worker, aggregate) = spawn_worker("car", config);
    worker.start().unwrap();
    assert!(wait_for(Duration::from_secs(2), || worker.ticks() == 1));

    let distance = worker.unit().distance();
    let total = aggregate.snapshot_total();

    worker.pause().unwrap();
    worker.resume().unwrap();
    // Resume on a running unit is a no-op
    worker.resume().unwrap();

    assert_eq!(worker.unit().distance(), distance);
    assert_eq!(aggregate.snapshot_total(), total);
    assert_eq!(worker.state(), WorkerState::Running);
    worker.stop();
}

#[test]
fn test_panicking_loop_still_reaches_stopped() {
    let aggregate = Arc::new(SharedAggregate::new(SyncMode::Mutex));
    let unit: Arc<dyn MobileUnit> = Arc::new(FaultyOdometer {
        distance: AtomicF64::zero(),
        limit: 1.0,
    });
    let worker = WorkerUnit::new(unit, Arc::clone(&aggregate), fast_config());

    worker.start().unwrap();
    assert!(worker.wait_until_stopped(Duration::from_secs(2)));

    assert_eq!(worker.state(), WorkerState::Stopped);
    assert_eq!(worker.ticks(), 1);
    assert_eq!(aggregate.snapshot_total(), 1.0);
    assert_eq!(aggregate.active_workers(), 0);
    assert!(aggregate.set_mode(SyncMode::Lock).is_ok());

    // Nothing left to join
    worker.stop();
    assert_eq!(worker.state(), WorkerState::Stopped);
}

#[test]
fn test_start_right_after_tick_limit_always_restarts() {
    let config = WorkerConfig::default()
        .with_tick_interval(Duration::ZERO)
        .with_tick_limit(1);
    let (worker, aggregate) = spawn_worker("bike", config);

    // Each start lands as soon as the previous loop's last tick is visible
    for round in 1..=100u64 {
        worker.start().unwrap();
        assert!(
            wait_for(Duration::from_secs(2), || worker.ticks() == round),
            "start in round {} did not run a loop",
            round
        );
    }

    assert!(worker.wait_until_stopped(Duration::from_secs(2)));
    assert_eq!(aggregate.snapshot_total(), 100.0);
    assert_eq!(aggregate.active_workers(), 0);
}
