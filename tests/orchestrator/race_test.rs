/*!
 * Lost Update Tests
 * The unsynchronized mode demonstrably loses distance; the protected ones never do
 */

use highway_sim::{
    MobileUnit, Orchestrator, RaceAmplification, ReconciliationReport, SyncMode, Vehicle,
    WorkerConfig,
};
use std::sync::Arc;
use std::time::Duration;

const UNITS: usize = 3;
const TICKS: u64 = 10;
const TRIALS: usize = 20;

fn run_trial(mode: SyncMode) -> ReconciliationReport {
    let units: Vec<Arc<dyn MobileUnit>> = (0..UNITS)
        .map(|i| Arc::new(Vehicle::new(format!("unit-{}", i))) as Arc<dyn MobileUnit>)
        .collect();

    let orchestrator = Orchestrator::builder()
        .with_mode(mode)
        .with_race(RaceAmplification::Sleep(Duration::from_micros(100)))
        .with_worker_config(
            WorkerConfig::default()
                .with_tick_interval(Duration::ZERO)
                .with_tick_limit(TICKS),
        )
        .with_units(units)
        .build()
        .unwrap();

    orchestrator.start_all().unwrap();
    assert!(orchestrator.wait_until_stopped(Duration::from_secs(10)));
    orchestrator.stop_all()
}

#[test]
fn test_unsynchronized_mode_loses_updates() {
    let expected = (UNITS as u64 * TICKS) as f64;
    let mut lossy_trials = 0;

    for _ in 0..TRIALS {
        let report = run_trial(SyncMode::None);

        // Each unit's own distance is never racy
        assert_eq!(report.unit_distance_sum, expected);
        assert_eq!(report.submitted_sum, expected);
        assert_eq!(report.update_count, UNITS as u64 * TICKS);
        assert!(report.aggregate_total <= expected);

        if report.aggregate_total < expected {
            lossy_trials += 1;
            assert!(report.lost_distance > 0.0);
            assert!(!report.is_consistent());
        }
    }

    assert!(
        lossy_trials > 0,
        "expected at least one trial in {} to lose an update",
        TRIALS
    );
}

#[test]
fn test_protected_modes_never_lose_updates() {
    let expected = (UNITS as u64 * TICKS) as f64;

    for mode in [SyncMode::Mutex, SyncMode::Lock] {
        for _ in 0..5 {
            let report = run_trial(mode);
            assert_eq!(report.aggregate_total, expected, "mode {}", mode);
            assert_eq!(report.anomaly_count, 0);
            assert!(report.is_consistent());
        }
    }
}
