/*!
 * Orchestrator Session Tests
 * Group commands, per-unit commands, reconciliation, and session guards
 */

use highway_sim::{
    MobileUnit, Orchestrator, SimulationConfig, SimulationError, SyncMode, Vehicle, WorkerConfig,
    WorkerState,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn three_units() -> Vec<Arc<dyn MobileUnit>> {
    vec![
        Arc::new(Vehicle::new("car").with_fuel(100.0)),
        Arc::new(Vehicle::new("truck").with_fuel(100.0)),
        Arc::new(Vehicle::new("bike")),
    ]
}

fn orchestrator(mode: SyncMode, worker: WorkerConfig) -> Orchestrator {
    Orchestrator::builder()
        .with_mode(mode)
        .with_worker_config(worker)
        .with_units(three_units())
        .build()
        .unwrap()
}

#[test]
fn test_stepped_units_sum_exactly() {
    for mode in SyncMode::ALL {
        let orchestrator = orchestrator(mode, WorkerConfig::default());
        orchestrator.step_all(10).unwrap();

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.aggregate.total, 30.0, "mode {}", mode);
        assert_eq!(snapshot.aggregate.update_count, 30);
        for unit in &snapshot.units {
            assert_eq!(unit.distance, 10.0);
            assert_eq!(unit.state, WorkerState::Stopped);
        }
    }
}

#[test]
fn test_protected_session_reconciles_exactly() {
    let worker = WorkerConfig::default()
        .with_tick_interval(Duration::ZERO)
        .with_tick_limit(50);

    for mode in [SyncMode::Mutex, SyncMode::Lock] {
        let orchestrator = orchestrator(mode, worker);
        orchestrator.start_all().unwrap();
        assert!(orchestrator.wait_until_stopped(Duration::from_secs(10)));

        let report = orchestrator.stop_all();
        assert_eq!(report.mode, mode);
        assert_eq!(report.aggregate_total, 150.0);
        assert_eq!(report.unit_distance_sum, 150.0);
        assert_eq!(report.lost_distance, 0.0);
        assert_eq!(report.update_count, 150);
        assert!(report.is_consistent());
    }
}

#[test]
fn test_set_global_mode_rejected_during_session() {
    let orchestrator = orchestrator(SyncMode::None, WorkerConfig::default());
    orchestrator.start_all().unwrap();
    assert!(orchestrator.is_session_active());

    let err = orchestrator.set_global_mode(SyncMode::Lock).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidState(_)));

    // Still refused with every unit paused
    orchestrator.pause_all();
    assert!(orchestrator.set_global_mode(SyncMode::Lock).is_err());
    assert!(orchestrator.reset().is_err());

    orchestrator.stop_all();
    orchestrator.set_global_mode(SyncMode::Lock).unwrap();
    assert_eq!(orchestrator.aggregate().mode(), SyncMode::Lock);
}

#[test]
fn test_reset_after_stop_zeroes_aggregate() {
    let worker = WorkerConfig::default()
        .with_tick_interval(Duration::from_millis(1))
        .with_tick_limit(5);
    let orchestrator = orchestrator(SyncMode::Mutex, worker);
    orchestrator.start_all().unwrap();
    assert!(orchestrator.wait_until_stopped(Duration::from_secs(5)));
    orchestrator.stop_all();

    orchestrator.reset().unwrap();
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.aggregate.total, 0.0);
    assert_eq!(snapshot.aggregate.update_count, 0);
    assert_eq!(snapshot.aggregate.anomaly_count, 0);
    assert_eq!(snapshot.aggregate.mode, SyncMode::Mutex);
    for unit in &snapshot.units {
        // Odometers keep their reading; session accounting restarts
        assert_eq!(unit.distance, 5.0);
        assert_eq!(unit.session_distance, 0.0);
        assert_eq!(unit.contributed, 0.0);
    }
}

#[test]
fn test_pause_all_and_resume_all() {
    let worker = WorkerConfig::default().with_tick_interval(Duration::from_millis(5));
    let orchestrator = orchestrator(SyncMode::Lock, worker);
    orchestrator.start_all().unwrap();

    orchestrator.pause_all();
    for unit in orchestrator.unit_statuses() {
        assert_eq!(unit.state, WorkerState::Paused);
        assert_eq!(unit.label(), "Paused");
    }

    orchestrator.resume_all();
    for unit in orchestrator.unit_statuses() {
        assert_eq!(unit.state, WorkerState::Running);
    }

    let report = orchestrator.stop_all();
    assert!(report.is_consistent());
    assert!(!orchestrator.is_session_active());
}

#[test]
fn test_per_unit_commands() {
    let worker = WorkerConfig::default().with_tick_interval(Duration::from_millis(5));
    let orchestrator = orchestrator(SyncMode::Mutex, worker);

    orchestrator.start_unit("truck").unwrap();
    assert!(orchestrator.is_session_active());
    assert_eq!(orchestrator.unit_status("truck").unwrap().state, WorkerState::Running);
    assert_eq!(orchestrator.unit_status("car").unwrap().state, WorkerState::Stopped);

    orchestrator.pause_unit("truck").unwrap();
    assert_eq!(orchestrator.unit_status("truck").unwrap().state, WorkerState::Paused);
    assert!(matches!(
        orchestrator.pause_unit("car"),
        Err(SimulationError::InvalidState(_))
    ));

    orchestrator.refuel_unit("truck", 10.0).unwrap();
    assert!(orchestrator.refuel_unit("bike", 10.0).is_err());

    orchestrator.resume_unit("truck").unwrap();
    orchestrator.stop_unit("truck").unwrap();
    assert_eq!(orchestrator.unit_status("truck").unwrap().state, WorkerState::Stopped);

    assert!(matches!(
        orchestrator.stop_unit("van"),
        Err(SimulationError::UnitNotFound(id)) if id == "van"
    ));
}

#[test]
fn test_add_unit_after_build() {
    let orchestrator = Orchestrator::new(SyncMode::Lock);
    assert!(orchestrator.is_empty());

    orchestrator
        .add_unit(Arc::new(Vehicle::new("scooter")))
        .unwrap();
    assert!(orchestrator
        .add_unit(Arc::new(Vehicle::new("scooter")))
        .is_err());

    orchestrator.step_all(3).unwrap();
    assert_eq!(orchestrator.len(), 1);
    assert_eq!(orchestrator.aggregate_status().total, 3.0);
}

#[test]
fn test_builder_from_config() {
    let config = SimulationConfig {
        mode: SyncMode::Lock,
        ..SimulationConfig::demo()
    };
    let orchestrator = Orchestrator::builder()
        .with_config(&config)
        .with_units(three_units())
        .build()
        .unwrap();

    assert_eq!(orchestrator.aggregate().mode(), SyncMode::Lock);
    assert_eq!(orchestrator.workers()[0].config(), &config.worker);
}

#[test]
fn test_builder_rejects_invalid_worker_config() {
    let result = Orchestrator::builder()
        .with_worker_config(WorkerConfig::default().with_distance_per_tick(-1.0))
        .build();
    assert!(matches!(result, Err(SimulationError::Config(_))));
}

#[test]
fn test_step_all_rejected_during_session() {
    let orchestrator = orchestrator(SyncMode::Mutex, WorkerConfig::default());
    orchestrator.start_all().unwrap();
    assert!(orchestrator.step_all(1).is_err());
    orchestrator.stop_all();
    assert!(orchestrator.step_all(1).is_ok());
}

#[test]
fn test_snapshot_serializes_for_clients() {
    let orchestrator = orchestrator(SyncMode::None, WorkerConfig::default());
    orchestrator.step_all(1).unwrap();

    let json = serde_json::to_value(orchestrator.snapshot()).unwrap();
    assert_eq!(json["aggregate"]["mode"], "none");
    assert_eq!(json["units"].as_array().unwrap().len(), 3);
    assert_eq!(json["units"][0]["id"], "bike");
    assert!(json["units"][0]["resource_level"].is_null());
}

#[test]
fn test_step_all_rejects_unaddressable_round_count() {
    let orchestrator = Orchestrator::builder()
        .with_units(vec![
            Arc::new(Vehicle::new("a")) as Arc<dyn MobileUnit>,
            Arc::new(Vehicle::new("b")),
        ])
        .build()
        .unwrap();

    let err = orchestrator.step_all(u64::MAX).unwrap_err();
    assert!(matches!(err, SimulationError::Config(_)));

    // Rejected before any unit moved
    assert_eq!(orchestrator.aggregate_status().update_count, 0);
    for unit in orchestrator.unit_statuses() {
        assert_eq!(unit.distance, 0.0);
    }
}

#[test]
fn test_step_all_without_units_is_empty() {
    let orchestrator = Orchestrator::new(SyncMode::Mutex);
    assert_eq!(orchestrator.step_all(u64::MAX).unwrap().len(), 0);
}
