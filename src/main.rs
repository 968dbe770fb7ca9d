/*!
 * Highway - Display Client
 *
 * Runs the demo fleet against the shared aggregate and polls snapshots:
 * - car: small tank, runs dry early and is refuelled mid-session
 * - truck: large tank
 * - bike: no resource, never stops on its own
 *
 * HIGHWAY_SYNC_MODE=all runs one session per synchronization mode.
 */

use anyhow::Context;
use highway_sim::{
    init_tracing, MobileUnit, Orchestrator, SessionSpan, SimulationConfig, SimulationSnapshot,
    SyncMode, Vehicle,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const CAR_FUEL: f64 = 2.0;
const TRUCK_FUEL: f64 = 500.0;
const CAR_REFUEL: f64 = 5.0;

fn demo_fleet() -> Vec<Arc<dyn MobileUnit>> {
    vec![
        Arc::new(Vehicle::new("car").with_fuel(CAR_FUEL)),
        Arc::new(Vehicle::new("truck").with_fuel(TRUCK_FUEL)),
        Arc::new(Vehicle::new("bike")),
    ]
}

fn render(snapshot: &SimulationSnapshot, elapsed: Duration) {
    println!(
        "[{:>6.2}s] mode={:<5} total={:>9.2} updates={:>6} lost={:>4}",
        elapsed.as_secs_f64(),
        snapshot.aggregate.mode,
        snapshot.aggregate.total,
        snapshot.aggregate.update_count,
        snapshot.aggregate.anomaly_count,
    );
    for unit in &snapshot.units {
        let level = unit
            .resource_level
            .map_or_else(|| "N/A".to_string(), |l| format!("{:.2}", l));
        println!(
            "    {:<8} {:<12} distance={:>9.2} fuel={}",
            unit.id,
            unit.label(),
            unit.distance,
            level
        );
    }
}

fn run_session(orchestrator: &Orchestrator, config: &SimulationConfig) -> anyhow::Result<()> {
    orchestrator
        .start_all()
        .context("failed to start the fleet")?;

    let session = SessionSpan::new(
        &orchestrator.session_id(),
        orchestrator.aggregate().mode(),
        orchestrator.len(),
    );
    let started = Instant::now();
    let refuel_at = config.run_duration / 2;
    let mut refuelled = false;

    while started.elapsed() < config.run_duration {
        thread::sleep(config.refresh_interval);
        let _entered = session.enter();

        if !refuelled && started.elapsed() >= refuel_at {
            orchestrator
                .refuel_unit("car", CAR_REFUEL)
                .context("failed to refuel car")?;
            refuelled = true;
        }
        render(&orchestrator.snapshot(), started.elapsed());
    }

    let report = orchestrator.stop_all();
    session.record_report(&report);
    println!("{}", report);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let sweep = std::env::var("HIGHWAY_SYNC_MODE")
        .map(|v| v.trim().eq_ignore_ascii_case("all"))
        .unwrap_or(false);
    if sweep {
        std::env::remove_var("HIGHWAY_SYNC_MODE");
    }

    let config = match SimulationConfig::from_env_or(SimulationConfig::demo()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err.render());
            std::process::exit(2);
        }
    };
    let modes: Vec<SyncMode> = if sweep {
        SyncMode::ALL.to_vec()
    } else {
        vec![config.mode]
    };

    let orchestrator = Orchestrator::builder()
        .with_config(&config)
        .with_units(demo_fleet())
        .build()
        .context("failed to build orchestrator")?;

    for (i, mode) in modes.into_iter().enumerate() {
        if i > 0 {
            orchestrator.reset()?;
            orchestrator.set_global_mode(mode)?;
        }
        info!(%mode, run_ms = config.run_duration.as_millis() as u64, "Running session");
        run_session(&orchestrator, &config)?;
    }

    Ok(())
}
