/*!
 * Highway Simulation Library
 * Concurrent mobile units feeding one shared distance aggregate
 */

pub mod core;
pub mod fleet;
pub mod monitoring;
pub mod simulation;

// Re-exports
pub use crate::core::config::{RaceAmplification, SimulationConfig, WorkerConfig};
pub use crate::core::errors::{SimulationError, SimulationResult};
pub use crate::core::types::{AtomicF64, UnitId};
pub use fleet::{FuelTank, MobileUnit, ResourceConsumer, Shortfall, Vehicle};
pub use monitoring::{init_tracing, SessionSpan};
pub use simulation::{
    AggregateStatus, Orchestrator, OrchestratorBuilder, PauseReason, ReconciliationReport,
    SharedAggregate, SimulationSnapshot, SyncMode, TickOutcome, UnitStatus, WorkerState,
    WorkerUnit,
};
