/*!
 * Simulation Module
 * Worker units, the shared aggregate they update, and the orchestrator that owns both
 */

pub mod aggregate;
pub mod orchestrator;
pub mod report;
pub mod types;
pub mod worker;

// Re-exports
pub use aggregate::{AggregateStatus, SessionLease, SharedAggregate};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use report::{ReconciliationReport, SimulationSnapshot, UnitSummary};
pub use types::{PauseReason, SyncMode, TickOutcome, WorkerState};
pub use worker::{UnitStatus, WorkerUnit};
