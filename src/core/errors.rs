/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::UnitId;
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Simulation result type
pub type SimulationResult<T> = Result<T, SimulationError>;

/// Simulation errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SimulationError {
    #[error("Invalid state: {0}")]
    #[diagnostic(
        code(simulation::invalid_state),
        help("Stop every worker unit before changing the mode or resetting the aggregate.")
    )]
    InvalidState(String),

    #[error("Resource exhausted on unit {unit}: required {required:.3}, available {available:.3}")]
    #[diagnostic(
        code(simulation::resource_exhausted),
        help("Refuel the unit; it resumes automatically once the resource is replenished.")
    )]
    ResourceExhausted {
        unit: UnitId,
        required: f64,
        available: f64,
    },

    #[error("Worker loop interrupted: {0}")]
    #[diagnostic(code(simulation::interrupted))]
    Interrupted(String),

    #[error("Unit {0} not found")]
    #[diagnostic(
        code(simulation::unit_not_found),
        help("The unit was never registered with this orchestrator.")
    )]
    UnitNotFound(UnitId),

    #[error("Unit {0} already registered")]
    #[diagnostic(
        code(simulation::duplicate_unit),
        help("Each mobile unit id may drive at most one worker per session.")
    )]
    DuplicateUnit(UnitId),

    #[error("Invalid amount: {0}")]
    #[diagnostic(
        code(simulation::invalid_amount),
        help("Amounts must be finite and strictly positive.")
    )]
    InvalidAmount(f64),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(simulation::config))]
    Config(String),
}

impl SimulationError {
    /// Shorthand for the lifecycle/mode precondition failures
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Plain-text diagnostic report with code and help, for terminal output
    pub fn render(&self) -> String {
        let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
        let mut out = String::new();
        match handler.render_report(&mut out, self) {
            Ok(()) => out,
            Err(_) => self.to_string(),
        }
    }

    /// Whether this error is recovered from inside the worker loop
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }
}

impl From<serde_json::Error> for SimulationError {
    fn from(err: serde_json::Error) -> Self {
        SimulationError::Config(err.to_string())
    }
}

impl From<std::io::Error> for SimulationError {
    fn from(err: std::io::Error) -> Self {
        SimulationError::Config(err.to_string())
    }
}
