/*!
 * Core Module
 * Fundamental simulation types, configuration, and error handling
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod serde;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use config::{RaceAmplification, SimulationConfig, WorkerConfig};
pub use errors::*;
pub use types::*;
