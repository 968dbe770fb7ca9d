/*!
 * Simulation Types
 * Synchronization modes and worker lifecycle states
 */

use crate::core::errors::SimulationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Synchronization strategy applied to shared aggregate updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Unsynchronized read-modify-write (lost updates possible)
    #[default]
    None,
    /// Whole update inside a monitor-style mutex
    Mutex,
    /// Whole update inside an explicitly acquired re-entrant lock
    Lock,
}

impl SyncMode {
    pub const ALL: [SyncMode; 3] = [SyncMode::None, SyncMode::Mutex, SyncMode::Lock];

    /// Whether updates in this mode are linearized
    #[inline]
    pub const fn is_protected(self) -> bool {
        !matches!(self, SyncMode::None)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SyncMode::None => "none",
            SyncMode::Mutex => "mutex",
            SyncMode::Lock => "lock",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "unsynchronized" => Ok(SyncMode::None),
            "mutex" | "synchronized" => Ok(SyncMode::Mutex),
            "lock" | "reentrant_lock" => Ok(SyncMode::Lock),
            other => Err(SimulationError::Config(format!(
                "unknown sync mode '{}', expected none, mutex or lock",
                other
            ))),
        }
    }
}

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl WorkerState {
    /// Running or paused units belong to an active session
    #[inline]
    pub const fn is_active(self) -> bool {
        !matches!(self, WorkerState::Stopped)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkerState::Stopped => "Stopped",
            WorkerState::Running => "Running",
            WorkerState::Paused => "Paused",
        };
        f.write_str(label)
    }
}

/// Why a unit is paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Paused by a lifecycle command
    Requested,
    /// Auto-paused because the unit ran out of its resource
    OutOfResource,
}

/// Result of one tick of a worker loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Unit advanced and the shared aggregate received the delta
    Advanced { distance: f64 },
    /// Resource was already at or below zero; nothing moved
    OutOfResource { level: f64 },
    /// Unit moved but the debit failed; the aggregate was not updated
    DebitFailed { required: f64, available: f64 },
}

impl TickOutcome {
    #[inline]
    pub fn advanced(&self) -> bool {
        matches!(self, TickOutcome::Advanced { .. })
    }
}
