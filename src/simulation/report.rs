/*!
 * Simulation Reports
 * Polling snapshots and the end-of-session reconciliation
 */

use super::aggregate::AggregateStatus;
use super::types::SyncMode;
use super::worker::UnitStatus;
use crate::core::limits::ANOMALY_EPSILON;
use crate::core::serde::is_zero_u64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything a display client renders on one refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimulationSnapshot {
    pub session_id: String,
    pub session_active: bool,
    pub aggregate: AggregateStatus,
    pub units: Vec<UnitStatus>,
}

/// Per-unit line of the reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UnitSummary {
    pub id: String,
    pub odometer: f64,
    pub session_distance: f64,
    pub contributed: f64,
    pub resource_level: Option<f64>,
}

impl From<&UnitStatus> for UnitSummary {
    fn from(status: &UnitStatus) -> Self {
        Self {
            id: status.id.clone(),
            odometer: status.distance,
            session_distance: status.session_distance,
            contributed: status.contributed,
            resource_level: status.resource_level,
        }
    }
}

/// Unit-side distances compared against the shared total after a stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReconciliationReport {
    pub session_id: String,
    pub mode: SyncMode,
    pub units: Vec<UnitSummary>,
    /// Sum of every unit's distance travelled this session
    pub unit_distance_sum: f64,
    /// Exact sum of the deltas the workers handed to the aggregate
    pub submitted_sum: f64,
    pub aggregate_total: f64,
    /// `submitted_sum - aggregate_total`: distance swallowed by lost updates
    pub lost_distance: f64,
    /// `unit_distance_sum - submitted_sum`: moves that never reached the aggregate
    /// (failed debits, external odometer edits)
    pub unrecorded_distance: f64,
    pub update_count: u64,
    #[serde(skip_serializing_if = "is_zero_u64", default)]
    pub anomaly_count: u64,
}

impl ReconciliationReport {
    pub fn new(
        session_id: String,
        units: &[UnitStatus],
        aggregate: AggregateStatus,
    ) -> Self {
        let summaries: Vec<UnitSummary> = units.iter().map(UnitSummary::from).collect();
        let unit_distance_sum: f64 = summaries.iter().map(|u| u.session_distance).sum();
        let submitted_sum: f64 = summaries.iter().map(|u| u.contributed).sum();

        Self {
            session_id,
            mode: aggregate.mode,
            units: summaries,
            unit_distance_sum,
            submitted_sum,
            aggregate_total: aggregate.total,
            lost_distance: submitted_sum - aggregate.total,
            unrecorded_distance: unit_distance_sum - submitted_sum,
            update_count: aggregate.update_count,
            anomaly_count: aggregate.anomaly_count,
        }
    }

    /// True when no submitted distance went missing
    pub fn is_consistent(&self) -> bool {
        self.lost_distance.abs() <= ANOMALY_EPSILON
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========== Shared Aggregate Statistics ==========")?;
        writeln!(f, "Session: {}", self.session_id)?;
        writeln!(f, "Mode: {}", self.mode)?;
        writeln!(f, "Total Updates: {}", self.update_count)?;
        writeln!(f, "Total Distance: {:.2}", self.aggregate_total)?;
        if self.mode == SyncMode::None {
            writeln!(f, "Lost Updates Detected: {}", self.anomaly_count)?;
        }
        writeln!(f, "=============== Per-Unit Summary ================")?;
        for unit in &self.units {
            let level = match unit.resource_level {
                Some(level) => format!("{:.2}", level),
                None => "N/A".to_string(),
            };
            writeln!(
                f,
                "{:<12} odometer {:>9.2} | session {:>8.2} | contributed {:>8.2} | resource {}",
                unit.id, unit.odometer, unit.session_distance, unit.contributed, level
            )?;
        }
        writeln!(f, "=================================================")?;
        writeln!(f, "Sum of Unit Distances:   {:.2}", self.unit_distance_sum)?;
        writeln!(f, "Submitted to Aggregate:  {:.2}", self.submitted_sum)?;
        writeln!(f, "Shared Aggregate Total:  {:.2}", self.aggregate_total)?;
        writeln!(f, "Difference (Lost):       {:.2}", self.lost_distance)?;
        if self.unrecorded_distance.abs() > ANOMALY_EPSILON {
            writeln!(f, "Unrecorded Unit Moves:   {:.2}", self.unrecorded_distance)?;
        }
        write!(f, "=================================================")
    }
}
