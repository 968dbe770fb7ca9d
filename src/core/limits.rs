/*!
 * Simulation Limits and Constants
 *
 * Centralized location for tick cadence, distance units, and detector thresholds.
 * Organized by domain for maintainability and discoverability.
 *
 * ## Conventions
 * - Distances are abstract units (the demo fleet treats them as km)
 * - Resource quantities are abstract units (the demo fleet treats them as litres)
 * - Race-amplification values are marked with [RACE]
 */

use std::time::Duration;

// =============================================================================
// WORKER LOOP
// =============================================================================

/// Interval between two ticks of a worker loop (1 second)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Distance advanced by a unit on every tick
pub const DEFAULT_DISTANCE_PER_TICK: f64 = 1.0;

/// Resource consumed per unit of distance (0.1 L per km)
pub const DEFAULT_RESOURCE_PER_DISTANCE: f64 = 0.1;

/// Prefix for worker thread names, followed by the unit id
pub const WORKER_THREAD_PREFIX: &str = "unit-";

// =============================================================================
// SHARED AGGREGATE
// =============================================================================

/// Tolerance used by the lost-update detector when re-reading the total
pub const ANOMALY_EPSILON: f64 = 1e-3;

/// Delay inside the unsynchronized read-modify-write window (100ns)
/// [RACE] Widens the window between read and write-back so interleavings show up
pub const DEFAULT_RACE_DELAY: Duration = Duration::from_nanos(100);

/// Protected updates are logged at debug level once every N updates
pub const SYNC_LOG_INTERVAL: u64 = 10;

// =============================================================================
// DISPLAY CLIENT
// =============================================================================

/// Polling cadence of the terminal display client (100ms)
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Default length of a demo session run by the binary
pub const DEFAULT_RUN_DURATION: Duration = Duration::from_secs(10);
