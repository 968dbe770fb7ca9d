/*!
 * Simulation Configuration
 *
 * Worker cadence, race amplification, and session settings. Values come from
 * `Default`, one of the presets, a JSON file, or environment overrides:
 *
 * - HIGHWAY_CONFIG: path to a JSON config file
 * - HIGHWAY_SYNC_MODE: none | mutex | lock
 * - HIGHWAY_TICK_MS: tick interval in milliseconds
 * - HIGHWAY_RUN_SECS: demo session length in seconds
 * - HIGHWAY_RACE_DELAY_NS: sleep inside the unsynchronized update window
 */

use crate::core::errors::{SimulationError, SimulationResult};
use crate::core::limits::{
    DEFAULT_DISTANCE_PER_TICK, DEFAULT_RACE_DELAY, DEFAULT_REFRESH_INTERVAL,
    DEFAULT_RESOURCE_PER_DISTANCE, DEFAULT_RUN_DURATION, DEFAULT_TICK_INTERVAL,
};
use crate::core::serde::{duration_millis, duration_nanos, is_none};
use crate::simulation::types::SyncMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

/// Artificial delay between reading and writing back the total in unsynchronized mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RaceAmplification {
    /// No delay (races still possible, just rare)
    None,
    /// Yield the rest of the time slice
    Yield,
    /// Sleep for a fixed duration
    Sleep(#[serde(with = "duration_nanos")] Duration),
    /// Busy-spin for a number of iterations
    Spin(u32),
}

impl Default for RaceAmplification {
    fn default() -> Self {
        RaceAmplification::Sleep(DEFAULT_RACE_DELAY)
    }
}

impl RaceAmplification {
    /// Widen the read-modify-write window on the calling thread
    #[inline]
    pub fn apply(&self) {
        match *self {
            RaceAmplification::None => {}
            RaceAmplification::Yield => thread::yield_now(),
            RaceAmplification::Sleep(delay) => thread::sleep(delay),
            RaceAmplification::Spin(iterations) => {
                for _ in 0..iterations {
                    std::hint::spin_loop();
                }
            }
        }
    }
}

/// Per-worker loop settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Interval between ticks
    #[serde(with = "duration_millis")]
    pub tick_interval: Duration,
    /// Distance advanced per tick (also the delta applied to the aggregate)
    pub distance_per_tick: f64,
    /// Resource debited per unit of distance for units that consume one
    pub resource_per_distance: f64,
    /// Loop stops itself after this many ticks in one run
    #[serde(default, skip_serializing_if = "is_none")]
    pub tick_limit: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            distance_per_tick: DEFAULT_DISTANCE_PER_TICK,
            resource_per_distance: DEFAULT_RESOURCE_PER_DISTANCE,
            tick_limit: None,
        }
    }
}

impl WorkerConfig {
    #[inline]
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_distance_per_tick(mut self, distance: f64) -> Self {
        self.distance_per_tick = distance;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_resource_per_distance(mut self, rate: f64) -> Self {
        self.resource_per_distance = rate;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_tick_limit(mut self, ticks: u64) -> Self {
        self.tick_limit = Some(ticks);
        self
    }

    /// Resource debited on every tick
    #[inline]
    pub fn debit_per_tick(&self) -> f64 {
        self.distance_per_tick * self.resource_per_distance
    }

    pub fn validate(&self) -> SimulationResult<()> {
        if !self.distance_per_tick.is_finite() || self.distance_per_tick < 0.0 {
            return Err(SimulationError::Config(format!(
                "distance_per_tick must be a non-negative number, got {}",
                self.distance_per_tick
            )));
        }
        if !self.resource_per_distance.is_finite() || self.resource_per_distance < 0.0 {
            return Err(SimulationError::Config(format!(
                "resource_per_distance must be a non-negative number, got {}",
                self.resource_per_distance
            )));
        }
        Ok(())
    }
}

/// Whole-session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimulationConfig {
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub race: RaceAmplification,
    /// Display client polling cadence
    #[serde(with = "duration_millis", default = "default_refresh")]
    pub refresh_interval: Duration,
    /// How long the display client lets a session run
    #[serde(with = "duration_millis", default = "default_run")]
    pub run_duration: Duration,
}

fn default_refresh() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

fn default_run() -> Duration {
    DEFAULT_RUN_DURATION
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            worker: WorkerConfig::default(),
            race: RaceAmplification::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            run_duration: DEFAULT_RUN_DURATION,
        }
    }
}

impl SimulationConfig {
    /// Fast cadence that makes lost updates visible within a few seconds
    pub fn demo() -> Self {
        Self {
            mode: SyncMode::None,
            worker: WorkerConfig::default().with_tick_interval(Duration::from_millis(10)),
            race: RaceAmplification::Sleep(Duration::from_micros(50)),
            refresh_interval: Duration::from_millis(500),
            run_duration: Duration::from_secs(3),
        }
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> SimulationResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: SimulationConfig = serde_json::from_str(&raw)?;
        config.worker.validate()?;
        Ok(config)
    }

    /// Start from `base` (or HIGHWAY_CONFIG when set) and apply env overrides
    pub fn from_env_or(base: SimulationConfig) -> SimulationResult<Self> {
        let mut config = match std::env::var("HIGHWAY_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => base,
        };

        if let Some(mode) = env_value::<String>("HIGHWAY_SYNC_MODE")? {
            config.mode = SyncMode::from_str(&mode)?;
        }
        if let Some(ms) = env_value::<u64>("HIGHWAY_TICK_MS")? {
            config.worker.tick_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = env_value::<u64>("HIGHWAY_RUN_SECS")? {
            config.run_duration = Duration::from_secs(secs);
        }
        if let Some(nanos) = env_value::<u64>("HIGHWAY_RACE_DELAY_NS")? {
            config.race = RaceAmplification::Sleep(Duration::from_nanos(nanos));
        }

        config.worker.validate()?;
        Ok(config)
    }
}

fn env_value<T>(key: &str) -> SimulationResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| SimulationError::Config(format!("{}: {}", key, e))),
        Err(_) => Ok(None),
    }
}
