/*!
 * Fleet Traits
 * Capabilities the simulation core needs from an externally owned mobile unit
 */

use crate::core::errors::SimulationResult;
use std::fmt;

/// A unit that travels: unique id plus a mutable distance counter
///
/// Implementations are shared between a worker thread (writer) and display
/// clients (readers), so all accessors take `&self` and use interior mutability.
/// Readers may observe a momentarily stale value.
pub trait MobileUnit: Send + Sync {
    fn id(&self) -> &str;

    /// Distance travelled so far
    fn distance(&self) -> f64;

    fn set_distance(&self, distance: f64);

    /// Resource capability, if this unit consumes one
    fn resource(&self) -> Option<&dyn ResourceConsumer> {
        None
    }
}

/// A depletable resource (fuel, charge, ...)
pub trait ResourceConsumer: Send + Sync {
    /// Current level
    fn level(&self) -> f64;

    /// Remove `amount`, failing without side effects if not enough is available
    fn debit(&self, amount: f64) -> Result<(), Shortfall>;

    /// Add `amount`; non-positive amounts are rejected
    fn add(&self, amount: f64) -> SimulationResult<()>;
}

/// Failed debit: how much was asked for and how much there was
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shortfall {
    pub required: f64,
    pub available: f64,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "required {:.3}, available {:.3}",
            self.required, self.available
        )
    }
}
