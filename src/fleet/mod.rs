/*!
 * Fleet Module
 * Mobile unit capabilities consumed by the simulation core
 */

pub mod traits;
pub mod vehicle;

pub use traits::{MobileUnit, ResourceConsumer, Shortfall};
pub use vehicle::{FuelTank, Vehicle};
