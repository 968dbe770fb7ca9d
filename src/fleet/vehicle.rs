/*!
 * Reference Vehicle
 *
 * Minimal mobile unit used by the display client and tests: an odometer and an
 * optional fuel tank. Vehicle-type rules (cargo, passengers, efficiency curves)
 * live outside the simulation core.
 */

use super::traits::{MobileUnit, ResourceConsumer, Shortfall};
use crate::core::errors::{SimulationError, SimulationResult};
use crate::core::types::{AtomicF64, UnitId};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;

/// Depletable fuel store
#[derive(Debug, Default)]
pub struct FuelTank {
    level: Mutex<f64>,
}

impl FuelTank {
    pub fn new(level: f64) -> Self {
        Self {
            level: Mutex::new(level),
        }
    }
}

impl ResourceConsumer for FuelTank {
    fn level(&self) -> f64 {
        *self.level.lock()
    }

    fn debit(&self, amount: f64) -> Result<(), Shortfall> {
        let mut level = self.level.lock();
        if amount > *level {
            return Err(Shortfall {
                required: amount,
                available: *level,
            });
        }
        *level -= amount;
        Ok(())
    }

    fn add(&self, amount: f64) -> SimulationResult<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(SimulationError::InvalidAmount(amount));
        }
        *self.level.lock() += amount;
        Ok(())
    }
}

/// A mobile unit with an odometer and optional fuel tank
#[derive(Debug)]
pub struct Vehicle {
    id: UnitId,
    odometer: AtomicF64,
    tank: Option<FuelTank>,
}

impl Vehicle {
    /// Vehicle with a zeroed odometer and no fuel tank
    pub fn new(id: impl Into<UnitId>) -> Self {
        Self {
            id: id.into(),
            odometer: AtomicF64::zero(),
            tank: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_fuel(mut self, level: f64) -> Self {
        self.tank = Some(FuelTank::new(level));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_distance(self, distance: f64) -> Self {
        self.odometer.store(distance, Ordering::Relaxed);
        self
    }

    /// Fuel level, if the vehicle has a tank
    pub fn fuel_level(&self) -> Option<f64> {
        self.tank.as_ref().map(|tank| tank.level())
    }
}

impl MobileUnit for Vehicle {
    fn id(&self) -> &str {
        &self.id
    }

    fn distance(&self) -> f64 {
        self.odometer.load(Ordering::Acquire)
    }

    fn set_distance(&self, distance: f64) {
        self.odometer.store(distance, Ordering::Release);
    }

    fn resource(&self) -> Option<&dyn ResourceConsumer> {
        self.tank.as_ref().map(|tank| tank as &dyn ResourceConsumer)
    }
}
