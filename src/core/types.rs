/*!
 * Core Types
 * Common types used across the simulation
 */

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Mobile unit identifier
pub type UnitId = String;

/// Lock-free f64 cell backed by the bit pattern in an `AtomicU64`
///
/// Plain `load`/`store` never tear, which lets the unsynchronized update path
/// race on a real shared value without undefined behavior. Read-modify-write
/// via `load` + `store` is deliberately *not* atomic; use `fetch_add` when the
/// caller needs a linearizable increment.
#[repr(transparent)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    #[inline]
    pub const fn zero() -> Self {
        Self {
            bits: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.bits.load(order))
    }

    #[inline]
    pub fn store(&self, value: f64, order: Ordering) {
        self.bits.store(value.to_bits(), order);
    }

    /// Atomic add via CAS loop, returns the previous value
    pub fn fetch_add(&self, delta: f64, order: Ordering) -> f64 {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .bits
                .compare_exchange_weak(current, next, order, Ordering::Relaxed)
            {
                Ok(prev) => return f64::from_bits(prev),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for AtomicF64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.load(Ordering::Relaxed))
    }
}
