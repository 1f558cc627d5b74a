//! Commanded-throttle input
//!
//! The throttle value the driver forwards to the ECU comes from elsewhere
//! in the system (an autopilot output channel, a ground-station slider);
//! the driver only polls it once per tick and reacts to changes.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// Source of the currently commanded throttle
pub trait ThrottleSource: Send {
    /// Commanded throttle in percent, 0–100
    fn commanded_throttle(&self) -> u16;
}

/// Constant throttle value
pub struct FixedThrottle(pub u16);

impl ThrottleSource for FixedThrottle {
    fn commanded_throttle(&self) -> u16 {
        self.0
    }
}

/// Throttle cell shared with application code.
///
/// Clones share the same underlying value; hand one clone to the driver and
/// keep another to command throttle changes.
#[derive(Clone, Default)]
pub struct SharedThrottle(Arc<AtomicU16>);

impl SharedThrottle {
    /// Create a cell commanding 0%
    pub fn new() -> Self {
        Self::default()
    }

    /// Command a new throttle, clamped to 100%
    pub fn set(&self, percent: u16) {
        self.0.store(percent.min(100), Ordering::SeqCst);
    }

    /// Currently commanded throttle
    pub fn get(&self) -> u16 {
        self.0.load(Ordering::SeqCst)
    }
}

impl ThrottleSource for SharedThrottle {
    fn commanded_throttle(&self) -> u16 {
        self.get()
    }
}
