//! Backend capability trait and multi-backend monitor
//!
//! Every ECU protocol driver exposes the same small capability set so the
//! rest of the system can stay agnostic of the wire protocol behind it.

use crate::telemetry::EngineTelemetry;

/// Capability set shared by all ECU protocol drivers
pub trait EfiBackend: Send {
    /// Advance the driver state machine by one step
    fn tick(&mut self);

    /// Latest aggregated telemetry, by value
    fn snapshot(&self) -> EngineTelemetry;

    /// Whether telemetry is fresh enough to trust
    fn is_healthy(&self) -> bool;
}

/// Owns a set of ECU backends and fans ticks out to them.
///
/// Constructed once at startup and passed by handle to whoever needs engine
/// state; there is no process-wide instance.
#[derive(Default)]
pub struct EfiMonitor {
    backends: Vec<Box<dyn EfiBackend>>,
}

impl EfiMonitor {
    /// Create an empty monitor
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend
    pub fn push(&mut self, backend: Box<dyn EfiBackend>) {
        self.backends.push(backend);
    }

    /// Number of registered backends
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backends are registered
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Tick every backend once
    pub fn tick_all(&mut self) {
        for backend in &mut self.backends {
            backend.tick();
        }
    }

    /// Snapshot of the backend at `index`
    pub fn snapshot(&self, index: usize) -> Option<EngineTelemetry> {
        self.backends.get(index).map(|b| b.snapshot())
    }

    /// Snapshot of the first healthy backend, falling back to the first
    /// registered one
    pub fn primary(&self) -> Option<EngineTelemetry> {
        self.backends
            .iter()
            .find(|b| b.is_healthy())
            .or_else(|| self.backends.first())
            .map(|b| b.snapshot())
    }

    /// Whether any backend is healthy
    pub fn is_healthy(&self) -> bool {
        self.backends.iter().any(|b| b.is_healthy())
    }
}
