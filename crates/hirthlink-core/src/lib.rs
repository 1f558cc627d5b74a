//! # HirthLink Core Library
//!
//! Driver library for the Hirth engine-control-unit serial telemetry
//! protocol.
//!
//! This library provides:
//! - Binary frame encoding and validation with the ECU's additive checksum
//! - A tick-driven polling state machine multiplexing rotating status
//!   requests and throttle commands over a half-duplex serial link
//! - Typed engine telemetry with unit conversion and running fuel averages
//! - A simulated ECU for development without hardware
//!
//! ## Example
//!
//! ```rust,ignore
//! use hirthlink_core::prelude::*;
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0", None)?;
//! let throttle = SharedThrottle::new();
//! let mut driver = HirthDriver::new(
//!     Box::new(transport),
//!     Box::new(throttle.clone()),
//!     DriverConfig::default(),
//! );
//!
//! // tick at a steady 10-50 Hz from the host loop
//! driver.tick();
//! let telemetry = driver.snapshot();
//! println!("RPM: {}", telemetry.engine_speed_rpm);
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backend;
pub mod clock;
pub mod demo;
pub mod protocol;
pub mod runner;
pub mod telemetry;
pub mod throttle;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backend::{EfiBackend, EfiMonitor};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::demo::SimulatedEcu;
    pub use crate::protocol::{
        memory_link, DriverConfig, HirthDriver, LinkStats, MemoryTransport, ProtocolError,
        RequestCode, SerialTransport, Transport,
    };
    pub use crate::runner::{spawn_poller, PollHandle};
    pub use crate::telemetry::{EngineState, EngineTelemetry};
    pub use crate::throttle::{FixedThrottle, SharedThrottle, ThrottleSource};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
