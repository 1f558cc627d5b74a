//! Hirth serial protocol
//!
//! Implements the ECU's cyclic request/response exchange over a half-duplex
//! serial link: three rotating status requests plus a throttle set-values
//! command, one request outstanding at a time, validated with an 8-bit
//! additive checksum.

pub mod engine;
mod error;
pub mod frame;
pub mod serial;
mod transport;

pub use engine::{DriverConfig, HirthDriver, LinkStats};
pub use error::ProtocolError;
pub use frame::{
    encode_set_values, encode_status_request, frame_checksum, validate_response, RequestCode,
    ResponseFrame,
};
pub use serial::{open_port, SerialTransport};
pub use transport::{memory_link, MemoryTransport, Transport};

/// Default baud rate for the ECU link
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Total length of a status request frame
pub const STATUS_REQUEST_LEN: usize = 3;

/// Total length of the set-values command frame
pub const SET_VALUES_FRAME_LEN: usize = 0x17;

/// Scale factor applied to the commanded throttle before it goes on the wire
pub const THROTTLE_SCALE_FACTOR: u16 = 10;

/// Default time to wait for a response before discarding the exchange
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 100;

/// Default telemetry age beyond which the driver reports unhealthy
pub const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 300;
