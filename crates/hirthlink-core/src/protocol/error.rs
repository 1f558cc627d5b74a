//! Protocol errors

use thiserror::Error;

/// Errors that can occur on the ECU serial link
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Serial port could not be opened or configured
    #[error("serial port error: {0}")]
    Serial(String),

    /// No complete response arrived within the response deadline
    #[error("response timeout")]
    ResponseTimeout,

    /// Fewer bytes than the smallest possible frame
    #[error("frame too short: {len} bytes")]
    ShortFrame {
        /// Bytes actually received
        len: usize,
    },

    /// The leading quantity byte disagrees with the received length
    #[error("frame length mismatch: quantity byte says {declared:#04x}, got {actual} bytes")]
    LengthMismatch {
        /// Value of the quantity byte
        declared: u8,
        /// Bytes actually received
        actual: usize,
    },

    /// The additive checksum did not validate
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch {
        /// Checksum recomputed over the received bytes
        expected: u8,
        /// Checksum byte carried by the frame
        actual: u8,
    },

    /// Response code does not match the outstanding request
    #[error("unexpected response code: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedCode {
        /// Code of the request most recently sent
        expected: u8,
        /// Code carried by the response
        actual: u8,
    },

    /// Response payload is shorter than the record layout requires
    #[error("payload too short for record {code:#04x}: {len} bytes")]
    ShortPayload {
        /// Request code the payload belongs to
        code: u8,
        /// Payload bytes received
        len: usize,
    },

    /// Transport-level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
