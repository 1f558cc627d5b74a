//! Frame encoding/decoding
//!
//! Implements the ECU's binary frame format with an 8-bit additive checksum.
//!
//! Frame format (both directions):
//! - 1 byte: quantity — total frame length, counting itself and the checksum
//! - 1 byte: code — operation selector
//! - N bytes: payload (quantity − 3; status requests and the ack carry none)
//! - 1 byte: checksum — `0x100 − (sum of all preceding bytes mod 0x100)`

use byteorder::{ByteOrder, LittleEndian};

use super::{ProtocolError, SET_VALUES_FRAME_LEN, STATUS_REQUEST_LEN, THROTTLE_SCALE_FACTOR};

/// Operation selector byte of a request frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestCode {
    /// Engine data record: run state, speed, timing, temperatures
    Status1 = 0x04,
    /// Fuel data record: consumption rate, throttle feedback
    Status2 = 0x0B,
    /// Excess-temperature data record
    Status3 = 0x0D,
    /// Throttle set-values command
    SetValues = 0xC9,
}

impl RequestCode {
    /// Parse a wire code byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x04 => Some(Self::Status1),
            0x0B => Some(Self::Status2),
            0x0D => Some(Self::Status3),
            0xC9 => Some(Self::SetValues),
            _ => None,
        }
    }

    /// Total length of the response this request elicits, including the
    /// quantity, code and checksum bytes
    pub fn response_len(self) -> usize {
        match self {
            Self::Status1 => 0x57,
            Self::Status2 => 0x65,
            Self::Status3 => 0x67,
            Self::SetValues => 0x03,
        }
    }

    /// Successor in the cyclic status rotation
    pub fn next_status(self) -> Self {
        match self {
            Self::Status1 => Self::Status2,
            Self::Status2 => Self::Status3,
            Self::Status3 | Self::SetValues => Self::Status1,
        }
    }

    /// Whether this code is part of the status rotation
    pub fn is_status(self) -> bool {
        !matches!(self, Self::SetValues)
    }
}

/// Additive complement checksum over `bytes`, mod 256
pub fn frame_checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0u8.wrapping_sub(sum)
}

/// Build a 3-byte status request frame.
///
/// STATUS_1 encodes to `03 04 F9`, STATUS_2 to `03 0B F2`, STATUS_3 to
/// `03 0D F0`.
pub fn encode_status_request(code: RequestCode) -> [u8; STATUS_REQUEST_LEN] {
    debug_assert!(code.is_status());
    let mut frame = [STATUS_REQUEST_LEN as u8, code as u8, 0];
    frame[2] = frame_checksum(&frame[..2]);
    frame
}

/// Build the fixed-length set-values command frame.
///
/// `throttle` is the unscaled commanded throttle (percent); it is scaled by
/// ×10 before being split little-endian into the first two payload bytes.
/// The remaining payload bytes are zero and contribute nothing to the
/// checksum.
pub fn encode_set_values(throttle: u16) -> [u8; SET_VALUES_FRAME_LEN] {
    let scaled = throttle.saturating_mul(THROTTLE_SCALE_FACTOR);
    let mut frame = [0u8; SET_VALUES_FRAME_LEN];
    frame[0] = SET_VALUES_FRAME_LEN as u8;
    frame[1] = RequestCode::SetValues as u8;
    LittleEndian::write_u16(&mut frame[2..4], scaled);
    frame[SET_VALUES_FRAME_LEN - 1] = frame_checksum(&frame[..SET_VALUES_FRAME_LEN - 1]);
    frame
}

/// A validated response frame, borrowed from the receive buffer
#[derive(Debug, Clone, Copy)]
pub struct ResponseFrame<'a> {
    /// Quantity byte (total frame length)
    pub quantity: u8,
    /// Operation code echoed by the ECU
    pub code: u8,
    /// Payload bytes between the code and the checksum
    pub payload: &'a [u8],
}

/// Validate a received frame: length consistency and checksum.
///
/// The checksum is recomputed over every byte before the trailing checksum
/// byte with wrapping mod-256 arithmetic.
pub fn validate_response(frame: &[u8]) -> Result<ResponseFrame<'_>, ProtocolError> {
    if frame.len() < STATUS_REQUEST_LEN {
        return Err(ProtocolError::ShortFrame { len: frame.len() });
    }
    let quantity = frame[0];
    if quantity as usize != frame.len() {
        return Err(ProtocolError::LengthMismatch {
            declared: quantity,
            actual: frame.len(),
        });
    }
    let expected = frame_checksum(&frame[..frame.len() - 1]);
    let actual = frame[frame.len() - 1];
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }
    Ok(ResponseFrame {
        quantity,
        code: frame[1],
        payload: &frame[2..frame.len() - 1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn response(code: RequestCode, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![(payload.len() + 3) as u8, code as u8];
        frame.extend_from_slice(payload);
        frame.push(frame_checksum(&frame));
        frame
    }

    #[test]
    fn test_status_request_encoding() {
        assert_eq!(encode_status_request(RequestCode::Status1), [0x03, 0x04, 0xF9]);
        assert_eq!(encode_status_request(RequestCode::Status2), [0x03, 0x0B, 0xF2]);
        assert_eq!(encode_status_request(RequestCode::Status3), [0x03, 0x0D, 0xF0]);
    }

    #[test]
    fn test_status_rotation_order() {
        let mut code = RequestCode::Status1;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(code);
            code = code.next_status();
        }
        assert_eq!(
            seen,
            vec![
                RequestCode::Status1,
                RequestCode::Status2,
                RequestCode::Status3,
                RequestCode::Status1,
                RequestCode::Status2,
                RequestCode::Status3,
            ]
        );
    }

    #[test]
    fn test_set_values_layout() {
        let frame = encode_set_values(50);
        assert_eq!(frame.len(), 23);
        assert_eq!(frame[0], 0x17);
        assert_eq!(frame[1], 0xC9);
        // 50% scaled by 10 -> 500 = 0x01F4, little-endian
        assert_eq!(frame[2], 0xF4);
        assert_eq!(frame[3], 0x01);
        assert!(frame[4..22].iter().all(|b| *b == 0));
        // whole frame sums to zero mod 256
        let sum = frame.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        assert_eq!(sum, 0);
    }

    #[test]
    fn test_set_values_ack_validates() {
        // ack checksum: 0x100 - (0x03 + 0xC9) = 0x34
        let ack = [0x03, 0xC9, 0x34];
        let frame = validate_response(&ack).expect("ack should validate");
        assert_eq!(frame.code, 0xC9);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_checksum_sensitivity() {
        let good = response(RequestCode::Status1, &[0x11; 84]);
        assert!(validate_response(&good).is_ok());

        // flipping any single byte must fail validation
        for i in 0..good.len() {
            let mut corrupted = good.clone();
            corrupted[i] ^= 0x40;
            assert!(
                validate_response(&corrupted).is_err(),
                "corruption at byte {i} was not detected"
            );
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut frame = response(RequestCode::Status2, &[0; 98]);
        frame[0] = 0x57;
        assert!(matches!(
            validate_response(&frame),
            Err(ProtocolError::LengthMismatch { declared: 0x57, .. })
        ));
    }

    #[test]
    fn test_short_frame_rejected() {
        assert!(matches!(
            validate_response(&[0x03, 0x04]),
            Err(ProtocolError::ShortFrame { len: 2 })
        ));
    }

    #[test]
    fn test_throttle_roundtrip() {
        let frame = encode_set_values(73);
        let parsed = validate_response(&frame).expect("own encoding should validate");
        assert_eq!(parsed.code, RequestCode::SetValues as u8);
        assert_eq!(u16::from(parsed.payload[0]) | u16::from(parsed.payload[1]) << 8, 730);
    }
}
