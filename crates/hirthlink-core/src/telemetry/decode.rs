//! Response payload decoding
//!
//! Maps each status record's payload bytes, keyed by request code, into
//! typed telemetry fields with unit conversion. All multi-byte fields are
//! little-endian; combination is always `low | (high << 8)`, delegated to
//! `byteorder` in one place.
//!
//! Payload offsets are relative to the first byte after the code byte.

use byteorder::{ByteOrder, LittleEndian};

use super::{EngineState, ExcessTempFlags, ExcessTemperatureStatus, SensorHealth};
use crate::protocol::{ProtocolError, RequestCode};

/// Status word value at or above which the engine reports as running
pub const ENGINE_RUNNING_THRESHOLD: u16 = 4;

/// Injection time resolution, milliseconds per count
pub const INJECTION_TIME_RESOLUTION_MS: f32 = 0.8;

/// Fuel consumption counts per cm³/min
pub const FUEL_CONSUMPTION_RESOLUTION: f32 = 10.0;

/// Throttle position percent per count
pub const THROTTLE_POSITION_RESOLUTION: f32 = 0.1;

/// Offset between the ECU's temperature encoding and degrees Celsius
pub const KELVIN_CONVERSION_CONSTANT: f32 = 273.5;

/// Sensor byte mask covering all four sensor-OK bits
pub const CRANKSHAFT_SENSOR_OK: u8 = 0x0F;

/// Contents of the engine data record (status request 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineRecord {
    /// Engine run state derived from the status word
    pub engine_state: EngineState,
    /// Engine speed, RPM
    pub engine_speed_rpm: u32,
    /// Injection time, milliseconds
    pub injection_time_ms: f32,
    /// Ignition timing, degrees
    pub ignition_timing_deg: f32,
    /// Cylinder head temperature, °C
    pub cylinder_head_temperature: f32,
    /// Exhaust gas temperature, °C
    pub exhaust_gas_temperature: f32,
    /// Battery voltage (vendor-underdocumented scaling, raw volts)
    pub battery_voltage: f32,
    /// Whether all crankshaft-relevant sensor bits read OK
    pub crankshaft_ok: bool,
    /// Individual sensor-OK flags
    pub sensors: SensorHealth,
}

/// Contents of the fuel data record (status request 2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelRecord {
    /// Fuel consumption rate, cm³/min
    pub fuel_consumption_rate_cm3pm: f32,
    /// Throttle position feedback, percent
    pub throttle_position_percent: f32,
}

/// Decoded contents of one response frame
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryDelta {
    /// Engine data record
    Engine(EngineRecord),
    /// Fuel data record
    Fuel(FuelRecord),
    /// Excess-temperature data record
    ExcessTemperature(ExcessTemperatureStatus),
    /// Empty acknowledgement of a set-values command
    SetValuesAck,
}

/// Decode a validated response payload for `code`.
///
/// Fails only if the payload is shorter than the record layout requires;
/// offsets not listed in the layout are reserved and ignored.
pub fn decode(code: RequestCode, payload: &[u8]) -> Result<TelemetryDelta, ProtocolError> {
    let need = code.response_len().saturating_sub(3);
    if payload.len() < need {
        return Err(ProtocolError::ShortPayload {
            code: code as u8,
            len: payload.len(),
        });
    }
    Ok(match code {
        RequestCode::Status1 => TelemetryDelta::Engine(decode_engine_record(payload)),
        RequestCode::Status2 => TelemetryDelta::Fuel(decode_fuel_record(payload)),
        RequestCode::Status3 => {
            TelemetryDelta::ExcessTemperature(decode_excess_temperature_record(payload))
        }
        RequestCode::SetValues => TelemetryDelta::SetValuesAck,
    })
}

fn u16_at(payload: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&payload[offset..offset + 2])
}

fn decode_engine_record(payload: &[u8]) -> EngineRecord {
    let status_word = u16_at(payload, 8);
    let sensor_byte = payload[82];
    EngineRecord {
        engine_state: if status_word >= ENGINE_RUNNING_THRESHOLD {
            EngineState::Running
        } else {
            EngineState::Starting
        },
        engine_speed_rpm: u32::from(u16_at(payload, 10)),
        injection_time_ms: f32::from(u16_at(payload, 32)) * INJECTION_TIME_RESOLUTION_MS,
        ignition_timing_deg: f32::from(u16_at(payload, 34)),
        cylinder_head_temperature: f32::from(u16_at(payload, 74)) - KELVIN_CONVERSION_CONSTANT,
        battery_voltage: f32::from(u16_at(payload, 76)),
        exhaust_gas_temperature: f32::from(u16_at(payload, 78)) - KELVIN_CONVERSION_CONSTANT,
        crankshaft_ok: sensor_byte & CRANKSHAFT_SENSOR_OK == CRANKSHAFT_SENSOR_OK,
        sensors: SensorHealth {
            engine_temperature_ok: sensor_byte & 0x01 != 0,
            air_temperature_ok: sensor_byte & 0x02 != 0,
            air_pressure_ok: sensor_byte & 0x04 != 0,
            throttle_ok: sensor_byte & 0x08 != 0,
        },
    }
}

fn decode_fuel_record(payload: &[u8]) -> FuelRecord {
    FuelRecord {
        fuel_consumption_rate_cm3pm: f32::from(u16_at(payload, 52)) / FUEL_CONSUMPTION_RESOLUTION,
        throttle_position_percent: f32::from(u16_at(payload, 62)) * THROTTLE_POSITION_RESOLUTION,
    }
}

fn channel_flags(error_word: u16, shift: u32) -> ExcessTempFlags {
    ExcessTempFlags {
        low: error_word >> shift & 1 != 0,
        high: error_word >> (shift + 1) & 1 != 0,
        average: error_word >> (shift + 2) & 1 != 0,
    }
}

fn decode_excess_temperature_record(payload: &[u8]) -> ExcessTemperatureStatus {
    let error_word = u16_at(payload, 46);
    ExcessTemperatureStatus {
        cht1_temp: f32::from(u16_at(payload, 16)),
        cht2_temp: f32::from(u16_at(payload, 18)),
        egt1_temp: f32::from(u16_at(payload, 20)),
        egt2_temp: f32::from(u16_at(payload, 22)),
        cht1: channel_flags(error_word, 0),
        cht2: channel_flags(error_word, 3),
        egt1: channel_flags(error_word, 6),
        egt2: channel_flags(error_word, 9),
    }
}
