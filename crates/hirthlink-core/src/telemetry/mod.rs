//! Engine telemetry data model
//!
//! The decoded state of the engine as reported by the ECU. The driver owns
//! the only mutable copy; consumers get complete snapshots by value, so a
//! reader never sees fields from two different decode cycles.

mod aggregator;
pub mod decode;

pub use aggregator::TelemetryAggregator;

use serde::{Deserialize, Serialize};

/// Engine run state reported in the engine data record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineState {
    /// Status word below the running threshold: tune-up, cranking or warm-up
    #[default]
    Starting,
    /// Engine running normally
    Running,
}

/// Crankshaft sensor status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrankshaftSensorStatus {
    /// No engine data record decoded yet
    #[default]
    Unknown,
    /// Sensor reporting OK
    Ok,
    /// Sensor reporting a fault
    Error,
}

/// Per-cylinder measurements from the engine data record
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CylinderStatus {
    /// Ignition timing, degrees
    pub ignition_timing_deg: f32,
    /// Injection time, milliseconds
    pub injection_time_ms: f32,
    /// Cylinder head temperature, °C
    pub cylinder_head_temperature: f32,
    /// Exhaust gas temperature, °C
    pub exhaust_gas_temperature: f32,
}

/// Sensor-OK flags from the engine data record.
///
/// A cleared flag means the ECU is reporting that sensor as faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorHealth {
    /// Engine temperature sensor OK
    pub engine_temperature_ok: bool,
    /// Air temperature sensor OK
    pub air_temperature_ok: bool,
    /// Air pressure sensor OK
    pub air_pressure_ok: bool,
    /// Throttle sensor OK
    pub throttle_ok: bool,
}

impl SensorHealth {
    /// Whether every sensor reports OK
    pub fn all_ok(&self) -> bool {
        self.engine_temperature_ok
            && self.air_temperature_ok
            && self.air_pressure_ok
            && self.throttle_ok
    }
}

/// Error flags of one excess-temperature channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExcessTempFlags {
    /// Temperature below the channel's low limit
    pub low: bool,
    /// Temperature above the channel's high limit
    pub high: bool,
    /// Channel average out of range
    pub average: bool,
}

impl ExcessTempFlags {
    /// Whether any flag is raised
    pub fn any(&self) -> bool {
        self.low || self.high || self.average
    }
}

/// Excess-temperature channels from the third status record.
///
/// Field assignments beyond these offsets vary by firmware revision and are
/// treated as reserved.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExcessTemperatureStatus {
    /// Cylinder head temperature channel 1, °C
    pub cht1_temp: f32,
    /// Cylinder head temperature channel 2, °C
    pub cht2_temp: f32,
    /// Exhaust gas temperature channel 1, °C
    pub egt1_temp: f32,
    /// Exhaust gas temperature channel 2, °C
    pub egt2_temp: f32,
    /// CHT channel 1 error flags
    pub cht1: ExcessTempFlags,
    /// CHT channel 2 error flags
    pub cht2: ExcessTempFlags,
    /// EGT channel 1 error flags
    pub egt1: ExcessTempFlags,
    /// EGT channel 2 error flags
    pub egt2: ExcessTempFlags,
}

impl ExcessTemperatureStatus {
    /// Whether any channel reports an excess-temperature error
    pub fn any_error(&self) -> bool {
        self.cht1.any() || self.cht2.any() || self.egt1.any() || self.egt2.any()
    }
}

/// Latest fully-decoded engine state, immutable once published
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineTelemetry {
    /// Engine run state
    pub engine_state: EngineState,
    /// Engine speed, RPM
    pub engine_speed_rpm: u32,
    /// Per-cylinder measurements
    pub cylinder: CylinderStatus,
    /// Crankshaft sensor status
    pub crankshaft_sensor: CrankshaftSensorStatus,
    /// Throttle position feedback, percent
    pub throttle_position_percent: f32,
    /// Instantaneous fuel consumption rate, cm³/min
    pub fuel_consumption_rate_cm3pm: f32,
    /// Fuel consumption rate averaged over the configured window, cm³/min
    pub fuel_consumption_rate_avg_cm3pm: f32,
    /// Fuel consumed since driver start, cm³
    pub total_fuel_consumed_cm3: f32,
    /// Battery voltage as reported by the ECU
    pub battery_voltage: f32,
    /// Sensor-OK flags
    pub sensor_health: SensorHealth,
    /// Excess-temperature channels
    pub excess_temperature: ExcessTemperatureStatus,
    /// Driver-clock time of the last successful decode, ms (0 = never)
    pub last_updated_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_snapshot_serialization_roundtrip() {
        let mut telemetry = EngineTelemetry {
            engine_state: EngineState::Running,
            engine_speed_rpm: 5200,
            throttle_position_percent: 63.5,
            last_updated_ms: 1234,
            ..Default::default()
        };
        telemetry.sensor_health.throttle_ok = true;

        let json = serde_json::to_string(&telemetry).unwrap();
        let back: EngineTelemetry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, telemetry);
    }

    #[test]
    fn test_defaults_are_stale_and_unknown() {
        let telemetry = EngineTelemetry::default();
        assert_eq!(telemetry.last_updated_ms, 0);
        assert_eq!(telemetry.engine_state, EngineState::Starting);
        assert_eq!(telemetry.crankshaft_sensor, CrankshaftSensorStatus::Unknown);
        assert!(!telemetry.sensor_health.all_ok());
    }
}
