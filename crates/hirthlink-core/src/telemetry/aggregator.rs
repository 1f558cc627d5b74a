//! Telemetry aggregation
//!
//! Owns the latest decoded snapshot and the derived fuel-consumption
//! averages. Mutated only from the decode path; everything else reads
//! complete snapshots by value.
//!
//! State transitions and sensor faults are reported here as structured
//! events rather than being interleaved into the decoders.

use std::collections::VecDeque;

use tracing::{debug, info, trace, warn};

use super::decode::{EngineRecord, FuelRecord, TelemetryDelta};
use super::{CrankshaftSensorStatus, EngineTelemetry, ExcessTemperatureStatus};

/// Accumulates decoded records into the published telemetry state
pub struct TelemetryAggregator {
    state: EngineTelemetry,
    fuel_samples: VecDeque<f32>,
    fuel_window: usize,
    fuel_slope: f32,
    fuel_offset: f32,
    last_fuel_sample_ms: u64,
}

impl TelemetryAggregator {
    /// Create an aggregator with the given fuel smoothing window and
    /// fuel-rate calibration
    pub fn new(fuel_window: usize, fuel_slope: f32, fuel_offset: f32) -> Self {
        Self {
            state: EngineTelemetry::default(),
            fuel_samples: VecDeque::new(),
            fuel_window: fuel_window.max(1),
            fuel_slope,
            fuel_offset,
            last_fuel_sample_ms: 0,
        }
    }

    /// Latest aggregated telemetry, by value
    pub fn snapshot(&self) -> EngineTelemetry {
        self.state.clone()
    }

    /// Time of the last successful decode on the driver clock (0 = never)
    pub fn last_updated_ms(&self) -> u64 {
        self.state.last_updated_ms
    }

    /// Merge a decoded record and advance the update timestamp
    pub fn apply(&mut self, delta: TelemetryDelta, now_ms: u64) {
        match delta {
            TelemetryDelta::Engine(record) => self.apply_engine(record),
            TelemetryDelta::Fuel(record) => self.apply_fuel(record, now_ms),
            TelemetryDelta::ExcessTemperature(record) => self.apply_excess_temperature(record),
            TelemetryDelta::SetValuesAck => debug!("set-values acknowledged"),
        }
        self.state.last_updated_ms = now_ms;
    }

    fn apply_engine(&mut self, record: EngineRecord) {
        if record.engine_state != self.state.engine_state {
            info!(from = ?self.state.engine_state, to = ?record.engine_state, "engine state changed");
        }

        let crankshaft = if record.crankshaft_ok {
            CrankshaftSensorStatus::Ok
        } else {
            CrankshaftSensorStatus::Error
        };
        if crankshaft == CrankshaftSensorStatus::Error
            && self.state.crankshaft_sensor != CrankshaftSensorStatus::Error
        {
            warn!("crankshaft sensor reporting error");
        }

        let previous = self.state.sensor_health;
        if previous.engine_temperature_ok && !record.sensors.engine_temperature_ok {
            warn!("engine temperature sensor fault");
        }
        if previous.air_temperature_ok && !record.sensors.air_temperature_ok {
            warn!("air temperature sensor fault");
        }
        if previous.air_pressure_ok && !record.sensors.air_pressure_ok {
            warn!("air pressure sensor fault");
        }
        if previous.throttle_ok && !record.sensors.throttle_ok {
            warn!("throttle sensor fault");
        }

        self.state.engine_state = record.engine_state;
        self.state.engine_speed_rpm = record.engine_speed_rpm;
        self.state.cylinder.injection_time_ms = record.injection_time_ms;
        self.state.cylinder.ignition_timing_deg = record.ignition_timing_deg;
        self.state.cylinder.cylinder_head_temperature = record.cylinder_head_temperature;
        self.state.cylinder.exhaust_gas_temperature = record.exhaust_gas_temperature;
        self.state.battery_voltage = record.battery_voltage;
        self.state.crankshaft_sensor = crankshaft;
        self.state.sensor_health = record.sensors;

        trace!(
            rpm = record.engine_speed_rpm,
            state = ?record.engine_state,
            "engine record applied"
        );
    }

    fn apply_fuel(&mut self, record: FuelRecord, now_ms: u64) {
        let rate = record.fuel_consumption_rate_cm3pm * self.fuel_slope + self.fuel_offset;
        self.state.fuel_consumption_rate_cm3pm = rate;

        self.fuel_samples.push_back(rate);
        while self.fuel_samples.len() > self.fuel_window {
            self.fuel_samples.pop_front();
        }
        let sum: f32 = self.fuel_samples.iter().sum();
        self.state.fuel_consumption_rate_avg_cm3pm = sum / self.fuel_samples.len() as f32;

        if self.last_fuel_sample_ms != 0 {
            let dt_min = now_ms.saturating_sub(self.last_fuel_sample_ms) as f32 / 60_000.0;
            self.state.total_fuel_consumed_cm3 += rate * dt_min;
        }
        self.last_fuel_sample_ms = now_ms;

        self.state.throttle_position_percent = record.throttle_position_percent;

        trace!(
            rate_cm3pm = rate,
            throttle_percent = record.throttle_position_percent,
            "fuel record applied"
        );
    }

    fn apply_excess_temperature(&mut self, record: ExcessTemperatureStatus) {
        if record.any_error() && !self.state.excess_temperature.any_error() {
            warn!(
                cht1 = record.cht1_temp,
                cht2 = record.cht2_temp,
                egt1 = record.egt1_temp,
                egt2 = record.egt2_temp,
                "excess temperature error reported"
            );
        }
        self.state.excess_temperature = record;
    }
}
