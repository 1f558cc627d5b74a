//! Simulated Hirth ECU
//!
//! Speaks the device side of the wire protocol, for development and testing
//! without hardware. Pair it with the driver over [`memory_link`]: it parses
//! request frames (checksum-verified), applies set-values throttle commands
//! with a low-pass response, and serves the three status records with
//! plausible engine behavior.
//!
//! [`memory_link`]: crate::protocol::memory_link

use byteorder::{ByteOrder, LittleEndian};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::protocol::frame::{frame_checksum, RequestCode};
use crate::protocol::Transport;
use crate::telemetry::decode::{FUEL_CONSUMPTION_RESOLUTION, KELVIN_CONVERSION_CONSTANT};

const IDLE_RPM: f32 = 850.0;
const MAX_RPM: f32 = 6500.0;

/// Device-side protocol simulator
pub struct SimulatedEcu {
    port: Box<dyn Transport>,
    rx: Vec<u8>,
    /// last set-values payload, wire counts (percent × 10)
    throttle_setting: u16,
    /// low-pass tracked throttle actually applied, percent
    throttle_percent: f32,
    rpm: f32,
    service_delay_ms: u64,
    pending: Option<(RequestCode, u64)>,
    rng: StdRng,
}

impl SimulatedEcu {
    /// Create a simulator on the device end of a link
    pub fn new(port: Box<dyn Transport>) -> Self {
        Self::with_seed(port, rand::random())
    }

    /// Create a simulator with a fixed RNG seed for deterministic runs
    pub fn with_seed(port: Box<dyn Transport>, seed: u64) -> Self {
        Self {
            port,
            rx: Vec::new(),
            throttle_setting: 0,
            throttle_percent: 0.0,
            rpm: IDLE_RPM,
            service_delay_ms: 0,
            pending: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Delay between receiving a request and answering it (default 0)
    pub fn with_service_delay(mut self, ms: u64) -> Self {
        self.service_delay_ms = ms;
        self
    }

    /// Throttle the simulated engine is currently applying, percent
    pub fn throttle_percent(&self) -> f32 {
        self.throttle_percent
    }

    /// Current simulated engine speed, RPM
    pub fn rpm(&self) -> f32 {
        self.rpm
    }

    /// Run one simulation step: advance the engine model, consume any
    /// buffered requests, and answer the pending one
    pub fn update(&mut self, now_ms: u64) {
        self.step_engine();
        self.receive(now_ms);
        self.send(now_ms);
    }

    fn step_engine(&mut self) {
        let target = f32::from(self.throttle_setting) / 10.0;
        self.throttle_percent = 0.9 * self.throttle_percent + 0.1 * target;

        let target_rpm = IDLE_RPM + self.throttle_percent / 100.0 * (MAX_RPM - IDLE_RPM);
        let wobble = self.rng.gen_range(-15.0..15.0);
        self.rpm = (0.8 * self.rpm + 0.2 * target_rpm + wobble).max(0.0);
    }

    fn receive(&mut self, now_ms: u64) {
        let mut buf = [0u8; 64];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => self.rx.extend_from_slice(&buf[..n]),
            }
        }

        while !self.rx.is_empty() {
            let expected = self.rx[0] as usize;
            if expected < 3 {
                debug!(quantity = expected, "unframeable request, dropping buffer");
                self.rx.clear();
                break;
            }
            if self.rx.len() < expected {
                break;
            }
            let frame: Vec<u8> = self.rx.drain(..expected).collect();
            self.handle_frame(&frame, now_ms);
        }
    }

    fn handle_frame(&mut self, frame: &[u8], now_ms: u64) {
        let expected = frame_checksum(&frame[..frame.len() - 1]);
        if frame[frame.len() - 1] != expected {
            debug!("request checksum failed, dropping frame");
            return;
        }
        match RequestCode::from_byte(frame[1]) {
            Some(RequestCode::SetValues) if frame.len() >= 4 => {
                self.throttle_setting = LittleEndian::read_u16(&frame[2..4]);
                self.pending = Some((RequestCode::SetValues, now_ms));
            }
            Some(code) if code.is_status() => {
                self.pending = Some((code, now_ms));
            }
            _ => debug!(code = frame[1], "unknown request code, ignoring"),
        }
    }

    fn send(&mut self, now_ms: u64) {
        let Some((code, requested_at)) = self.pending else {
            return;
        };
        if now_ms.saturating_sub(requested_at) < self.service_delay_ms {
            return;
        }
        self.pending = None;

        let frame = match code {
            RequestCode::Status1 => self.record1(),
            RequestCode::Status2 => self.record2(),
            RequestCode::Status3 => self.record3(),
            RequestCode::SetValues => pack(RequestCode::SetValues, &[]),
        };
        if let Err(e) = self.port.write_all(&frame) {
            debug!(error = %e, "simulated ECU write failed");
        }
    }

    fn record1(&mut self) -> Vec<u8> {
        let mut payload = [0u8; 84];
        let status_word: u16 = if self.rpm >= 1000.0 { 4 } else { 2 };
        put_u16(&mut payload, 8, status_word);
        put_u16(&mut payload, 10, self.rpm as u16);
        put_u16(&mut payload, 32, 6); // injection time counts
        put_u16(&mut payload, 34, 12); // ignition degrees
        let cht = 105.0 + self.rng.gen_range(0.0..10.0);
        let egt = 510.0 + self.rng.gen_range(0.0..20.0);
        put_u16(&mut payload, 74, (cht + KELVIN_CONVERSION_CONSTANT) as u16);
        put_u16(&mut payload, 76, 12); // battery
        put_u16(&mut payload, 78, (egt + KELVIN_CONVERSION_CONSTANT) as u16);
        payload[82] = 0x0F; // all sensors OK
        pack(RequestCode::Status1, &payload)
    }

    fn record2(&mut self) -> Vec<u8> {
        let mut payload = [0u8; 98];
        // very rough consumption curve over RPM
        let rate_cm3pm = (self.rpm - 1500.0).max(0.0) / 2200.0 * 10.0;
        put_u16(
            &mut payload,
            52,
            (rate_cm3pm * FUEL_CONSUMPTION_RESOLUTION) as u16,
        );
        put_u16(&mut payload, 62, (self.throttle_percent * 10.0) as u16);
        pack(RequestCode::Status2, &payload)
    }

    fn record3(&mut self) -> Vec<u8> {
        let mut payload = [0u8; 100];
        put_u16(&mut payload, 16, 110 + self.rng.gen_range(0..8));
        put_u16(&mut payload, 18, 112 + self.rng.gen_range(0..8));
        put_u16(&mut payload, 20, 530 + self.rng.gen_range(0..15));
        put_u16(&mut payload, 22, 535 + self.rng.gen_range(0..15));
        // no excess-temperature errors
        put_u16(&mut payload, 46, 0);
        pack(RequestCode::Status3, &payload)
    }
}

fn put_u16(payload: &mut [u8], offset: usize, value: u16) {
    LittleEndian::write_u16(&mut payload[offset..offset + 2], value);
}

fn pack(code: RequestCode, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 3);
    frame.push((payload.len() + 3) as u8);
    frame.push(code as u8);
    frame.extend_from_slice(payload);
    frame.push(frame_checksum(&frame));
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        encode_set_values, encode_status_request, memory_link, validate_response,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_answers_status_request_with_valid_record() {
        let (mut driver_end, ecu_end) = memory_link();
        let mut ecu = SimulatedEcu::with_seed(Box::new(ecu_end), 1);

        driver_end
            .write_all(&encode_status_request(RequestCode::Status1))
            .unwrap();
        ecu.update(0);

        let mut buf = [0u8; 128];
        let n = driver_end.read(&mut buf).unwrap();
        assert_eq!(n, RequestCode::Status1.response_len());
        let frame = validate_response(&buf[..n]).expect("record must validate");
        assert_eq!(frame.code, RequestCode::Status1 as u8);
    }

    #[test]
    fn test_acks_set_values_and_tracks_throttle() {
        let (mut driver_end, ecu_end) = memory_link();
        let mut ecu = SimulatedEcu::with_seed(Box::new(ecu_end), 1);

        driver_end.write_all(&encode_set_values(60)).unwrap();
        ecu.update(0);

        let mut buf = [0u8; 8];
        let n = driver_end.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x03, 0xC9, 0x34]);

        // low-pass: converges towards 60% over repeated updates
        for now in 1..100 {
            ecu.update(now);
        }
        assert!(ecu.throttle_percent() > 55.0);
    }

    #[test]
    fn test_service_delay_defers_response() {
        let (mut driver_end, ecu_end) = memory_link();
        let mut ecu = SimulatedEcu::with_seed(Box::new(ecu_end), 1).with_service_delay(20);

        driver_end
            .write_all(&encode_status_request(RequestCode::Status2))
            .unwrap();
        ecu.update(0);
        assert_eq!(driver_end.available().unwrap(), 0);

        ecu.update(25);
        assert_eq!(
            driver_end.available().unwrap(),
            RequestCode::Status2.response_len()
        );
    }

    #[test]
    fn test_corrupt_request_is_dropped() {
        let (mut driver_end, ecu_end) = memory_link();
        let mut ecu = SimulatedEcu::with_seed(Box::new(ecu_end), 1);

        driver_end.write_all(&[0x03, 0x04, 0x00]).unwrap(); // bad checksum
        ecu.update(0);
        assert_eq!(driver_end.available().unwrap(), 0);
    }
}
