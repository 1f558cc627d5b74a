//! Polling state machine properties, driven over an in-memory link with a
//! manual clock: the test plays the ECU side byte-for-byte.

use hirthlink_core::prelude::*;
use hirthlink_core::protocol::frame_checksum;
use pretty_assertions::assert_eq;

struct Harness {
    driver: HirthDriver,
    ecu: MemoryTransport,
    clock: ManualClock,
    throttle: SharedThrottle,
}

fn harness() -> Harness {
    let (driver_end, ecu_end) = memory_link();
    let clock = ManualClock::new();
    clock.set(1); // keep "never updated" (0) distinguishable
    let throttle = SharedThrottle::new();
    let driver = HirthDriver::new(
        Box::new(driver_end),
        Box::new(throttle.clone()),
        DriverConfig::default(),
    )
    .with_clock(Box::new(clock.clone()));
    Harness {
        driver,
        ecu: ecu_end,
        clock,
        throttle,
    }
}

/// Read whatever request the driver wrote
fn read_request(ecu: &mut MemoryTransport) -> Vec<u8> {
    let mut buf = [0u8; 64];
    let n = ecu.read(&mut buf).unwrap();
    buf[..n].to_vec()
}

fn response_frame(code: RequestCode, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![(payload.len() + 3) as u8, code as u8];
    frame.extend_from_slice(payload);
    let checksum = frame_checksum(&frame);
    frame.push(checksum);
    frame
}

fn zero_payload(code: RequestCode) -> Vec<u8> {
    vec![0u8; code.response_len() - 3]
}

/// Send one request, answer it correctly, and return the request's code byte
fn run_one_exchange(h: &mut Harness) -> u8 {
    h.driver.tick(); // send
    let request = read_request(&mut h.ecu);
    assert!(request.len() >= 3, "driver sent a malformed request");
    let code = RequestCode::from_byte(request[1]).expect("driver sent an unknown code");
    h.ecu
        .write_all(&response_frame(code, &zero_payload(code)))
        .unwrap();
    h.clock.advance(10);
    h.driver.tick(); // consume
    h.clock.advance(10);
    request[1]
}

#[test]
fn test_rotation_visits_status_codes_in_order() {
    let mut h = harness();
    let mut codes = Vec::new();
    for _ in 0..7 {
        codes.push(run_one_exchange(&mut h));
    }
    assert_eq!(codes, vec![0x04, 0x0B, 0x0D, 0x04, 0x0B, 0x0D, 0x04]);
}

#[test]
fn test_throttle_change_preempts_rotation_and_resumes() {
    let mut h = harness();
    assert_eq!(run_one_exchange(&mut h), 0x04); // rotation now at STATUS_2

    h.throttle.set(50);
    h.driver.tick();
    let request = read_request(&mut h.ecu);
    assert_eq!(request.len(), 23);
    assert_eq!(request[0], 0x17);
    assert_eq!(request[1], 0xC9);
    // 50% scaled by 10 -> 500, little-endian
    assert_eq!(request[2], 0xF4);
    assert_eq!(request[3], 0x01);

    h.ecu.write_all(&[0x03, 0xC9, 0x34]).unwrap(); // ack
    h.clock.advance(10);
    h.driver.tick(); // consume ack
    h.clock.advance(10);

    // rotation resumes where it left off
    assert_eq!(run_one_exchange(&mut h), 0x0B);
}

#[test]
fn test_unchanged_throttle_sends_no_second_command() {
    let mut h = harness();
    h.throttle.set(40);
    h.driver.tick();
    assert_eq!(read_request(&mut h.ecu)[1], 0xC9);
    h.ecu.write_all(&[0x03, 0xC9, 0x34]).unwrap();
    h.clock.advance(10);
    h.driver.tick();
    h.clock.advance(10);

    // same commanded value: back to status polling
    assert_eq!(run_one_exchange(&mut h), 0x04);
}

#[test]
fn test_checksum_failure_discards_and_retries_same_code() {
    let mut h = harness();
    h.driver.tick();
    assert_eq!(read_request(&mut h.ecu)[1], 0x04);

    let mut bad = response_frame(RequestCode::Status1, &zero_payload(RequestCode::Status1));
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    h.ecu.write_all(&bad).unwrap();
    h.clock.advance(10);
    h.driver.tick(); // rejects
    h.clock.advance(10);

    assert_eq!(h.driver.stats().checksum_failures, 1);
    assert_eq!(h.driver.snapshot().last_updated_ms, 0);
    assert!(!h.driver.is_healthy());

    // same rotation position is retried
    h.driver.tick();
    assert_eq!(read_request(&mut h.ecu)[1], 0x04);
}

#[test]
fn test_unexpected_code_discarded_without_update() {
    let mut h = harness();
    h.driver.tick();
    assert_eq!(read_request(&mut h.ecu)[1], 0x04);

    // a valid STATUS_1-sized frame carrying the wrong code
    let mut frame = vec![0x57, 0x0B];
    frame.extend_from_slice(&zero_payload(RequestCode::Status1));
    let checksum = frame_checksum(&frame);
    frame.push(checksum);
    h.ecu.write_all(&frame).unwrap();

    h.clock.advance(10);
    h.driver.tick();
    h.clock.advance(10);

    assert_eq!(h.driver.stats().unexpected_codes, 1);
    assert_eq!(h.driver.snapshot().last_updated_ms, 0);

    h.driver.tick();
    assert_eq!(read_request(&mut h.ecu)[1], 0x04);
}

#[test]
fn test_timeout_returns_to_idle_without_update() {
    let mut h = harness();
    h.driver.tick();
    assert_eq!(read_request(&mut h.ecu)[1], 0x04);

    // not yet past the deadline: still waiting, nothing new sent
    h.clock.advance(50);
    h.driver.tick();
    assert_eq!(h.ecu.available().unwrap(), 0);
    assert_eq!(h.driver.stats().timeouts, 0);

    // past the deadline: abandon the exchange
    h.clock.advance(60);
    h.driver.tick();
    assert_eq!(h.driver.stats().timeouts, 1);
    assert_eq!(h.driver.snapshot().last_updated_ms, 0);
    assert!(!h.driver.is_healthy());

    // retries the same rotation position on the next tick
    h.driver.tick();
    assert_eq!(read_request(&mut h.ecu)[1], 0x04);
}

#[test]
fn test_rpm_decode_example() {
    let mut h = harness();
    h.driver.tick();
    assert_eq!(read_request(&mut h.ecu), vec![0x03, 0x04, 0xF9]);

    let mut payload = zero_payload(RequestCode::Status1);
    payload[8] = 0x04; // status word: engine running
    payload[10] = 0xC4; // RPM 2500 little-endian
    payload[11] = 0x09;
    payload[82] = 0x0F;
    h.ecu
        .write_all(&response_frame(RequestCode::Status1, &payload))
        .unwrap();

    h.clock.advance(10);
    h.driver.tick();

    let snapshot = h.driver.snapshot();
    assert_eq!(snapshot.engine_speed_rpm, 2500);
    assert_eq!(snapshot.engine_state, EngineState::Running);
    assert!(snapshot.sensor_health.all_ok());
    assert!(h.driver.is_healthy());
    assert_eq!(h.driver.stats().responses_ok, 1);
}

#[test]
fn test_fuel_record_updates_rates_and_throttle_feedback() {
    let mut h = harness();
    assert_eq!(run_one_exchange(&mut h), 0x04); // rotation now at STATUS_2

    h.driver.tick();
    assert_eq!(read_request(&mut h.ecu)[1], 0x0B);
    let mut payload = zero_payload(RequestCode::Status2);
    payload[52] = 0xF4; // 500 counts -> 50.0 cm³/min
    payload[53] = 0x01;
    payload[62] = 0xF4; // 500 counts -> 50.0 %
    payload[63] = 0x01;
    h.ecu
        .write_all(&response_frame(RequestCode::Status2, &payload))
        .unwrap();
    h.clock.advance(10);
    h.driver.tick();

    let snapshot = h.driver.snapshot();
    assert_eq!(snapshot.fuel_consumption_rate_cm3pm, 50.0);
    assert_eq!(snapshot.throttle_position_percent, 50.0);
}

#[test]
fn test_health_goes_stale_without_fresh_telemetry() {
    let mut h = harness();
    run_one_exchange(&mut h);
    assert!(h.driver.is_healthy());

    h.clock.advance(301);
    assert!(!h.driver.is_healthy());
}
