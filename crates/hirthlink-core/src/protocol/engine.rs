//! Polling state machine
//!
//! Drives the cyclic request/response exchange with the ECU. Exactly one
//! request is outstanding at any time; the link has no transaction IDs, so
//! correlation rests entirely on this sequencing. Throttle commands take
//! priority over the status rotation, and checksum failures or timeouts are
//! recovered by discarding buffered input and retrying on a later tick —
//! nothing here panics or blocks.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::frame::{encode_set_values, encode_status_request, validate_response, RequestCode};
use super::{
    ProtocolError, Transport, DEFAULT_HEALTH_TIMEOUT_MS, DEFAULT_RESPONSE_TIMEOUT_MS,
};
use crate::backend::EfiBackend;
use crate::clock::{Clock, SystemClock};
use crate::telemetry::decode::decode;
use crate::telemetry::{EngineTelemetry, TelemetryAggregator};
use crate::throttle::ThrottleSource;

/// Driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// How long to wait for a response before discarding the exchange, ms
    pub response_timeout_ms: u64,
    /// Telemetry age beyond which the driver reports unhealthy, ms
    pub health_timeout_ms: u64,
    /// Number of fuel-rate samples in the running average
    pub fuel_average_window: usize,
    /// Fuel-rate calibration slope
    pub fuel_rate_slope: f32,
    /// Fuel-rate calibration offset
    pub fuel_rate_offset: f32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            health_timeout_ms: DEFAULT_HEALTH_TIMEOUT_MS,
            fuel_average_window: 10,
            fuel_rate_slope: 1.0,
            fuel_rate_offset: 0.0,
        }
    }
}

/// Link health and failure counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinkStats {
    /// Request frames written to the transport
    pub requests_sent: u32,
    /// Responses validated and decoded
    pub responses_ok: u32,
    /// Responses rejected for checksum or framing errors
    pub checksum_failures: u32,
    /// Responses rejected because the code did not match the request
    pub unexpected_codes: u32,
    /// Requests abandoned after the response deadline
    pub timeouts: u32,
}

/// Link session state across ticks
#[derive(Debug, Clone, Copy)]
enum LinkState {
    /// No request outstanding
    Idle,
    /// Request written, waiting for `expected` bytes
    AwaitingResponse {
        code: RequestCode,
        expected: usize,
        sent_at_ms: u64,
    },
}

/// Protocol driver for a Hirth ECU on a half-duplex serial link.
///
/// Owns its transport exclusively. Advance it with [`tick`](Self::tick) at a
/// steady 10–50 Hz; it never blocks and never sleeps.
pub struct HirthDriver {
    transport: Box<dyn Transport>,
    throttle: Box<dyn ThrottleSource>,
    clock: Box<dyn Clock>,
    config: DriverConfig,
    link: LinkState,
    next_status: RequestCode,
    last_throttle_sent: u16,
    aggregator: TelemetryAggregator,
    stats: LinkStats,
}

impl HirthDriver {
    /// Create a driver over `transport`, polling `throttle` for commands
    pub fn new(
        transport: Box<dyn Transport>,
        throttle: Box<dyn ThrottleSource>,
        config: DriverConfig,
    ) -> Self {
        let aggregator = TelemetryAggregator::new(
            config.fuel_average_window,
            config.fuel_rate_slope,
            config.fuel_rate_offset,
        );
        Self {
            transport,
            throttle,
            clock: Box::new(SystemClock::new()),
            config,
            link: LinkState::Idle,
            next_status: RequestCode::Status1,
            last_throttle_sent: 0,
            aggregator,
            stats: LinkStats::default(),
        }
    }

    /// Replace the time source (tests, simulation)
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Advance the state machine by one step.
    ///
    /// While a request is outstanding this checks for (and consumes) the
    /// response or gives up after the response deadline; otherwise it sends
    /// the next request, preferring a throttle command over the status
    /// rotation.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        match self.link {
            LinkState::AwaitingResponse {
                code,
                expected,
                sent_at_ms,
            } => self.poll_response(code, expected, sent_at_ms, now),
            LinkState::Idle => self.send_next_request(now),
        }
    }

    /// Latest aggregated telemetry, by value
    pub fn snapshot(&self) -> EngineTelemetry {
        self.aggregator.snapshot()
    }

    /// Whether telemetry is fresh enough to trust
    pub fn is_healthy(&self) -> bool {
        let last = self.aggregator.last_updated_ms();
        last != 0 && self.clock.now_ms().saturating_sub(last) < self.config.health_timeout_ms
    }

    /// Link counters since driver start
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Active configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn poll_response(&mut self, code: RequestCode, expected: usize, sent_at_ms: u64, now: u64) {
        let available = match self.transport.available() {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "transport error while polling, resetting link");
                self.reset_link();
                return;
            }
        };

        if available >= expected {
            match self.consume_response(code, expected, now) {
                Ok(()) => self.stats.responses_ok += 1,
                Err(e) => {
                    match e {
                        ProtocolError::ChecksumMismatch { .. }
                        | ProtocolError::LengthMismatch { .. }
                        | ProtocolError::ShortFrame { .. } => self.stats.checksum_failures += 1,
                        ProtocolError::UnexpectedCode { .. } => self.stats.unexpected_codes += 1,
                        _ => {}
                    }
                    debug!(code = code as u8, error = %e, "response rejected, discarding input");
                    let _ = self.transport.discard_input();
                }
            }
            self.link = LinkState::Idle;
        } else if now.saturating_sub(sent_at_ms) > self.config.response_timeout_ms {
            self.stats.timeouts += 1;
            debug!(
                code = code as u8,
                available, expected, "response timeout, discarding input"
            );
            self.reset_link();
        }
    }

    fn reset_link(&mut self) {
        let _ = self.transport.discard_input();
        self.link = LinkState::Idle;
    }

    fn consume_response(
        &mut self,
        code: RequestCode,
        expected: usize,
        now: u64,
    ) -> Result<(), ProtocolError> {
        let mut frame = vec![0u8; expected];
        let mut filled = 0;
        while filled < expected {
            let n = self.transport.read(&mut frame[filled..])?;
            if n == 0 {
                // transport promised these bytes but withdrew them
                return Err(ProtocolError::ShortFrame { len: filled });
            }
            filled += n;
        }

        let response = validate_response(&frame)?;
        if response.code != code as u8 {
            return Err(ProtocolError::UnexpectedCode {
                expected: code as u8,
                actual: response.code,
            });
        }

        let delta = decode(code, response.payload)?;
        // the rotation only moves past a status code once its response
        // decoded; failed cycles retry the same code
        if code.is_status() {
            self.next_status = code.next_status();
        }
        self.aggregator.apply(delta, now);
        Ok(())
    }

    fn send_next_request(&mut self, now: u64) {
        let commanded = self.throttle.commanded_throttle();
        let (code, frame): (RequestCode, Vec<u8>) = if commanded != self.last_throttle_sent {
            (
                RequestCode::SetValues,
                encode_set_values(commanded).to_vec(),
            )
        } else {
            (
                self.next_status,
                encode_status_request(self.next_status).to_vec(),
            )
        };

        if let Err(e) = self.transport.write_all(&frame) {
            warn!(code = code as u8, error = %e, "failed to write request");
            return;
        }
        if code == RequestCode::SetValues {
            self.last_throttle_sent = commanded;
        }

        trace!(code = code as u8, len = frame.len(), "request sent");
        self.stats.requests_sent += 1;
        self.link = LinkState::AwaitingResponse {
            code,
            expected: code.response_len(),
            sent_at_ms: now,
        };
    }
}

impl EfiBackend for HirthDriver {
    fn tick(&mut self) {
        HirthDriver::tick(self)
    }

    fn snapshot(&self) -> EngineTelemetry {
        HirthDriver::snapshot(self)
    }

    fn is_healthy(&self) -> bool {
        HirthDriver::is_healthy(self)
    }
}
