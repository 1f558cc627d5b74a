//! Async poll loop
//!
//! The driver itself is synchronous and tick-driven; this module is the
//! bridge for async hosts. It owns a backend on a tokio task, ticks it at a
//! fixed cadence, and publishes changed snapshots through a watch channel,
//! so concurrent readers always observe a complete telemetry record.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::EfiBackend;
use crate::telemetry::EngineTelemetry;

/// Handle to a running poll task
pub struct PollHandle {
    telemetry: watch::Receiver<EngineTelemetry>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Receiver for published telemetry snapshots
    pub fn telemetry(&self) -> watch::Receiver<EngineTelemetry> {
        self.telemetry.clone()
    }

    /// Stop the poll loop and wait for the task to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            debug!(error = %e, "poll task join failed");
        }
    }
}

/// Spawn a poll loop ticking `backend` every `period`.
///
/// Must be called from within a tokio runtime. A snapshot is published
/// whenever its update timestamp advances; missed ticks are skipped rather
/// than bunched.
pub fn spawn_poller<B: EfiBackend + 'static>(mut backend: B, period: Duration) -> PollHandle {
    let (tx, rx) = watch::channel(backend.snapshot());
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    backend.tick();
                    let snapshot = backend.snapshot();
                    if snapshot.last_updated_ms != tx.borrow().last_updated_ms {
                        let _ = tx.send(snapshot);
                    }
                }
            }
        }
    });

    PollHandle {
        telemetry: rx,
        cancel,
        task,
    }
}
