//! Byte transport abstraction
//!
//! The driver owns its transport exclusively for its whole lifetime and
//! never blocks on it: reads return whatever is already buffered and writes
//! are fire-and-forget.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// Non-blocking byte transport to the ECU
pub trait Transport: Send {
    /// Number of bytes currently buffered for reading
    fn available(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` buffered bytes, returning how many were
    /// copied. May return fewer bytes than `available` reported; callers
    /// must re-check before consuming.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Queue bytes for transmission
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Drop all buffered input
    fn discard_input(&mut self) -> io::Result<()>;
}

type SharedBuf = Arc<Mutex<VecDeque<u8>>>;

fn lock(buf: &SharedBuf) -> io::Result<MutexGuard<'_, VecDeque<u8>>> {
    buf.lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory link poisoned"))
}

/// One end of an in-memory duplex link.
///
/// Used by the integration tests and the simulated ECU; bytes written on one
/// end become readable on the other.
pub struct MemoryTransport {
    rx: SharedBuf,
    tx: SharedBuf,
}

/// Create a cross-connected transport pair.
///
/// Returns `(driver_end, device_end)`; the distinction is only by
/// convention, the two ends are symmetric.
pub fn memory_link() -> (MemoryTransport, MemoryTransport) {
    let a: SharedBuf = Arc::new(Mutex::new(VecDeque::new()));
    let b: SharedBuf = Arc::new(Mutex::new(VecDeque::new()));
    (
        MemoryTransport {
            rx: Arc::clone(&a),
            tx: Arc::clone(&b),
        },
        MemoryTransport { rx: b, tx: a },
    )
}

impl Transport for MemoryTransport {
    fn available(&mut self) -> io::Result<usize> {
        Ok(lock(&self.rx)?.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut rx = lock(&self.rx)?;
        let mut copied = 0;
        while copied < buf.len() {
            match rx.pop_front() {
                Some(byte) => {
                    buf[copied] = byte;
                    copied += 1;
                }
                None => break,
            }
        }
        Ok(copied)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        lock(&self.tx)?.extend(bytes.iter().copied());
        Ok(())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        lock(&self.rx)?.clear();
        Ok(())
    }
}
