//! Capture ring and console tee.
//!
//! Every byte written to the console is also kept in a fixed-capacity ring
//! so the diagnostic web interface can show the most recent output without
//! a serial cable.
//!
//! ```text
//!             ┌───────────────┐  1. push   ┌───────────────┐
//! log bytes ─▶│  CaptureTee   │───────────▶│ CaptureBuffer │◀── CaptureReader
//!             └───────────────┘            └───────────────┘     (web route)
//!                     │ 2. forward
//!                     ▼
//!              console sink (UART / stdout)
//! ```
//!
//! The ring lives behind `Arc<Mutex<_>>`: the firmware is single-threaded,
//! but the logger that owns the tee must be `Sync`.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use heapless::Deque;

/// Ring capacity in bytes.
pub const CAPTURE_CAPACITY: usize = 4192;

// ───────────────────────────────────────────────────────────────
// Ring buffer
// ───────────────────────────────────────────────────────────────

/// Fixed-capacity byte FIFO that overwrites the oldest byte when full.
pub struct CaptureBuffer<const N: usize = CAPTURE_CAPACITY> {
    ring: Deque<u8, N>,
}

impl<const N: usize> CaptureBuffer<N> {
    pub const fn new() -> Self {
        Self { ring: Deque::new() }
    }

    /// Append one byte, evicting the oldest when at capacity.
    pub fn push(&mut self, byte: u8) {
        if self.ring.is_full() {
            self.ring.pop_front();
        }
        // Only fails for a zero-capacity ring.
        let _ = self.ring.push_back(byte);
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Byte at `index`, where 0 is the oldest byte retained.
    pub fn get(&self, index: usize) -> Option<u8> {
        let (front, back) = self.ring.as_slices();
        if index < front.len() {
            Some(front[index])
        } else {
            back.get(index - front.len()).copied()
        }
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.ring.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let (front, back) = self.ring.as_slices();
        let mut out = Vec::with_capacity(front.len() + back.len());
        out.extend_from_slice(front);
        out.extend_from_slice(back);
        out
    }
}

impl<const N: usize> Default for CaptureBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

type SharedRing<const N: usize> = Arc<Mutex<CaptureBuffer<N>>>;

fn lock<const N: usize>(ring: &SharedRing<N>) -> MutexGuard<'_, CaptureBuffer<N>> {
    // A panic mid-push leaves at worst one byte missing; keep going.
    ring.lock().unwrap_or_else(PoisonError::into_inner)
}

// ───────────────────────────────────────────────────────────────
// Tee
// ───────────────────────────────────────────────────────────────

/// Writes every byte to the ring first and to the wrapped sink second.
///
/// Neither step can prevent the other: sink errors are swallowed and the
/// ring never fails. Pass `&mut W` to keep ownership of the sink with the
/// caller.
pub struct CaptureTee<S: Write, const N: usize = CAPTURE_CAPACITY> {
    sink: S,
    ring: SharedRing<N>,
}

impl<S: Write, const N: usize> CaptureTee<S, N> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            ring: Arc::new(Mutex::new(CaptureBuffer::new())),
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        lock(&self.ring).push(byte);
        let _ = self.sink.write_all(&[byte]);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        lock(&self.ring).extend_from_slice(bytes);
        let _ = self.sink.write_all(bytes);
    }

    /// Read-only handle on the live ring contents.
    pub fn reader(&self) -> CaptureReader<N> {
        CaptureReader {
            ring: Arc::clone(&self.ring),
        }
    }
}

impl<S: Write, const N: usize> Write for CaptureTee<S, N> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.sink.flush();
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Reader
// ───────────────────────────────────────────────────────────────

/// Shared, read-only view of a tee's ring. Every call observes the contents
/// at that moment.
#[derive(Clone)]
pub struct CaptureReader<const N: usize = CAPTURE_CAPACITY> {
    ring: SharedRing<N>,
}

impl<const N: usize> CaptureReader<N> {
    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<u8> {
        lock(&self.ring).to_vec()
    }

    pub fn len(&self) -> usize {
        lock(&self.ring).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.ring).is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        lock(&self.ring).get(index)
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> core::fmt::Debug for CaptureReader<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CaptureReader")
            .field("len", &self.len())
            .field("capacity", &N)
            .finish()
    }
}
