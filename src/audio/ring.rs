//! Concurrent sample ring buffer bridging the capture device and the two
//! consumers.
//!
//! [`SampleRing`] owns the [`AudioSource`] and a fixed i16 store with three
//! logical offsets over it:
//!
//! ```text
//!            ┌────────────── capacity ──────────────┐
//!  evicted   │  retained history   │   unread       │
//! ───────────┼─────────────────────┼────────────────┤
//!        history cursor          read            write
//! ```
//!
//! * [`pull`](SampleRing::pull) — consumption cursor.  Blocks (driving the
//!   device read primitive) until the caller's slice is filled.  Used only
//!   by the detection thread.
//! * [`history_pull`](SampleRing::history_pull) — retrospective cursor.
//!   Non-blocking copy of samples the detection thread already consumed,
//!   retained up to `history_len` behind the read cursor.  Used only by the
//!   recognition thread, gated on [`wait_history`](SampleRing::wait_history).
//!
//! Writes never overwrite unread data or retained history: the device read
//! is bounded by the free room `capacity - history_len - unread`, so the
//! producer waits rather than overwriting.  The retained-history counter is
//! the only cross-thread state; it lives under the ring's own mutex and is
//! broadcast on a dedicated condition variable whenever consumption pushes
//! it past the watermark a waiter announced — never a lock shared with the
//! detection status.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::audio::source::{AudioSource, DeviceError};
use crate::pipeline::CancelToken;

/// Poll slice for cancellable condvar waits.
const WAIT_SLICE: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// RingError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RingError {
    /// Capacity must leave room for the full history span plus one window
    /// of unread samples, otherwise the device write could never proceed.
    #[error("ring capacity {capacity} must exceed history_len {history_len} + window {window}")]
    Capacity {
        capacity: usize,
        history_len: usize,
        window: usize,
    },

    /// The requested history span was already evicted.  The eviction cursor
    /// auto-advances and `pull` caps retention at `history_len`, so this is
    /// a defensive guard for embedders composing their own history reads,
    /// not something the pipeline's own loops can produce.  It indicates a
    /// logic or configuration error, never a transient condition.
    #[error("requested history span was already evicted (retention is {history_len} samples)")]
    InsufficientHistory { history_len: usize },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

// ---------------------------------------------------------------------------
// SampleRing
// ---------------------------------------------------------------------------

struct RingInner {
    source: Box<dyn AudioSource>,
    buf: Vec<i16>,
    /// Total samples ever written by the device.
    write: u64,
    /// Total samples ever consumed through `pull`.
    read: u64,
    /// Samples behind the read cursor still retained for `history_pull`.
    /// Capped at `history_len`; the cap is the eviction point.
    history_avail: usize,
    /// Watermark the recognition thread is currently waiting on (0 = none).
    wanted: usize,
    history_len: usize,
    window: usize,
}

/// Shared ring buffer.  Interior mutability only; producer and consumers
/// interact exclusively through the accessors below, never raw indices.
pub struct SampleRing {
    inner: Mutex<RingInner>,
    history_ready: Condvar,
}

impl SampleRing {
    /// Build a ring of `capacity` samples over `source`.
    ///
    /// # Errors
    ///
    /// [`RingError::Capacity`] unless `capacity > history_len + window`.
    pub fn new(
        source: Box<dyn AudioSource>,
        capacity: usize,
        history_len: usize,
        window: usize,
    ) -> Result<Self, RingError> {
        if capacity <= history_len + window {
            return Err(RingError::Capacity {
                capacity,
                history_len,
                window,
            });
        }
        Ok(Self {
            inner: Mutex::new(RingInner {
                source,
                buf: vec![0; capacity],
                write: 0,
                read: 0,
                history_avail: 0,
                wanted: 0,
                history_len,
                window,
            }),
            history_ready: Condvar::new(),
        })
    }

    /// Fill `out` from the consumption cursor, blocking on the device read
    /// primitive until enough samples have been captured.
    ///
    /// Advances the retained-history counter by `out.len()` (capped at
    /// `history_len`) and notifies the history condvar when the counter
    /// crosses a waiter's announced watermark.
    pub fn pull(&self, out: &mut [i16]) -> Result<(), RingError> {
        let mut inner = self.inner.lock().unwrap();
        let mut filled = 0;
        while filled < out.len() {
            if inner.write == inner.read {
                inner.read_some()?;
                continue;
            }
            let n = inner.copy_read(&mut out[filled..]);
            filled += n;
        }

        inner.history_avail = inner.history_len.min(inner.history_avail + out.len());
        if inner.wanted > 0 && inner.history_avail >= inner.wanted {
            self.history_ready.notify_all();
        }
        Ok(())
    }

    /// Block until at least `min` history samples are retained, then return
    /// the retained count.  Returns `None` when `cancel` fires first.
    pub fn wait_history(&self, min: usize, cancel: &CancelToken) -> Option<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.wanted = min;
        loop {
            if inner.history_avail >= min {
                inner.wanted = 0;
                return Some(inner.history_avail);
            }
            if cancel.is_cancelled() {
                inner.wanted = 0;
                return None;
            }
            let (guard, _) = self.history_ready.wait_timeout(inner, WAIT_SLICE).unwrap();
            inner = guard;
        }
    }

    /// Copy up to `out.len()` retained samples in capture order, oldest
    /// first, advancing the history cursor.  Non-blocking; returns the
    /// number copied (0 when nothing is retained).
    pub fn history_pull(&self, out: &mut [i16]) -> Result<usize, RingError> {
        let mut inner = self.inner.lock().unwrap();
        // `pull` caps the counter at history_len on every write.
        debug_assert!(inner.history_avail <= inner.history_len);
        let n = out.len().min(inner.history_avail);
        let start = inner.read - inner.history_avail as u64;
        inner.copy_absolute(start, &mut out[..n]);
        inner.history_avail -= n;
        Ok(n)
    }

    /// Retained history sample count (test/diagnostic accessor).
    pub fn retained_history(&self) -> usize {
        self.inner.lock().unwrap().history_avail
    }

    /// Captured-but-unread sample count (test/diagnostic accessor).
    pub fn available(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        (inner.write - inner.read) as usize
    }
}

impl RingInner {
    /// One device read into the free region, bounded so that neither unread
    /// samples nor the retained-history span can be overwritten.
    fn read_some(&mut self) -> Result<(), RingError> {
        let capacity = self.buf.len();
        let unread = (self.write - self.read) as usize;
        let room = capacity - self.history_len - unread;
        if room == 0 {
            // Unreachable with a validated capacity: unread stays below one
            // window between device reads.
            return Err(RingError::Capacity {
                capacity,
                history_len: self.history_len,
                window: self.window,
            });
        }
        let pos = (self.write % capacity as u64) as usize;
        let run = room.min(capacity - pos);
        let end = pos + run;
        let n = self.source.read(&mut self.buf[pos..end])?;
        debug_assert!(n > 0, "AudioSource::read returned 0");
        self.write += n as u64;
        Ok(())
    }

    /// Copy from the consumption cursor, advancing it.  Returns how many
    /// samples were copied (bounded by the wrap and by what is unread).
    fn copy_read(&mut self, out: &mut [i16]) -> usize {
        let capacity = self.buf.len();
        let unread = (self.write - self.read) as usize;
        let pos = (self.read % capacity as u64) as usize;
        let n = out.len().min(unread).min(capacity - pos);
        out[..n].copy_from_slice(&self.buf[pos..pos + n]);
        self.read += n as u64;
        n
    }

    /// Copy `out.len()` samples starting at absolute position `start`,
    /// without moving any cursor.
    fn copy_absolute(&self, start: u64, out: &mut [i16]) {
        let capacity = self.buf.len();
        let mut pos = (start % capacity as u64) as usize;
        let mut copied = 0;
        while copied < out.len() {
            let n = (out.len() - copied).min(capacity - pos);
            out[copied..copied + n].copy_from_slice(&self.buf[pos..pos + n]);
            copied += n;
            pos = (pos + n) % capacity;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::ScriptSource;

    fn ring_over(samples: Vec<i16>, capacity: usize, history: usize, window: usize) -> SampleRing {
        SampleRing::new(
            Box::new(ScriptSource::new(samples, 64)),
            capacity,
            history,
            window,
        )
        .unwrap()
    }

    // ---- Construction -----------------------------------------------------

    #[test]
    fn capacity_must_exceed_history_plus_window() {
        let err = SampleRing::new(
            Box::new(ScriptSource::new(vec![], 8)),
            128,
            100,
            28,
        )
        .err()
        .unwrap();
        assert!(matches!(err, RingError::Capacity { .. }));

        assert!(SampleRing::new(Box::new(ScriptSource::new(vec![], 8)), 129, 100, 28).is_ok());
    }

    // ---- pull -------------------------------------------------------------

    #[test]
    fn pull_preserves_capture_order_across_wraps() {
        // Capacity 256, pulls totalling well past one wrap.
        let total = 1024usize;
        let samples: Vec<i16> = (0..total as i16).collect();
        let ring = ring_over(samples, 256, 96, 128);

        let mut seen = Vec::new();
        let mut out = [0i16; 128];
        for _ in 0..(total / 128) {
            ring.pull(&mut out).unwrap();
            seen.extend_from_slice(&out);
        }
        let expect: Vec<i16> = (0..total as i16).collect();
        assert_eq!(seen, expect);
    }

    #[test]
    fn pull_never_reports_more_than_written() {
        let ring = ring_over((0..300).collect(), 256, 64, 128);
        let mut out = [0i16; 100];
        ring.pull(&mut out).unwrap();
        // Whatever the device over-delivered is bounded by the free room.
        assert!(ring.available() <= 256 - 64);
    }

    #[test]
    fn pull_does_not_block_when_samples_are_available() {
        // The script holds exactly the requested total; if pull tried to
        // read the device again after satisfying the request it would hit
        // StreamClosed chunk-by-chunk. A full drain must succeed.
        let ring = ring_over((0..256).collect(), 512, 128, 128);
        let mut out = [0i16; 256];
        ring.pull(&mut out).unwrap();
        assert_eq!(out[255], 255);
    }

    #[test]
    fn exhausted_source_surfaces_stream_closed() {
        let ring = ring_over((0..64).collect(), 512, 128, 128);
        let mut out = [0i16; 128];
        let err = ring.pull(&mut out).unwrap_err();
        assert!(matches!(err, RingError::Device(DeviceError::StreamClosed)));
    }

    // ---- history ----------------------------------------------------------

    #[test]
    fn history_returns_consumed_samples_oldest_first() {
        let ring = ring_over((0..512).collect(), 512, 128, 128);
        let mut out = [0i16; 128];
        ring.pull(&mut out).unwrap();

        assert_eq!(ring.retained_history(), 128);
        let mut hist = [0i16; 50];
        assert_eq!(ring.history_pull(&mut hist).unwrap(), 50);
        let expect: Vec<i16> = (0..50).collect();
        assert_eq!(&hist[..], &expect[..]);

        // Cursor advanced: the next pull continues at 50.
        assert_eq!(ring.history_pull(&mut hist).unwrap(), 50);
        assert_eq!(hist[0], 50);
        assert_eq!(ring.retained_history(), 28);
    }

    #[test]
    fn history_caps_at_retention_and_drops_oldest() {
        // history_len 64: after consuming 200 samples the retained span is
        // the newest 64, i.e. samples 136..200.
        let ring = ring_over((0..400).collect(), 512, 64, 128);
        let mut out = [0i16; 100];
        ring.pull(&mut out).unwrap();
        ring.pull(&mut out).unwrap();

        assert_eq!(ring.retained_history(), 64);
        let mut hist = [0i16; 64];
        assert_eq!(ring.history_pull(&mut hist).unwrap(), 64);
        assert_eq!(hist[0], 136);
        assert_eq!(hist[63], 199);
    }

    #[test]
    fn history_pull_on_empty_returns_zero() {
        let ring = ring_over((0..64).collect(), 512, 128, 128);
        let mut hist = [0i16; 16];
        assert_eq!(ring.history_pull(&mut hist).unwrap(), 0);
    }

    #[test]
    fn wait_history_returns_once_watermark_reached() {
        let ring = ring_over((0..512).collect(), 512, 256, 128);
        let mut out = [0i16; 300];
        ring.pull(&mut out).unwrap();

        let cancel = CancelToken::new();
        let avail = ring.wait_history(256, &cancel).unwrap();
        assert_eq!(avail, 256);
    }

    #[test]
    fn wait_history_observes_cancellation() {
        let ring = ring_over(vec![], 512, 256, 128);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(ring.wait_history(256, &cancel), None);
    }

    #[test]
    fn wait_history_wakes_cross_thread() {
        use std::sync::Arc;

        let ring = Arc::new(ring_over((0..4096).collect(), 1024, 512, 128));
        let cancel = CancelToken::new();

        let waiter = {
            let ring = Arc::clone(&ring);
            let cancel = cancel.clone();
            std::thread::spawn(move || ring.wait_history(512, &cancel))
        };

        // Consume enough to cross the watermark from this thread.
        let mut out = [0i16; 128];
        for _ in 0..5 {
            ring.pull(&mut out).unwrap();
        }

        assert_eq!(waiter.join().unwrap(), Some(512));
    }
}
