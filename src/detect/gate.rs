//! Cross-thread half of the detection state machine.
//!
//! [`WakeGate`] holds the [`DetectionStatus`] plus the one-shot wake signal
//! under a single dedicated mutex with its own condition variable — the
//! ring buffer's history signal is guarded separately so the detection
//! thread never stalls behind recognition work.
//!
//! The wake signal is edge-triggered: it fires once per Idle→Armed edge and
//! re-arming while already Armed does not re-signal.  The gate tracks the
//! in-flight recognition episode so the Armed→Idle transition (and the
//! hidden-state reset that rides on it) waits for
//! [`recognition_complete`](WakeGate::recognition_complete).

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::pipeline::CancelToken;

/// Poll slice for cancellable condvar waits.
const WAIT_SLICE: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// DetectionStatus
// ---------------------------------------------------------------------------

/// Listening status of the detection state machine.
///
/// ```text
/// Idle ──score > threshold──▶ Armed        (one wake signal)
/// Armed ──score ≤ threshold AND recognition complete──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStatus {
    /// Waiting for the wake word.
    Idle,
    /// Wake word heard; a recognition episode is (or was just) in flight.
    Armed,
}

// ---------------------------------------------------------------------------
// WakeGate
// ---------------------------------------------------------------------------

struct GateState {
    status: DetectionStatus,
    /// Wake signal emitted but not yet observed by the recognition thread.
    wake_pending: bool,
    /// Recognition episode for the current arming still running.
    recognizing: bool,
}

/// Single-producer/single-consumer wake handoff between the detection and
/// recognition threads.
pub struct WakeGate {
    state: Mutex<GateState>,
    wake: Condvar,
}

impl Default for WakeGate {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                status: DetectionStatus::Idle,
                wake_pending: false,
                recognizing: false,
            }),
            wake: Condvar::new(),
        }
    }

    /// Detection side: the score crossed the threshold.
    ///
    /// Returns `true` when this was an Idle→Armed edge and the one-shot
    /// wake signal was emitted; `false` while already Armed.
    pub fn arm(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if st.status == DetectionStatus::Armed {
            return false;
        }
        st.status = DetectionStatus::Armed;
        st.wake_pending = true;
        st.recognizing = true;
        self.wake.notify_one();
        true
    }

    /// Detection side: the score fell to or below the threshold.
    ///
    /// Completes the Armed→Idle transition only when the recognition
    /// episode for this arming has finished.  Returns `true` on the actual
    /// transition — the caller zeroes the classifier hidden state exactly
    /// then.
    pub fn disarm(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if st.status == DetectionStatus::Armed && !st.recognizing {
            st.status = DetectionStatus::Idle;
            return true;
        }
        false
    }

    /// Recognition side: block until a wake signal arrives.
    ///
    /// Returns `false` when `cancel` fires before a signal.  Consumes the
    /// pending signal.
    pub fn wait_for_wake(&self, cancel: &CancelToken) -> bool {
        let mut st = self.state.lock().unwrap();
        loop {
            if st.wake_pending {
                st.wake_pending = false;
                return true;
            }
            if cancel.is_cancelled() {
                return false;
            }
            let (guard, _) = self.wake.wait_timeout(st, WAIT_SLICE).unwrap();
            st = guard;
        }
    }

    /// Recognition side: the episode for the current arming is done
    /// (dispatched or not).  The status itself clears on the detection
    /// thread's next at-or-below-threshold hop.
    pub fn recognition_complete(&self) {
        let mut st = self.state.lock().unwrap();
        st.recognizing = false;
    }

    pub fn status(&self) -> DetectionStatus {
        self.state.lock().unwrap().status
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
