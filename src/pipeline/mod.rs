//! Pipeline orchestration — wires capture, detection, recognition, and
//! dispatch into two long-lived threads.
//!
//! ```text
//! detection thread                      recognition thread
//! ────────────────                      ──────────────────
//! ring.pull(hop) ──▶ FeatureExtractor   gate.wait_for_wake()
//!        │              │                     │
//!        ▼              ▼                     ▼
//!   SampleRing     Detector.observe ──▶ ring.history_pull ──▶ SpeechEngine
//!   (history)           │                     │
//!                   WakeGate            Transcript → lexeme check → Dispatch
//! ```
//!
//! [`CancelToken`] is honored at every blocking wait so a run can be torn
//! down deterministically from either side.

pub mod cancel;
pub mod runner;

pub use cancel::CancelToken;
pub use runner::{Pipeline, PipelineError};
