//! Detection state machine — threshold logic, hidden-state lifecycle, and
//! the cross-thread wake handoff.
//!
//! Split in two: [`Detector`] is the detection thread's private half
//! (classifier + hidden state), [`WakeGate`] is the shared half (status +
//! edge-triggered wake signal behind its own mutex/condvar pair).

pub mod gate;
pub mod machine;

pub use gate::{DetectionStatus, WakeGate};
pub use machine::{Detector, HopOutcome};
