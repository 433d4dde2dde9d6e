//! Audio front end — microphone capture and the shared sample ring.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → ChannelSource (mpsc) → SampleRing
//!                                                       ├─ pull()          detection thread
//!                                                       └─ history_pull()  recognition thread
//! ```
//!
//! [`AudioCapture`] owns device selection and the cpal stream; the stream
//! itself stays on the spawning thread behind a [`StreamHandle`] RAII guard
//! while the [`ChannelSource`] half crosses into the [`SampleRing`].  The
//! ring fans the live feed out to both consumer threads: the detection
//! thread drains it in hop-sized reads while the recognition thread
//! replays retained history after a wake.

pub mod capture;
pub mod ring;
pub mod source;

pub use capture::{AudioCapture, ChannelSource, StreamHandle};
pub use ring::{RingError, SampleRing};
pub use source::{AudioSource, DeviceError};
