//! Wakeline — an always-on, offline wake-word pipeline.
//!
//! Listens to a microphone continuously, scores each half-window hop of
//! audio with a small recurrent classifier, and on a wake-word detection
//! hands the buffered audio to a speech engine whose transcript is routed
//! to regex-matched skills.
//!
//! # Architecture
//!
//! ```text
//! cpal capture ─▶ SampleRing ─▶ FeatureExtractor ─▶ Detector ─▶ WakeGate
//!                    │  (retained history)                         │ wake
//!                    └──────────▶ SpeechEngine ◀───────────────────┘
//!                                     │ transcript
//!                                     ▼
//!                                 SkillSet (regex → child process / module)
//! ```
//!
//! Two threads do all the work: the detection thread never blocks except
//! on the ring's sample pull, and the recognition thread absorbs all slow
//! work (speech decoding, skill execution).  See [`pipeline::Pipeline`]
//! for the entry point.

pub mod audio;
pub mod classifier;
pub mod config;
pub mod detect;
pub mod dsp;
pub mod pipeline;
pub mod skills;
pub mod speech;
