//! DSP front end — in-place FFT and sliding-window spectral features.
//!
//! # Pipeline position
//!
//! ```text
//! SampleRing ──▶ FeatureExtractor::slide ──▶ extract ──▶ Classifier::score
//! ```
//!
//! Everything here is single-threaded and owned by the detection loop; the
//! window and the feature slice are mutated in place every hop.

pub mod fft;
pub mod spectrum;

pub use spectrum::{normalize, FeatureExtractor};
