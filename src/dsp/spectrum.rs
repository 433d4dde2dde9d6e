//! Sliding-window spectral feature extraction.
//!
//! [`FeatureExtractor`] owns the analysis window and turns each hop of raw
//! i16 samples into the normalized power-spectrum slice the classifier
//! consumes:
//!
//! ```text
//! i16 samples ── /32767 ──▶ window (128) ── FFT ──▶ |bins [3, 43)| ──▶ / max(mean, floor)
//! ```
//!
//! The window advances with 50 % overlap: every hop discards the first half
//! and appends `window_size / 2` fresh samples, mutating the window in
//! place.  The lowest `low_bin` complex bins are rejected (DC and near-DC
//! drift carry no voicing information) and the Nyquist-redundant upper half
//! is never read.

use num_complex::Complex32;

use crate::dsp::fft;

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

/// Divide every element of `slice` by `max(mean(slice), floor)`.
///
/// The floor keeps near-silent input from exploding the slice: for any
/// non-negative slice with mean `m`, output equals `slice / max(m, floor)`
/// elementwise.
pub fn normalize(slice: &mut [f32], floor: f32) {
    if slice.is_empty() {
        return;
    }
    let mean = slice.iter().sum::<f32>() / slice.len() as f32;
    let denom = mean.max(floor);
    for x in slice.iter_mut() {
        *x /= denom;
    }
}

// ---------------------------------------------------------------------------
// FeatureExtractor
// ---------------------------------------------------------------------------

/// Fixed-size analysis window plus the in-place transform scratch space.
///
/// One instance lives on the detection thread; both the window and the
/// feature slice are recreated/mutated every hop and never cross threads.
pub struct FeatureExtractor {
    /// Current window contents, scaled to `[-1.0, 1.0]`.
    window: Vec<f32>,
    /// Complex FFT workspace (re-filled from `window` each hop).
    scratch: Vec<Complex32>,
    /// Output slice, `feature_size` magnitudes.
    features: Vec<f32>,
    /// First kept complex bin.
    low_bin: usize,
    /// Normalization divisor floor.
    norm_floor: f32,
}

impl FeatureExtractor {
    /// Create an extractor.
    ///
    /// # Panics
    ///
    /// Panics when `window_size` is not a power of two or the kept bin range
    /// `[low_bin, low_bin + feature_size)` reaches into the Nyquist-redundant
    /// upper half.  [`crate::config::PipelineConfig::validate`] rejects such
    /// configurations before an extractor is ever built.
    pub fn new(window_size: usize, low_bin: usize, feature_size: usize, norm_floor: f32) -> Self {
        assert!(
            window_size.is_power_of_two() && window_size >= 2,
            "window_size must be a power of two >= 2, got {window_size}"
        );
        assert!(
            low_bin + feature_size <= window_size / 2,
            "bins [{low_bin}, {}) exceed the usable half-spectrum of {}",
            low_bin + feature_size,
            window_size / 2
        );
        Self {
            window: vec![0.0; window_size],
            scratch: vec![Complex32::new(0.0, 0.0); window_size],
            features: vec![0.0; feature_size],
            low_bin,
            norm_floor,
        }
    }

    /// Number of samples consumed per hop (half the window).
    pub fn hop_size(&self) -> usize {
        self.window.len() / 2
    }

    /// Full window length in samples.
    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Fill the entire window — used once at startup before the first hop.
    ///
    /// # Panics
    ///
    /// Panics when `samples.len() != window_size`.
    pub fn prime(&mut self, samples: &[i16]) {
        assert_eq!(samples.len(), self.window.len());
        for (dst, &s) in self.window.iter_mut().zip(samples) {
            *dst = scale(s);
        }
    }

    /// Advance one hop: drop the first half of the window, append `fresh`.
    ///
    /// # Panics
    ///
    /// Panics when `fresh.len() != hop_size()`.
    pub fn slide(&mut self, fresh: &[i16]) {
        let hop = self.hop_size();
        assert_eq!(fresh.len(), hop);
        self.window.copy_within(hop.., 0);
        for (dst, &s) in self.window[hop..].iter_mut().zip(fresh) {
            *dst = scale(s);
        }
    }

    /// Transform the current window and return the normalized spectrum slice.
    ///
    /// The returned slice is valid until the next `extract` call.
    pub fn extract(&mut self) -> &[f32] {
        for (dst, &w) in self.scratch.iter_mut().zip(&self.window) {
            *dst = Complex32::new(w, 0.0);
        }
        fft::forward(&mut self.scratch);

        for (i, dst) in self.features.iter_mut().enumerate() {
            *dst = self.scratch[self.low_bin + i].norm();
        }
        normalize(&mut self.features, self.norm_floor);
        &self.features
    }
}

fn scale(s: i16) -> f32 {
    s as f32 / i16::MAX as f32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
