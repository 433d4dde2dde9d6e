//! Pipeline configuration: tunable constants, TOML persistence, and
//! startup validation.
//!
//! Every tuned constant in the pipeline lives in [`PipelineConfig`] so the
//! relationships between them (`buffer_capacity` vs `history_len`, feature
//! bins vs window size) can be checked once in [`validate`](PipelineConfig::validate)
//! instead of asserted piecemeal at each construction site.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// All pipeline tunables.  The defaults reproduce the constants the
/// detector was trained against, so a missing config file is never an
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Mono sample rate the whole pipeline runs at (Hz).
    pub sample_rate: u32,
    /// FFT window length in samples; hops advance by half of this.
    pub window_size: usize,
    /// Number of spectral magnitude bins fed to the classifier.
    pub feature_size: usize,
    /// First FFT bin kept; bins below carry DC and rumble.
    pub low_bin: usize,
    /// Ring buffer capacity in samples.
    pub buffer_capacity: usize,
    /// Samples of already-read audio the ring retains for recognition.
    pub history_len: usize,
    /// Largest chunk handed to the speech engine per accept call.
    pub recognition_chunk: usize,
    /// Hard cap on one utterance, in seconds of audio fed to the engine.
    pub max_utterance_secs: u32,
    /// Floor for the spectral mean normalizer.
    pub norm_floor: f32,
    /// Wake probability threshold; a score strictly above this arms.
    pub threshold: f32,
    /// Literal the transcript must start with to be actionable.
    pub wake_lexeme: String,
    /// Directory scanned for `.re` pattern files and their targets.
    pub skills_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            window_size: 128,
            feature_size: 40,
            low_bin: 3,
            buffer_capacity: 64_000,
            history_len: 24_000,
            recognition_chunk: 8_000,
            max_utterance_secs: 10,
            norm_floor: 1e-5,
            threshold: 0.9,
            wake_lexeme: "aria".to_string(),
            skills_dir: PathBuf::from("skills"),
        }
    }
}

impl PipelineConfig {
    /// Load from `path`, falling back to defaults when the file does not
    /// exist yet.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the cross-field invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.window_size < 2 || !self.window_size.is_power_of_two() {
            return invalid(format!(
                "window_size {} must be a power of two >= 2",
                self.window_size
            ));
        }
        if self.buffer_capacity <= self.history_len + self.window_size {
            return invalid(format!(
                "buffer_capacity {} must exceed history_len {} + window_size {}",
                self.buffer_capacity, self.history_len, self.window_size
            ));
        }
        if self.feature_size == 0 || self.low_bin + self.feature_size > self.window_size / 2 {
            return invalid(format!(
                "feature bins [{}, {}) exceed the usable half-spectrum of a {}-sample window",
                self.low_bin,
                self.low_bin + self.feature_size,
                self.window_size
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return invalid(format!("threshold {} must lie in (0, 1)", self.threshold));
        }
        if self.recognition_chunk == 0 || self.recognition_chunk > self.history_len {
            return invalid(format!(
                "recognition_chunk {} must be in 1..={}",
                self.recognition_chunk, self.history_len
            ));
        }
        if self.norm_floor <= 0.0 {
            return invalid(format!("norm_floor {} must be positive", self.norm_floor));
        }
        if self.wake_lexeme.is_empty() {
            return invalid("wake_lexeme must not be empty".to_string());
        }
        Ok(())
    }

    /// Samples allowed into the engine for one utterance.
    pub fn max_utterance_samples(&self) -> usize {
        self.max_utterance_secs as usize * self.sample_rate as usize
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
