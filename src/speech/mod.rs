//! Speech-recognition engine boundary.
//!
//! The recognition thread consumes the engine through [`SpeechEngine`]:
//! stream buffered history in with [`accept`](SpeechEngine::accept) until
//! the engine declares the utterance final (or the caller hits its length
//! cap), then collect the ordered [`Transcript`] alternatives.  Only the
//! first alternative whose text starts with the configured wake lexeme is
//! actionable.
//!
//! The production backend is Vosk ([`VoskEngine`], behind the `vosk` cargo
//! feature — the crate links the vendor libvosk shared library).  Engine
//! internals are opaque to the pipeline: failures propagate as
//! [`SpeechError`] and the caller decides policy.

#[cfg(feature = "vosk")]
pub mod vosk;

use thiserror::Error;

#[cfg(feature = "vosk")]
pub use self::vosk::VoskEngine;

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    #[error("failed to load speech model: {0}")]
    ModelLoad(String),

    #[error("recognizer setup failed: {0}")]
    RecognizerInit(String),

    /// Opaque failure inside the external engine.
    #[error("speech engine error: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// One candidate transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub text: String,
}

/// Ordered transcription candidates for one finalized utterance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub alternatives: Vec<Alternative>,
}

impl Transcript {
    /// First alternative whose text starts with `lexeme` (case-sensitive).
    /// Remaining alternatives are ignored once a match is found.
    pub fn actionable(&self, lexeme: &str) -> Option<&str> {
        self.alternatives
            .iter()
            .find(|a| a.text.starts_with(lexeme))
            .map(|a| a.text.as_str())
    }
}

// ---------------------------------------------------------------------------
// SpeechEngine trait
// ---------------------------------------------------------------------------

/// Streaming speech-to-text boundary.
///
/// # Contract
///
/// - `samples` are mono i16 at the pipeline sample rate.
/// - `accept` returns `Ok(true)` once the engine considers the current
///   utterance final; the caller then calls `final_result`, which also
///   resets the engine for the next utterance.
pub trait SpeechEngine: Send {
    /// Feed one chunk of samples.  Returns whether the utterance is final.
    fn accept(&mut self, samples: &[i16]) -> Result<bool, SpeechError>;

    /// Finalize and return the ranked alternatives.
    fn final_result(&mut self) -> Result<Transcript, SpeechError>;
}

// ---------------------------------------------------------------------------
// ScriptEngine (test-only)
// ---------------------------------------------------------------------------

/// Test double: reports the utterance final after a fixed number of accept
/// calls and returns a canned transcript.  Counters are shared so tests can
/// observe feeding across the thread boundary.
#[cfg(test)]
pub struct ScriptEngine {
    finalize_after_accepts: usize,
    transcript: Transcript,
    pub accepts: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    pub samples_fed: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    pub finalized: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl ScriptEngine {
    pub fn new(finalize_after_accepts: usize, alternatives: &[&str]) -> Self {
        Self {
            finalize_after_accepts,
            transcript: Transcript {
                alternatives: alternatives
                    .iter()
                    .map(|t| Alternative {
                        text: (*t).to_string(),
                    })
                    .collect(),
            },
            accepts: Default::default(),
            samples_fed: Default::default(),
            finalized: Default::default(),
        }
    }
}

#[cfg(test)]
impl SpeechEngine for ScriptEngine {
    fn accept(&mut self, samples: &[i16]) -> Result<bool, SpeechError> {
        use std::sync::atomic::Ordering;
        let n = self.accepts.fetch_add(1, Ordering::SeqCst) + 1;
        self.samples_fed.fetch_add(samples.len(), Ordering::SeqCst);
        Ok(n >= self.finalize_after_accepts)
    }

    fn final_result(&mut self) -> Result<Transcript, SpeechError> {
        use std::sync::atomic::Ordering;
        self.finalized.fetch_add(1, Ordering::SeqCst);
        self.accepts.store(0, Ordering::SeqCst);
        Ok(self.transcript.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
