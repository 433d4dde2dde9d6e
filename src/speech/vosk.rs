//! Vosk backend for the [`SpeechEngine`] trait.
//!
//! Compiled only with the `vosk` cargo feature: the binding links the
//! vendor `libvosk` shared library, so the default build stays free of
//! native link requirements.  The recognizer is configured for ranked
//! alternatives and is reset after every finalized utterance.

use std::path::Path;

use vosk::{CompleteResult, DecodingState, Model, Recognizer};

use crate::speech::{Alternative, SpeechEngine, SpeechError, Transcript};

/// Ranked alternatives requested per utterance.
const MAX_ALTERNATIVES: u16 = 5;

pub struct VoskEngine {
    recognizer: Recognizer,
}

impl VoskEngine {
    /// Load the acoustic model at `model_dir` and build a recognizer for
    /// `sample_rate` Hz mono input.
    pub fn new(model_dir: impl AsRef<Path>, sample_rate: u32) -> Result<Self, SpeechError> {
        let model_dir = model_dir.as_ref();
        let model = Model::new(model_dir.to_string_lossy().as_ref()).ok_or_else(|| {
            SpeechError::ModelLoad(format!("cannot open model at {}", model_dir.display()))
        })?;

        let mut recognizer =
            Recognizer::new(&model, sample_rate as f32).ok_or_else(|| {
                SpeechError::RecognizerInit(format!("recognizer rejected rate {sample_rate}"))
            })?;
        recognizer.set_max_alternatives(MAX_ALTERNATIVES);

        log::info!(
            "speech: vosk model loaded from {} ({sample_rate} Hz, {MAX_ALTERNATIVES} alternatives)",
            model_dir.display()
        );
        Ok(Self { recognizer })
    }
}

impl SpeechEngine for VoskEngine {
    fn accept(&mut self, samples: &[i16]) -> Result<bool, SpeechError> {
        match self.recognizer.accept_waveform(samples) {
            DecodingState::Finalized => Ok(true),
            DecodingState::Running => Ok(false),
            DecodingState::Failed => Err(SpeechError::Engine(
                "recognizer failed to process waveform".into(),
            )),
        }
    }

    fn final_result(&mut self) -> Result<Transcript, SpeechError> {
        // final_result also resets the recognizer for the next utterance.
        let alternatives = match self.recognizer.final_result() {
            CompleteResult::Multiple(multi) => multi
                .alternatives
                .into_iter()
                .map(|a| Alternative {
                    text: a.text.to_string(),
                })
                .collect(),
            CompleteResult::Single(single) => vec![Alternative {
                text: single.text.to_string(),
            }],
        };
        Ok(Transcript { alternatives })
    }
}
