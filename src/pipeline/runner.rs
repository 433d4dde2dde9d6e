//! The two-thread pipeline runner.
//!
//! [`Pipeline::run`] drives the detection loop on the calling thread and
//! spawns the recognition loop on a second thread.  Detection never blocks
//! except on the ring's sample pull; all slow work (speech engine, skill
//! execution) happens on the recognition side.
//!
//! # Episode shape
//!
//! A recognition episode starts when the wake signal arrives and ends when
//! the speech engine reports the utterance final or the utterance-length
//! cap is reached.  History is consumed in capture order, chunk by chunk,
//! blocking on the ring's history watermark between chunks.  The gate is
//! told the episode is over whether or not anything was dispatched, so the
//! detection side can complete the Armed→Idle transition.

use std::sync::Arc;
use std::thread;

use thiserror::Error;

use crate::audio::{AudioSource, RingError, SampleRing};
use crate::classifier::Classifier;
use crate::config::{ConfigError, PipelineConfig};
use crate::detect::{Detector, WakeGate};
use crate::dsp::FeatureExtractor;
use crate::pipeline::CancelToken;
use crate::skills::Dispatch;
use crate::speech::{SpeechEngine, SpeechError};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ring(#[from] RingError),

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error("recognition thread panicked")]
    RecognitionPanicked,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Fully wired wake-word pipeline.  Everything is injected: the audio
/// source, classifier, speech engine, and dispatch table are constructed
/// by the caller and passed in.
pub struct Pipeline {
    config: PipelineConfig,
    ring: Arc<SampleRing>,
    gate: Arc<WakeGate>,
    cancel: CancelToken,
    detector: Detector,
    extractor: FeatureExtractor,
    engine: Box<dyn SpeechEngine>,
    dispatch: Box<dyn Dispatch>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        source: Box<dyn AudioSource>,
        classifier: Box<dyn Classifier>,
        engine: Box<dyn SpeechEngine>,
        dispatch: Box<dyn Dispatch>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let ring = Arc::new(SampleRing::new(
            source,
            config.buffer_capacity,
            config.history_len,
            config.window_size,
        )?);
        let extractor = FeatureExtractor::new(
            config.window_size,
            config.low_bin,
            config.feature_size,
            config.norm_floor,
        );
        let detector = Detector::new(classifier, config.threshold);

        Ok(Self {
            config,
            ring,
            gate: Arc::new(WakeGate::new()),
            cancel: CancelToken::new(),
            detector,
            extractor,
            engine,
            dispatch,
        })
    }

    /// Token that tears the run down from outside (signal handlers, tests).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run until the capture stream ends or the cancel token fires.
    ///
    /// The end of the capture stream is a clean shutdown; any other device,
    /// ring, or speech-engine failure is returned as the error it was.
    pub fn run(self) -> Result<(), PipelineError> {
        let Pipeline {
            config,
            ring,
            gate,
            cancel,
            mut detector,
            mut extractor,
            mut engine,
            dispatch,
        } = self;

        let recognizer = {
            let ring = Arc::clone(&ring);
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            let config = config.clone();
            thread::Builder::new()
                .name("recognition".into())
                .spawn(move || {
                    let result =
                        recognition_loop(&ring, &gate, &mut *engine, &*dispatch, &config, &cancel);
                    if result.is_err() {
                        // Let the detection side unwind instead of running
                        // headless forever.
                        cancel.cancel();
                    }
                    result
                })
                .map_err(|_| PipelineError::RecognitionPanicked)?
        };

        let detection = detection_loop(&ring, &gate, &mut detector, &mut extractor, &cancel);
        cancel.cancel();
        let recognition = recognizer
            .join()
            .map_err(|_| PipelineError::RecognitionPanicked)?;

        detection.and(recognition)
    }
}

// ---------------------------------------------------------------------------
// Detection loop
// ---------------------------------------------------------------------------

/// Prime one full window, then score every half-window hop until the
/// stream ends or the token fires.
fn detection_loop(
    ring: &SampleRing,
    gate: &WakeGate,
    detector: &mut Detector,
    extractor: &mut FeatureExtractor,
    cancel: &CancelToken,
) -> Result<(), PipelineError> {
    let mut window = vec![0i16; extractor.window_size()];
    match ring.pull(&mut window) {
        Ok(()) => extractor.prime(&window),
        Err(err) => return end_of_stream(err),
    }

    let mut hop = vec![0i16; extractor.hop_size()];
    while !cancel.is_cancelled() {
        detector.observe(extractor.extract(), gate);
        match ring.pull(&mut hop) {
            Ok(()) => extractor.slide(&hop),
            Err(err) => return end_of_stream(err),
        }
    }
    log::info!("pipeline: detection loop cancelled");
    Ok(())
}

/// A closed capture stream is how a run ends, not a failure.
fn end_of_stream(err: RingError) -> Result<(), PipelineError> {
    use crate::audio::DeviceError;
    if matches!(err, RingError::Device(DeviceError::StreamClosed)) {
        log::info!("pipeline: capture stream ended");
        Ok(())
    } else {
        Err(err.into())
    }
}

// ---------------------------------------------------------------------------
// Recognition loop
// ---------------------------------------------------------------------------

fn recognition_loop(
    ring: &SampleRing,
    gate: &WakeGate,
    engine: &mut dyn SpeechEngine,
    dispatch: &dyn Dispatch,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<(), PipelineError> {
    while gate.wait_for_wake(cancel) {
        log::info!("pipeline: wake signal received, starting recognition");
        let episode = run_episode(ring, engine, config, cancel);
        // The detection side needs the completion regardless of outcome.
        gate.recognition_complete();

        match episode? {
            Some(utterance) => {
                if dispatch.dispatch(&utterance).is_none() {
                    log::info!("pipeline: no skill matched \"{utterance}\"");
                }
            }
            None => log::debug!("pipeline: episode ended without an actionable transcript"),
        }
    }
    log::info!("pipeline: recognition loop cancelled");
    Ok(())
}

/// Feed buffered history to the engine until it finalizes or the utterance
/// cap is hit, then pick the actionable alternative.
///
/// Returns `Ok(None)` when cancelled mid-episode or when no alternative
/// starts with the wake lexeme.
fn run_episode(
    ring: &SampleRing,
    engine: &mut dyn SpeechEngine,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<Option<String>, PipelineError> {
    let cap = config.max_utterance_samples();
    let mut chunk = vec![0i16; config.recognition_chunk];
    let mut fed = 0usize;

    loop {
        let want = config.recognition_chunk.min(cap - fed);
        if ring.wait_history(want, cancel).is_none() {
            return Ok(None);
        }
        let n = ring.history_pull(&mut chunk[..want])?;
        let is_final = engine.accept(&chunk[..n])?;
        fed += n;

        if is_final {
            break;
        }
        if fed >= cap {
            log::warn!("pipeline: utterance cap reached after {fed} samples, forcing finalize");
            break;
        }
    }

    let transcript = engine.final_result()?;
    log::debug!(
        "pipeline: transcript with {} alternative(s)",
        transcript.alternatives.len()
    );
    Ok(transcript
        .actionable(&config.wake_lexeme)
        .map(str::to_string))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};

    use crate::audio::source::ScriptSource;
    use crate::classifier::ScriptClassifier;
    use crate::speech::ScriptEngine;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Records every dispatched utterance.
    struct RecordingDispatch {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingDispatch {
        fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    seen: Arc::clone(&seen),
                },
                seen,
            )
        }
    }

    impl Dispatch for RecordingDispatch {
        fn dispatch(&self, utterance: &str) -> Option<String> {
            self.seen.lock().unwrap().push(utterance.to_string());
            Some("recorded".to_string())
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Small, fast geometry that still satisfies every validation rule.
    fn test_config() -> PipelineConfig {
        PipelineConfig {
            sample_rate: 1_000,
            window_size: 128,
            feature_size: 40,
            low_bin: 3,
            buffer_capacity: 8_192,
            history_len: 4_000,
            recognition_chunk: 512,
            max_utterance_secs: 2,
            ..PipelineConfig::default()
        }
    }

    fn pipeline(
        config: PipelineConfig,
        samples: Vec<i16>,
        scores: Vec<f32>,
        engine: ScriptEngine,
    ) -> (Pipeline, Arc<Mutex<Vec<String>>>) {
        let (dispatch, seen) = RecordingDispatch::new();
        let pipeline = Pipeline::new(
            config,
            Box::new(ScriptSource::new(samples, 256)),
            Box::new(ScriptClassifier::new(scores)),
            Box::new(engine),
            Box::new(dispatch),
        )
        .unwrap();
        (pipeline, seen)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    fn wake_leads_to_recognition_and_dispatch() {
        let engine = ScriptEngine::new(1, &["aria turn on the lights"]);
        let finalized = Arc::clone(&engine.finalized);

        // Spike above the default 0.9 threshold on the second hop.
        let (pipeline, seen) = pipeline(
            test_config(),
            vec![0i16; 6_400],
            vec![0.0, 0.95],
            engine,
        );

        pipeline.run().unwrap();

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["aria turn on the lights"]
        );
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_wake_means_no_engine_activity() {
        let engine = ScriptEngine::new(1, &["aria never heard"]);
        let accepts = Arc::clone(&engine.accepts);

        let (pipeline, seen) = pipeline(
            test_config(),
            vec![0i16; 6_400],
            vec![0.1, 0.5, 0.89],
            engine,
        );

        pipeline.run().unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(accepts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn transcript_without_lexeme_prefix_is_not_dispatched() {
        let engine = ScriptEngine::new(1, &["turn on the lights", "hello there"]);
        let finalized = Arc::clone(&engine.finalized);

        let (pipeline, seen) = pipeline(
            test_config(),
            vec![0i16; 6_400],
            vec![0.0, 0.95],
            engine,
        );

        pipeline.run().unwrap();

        // Recognition completed, but nothing was actionable.
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn utterance_cap_forces_finalize() {
        // Engine never finalizes on its own; the cap (2 s × 1 kHz = 2000
        // samples) must cut the episode off.
        let engine = ScriptEngine::new(usize::MAX, &["aria long story"]);
        let samples_fed = Arc::clone(&engine.samples_fed);

        let (pipeline, seen) = pipeline(
            test_config(),
            vec![0i16; 6_400],
            vec![0.0, 0.95],
            engine,
        );

        pipeline.run().unwrap();

        assert_eq!(samples_fed.load(Ordering::SeqCst), 2_000);
        assert_eq!(seen.lock().unwrap().as_slice(), ["aria long story"]);
    }

    #[test]
    fn stream_end_without_activity_is_a_clean_shutdown() {
        let engine = ScriptEngine::new(1, &[]);
        let (pipeline, _) = pipeline(test_config(), vec![0i16; 1_024], vec![], engine);
        pipeline.run().unwrap();
    }

    #[test]
    fn external_cancel_stops_a_live_pipeline() {
        // Enough audio to keep the detection loop busy for a while.
        let engine = ScriptEngine::new(1, &[]);
        let (pipeline, _) = pipeline(test_config(), vec![0i16; 1_000_000], vec![], engine);

        let cancel = pipeline.cancel_token();
        cancel.cancel();
        pipeline.run().unwrap();
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = test_config();
        config.buffer_capacity = config.history_len; // too small
        let (dispatch, _) = RecordingDispatch::new();
        let err = Pipeline::new(
            config,
            Box::new(ScriptSource::new(vec![], 256)),
            Box::new(ScriptClassifier::new(vec![])),
            Box::new(ScriptEngine::new(1, &[])),
            Box::new(dispatch),
        )
        .err()
        .unwrap();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
