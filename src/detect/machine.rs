//! Per-hop detection logic: score, threshold, hidden-state lifecycle.
//!
//! [`Detector`] runs on the detection thread only.  It owns the classifier
//! and its hidden state and drives the shared [`WakeGate`] from every hop's
//! score.  Scoring never pauses: hops keep updating the hidden state while
//! Armed and while a recognition episode is in flight.

use crate::classifier::{Classifier, HIDDEN_SIZE};
use crate::detect::gate::WakeGate;

// ---------------------------------------------------------------------------
// HopOutcome
// ---------------------------------------------------------------------------

/// What one hop did to the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HopOutcome {
    /// Below threshold, machine already Idle.
    Quiet,
    /// Idle→Armed edge; the one-shot wake signal was emitted.
    Wake(f32),
    /// Above threshold while already Armed — no new signal.
    Held(f32),
    /// Armed→Idle transition; hidden state was zeroed.
    Disarmed,
    /// Below threshold but recognition is still running — stays Armed.
    Draining,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Threshold-driven wake detector with persistent classifier hidden state.
pub struct Detector {
    classifier: Box<dyn Classifier>,
    hidden: Vec<f32>,
    threshold: f32,
}

impl Detector {
    pub fn new(classifier: Box<dyn Classifier>, threshold: f32) -> Self {
        Self {
            classifier,
            hidden: vec![0.0; HIDDEN_SIZE],
            threshold,
        }
    }

    /// Score one hop's feature slice and apply the transition rules.
    pub fn observe(&mut self, features: &[f32], gate: &WakeGate) -> HopOutcome {
        let score = self.classifier.score(features, &mut self.hidden);

        if score > self.threshold {
            if gate.arm() {
                log::info!("detect: wake (score {score:.3})");
                HopOutcome::Wake(score)
            } else {
                HopOutcome::Held(score)
            }
        } else if gate.disarm() {
            // A fresh detection episode starts clean: discard the
            // accumulated temporal context.
            self.hidden.fill(0.0);
            log::debug!("detect: disarmed, hidden state reset");
            HopOutcome::Disarmed
        } else if gate.status() == crate::detect::gate::DetectionStatus::Armed {
            HopOutcome::Draining
        } else {
            HopOutcome::Quiet
        }
    }

    #[cfg(test)]
    pub(crate) fn hidden(&self) -> &[f32] {
        &self.hidden
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ScriptClassifier;
    use crate::detect::gate::DetectionStatus;

    const THRESHOLD: f32 = 0.9;

    fn detector(scores: Vec<f32>) -> Detector {
        Detector::new(Box::new(ScriptClassifier::new(scores)), THRESHOLD)
    }

    /// The end-to-end transition property: probability sequence
    /// [0.1, 0.96, 0.97, 0.2] against threshold 0.9 emits exactly one wake
    /// signal (second hop), and the hidden state resets only after the
    /// recognition episode completes.
    #[test]
    fn one_wake_per_edge_and_reset_after_completion() {
        let gate = WakeGate::new();
        let mut det = detector(vec![0.1, 0.96, 0.97, 0.2, 0.2]);
        let features = vec![0.0; crate::classifier::FEATURE_SIZE];

        assert_eq!(det.observe(&features, &gate), HopOutcome::Quiet);
        assert_eq!(det.observe(&features, &gate), HopOutcome::Wake(0.96));
        assert_eq!(det.observe(&features, &gate), HopOutcome::Held(0.97));

        // Below threshold, but recognition has not completed — Armed holds
        // and the hidden state keeps its accumulated context.
        assert_eq!(det.observe(&features, &gate), HopOutcome::Draining);
        assert_eq!(gate.status(), DetectionStatus::Armed);
        assert_eq!(det.hidden()[0], 4.0);

        gate.recognition_complete();
        assert_eq!(det.observe(&features, &gate), HopOutcome::Disarmed);
        assert_eq!(gate.status(), DetectionStatus::Idle);
        assert!(det.hidden().iter().all(|&h| h == 0.0));
    }

    #[test]
    fn hidden_keeps_updating_while_armed() {
        let gate = WakeGate::new();
        let mut det = detector(vec![0.95, 0.95, 0.95]);
        let features = vec![0.0; crate::classifier::FEATURE_SIZE];

        det.observe(&features, &gate);
        det.observe(&features, &gate);
        det.observe(&features, &gate);
        // ScriptClassifier bumps hidden[0] every call — not frozen by Armed.
        assert_eq!(det.hidden()[0], 3.0);
    }

    #[test]
    fn no_wake_when_always_below_threshold() {
        let gate = WakeGate::new();
        let mut det = detector(vec![0.2, 0.5, 0.89]);
        let features = vec![0.0; crate::classifier::FEATURE_SIZE];

        for _ in 0..3 {
            assert_eq!(det.observe(&features, &gate), HopOutcome::Quiet);
        }
        assert_eq!(gate.status(), DetectionStatus::Idle);
    }

    #[test]
    fn score_at_threshold_does_not_arm() {
        let gate = WakeGate::new();
        let mut det = detector(vec![THRESHOLD]);
        let features = vec![0.0; crate::classifier::FEATURE_SIZE];
        assert_eq!(det.observe(&features, &gate), HopOutcome::Quiet);
    }

    #[test]
    fn second_episode_starts_clean() {
        let gate = WakeGate::new();
        let mut det = detector(vec![0.95, 0.1, 0.95]);
        let features = vec![0.0; crate::classifier::FEATURE_SIZE];

        assert_eq!(det.observe(&features, &gate), HopOutcome::Wake(0.95));
        gate.recognition_complete();
        assert_eq!(det.observe(&features, &gate), HopOutcome::Disarmed);
        // New edge emits a new signal.
        assert_eq!(det.observe(&features, &gate), HopOutcome::Wake(0.95));
    }
}
