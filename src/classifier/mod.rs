//! Streaming wake-word classifier boundary.
//!
//! The detection loop consumes classifiers through the [`Classifier`] trait:
//! one normalized spectrum slice in, one probability out, with a persistent
//! hidden-state vector carried across hops by the caller.  [`WakeNet`] is
//! the forward-only reference implementation; its training happens offline
//! and is out of scope here — weights arrive through the flat binary blob
//! codec in [`weights`].

pub mod net;
pub mod weights;

pub use net::WakeNet;
pub use weights::{load_weights, save_weights, WeightsError};

/// Spectrum-slice length the classifier consumes per hop.
pub const FEATURE_SIZE: usize = 40;
/// Hidden-state length carried across hops.
pub const HIDDEN_SIZE: usize = 128;
/// Width of the intermediate dense layers.
pub const LINEAR_SIZE: usize = 128;

// ---------------------------------------------------------------------------
// Classifier trait
// ---------------------------------------------------------------------------

/// Forward-only scorer with caller-owned hidden state.
///
/// `features` is the normalized spectrum slice ([`FEATURE_SIZE`] values);
/// `hidden` ([`HIDDEN_SIZE`] values) is updated in place — the caller
/// decides when to zero it (the detection state machine does so on the
/// Armed→Idle transition).
pub trait Classifier: Send {
    /// Score one hop.  Returns the wake probability in `[0, 1]`.
    fn score(&self, features: &[f32], hidden: &mut [f32]) -> f32;
}

// Compile-time assertion: Box<dyn Classifier> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Classifier>) {}
};

// ---------------------------------------------------------------------------
// ScriptClassifier (test-only)
// ---------------------------------------------------------------------------

/// Test double replaying a fixed probability sequence, ignoring features.
///
/// Each call also increments `hidden[0]` so tests can observe that hidden
/// state keeps accumulating until the state machine resets it.
#[cfg(test)]
pub struct ScriptClassifier {
    scores: Vec<f32>,
    next: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            next: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
impl Classifier for ScriptClassifier {
    fn score(&self, _features: &[f32], hidden: &mut [f32]) -> f32 {
        let i = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        hidden[0] += 1.0;
        // Past the script, stay quiet.
        self.scores.get(i).copied().unwrap_or(0.0)
    }
}
