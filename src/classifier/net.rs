//! Forward-only reference network: dense front end, GRU core, dense head.
//!
//! Layer stack (widths in parentheses):
//!
//! ```text
//! slice (40) ─ l1+ReLU ─ l2+ReLU ─ l3+ReLU ─ GRU ─ l4+ReLU ─ l5+ReLU ─ l6 ─ softmax
//!                (128)     (128)     (128)   (128)   (128)     (128)    (2)
//! ```
//!
//! The wake probability is the softmax mass of class 1.  Only the GRU
//! carries state between hops, and that state lives with the caller.

use crate::classifier::{Classifier, FEATURE_SIZE, HIDDEN_SIZE, LINEAR_SIZE};

// ---------------------------------------------------------------------------
// Linear
// ---------------------------------------------------------------------------

/// Dense layer `y = W·x + b`, `W` row-major `out_dim × in_dim`.
pub(crate) struct Linear {
    pub(crate) w: Vec<f32>,
    pub(crate) b: Vec<f32>,
    in_dim: usize,
    out_dim: usize,
}

impl Linear {
    fn zeros(in_dim: usize, out_dim: usize) -> Self {
        Self {
            w: vec![0.0; in_dim * out_dim],
            b: vec![0.0; out_dim],
            in_dim,
            out_dim,
        }
    }

    fn apply(&self, x: &[f32], out: &mut [f32]) {
        debug_assert_eq!(x.len(), self.in_dim);
        debug_assert_eq!(out.len(), self.out_dim);
        for (o, out_slot) in out.iter_mut().enumerate() {
            let row = &self.w[o * self.in_dim..(o + 1) * self.in_dim];
            let mut acc = self.b[o];
            for (wi, xi) in row.iter().zip(x) {
                acc += wi * xi;
            }
            *out_slot = acc;
        }
    }
}

// ---------------------------------------------------------------------------
// GruCell
// ---------------------------------------------------------------------------

/// Gated recurrent unit, input and hidden both [`HIDDEN_SIZE`] wide.
///
/// Update convention:
///
/// ```text
/// r  = σ(Wr·x + Ur·h + br)
/// z  = σ(Wz·x + Uz·h + bz)
/// h~ = tanh(Wh·x + Uh·(r∘h) + bh)
/// h' = z∘h + (1−z)∘h~
/// ```
pub(crate) struct GruCell {
    pub(crate) wr: Vec<f32>,
    pub(crate) ur: Vec<f32>,
    pub(crate) br: Vec<f32>,
    pub(crate) wz: Vec<f32>,
    pub(crate) uz: Vec<f32>,
    pub(crate) bz: Vec<f32>,
    pub(crate) wh: Vec<f32>,
    pub(crate) uh: Vec<f32>,
    pub(crate) bh: Vec<f32>,
    dim: usize,
}

impl GruCell {
    fn zeros(dim: usize) -> Self {
        Self {
            wr: vec![0.0; dim * dim],
            ur: vec![0.0; dim * dim],
            br: vec![0.0; dim],
            wz: vec![0.0; dim * dim],
            uz: vec![0.0; dim * dim],
            bz: vec![0.0; dim],
            wh: vec![0.0; dim * dim],
            uh: vec![0.0; dim * dim],
            bh: vec![0.0; dim],
            dim,
        }
    }

    fn step(&self, x: &[f32], hidden: &mut [f32]) {
        let d = self.dim;
        let mut r = vec![0.0f32; d];
        let mut z = vec![0.0f32; d];
        let mut cand = vec![0.0f32; d];

        gate(&self.wr, &self.ur, &self.br, x, hidden, &mut r, sigmoid);
        gate(&self.wz, &self.uz, &self.bz, x, hidden, &mut z, sigmoid);

        // Candidate uses the reset-gated hidden state.
        let gated: Vec<f32> = r.iter().zip(hidden.iter()).map(|(ri, hi)| ri * hi).collect();
        gate(&self.wh, &self.uh, &self.bh, x, &gated, &mut cand, f32::tanh);

        for i in 0..d {
            hidden[i] = z[i] * hidden[i] + (1.0 - z[i]) * cand[i];
        }
    }
}

/// `out = act(W·x + U·h + b)` with row-major square matrices.
fn gate(
    w: &[f32],
    u: &[f32],
    b: &[f32],
    x: &[f32],
    h: &[f32],
    out: &mut [f32],
    act: impl Fn(f32) -> f32,
) {
    let d = out.len();
    for (o, out_slot) in out.iter_mut().enumerate() {
        let mut acc = b[o];
        let wrow = &w[o * d..(o + 1) * d];
        let urow = &u[o * d..(o + 1) * d];
        for i in 0..d {
            acc += wrow[i] * x[i] + urow[i] * h[i];
        }
        *out_slot = act(acc);
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn relu_in_place(buf: &mut [f32]) {
    for x in buf.iter_mut() {
        if *x < 0.0 {
            *x = 0.0;
        }
    }
}

// ---------------------------------------------------------------------------
// WakeNet
// ---------------------------------------------------------------------------

/// The reference classifier.  Construct zeroed and fill via
/// [`crate::classifier::load_weights`].
pub struct WakeNet {
    pub(crate) l1: Linear,
    pub(crate) l2: Linear,
    pub(crate) l3: Linear,
    pub(crate) l4: Linear,
    pub(crate) l5: Linear,
    pub(crate) l6: Linear,
    pub(crate) cell: GruCell,
}

impl WakeNet {
    /// All-zero parameters.  Scores 0.5 on any input until weights are
    /// loaded — useful only as a codec target and in tests.
    pub fn zeros() -> Self {
        Self {
            l1: Linear::zeros(FEATURE_SIZE, LINEAR_SIZE),
            l2: Linear::zeros(LINEAR_SIZE, LINEAR_SIZE),
            l3: Linear::zeros(LINEAR_SIZE, LINEAR_SIZE),
            l4: Linear::zeros(HIDDEN_SIZE, LINEAR_SIZE),
            l5: Linear::zeros(LINEAR_SIZE, LINEAR_SIZE),
            l6: Linear::zeros(LINEAR_SIZE, 2),
            cell: GruCell::zeros(HIDDEN_SIZE),
        }
    }

    /// Parameter arrays in the declared on-disk order.
    pub(crate) fn params(&self) -> [&[f32]; 21] {
        [
            &self.l1.w, &self.l1.b,
            &self.l2.w, &self.l2.b,
            &self.l3.w, &self.l3.b,
            &self.l4.w, &self.l4.b,
            &self.l5.w, &self.l5.b,
            &self.l6.w, &self.l6.b,
            &self.cell.wr, &self.cell.ur, &self.cell.br,
            &self.cell.wz, &self.cell.uz, &self.cell.bz,
            &self.cell.wh, &self.cell.uh, &self.cell.bh,
        ]
    }

    /// Mutable view of the same arrays, same order.
    pub(crate) fn params_mut(&mut self) -> [&mut Vec<f32>; 21] {
        [
            &mut self.l1.w, &mut self.l1.b,
            &mut self.l2.w, &mut self.l2.b,
            &mut self.l3.w, &mut self.l3.b,
            &mut self.l4.w, &mut self.l4.b,
            &mut self.l5.w, &mut self.l5.b,
            &mut self.l6.w, &mut self.l6.b,
            &mut self.cell.wr, &mut self.cell.ur, &mut self.cell.br,
            &mut self.cell.wz, &mut self.cell.uz, &mut self.cell.bz,
            &mut self.cell.wh, &mut self.cell.uh, &mut self.cell.bh,
        ]
    }
}

impl Classifier for WakeNet {
    fn score(&self, features: &[f32], hidden: &mut [f32]) -> f32 {
        debug_assert_eq!(features.len(), FEATURE_SIZE);
        debug_assert_eq!(hidden.len(), HIDDEN_SIZE);

        let mut a = vec![0.0f32; LINEAR_SIZE];
        let mut b = vec![0.0f32; LINEAR_SIZE];

        self.l1.apply(features, &mut a);
        relu_in_place(&mut a);
        self.l2.apply(&a, &mut b);
        relu_in_place(&mut b);
        self.l3.apply(&b, &mut a);
        relu_in_place(&mut a);

        self.cell.step(&a, hidden);

        self.l4.apply(hidden, &mut a);
        relu_in_place(&mut a);
        self.l5.apply(&a, &mut b);
        relu_in_place(&mut b);
        let mut logits = [0.0f32; 2];
        self.l6.apply(&b, &mut logits);

        // Numerically stable two-way softmax, wake mass is class 1.
        let m = logits[0].max(logits[1]);
        let e0 = (logits[0] - m).exp();
        let e1 = (logits[1] - m).exp();
        e1 / (e0 + e1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
