//! In-place radix-2 FFT over [`Complex32`] buffers.
//!
//! The live path always transforms exactly 128 samples, but the routine is
//! size-parameterized (any power of two) because offline tooling runs it at
//! other lengths.
//!
//! ## Algorithm
//!
//! Classic decimation-in-time: a bit-reversal permutation pass first, so the
//! butterfly combine can then walk the buffer in place, doubling the span
//! each stage and rotating the twiddle `exp(2πi·k/n)` across each half-span.
//!
//! The twiddle sign follows the positive-exponent convention; magnitudes —
//! all the spectral extractor consumes — are identical either way, and
//! [`inverse`] compensates with conjugation plus `1/n` scaling so the
//! forward/inverse round trip reconstructs the input.

use std::f32::consts::PI;

use num_complex::Complex32;

// ---------------------------------------------------------------------------
// Forward transform
// ---------------------------------------------------------------------------

/// Transform `buf` in place.
///
/// # Panics
///
/// Panics if `buf.len()` is not a power of two (zero included).  Window
/// sizes are validated at configuration time, so a bad length here is a
/// programmer error, not an input error.
pub fn forward(buf: &mut [Complex32]) {
    let n = buf.len();
    assert!(n.is_power_of_two(), "FFT length must be a power of two, got {n}");

    bit_reverse_permute(buf);

    // Butterfly combine: span doubles each stage.
    let mut span = 2;
    while span <= n {
        let half = span / 2;
        let w0 = Complex32::from_polar(1.0, 2.0 * PI / span as f32);
        for block in buf.chunks_exact_mut(span) {
            let mut w = Complex32::new(1.0, 0.0);
            for i in 0..half {
                let x = block[i];
                let y = w * block[half + i];
                block[i] = x + y;
                block[half + i] = x - y;
                w *= w0;
            }
        }
        span *= 2;
    }
}

/// Inverse transform of [`forward`], in place.
///
/// Conjugate, forward transform, conjugate again, scale by `1/n`.
///
/// # Panics
///
/// Panics if `buf.len()` is not a power of two.
pub fn inverse(buf: &mut [Complex32]) {
    let n = buf.len();
    for x in buf.iter_mut() {
        *x = x.conj();
    }
    forward(buf);
    let scale = 1.0 / n as f32;
    for x in buf.iter_mut() {
        *x = x.conj() * scale;
    }
}

// ---------------------------------------------------------------------------
// Bit reversal
// ---------------------------------------------------------------------------

/// Swap each element with the one at its bit-reversed index.
///
/// Only indices where `rev > i` are swapped, so every pair moves exactly
/// once and the permutation is its own inverse.
fn bit_reverse_permute(buf: &mut [Complex32]) {
    let n = buf.len();
    let bits = n.trailing_zeros();
    for i in 0..n {
        let rev = reverse_bits(i, bits);
        if rev > i {
            buf.swap(i, rev);
        }
    }
}

fn reverse_bits(x: usize, bits: u32) -> usize {
    let mut out = 0;
    for i in 0..bits {
        out |= ((x >> i) & 1) << (bits - 1 - i);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
