//! Flat binary weight-blob codec.
//!
//! The on-disk format is a headerless concatenation of little-endian f32
//! arrays in a fixed declared order — dense layers first (`W` then `b` for
//! l1…l6), then the GRU gate matrices (`Wr Ur br Wz Uz bz Wh Uh bh`).  No
//! versioning, no padding: the file length alone identifies a valid blob,
//! and a save/load round trip is bit-identical.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::classifier::WakeNet;

// ---------------------------------------------------------------------------
// WeightsError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WeightsError {
    #[error("failed to read/write weight file: {0}")]
    Io(#[from] std::io::Error),

    /// The file length does not match the declared layout — wrong file or a
    /// network of different dimensions.
    #[error("weight blob is {actual} bytes, layout requires {expected}")]
    BadLength { expected: usize, actual: usize },
}

// ---------------------------------------------------------------------------
// load / save
// ---------------------------------------------------------------------------

/// Byte length of a valid blob.
fn blob_len() -> usize {
    WakeNet::zeros().params().iter().map(|p| p.len() * 4).sum()
}

/// Load a [`WakeNet`] from `path`.
///
/// # Errors
///
/// [`WeightsError::BadLength`] when the file size disagrees with the
/// declared layout; I/O errors pass through.
pub fn load_weights(path: impl AsRef<Path>) -> Result<WakeNet, WeightsError> {
    let bytes = fs::read(path.as_ref())?;
    let expected = blob_len();
    if bytes.len() != expected {
        return Err(WeightsError::BadLength {
            expected,
            actual: bytes.len(),
        });
    }

    let mut net = WakeNet::zeros();
    let mut offset = 0;
    for arr in net.params_mut() {
        for slot in arr.iter_mut() {
            let word: [u8; 4] = bytes[offset..offset + 4].try_into().unwrap();
            *slot = f32::from_le_bytes(word);
            offset += 4;
        }
    }
    debug_assert_eq!(offset, expected);

    log::info!(
        "classifier: loaded {} weight bytes from {}",
        expected,
        path.as_ref().display()
    );
    Ok(net)
}

/// Write `net` to `path` in the declared layout.
pub fn save_weights(net: &WakeNet, path: impl AsRef<Path>) -> Result<(), WeightsError> {
    let mut bytes = Vec::with_capacity(blob_len());
    for arr in net.params() {
        for x in arr {
            bytes.extend_from_slice(&x.to_le_bytes());
        }
    }
    fs::write(path.as_ref(), &bytes)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned_net() -> WakeNet {
        let mut net = WakeNet::zeros();
        let mut seed = 0x9e3779b9u32;
        for arr in net.params_mut() {
            for x in arr.iter_mut() {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                *x = f32::from_bits(0x3f000000 | (seed & 0x007f_ffff));
            }
        }
        net
    }

    #[test]
    fn round_trip_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wake.weights");

        let net = patterned_net();
        save_weights(&net, &path).unwrap();
        let loaded = load_weights(&path).unwrap();

        for (a, b) in net.params().iter().zip(loaded.params().iter()) {
            assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(b.iter()) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    #[test]
    fn blob_has_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wake.weights");

        let mut net = WakeNet::zeros();
        net.params_mut()[0][0] = 1.5;
        save_weights(&net, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // First four bytes are the first f32 of l1.W, not a magic number.
        assert_eq!(&bytes[..4], &1.5f32.to_le_bytes());
        assert_eq!(bytes.len(), super::blob_len());
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wake.weights");
        save_weights(&WakeNet::zeros(), &path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 4);
        std::fs::write(&path, &bytes).unwrap();

        let err = load_weights(&path).err().unwrap();
        assert!(matches!(err, WeightsError::BadLength { .. }));
    }

    #[test]
    fn oversized_blob_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wake.weights");
        save_weights(&WakeNet::zeros(), &path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0u8; 8]);
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            load_weights(&path),
            Err(WeightsError::BadLength { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_weights("/nonexistent/wake.weights").err().unwrap();
        assert!(matches!(err, WeightsError::Io(_)));
    }
}
