//! The blocking "pull N samples" capture primitive.
//!
//! [`AudioSource`] is the seam between the ring buffer and whatever produces
//! audio: the cpal-backed [`ChannelSource`](crate::audio::capture::ChannelSource)
//! in production, scripted sources in tests.  The ring buffer owns its
//! source and is the only caller.

use thiserror::Error;

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Capture-device failures.  All of these are fatal to the pipeline — silent
/// audio loss is worse than crashing, so there is no retry path.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("device rate {device} Hz is not an integer multiple of the required {required} Hz")]
    UnsupportedRate { device: u32, required: u32 },

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("audio stream ended")]
    StreamClosed,
}

// ---------------------------------------------------------------------------
// AudioSource trait
// ---------------------------------------------------------------------------

/// Blocking pull primitive over a continuous mono i16 stream.
///
/// Implementations block until at least one sample is available, then copy
/// up to `out.len()` samples and return the count.  A return of `Ok(0)` is
/// never produced; a stream that can deliver nothing more must return
/// [`DeviceError::StreamClosed`].
pub trait AudioSource: Send {
    /// Read up to `out.len()` samples, blocking until at least one arrives.
    fn read(&mut self, out: &mut [i16]) -> Result<usize, DeviceError>;
}

// ---------------------------------------------------------------------------
// ScriptSource (test-only)
// ---------------------------------------------------------------------------

/// A test double that replays a fixed sample script in bounded chunks and
/// then reports [`DeviceError::StreamClosed`].
#[cfg(test)]
pub struct ScriptSource {
    samples: Vec<i16>,
    pos: usize,
    /// Largest number of samples handed out per `read` call.
    chunk: usize,
}

#[cfg(test)]
impl ScriptSource {
    pub fn new(samples: Vec<i16>, chunk: usize) -> Self {
        assert!(chunk > 0);
        Self {
            samples,
            pos: 0,
            chunk,
        }
    }

    /// Samples not yet handed out.
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.pos
    }
}

#[cfg(test)]
impl AudioSource for ScriptSource {
    fn read(&mut self, out: &mut [i16]) -> Result<usize, DeviceError> {
        if self.pos == self.samples.len() {
            return Err(DeviceError::StreamClosed);
        }
        let n = out
            .len()
            .min(self.chunk)
            .min(self.samples.len() - self.pos);
        out[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_source_respects_chunk_limit() {
        let mut src = ScriptSource::new((0..100).collect(), 16);
        let mut out = [0i16; 64];
        assert_eq!(src.read(&mut out).unwrap(), 16);
        assert_eq!(&out[..4], &[0, 1, 2, 3]);
        assert_eq!(src.remaining(), 84);
    }

    #[test]
    fn script_source_ends_with_stream_closed() {
        let mut src = ScriptSource::new(vec![1, 2, 3], 8);
        let mut out = [0i16; 8];
        assert_eq!(src.read(&mut out).unwrap(), 3);
        assert!(matches!(
            src.read(&mut out),
            Err(DeviceError::StreamClosed)
        ));
    }
}
