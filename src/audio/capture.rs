//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle.  The cpal
//! callback downmixes to channel 0, decimates the device rate down to the
//! pipeline rate, converts to i16 and forwards chunks over an mpsc channel.
//! [`ChannelSource`] adapts the receiving end into the blocking
//! [`AudioSource`] pull primitive the ring buffer consumes.
//!
//! The returned [`StreamHandle`] is a RAII guard — dropping it stops the
//! underlying cpal stream.  `cpal::Stream` is not `Send` on every platform,
//! so the guard stays on the thread that built it (main) while the
//! `ChannelSource` crosses into the ring buffer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;

use crate::audio::source::{AudioSource, DeviceError};

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Capture-device wrapper built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use wakeline::audio::{AudioCapture, ChannelSource};
///
/// let capture = AudioCapture::new(None, 16_000).unwrap();
/// let (source, _handle) = capture.start().unwrap();
/// // `source` is handed to SampleRing; `_handle` keeps the stream alive.
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    /// Native device rate in Hz.
    device_rate: u32,
    /// Pipeline rate in Hz (16 000 by default).
    required_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Open the named input device (or the host default) and verify that
    /// its native rate can be decimated to `required_rate`.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::NoDevice`] — no usable input device.
    /// - [`DeviceError::UnsupportedRate`] — the device rate is not an
    ///   integer multiple of `required_rate`.
    pub fn new(device_name: Option<&str>, required_rate: u32) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .input_devices()
                .map_err(|_| DeviceError::NoDevice)?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or(DeviceError::NoDevice)?,
            None => host.default_input_device().ok_or(DeviceError::NoDevice)?,
        };

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let device_rate = supported.sample_rate().0;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        if device_rate % required_rate != 0 {
            return Err(DeviceError::UnsupportedRate {
                device: device_rate,
                required: required_rate,
            });
        }

        log::info!(
            "capture: device opened ({device_rate} Hz, {channels} ch, decimate x{})",
            device_rate / required_rate
        );

        Ok(Self {
            device,
            config,
            sample_format,
            device_rate,
            required_rate,
            channels,
        })
    }

    /// Start the stream and return the blocking source plus its RAII guard.
    ///
    /// The callback keeps channel 0 of every `device_rate / required_rate`-th
    /// frame, so the source yields mono i16 at the pipeline rate.  Send
    /// errors (receiver dropped) are ignored so the audio thread never
    /// panics; the consumer side surfaces the closed stream instead.
    pub fn start(&self) -> Result<(ChannelSource, StreamHandle), DeviceError> {
        let (tx, rx) = mpsc::channel::<Vec<i16>>();
        // `step_by` starts at index 0 — channel 0 of the first frame — and
        // the channel count is folded into the stride.
        let step = (self.device_rate / self.required_rate) as usize * self.channels as usize;

        let err_fn = |err: cpal::StreamError| {
            log::error!("capture: cpal stream error: {err}");
        };

        let stream = match self.sample_format {
            cpal::SampleFormat::I16 => self.device.build_input_stream(
                &self.config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let chunk: Vec<i16> = data.iter().copied().step_by(step).collect();
                    let _ = tx.send(chunk);
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::F32 => self.device.build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let chunk: Vec<i16> = data
                        .iter()
                        .copied()
                        .step_by(step)
                        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    let _ = tx.send(chunk);
                },
                err_fn,
                None,
            )?,
            other => {
                return Err(DeviceError::UnsupportedFormat(format!("{other:?}")));
            }
        };

        stream.play()?;
        Ok((ChannelSource::new(rx), StreamHandle { _stream: stream }))
    }

    /// Pipeline sample rate delivered by the source, in Hz.
    pub fn rate(&self) -> u32 {
        self.required_rate
    }

    /// Number of channels the device reports (only channel 0 is kept).
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// ChannelSource
// ---------------------------------------------------------------------------

/// Blocking [`AudioSource`] over the capture callback's mpsc channel.
///
/// Chunks larger than the caller's slice are carried over to the next read.
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<i16>>,
    /// Samples received but not yet handed to the ring buffer.
    pending: Vec<i16>,
    pending_pos: usize,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Vec<i16>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            pending_pos: 0,
        }
    }
}

impl AudioSource for ChannelSource {
    fn read(&mut self, out: &mut [i16]) -> Result<usize, DeviceError> {
        if self.pending_pos == self.pending.len() {
            // Block for the next non-empty chunk.
            loop {
                let chunk = self.rx.recv().map_err(|_| DeviceError::StreamClosed)?;
                if !chunk.is_empty() {
                    self.pending = chunk;
                    self.pending_pos = 0;
                    break;
                }
            }
        }
        let n = out.len().min(self.pending.len() - self.pending_pos);
        out[..n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
        self.pending_pos += n;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_source_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ChannelSource>();
    }

    #[test]
    fn channel_source_reads_across_chunk_boundaries() {
        let (tx, rx) = mpsc::channel();
        tx.send(vec![1i16, 2, 3]).unwrap();
        tx.send(vec![4i16, 5]).unwrap();
        let mut src = ChannelSource::new(rx);

        let mut out = [0i16; 2];
        assert_eq!(src.read(&mut out).unwrap(), 2);
        assert_eq!(out, [1, 2]);

        // Remainder of the first chunk before the second is touched.
        assert_eq!(src.read(&mut out).unwrap(), 1);
        assert_eq!(out[0], 3);

        assert_eq!(src.read(&mut out).unwrap(), 2);
        assert_eq!(out, [4, 5]);
    }

    #[test]
    fn channel_source_skips_empty_chunks() {
        let (tx, rx) = mpsc::channel();
        tx.send(vec![]).unwrap();
        tx.send(vec![7i16]).unwrap();
        let mut src = ChannelSource::new(rx);

        let mut out = [0i16; 4];
        assert_eq!(src.read(&mut out).unwrap(), 1);
        assert_eq!(out[0], 7);
    }

    #[test]
    fn channel_source_reports_closed_stream() {
        let (tx, rx) = mpsc::channel::<Vec<i16>>();
        drop(tx);
        let mut src = ChannelSource::new(rx);
        let mut out = [0i16; 4];
        assert!(matches!(
            src.read(&mut out),
            Err(DeviceError::StreamClosed)
        ));
    }
}
