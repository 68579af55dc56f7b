//! Random access to digitized recordings.
//!
//! The analysis engine never owns a file format; it only requires random
//! access to 16-bit samples through the [`SampleSource`] trait. Decoding
//! (WAV parsing, live capture buffers, ...) belongs to the caller. The
//! in-memory [`BufferSource`] is provided for tests and small recordings.

use crate::error::EphysError;

/// Random-access source of 16-bit signed samples, one buffer per channel.
///
/// Implementations must be safe to share across analysis workers: all methods
/// take `&self` and the underlying samples are immutable once acquired.
/// `read` may block (file I/O) and may fail; failures are propagated to the
/// analysis listener as a failed run.
pub trait SampleSource: Send + Sync {
    /// Returns the sample rate of the recording in Hz.
    fn sample_rate(&self) -> u32;

    /// Returns the number of channels in the recording.
    fn channel_count(&self) -> usize;

    /// Returns the number of samples per channel.
    fn num_samples(&self) -> usize;

    /// Reads `count` samples of the given channel starting at `offset`.
    ///
    /// Returns an error if the channel does not exist or the requested range
    /// is not fully contained in the recording.
    fn read(&self, channel: usize, offset: usize, count: usize) -> Result<Vec<i16>, EphysError>;

    /// Reads the entire buffer of the given channel.
    fn read_all(&self, channel: usize) -> Result<Vec<i16>, EphysError> {
        self.read(channel, 0, self.num_samples())
    }
}

/// An in-memory [`SampleSource`] holding one sample buffer per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSource {
    channels: Vec<Vec<i16>>,
    sample_rate: u32,
}

impl BufferSource {
    /// Create a source from per-channel sample buffers.
    ///
    /// The function returns an error if no channel is provided, if the
    /// channels have different lengths, or if the sample rate is zero.
    pub fn build(channels: Vec<Vec<i16>>, sample_rate: u32) -> Result<Self, EphysError> {
        if sample_rate == 0 {
            return Err(EphysError::InvalidParameter(
                "the sample rate must be positive".to_string(),
            ));
        }
        let num_samples = match channels.first() {
            Some(channel) => channel.len(),
            None => {
                return Err(EphysError::InvalidParameter(
                    "at least one channel is required".to_string(),
                ))
            }
        };
        if channels.iter().any(|channel| channel.len() != num_samples) {
            return Err(EphysError::InvalidParameter(
                "all channels must have the same number of samples".to_string(),
            ));
        }
        Ok(BufferSource {
            channels,
            sample_rate,
        })
    }
}

impl SampleSource for BufferSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn num_samples(&self) -> usize {
        self.channels[0].len()
    }

    fn read(&self, channel: usize, offset: usize, count: usize) -> Result<Vec<i16>, EphysError> {
        let samples = self.channels.get(channel).ok_or_else(|| {
            EphysError::InvalidChannel(format!(
                "channel {} out of {}",
                channel,
                self.channels.len()
            ))
        })?;
        if offset + count > samples.len() {
            return Err(EphysError::OutOfBounds(format!(
                "samples [{}, {}) out of {}",
                offset,
                offset + count,
                samples.len()
            )));
        }
        Ok(samples[offset..offset + count].to_vec())
    }
}
