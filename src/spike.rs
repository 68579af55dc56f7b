//! Module implementing the concept of a detected spike.

use serde::{Deserialize, Serialize};

/// Represents a single detected amplitude excursion on one channel.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Spike {
    /// The channel on which the spike was detected.
    channel: usize,
    /// The peak sample value of the excursion (signed; negative for downward spikes).
    amplitude: i16,
    /// The absolute index of the peak sample within the recording.
    sample_index: usize,
    /// The time of the peak in seconds, i.e., `sample_index / sample_rate`.
    time: f32,
}

impl Spike {
    /// Create a new spike with the specified parameters.
    pub fn new(channel: usize, amplitude: i16, sample_index: usize, sample_rate: u32) -> Self {
        Spike {
            channel,
            amplitude,
            sample_index,
            time: sample_index as f32 / sample_rate as f32,
        }
    }

    /// Returns the channel on which the spike was detected.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Returns the peak sample value of the spike.
    pub fn amplitude(&self) -> i16 {
        self.amplitude
    }

    /// Returns the absolute sample index of the spike peak.
    pub fn sample_index(&self) -> usize {
        self.sample_index
    }

    /// Returns the time of the spike peak in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spike_time_from_sample_index() {
        let spike = Spike::new(0, 750, 4400, 44100);
        assert_eq!(spike.channel(), 0);
        assert_eq!(spike.amplitude(), 750);
        assert_eq!(spike.sample_index(), 4400);
        assert!((spike.time() - 4400.0 / 44100.0).abs() < 1e-9);
    }

    #[test]
    fn test_spike_serde_round_trip() {
        let spike = Spike::new(1, -320, 10000, 10000);
        let json = serde_json::to_string(&spike).unwrap();
        let back: Spike = serde_json::from_str(&json).unwrap();
        assert_eq!(spike, back);
    }
}
