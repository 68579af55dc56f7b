//! Module implementing the average spike waveform of spike trains.
//!
//! For every spike of a train, a fixed-width window centered on the spike
//! peak is accumulated into running sum and sum-of-squares arrays; the result
//! is the mean waveform with a one-standard-deviation envelope, plus a
//! jointly [0, 1]-normalized variant sharing one scale across the mean and
//! both envelope lines.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::EphysError;
use crate::runner::CancelToken;
use crate::source::SampleSource;
use crate::train::SpikeTrain;
use crate::AVERAGING_HALF_WINDOW;

/// The average waveform of one spike train.
///
/// All arrays have length `2 * half_window + 1`. Trains with fewer than two
/// qualifying spikes yield zero-filled arrays rather than being omitted, so
/// callers always receive one result per train.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AverageSpike {
    /// The mean waveform.
    pub mean: Vec<f32>,
    /// The mean plus one standard deviation, per sample position.
    pub top_std: Vec<f32>,
    /// The mean minus one standard deviation, per sample position.
    pub bottom_std: Vec<f32>,
    /// The mean waveform normalized to [0, 1].
    pub norm_mean: Vec<f32>,
    /// The upper envelope normalized with the same scale as the mean.
    pub norm_top_std: Vec<f32>,
    /// The lower envelope normalized with the same scale as the mean.
    pub norm_bottom_std: Vec<f32>,
    /// The number of spikes accumulated into the average.
    pub spike_count: usize,
    /// The smallest value across mean and envelope, used as the shared scale.
    pub min: f32,
    /// The largest value across mean and envelope, used as the shared scale.
    pub max: f32,
}

impl AverageSpike {
    fn zero(width: usize) -> Self {
        AverageSpike {
            mean: vec![0.0; width],
            top_std: vec![0.0; width],
            bottom_std: vec![0.0; width],
            norm_mean: vec![0.0; width],
            norm_top_std: vec![0.0; width],
            norm_bottom_std: vec![0.0; width],
            spike_count: 0,
            min: 0.0,
            max: 0.0,
        }
    }
}

/// Returns the half-window of the averaging window in samples.
pub fn half_window(sample_rate: u32) -> usize {
    (sample_rate as f32 * AVERAGING_HALF_WINDOW).round() as usize
}

/// Computes the average spike waveform of one train.
///
/// Spikes whose window would overflow the buffer bounds are skipped without
/// error. With fewer than two accumulated spikes the result is zero-filled.
/// Read failures of the sample source are propagated.
pub fn average_spike(
    source: &dyn SampleSource,
    channel: usize,
    train: &SpikeTrain,
) -> Result<AverageSpike, EphysError> {
    let half = half_window(source.sample_rate());
    let width = 2 * half + 1;
    let num_samples = source.num_samples();

    let mut sum = vec![0f64; width];
    let mut sum_sq = vec![0f64; width];
    let mut spike_count = 0usize;

    for spike in train.spikes() {
        let index = spike.sample_index();
        if index < half || index + half >= num_samples {
            continue;
        }
        let window = source.read(channel, index - half, width)?;
        for (pos, &sample) in window.iter().enumerate() {
            let value = sample as f64;
            sum[pos] += value;
            sum_sq[pos] += value * value;
        }
        spike_count += 1;
    }

    if spike_count < 2 {
        debug!(
            "Not enough qualifying spikes for an average ({} found)",
            spike_count
        );
        return Ok(AverageSpike {
            spike_count,
            ..AverageSpike::zero(width)
        });
    }

    let n = spike_count as f64;
    let mut mean = Vec::with_capacity(width);
    let mut top_std = Vec::with_capacity(width);
    let mut bottom_std = Vec::with_capacity(width);

    for pos in 0..width {
        let m = sum[pos] / n;
        // Clamp against negative round-off before the square root
        let var = (sum_sq[pos] / n - m * m).max(0.0);
        let std = var.sqrt();
        mean.push(m as f32);
        top_std.push((m + std) as f32);
        bottom_std.push((m - std) as f32);
    }

    let min = bottom_std.iter().fold(f32::INFINITY, |acc, &x| acc.min(x));
    let max = top_std.iter().fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));

    let (norm_mean, norm_top_std, norm_bottom_std) = if max > min {
        let scale = max - min;
        (
            mean.iter().map(|&x| (x - min) / scale).collect(),
            top_std.iter().map(|&x| (x - min) / scale).collect(),
            bottom_std.iter().map(|&x| (x - min) / scale).collect(),
        )
    } else {
        // Perfectly flat average: nothing meaningful to scale
        (vec![0.0; width], vec![0.0; width], vec![0.0; width])
    };

    Ok(AverageSpike {
        mean,
        top_std,
        bottom_std,
        norm_mean,
        norm_top_std,
        norm_bottom_std,
        spike_count,
        min,
        max,
    })
}

/// Computes the average spike waveforms of all trains, one per train.
///
/// Cancellation is checked between trains.
pub fn average_spike_all(
    source: &dyn SampleSource,
    channel: usize,
    trains: &[SpikeTrain],
    token: &CancelToken,
) -> Result<Vec<AverageSpike>, EphysError> {
    trains
        .iter()
        .map(|train| {
            if token.is_cancelled() {
                return Err(EphysError::Cancelled);
            }
            average_spike(source, channel, train)
        })
        .collect()
}
