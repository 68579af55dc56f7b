//! Module implementing noise-adaptive spike detection.
//!
//! The detector scans one channel of a finite recording, estimates an
//! amplitude threshold from the distribution of short-window standard
//! deviations, extracts at most one candidate per threshold excursion with a
//! dual-polarity Schmitt trigger, and prunes refractory-violating candidates
//! by amplitude dominance.
//!
//! Degenerate inputs (recordings shorter than [`MIN_VALID_DURATION`](crate::MIN_VALID_DURATION),
//! all-flat signals) yield an empty spike list, never an error.
//!
//! # Examples
//!
//! ```rust
//! use rusty_ephys::detector;
//!
//! // A 1 s recording at 10 kHz: a small alternating baseline with one
//! // injected positive pulse at sample 1000.
//! let mut samples: Vec<i16> = (0..10_000).map(|i| if i % 2 == 0 { 1 } else { -1 }).collect();
//! samples[1000] = 800;
//!
//! let spikes = detector::detect_samples(&samples, 10_000, 0);
//! assert_eq!(spikes.len(), 1);
//! assert_eq!(spikes[0].sample_index(), 1000);
//! assert_eq!(spikes[0].amplitude(), 800);
//! ```

use log::debug;

use crate::error::EphysError;
use crate::source::SampleSource;
use crate::spike::Spike;
use crate::{KILL_INTERVAL, MIN_VALID_DURATION};

/// The maximum number of windows used to estimate the noise level.
const MAX_STD_BINS: usize = 200;
/// The noise estimation windows never grow past the length they would have
/// for a 12 s recording, to bound peak memory on long files.
const STD_BIN_CAP_SECONDS: usize = 12;
/// The descending-order quantile of the window standard deviations used as
/// the noise level.
const SIGMA_QUANTILE: f64 = 0.4;

/// A candidate spike before refractory filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    amplitude: i16,
    index: usize,
}

/// Detects the spikes of one channel of the given source.
///
/// The whole channel is read at once; read failures and invalid channels are
/// propagated as errors. Degenerate signals produce an empty spike list.
pub fn detect(source: &dyn SampleSource, channel: usize) -> Result<Vec<Spike>, EphysError> {
    if channel >= source.channel_count() {
        return Err(EphysError::InvalidChannel(format!(
            "channel {} out of {}",
            channel,
            source.channel_count()
        )));
    }
    let samples = source.read_all(channel)?;
    Ok(detect_samples(&samples, source.sample_rate(), channel))
}

/// Detects the spikes of a single in-memory channel buffer.
///
/// # Parameters
/// - `samples`: The full sample buffer of the channel.
/// - `sample_rate`: The sample rate of the recording in Hz.
/// - `channel`: The channel index recorded on the emitted spikes.
///
/// # Returns
/// The detected spikes, ordered by sample index.
pub fn detect_samples(samples: &[i16], sample_rate: u32, channel: usize) -> Vec<Spike> {
    if (samples.len() as f32) < MIN_VALID_DURATION * sample_rate as f32 {
        debug!(
            "Recording too short for detection: {} samples at {} Hz",
            samples.len(),
            sample_rate
        );
        return vec![];
    }

    let sigma = estimate_sigma(samples, sample_rate);
    debug!("Estimated detection threshold: {}", sigma);

    let mut candidates = find_candidates(samples, sigma);
    candidates.sort_by_key(|candidate| candidate.index);

    let kill_samples = (KILL_INTERVAL * sample_rate as f32).round() as usize;
    let candidates = sweep_right(&sweep_left(&candidates, kill_samples), kill_samples);

    candidates
        .into_iter()
        .map(|candidate| Spike::new(channel, candidate.amplitude, candidate.index, sample_rate))
        .collect()
}

/// Estimates the detection threshold as twice a low quantile of the
/// short-window standard deviations of the signal.
///
/// The result is clamped to `1..=i16::MAX`; the lower clamp keeps all-flat
/// signals from arming the trigger on every sample.
fn estimate_sigma(samples: &[i16], sample_rate: u32) -> i16 {
    let max_bin_len = (STD_BIN_CAP_SECONDS * sample_rate as usize).div_ceil(MAX_STD_BINS);
    let bin_len = samples
        .len()
        .div_ceil(MAX_STD_BINS)
        .clamp(1, max_bin_len.max(1));

    let mut stds: Vec<f64> = samples
        .chunks(bin_len)
        .take(MAX_STD_BINS)
        .map(std_dev)
        .collect();

    // Descending order, then pick the prescribed quantile
    stds.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let pos = ((SIGMA_QUANTILE * stds.len() as f64).ceil() as usize).min(stds.len() - 1);

    (2.0 * stds[pos]).clamp(1.0, i16::MAX as f64) as i16
}

fn std_dev(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&x| (x as f64 - mean) * (x as f64 - mean))
        .sum::<f64>()
        / n;
    var.max(0.0).sqrt()
}

/// Scans the buffer with two independent Schmitt triggers, one per polarity.
///
/// The positive trigger arms when a sample exceeds `sigma` and disarms when a
/// sample drops below zero, emitting the maximum sample seen while armed as
/// one candidate. The negative trigger is symmetric (arms below `-sigma`,
/// disarms above zero, emits the minimum). This yields at most one candidate
/// per polarity per excursion. Excursions still armed at the end of the
/// buffer are dropped.
fn find_candidates(samples: &[i16], sigma: i16) -> Vec<Candidate> {
    let neg_sigma = -sigma;

    let mut candidates = vec![];
    let mut pos_peak: Option<Candidate> = None;
    let mut neg_peak: Option<Candidate> = None;

    for (index, &sample) in samples.iter().enumerate() {
        if let Some(mut peak) = pos_peak {
            if sample > peak.amplitude {
                peak = Candidate {
                    amplitude: sample,
                    index,
                };
            }
            if sample < 0 {
                candidates.push(peak);
                pos_peak = None;
            } else {
                pos_peak = Some(peak);
            }
        } else if sample > sigma {
            pos_peak = Some(Candidate {
                amplitude: sample,
                index,
            });
        }

        if let Some(mut peak) = neg_peak {
            if sample < peak.amplitude {
                peak = Candidate {
                    amplitude: sample,
                    index,
                };
            }
            if sample > 0 {
                candidates.push(peak);
                neg_peak = None;
            } else {
                neg_peak = Some(peak);
            }
        } else if sample < neg_sigma {
            neg_peak = Some(Candidate {
                amplitude: sample,
                index,
            });
        }
    }

    candidates
}

/// Left-to-right refractory sweep: of two adjacent candidates closer than the
/// kill interval, keep the one with the larger absolute amplitude. Ties keep
/// the earlier-indexed candidate.
fn sweep_left(candidates: &[Candidate], kill_samples: usize) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for &candidate in candidates {
        match kept.last() {
            Some(last) if candidate.index - last.index < kill_samples => {
                if candidate.amplitude.unsigned_abs() > last.amplitude.unsigned_abs() {
                    kept.pop();
                    kept.push(candidate);
                }
            }
            _ => kept.push(candidate),
        }
    }
    kept
}

/// Right-to-left refractory sweep, symmetric to [`sweep_left`]. Ties keep the
/// earlier-indexed candidate, which is the incoming one in this direction.
fn sweep_right(candidates: &[Candidate], kill_samples: usize) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for &candidate in candidates.iter().rev() {
        match kept.last() {
            Some(last) if last.index - candidate.index < kill_samples => {
                if candidate.amplitude.unsigned_abs() >= last.amplitude.unsigned_abs() {
                    kept.pop();
                    kept.push(candidate);
                }
            }
            _ => kept.push(candidate),
        }
    }
    kept.reverse();
    kept
}
