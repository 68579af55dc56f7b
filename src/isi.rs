//! Module implementing the inter-spike-interval distribution of spike trains.
//!
//! Consecutive spike time differences are bucketed into a 100-bin
//! logarithmically spaced histogram spanning one millisecond to ten seconds.
//! Differences outside the edges are silently dropped.

use itertools::Itertools;

use crate::error::EphysError;
use crate::runner::CancelToken;
use crate::train::SpikeTrain;

/// The number of bins of an inter-spike-interval histogram.
pub const ISI_BIN_COUNT: usize = 100;
/// The decimal exponent of the smallest histogram edge (10^-3 s).
const ISI_MIN_EXPONENT: f64 = -3.0;
/// The decimal exponent of the largest histogram edge (10^1 s).
const ISI_MAX_EXPONENT: f64 = 1.0;

/// Generates `steps + 1` logarithmically spaced values from `10^min_exp` to
/// `10^max_exp`, interpolating on the natural logarithm and exponentiating.
pub fn log_space(min_exp: f64, max_exp: f64, steps: usize) -> Vec<f32> {
    let ln_lo = 10f64.powf(min_exp).ln();
    let ln_hi = 10f64.powf(max_exp).ln();
    let step = (ln_hi - ln_lo) / steps as f64;
    (0..=steps)
        .map(|i| (ln_lo + i as f64 * step).exp() as f32)
        .collect()
}

/// Computes the inter-spike-interval histogram of one train.
///
/// # Returns
/// [`ISI_BIN_COUNT`] `(edge, count)` pairs. A difference landing in
/// `[edge[j-1], edge[j])` increments the count paired with `edge[j-1]`; the
/// count paired with the last edge is never incremented and stays zero.
pub fn isi_histogram(train: &SpikeTrain) -> Vec<(f32, u32)> {
    let edges = log_space(ISI_MIN_EXPONENT, ISI_MAX_EXPONENT, ISI_BIN_COUNT - 1);
    let mut counts = vec![0u32; ISI_BIN_COUNT];

    for (first, second) in train.spikes().iter().tuple_windows() {
        let diff = second.time() - first.time();
        for j in 1..edges.len() {
            if diff >= edges[j - 1] && diff < edges[j] {
                counts[j - 1] += 1;
                break;
            }
        }
    }

    edges.into_iter().zip(counts).collect()
}

/// Computes the inter-spike-interval histograms of all trains, one per train.
///
/// Cancellation is checked between trains.
pub fn isi_all(
    trains: &[SpikeTrain],
    token: &CancelToken,
) -> Result<Vec<Vec<(f32, u32)>>, EphysError> {
    trains
        .iter()
        .map(|train| {
            if token.is_cancelled() {
                return Err(EphysError::Cancelled);
            }
            Ok(isi_histogram(train))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spike::Spike;
    use crate::train::ThresholdRange;
    use approx::assert_relative_eq;

    const RATE: u32 = 10_000;

    fn train(sample_indices: &[usize]) -> SpikeTrain {
        let spikes = sample_indices
            .iter()
            .map(|&index| Spike::new(0, 500, index, RATE))
            .collect();
        SpikeTrain::new(ThresholdRange::new(0, 1000), spikes)
    }

    #[test]
    fn test_log_space_edges() {
        let edges = log_space(-3.0, 1.0, 99);
        assert_eq!(edges.len(), 100);
        assert_relative_eq!(edges[0], 1e-3, max_relative = 1e-5);
        assert_relative_eq!(edges[99], 10.0, max_relative = 1e-5);
        // Strictly increasing
        assert!(edges.windows(2).all(|pair| pair[0] < pair[1]));
        // Log-spaced: constant ratio between consecutive edges
        let ratio = edges[1] / edges[0];
        for pair in edges.windows(2) {
            assert_relative_eq!(pair[1] / pair[0], ratio, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_isi_equal_intervals_share_a_bin() {
        // Spikes at 0, 10 ms, 20 ms: two identical 10 ms intervals
        let hist = isi_histogram(&train(&[0, 100, 200]));
        assert_eq!(hist.len(), ISI_BIN_COUNT);

        let total: u32 = hist.iter().map(|(_, count)| count).sum();
        assert_eq!(total, 2);
        assert!(hist.iter().any(|&(_, count)| count == 2));
    }

    #[test]
    fn test_isi_total_is_spike_count_minus_one() {
        let hist = isi_histogram(&train(&[0, 50, 140, 600, 4000]));
        let total: u32 = hist.iter().map(|(_, count)| count).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_isi_out_of_range_intervals_dropped() {
        // 0.5 ms is below the smallest edge and is silently dropped
        let hist = isi_histogram(&train(&[0, 5]));
        assert_eq!(hist.iter().map(|(_, count)| count).sum::<u32>(), 0);
    }

    #[test]
    fn test_isi_degenerate_trains() {
        for t in [train(&[]), train(&[100])] {
            let hist = isi_histogram(&t);
            assert_eq!(hist.len(), ISI_BIN_COUNT);
            assert!(hist.iter().all(|&(_, count)| count == 0));
        }
    }

    #[test]
    fn test_isi_cancellation() {
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            isi_all(&[train(&[0, 100])], &token),
            Err(EphysError::Cancelled)
        );
    }
}
