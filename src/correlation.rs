//! Module implementing auto- and cross-correlation of spike trains.
//!
//! Both analyses build fixed-bin-width lag histograms (1 ms bins over a
//! 100 ms window). Autocorrelation exploits the time ordering of a train to
//! terminate each scan as soon as the lag leaves the window; cross-correlation
//! compares every spike of one train against the entire other train, since no
//! monotonic shortcut applies across trains. Counts are raw; normalization is
//! a presentation concern.

use rayon::prelude::*;

use crate::error::EphysError;
use crate::runner::CancelToken;
use crate::train::SpikeTrain;

/// The lag histogram bin width in seconds.
pub const CORRELATION_BIN_WIDTH: f64 = 0.001;
/// The half-width of the lag window in seconds.
pub const CORRELATION_WINDOW: f64 = 0.1;
/// The number of bins of an autocorrelation histogram (zero-lag bin dropped).
pub const AUTOCORRELATION_BIN_COUNT: usize = 100;
/// The number of bins of a cross-correlation histogram (symmetric window).
pub const CROSS_CORRELATION_BIN_COUNT: usize = 201;

/// Computes the autocorrelation histogram of one train.
///
/// Lags are binned into `floor((diff + 0.5 ms) / 1 ms)` over the window
/// `(-0.5 ms, 100.5 ms)`. The zero-lag bin is excluded from the returned
/// histogram, leaving [`AUTOCORRELATION_BIN_COUNT`] counts. Empty and
/// singleton trains yield an all-zero histogram.
pub fn autocorrelation(train: &SpikeTrain) -> Vec<u32> {
    let times: Vec<f64> = train
        .spikes()
        .iter()
        .map(|spike| spike.time() as f64)
        .collect();

    let half_bin = CORRELATION_BIN_WIDTH / 2.0;
    let hi = CORRELATION_WINDOW + half_bin;
    let mut hist = vec![0u32; AUTOCORRELATION_BIN_COUNT + 1];

    for i in 0..times.len() {
        // Scan left, then right of the reference spike; the train is
        // time-sorted, so the first lag outside the window ends the scan.
        for j in (0..=i).rev() {
            let diff = times[i] - times[j];
            if diff > -half_bin && diff < hi {
                hist[((diff + half_bin) / CORRELATION_BIN_WIDTH) as usize] += 1;
            } else {
                break;
            }
        }
        for j in i + 1..times.len() {
            let diff = times[i] - times[j];
            if diff > -half_bin && diff < hi {
                hist[((diff + half_bin) / CORRELATION_BIN_WIDTH) as usize] += 1;
            } else {
                break;
            }
        }
    }

    hist.split_off(1)
}

/// Computes the autocorrelation histograms of all trains, one per train.
///
/// Cancellation is checked between trains.
pub fn autocorrelation_all(
    trains: &[SpikeTrain],
    token: &CancelToken,
) -> Result<Vec<Vec<u32>>, EphysError> {
    trains
        .iter()
        .map(|train| {
            if token.is_cancelled() {
                return Err(EphysError::Cancelled);
            }
            Ok(autocorrelation(train))
        })
        .collect()
}

/// Computes the cross-correlation histogram of an ordered train pair.
///
/// Lags `t_b - t_a` are binned over the symmetric window
/// `(-100.5 ms, 100.5 ms)` into [`CROSS_CORRELATION_BIN_COUNT`] bins. If
/// either train has at most one spike, the result is an all-zero histogram of
/// the declared bin count, preserving a fixed trains-by-trains matrix shape.
pub fn cross_correlation(a: &SpikeTrain, b: &SpikeTrain) -> Vec<u32> {
    let mut hist = vec![0u32; CROSS_CORRELATION_BIN_COUNT];
    if a.len() <= 1 || b.len() <= 1 {
        return hist;
    }

    let half_bin = CORRELATION_BIN_WIDTH / 2.0;
    let hi = CORRELATION_WINDOW + half_bin;

    for spike_a in a.spikes() {
        for spike_b in b.spikes() {
            let diff = spike_b.time() as f64 - spike_a.time() as f64;
            if diff > -hi && diff < hi {
                hist[((diff + hi) / CORRELATION_BIN_WIDTH) as usize] += 1;
            }
        }
    }

    hist
}

/// Computes the full cross-correlation matrix, indexed `[a][b]` over every
/// ordered pair of trains including `(a, a)`.
///
/// Rows are computed in parallel; cancellation is checked per row.
pub fn cross_correlation_all(
    trains: &[SpikeTrain],
    token: &CancelToken,
) -> Result<Vec<Vec<Vec<u32>>>, EphysError> {
    trains
        .par_iter()
        .map(|a| {
            if token.is_cancelled() {
                return Err(EphysError::Cancelled);
            }
            Ok(trains.iter().map(|b| cross_correlation(a, b)).collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spike::Spike;
    use crate::train::ThresholdRange;

    const RATE: u32 = 10_000;

    fn train(sample_indices: &[usize]) -> SpikeTrain {
        let spikes = sample_indices
            .iter()
            .map(|&index| Spike::new(0, 500, index, RATE))
            .collect();
        SpikeTrain::new(ThresholdRange::new(0, 1000), spikes)
    }

    #[test]
    fn test_autocorrelation_bin_counts() {
        // Spikes at 0, 1 ms, 2 ms: lags of 1 ms land in the first returned
        // bin (twice) and the 2 ms lag in the second.
        let hist = autocorrelation(&train(&[0, 10, 20]));
        assert_eq!(hist.len(), AUTOCORRELATION_BIN_COUNT);
        assert_eq!(hist[0], 2);
        assert_eq!(hist[1], 1);
        assert_eq!(hist.iter().sum::<u32>(), 3);
    }

    #[test]
    fn test_autocorrelation_excludes_zero_lag() {
        // A lone pair 50 ms apart: one count at the 50 ms bin, nothing else
        let hist = autocorrelation(&train(&[0, 500]));
        assert_eq!(hist.iter().sum::<u32>(), 1);
        assert_eq!(hist[49], 1);
    }

    #[test]
    fn test_autocorrelation_window_exclusion() {
        // 0.4 s lag is outside the 100 ms window
        let hist = autocorrelation(&train(&[1000, 5000]));
        assert!(hist.iter().all(|&count| count == 0));
    }

    #[test]
    fn test_autocorrelation_degenerate_trains() {
        assert!(autocorrelation(&train(&[])).iter().all(|&c| c == 0));
        assert!(autocorrelation(&train(&[100])).iter().all(|&c| c == 0));
    }

    #[test]
    fn test_cross_correlation_self_pair_symmetric() {
        let a = train(&[0, 100, 250, 400]);
        let hist = cross_correlation(&a, &a);

        assert_eq!(hist.len(), CROSS_CORRELATION_BIN_COUNT);
        // Zero-lag bin counts every spike against itself
        assert_eq!(hist[100], 4);
        // Symmetric about the zero-lag bin
        for k in 0..100 {
            assert_eq!(hist[100 - k], hist[100 + k]);
        }
    }

    #[test]
    fn test_cross_correlation_singleton_is_zero() {
        let a = train(&[0, 100]);
        let singleton = train(&[50]);
        let empty = train(&[]);

        for hist in [
            cross_correlation(&a, &singleton),
            cross_correlation(&singleton, &a),
            cross_correlation(&empty, &a),
            cross_correlation(&singleton, &singleton),
        ] {
            assert_eq!(hist.len(), CROSS_CORRELATION_BIN_COUNT);
            assert!(hist.iter().all(|&count| count == 0));
        }
    }

    #[test]
    fn test_cross_correlation_lag_sign() {
        // b fires 10 ms after a: the count lands right of the zero-lag bin
        let a = train(&[0, 10_000]);
        let b = train(&[100, 10_100]);
        let hist = cross_correlation(&a, &b);
        assert_eq!(hist[110], 2);
        // and the mirrored pair lands left of it
        let hist = cross_correlation(&b, &a);
        assert_eq!(hist[90], 2);
    }

    #[test]
    fn test_cross_correlation_matrix_shape() {
        let trains = vec![train(&[0, 100]), train(&[50]), train(&[0, 60, 120])];
        let matrix = cross_correlation_all(&trains, &CancelToken::new()).unwrap();

        assert_eq!(matrix.len(), 3);
        for row in &matrix {
            assert_eq!(row.len(), 3);
            for hist in row {
                assert_eq!(hist.len(), CROSS_CORRELATION_BIN_COUNT);
            }
        }
        // The singleton row and column are all zero
        assert!(matrix[1].iter().flatten().all(|&count| count == 0));
        assert!(matrix.iter().flat_map(|row| &row[1]).all(|&count| count == 0));
    }

    #[test]
    fn test_correlation_cancellation() {
        let trains = vec![train(&[0, 100]); 4];
        let token = CancelToken::new();
        token.cancel();

        assert_eq!(
            autocorrelation_all(&trains, &token),
            Err(EphysError::Cancelled)
        );
        assert_eq!(
            cross_correlation_all(&trains, &token),
            Err(EphysError::Cancelled)
        );
    }
}
