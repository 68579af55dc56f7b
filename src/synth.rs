//! Module implementing synthetic extracellular recordings.
//!
//! Sampling utilities for tests and demos: Gaussian baseline noise with
//! optional injected pulses standing in for real spikes.

use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Samples a Gaussian noise buffer with the given standard deviation.
///
/// # Parameters
/// - `num_samples`: The number of samples to generate.
/// - `std_dev`: The standard deviation of the noise in sample units.
/// - `rng`: A mutable reference to a random number generator implementing the `Rng` trait.
pub fn noise<R: Rng>(num_samples: usize, std_dev: f64, rng: &mut R) -> Vec<i16> {
    let normal = Normal::new(0.0, std_dev).unwrap_or_else(|_| Normal::new(0.0, 1.0).unwrap());
    (0..num_samples)
        .map(|_| {
            normal
                .sample(rng)
                .clamp(i16::MIN as f64, i16::MAX as f64)
                .round() as i16
        })
        .collect()
}

/// Injects a triangular pulse peaking at `index` into the buffer.
///
/// The pulse ramps linearly over `half_width` samples on each side of the
/// peak. Samples outside the buffer are ignored.
pub fn inject_pulse(samples: &mut [i16], index: usize, amplitude: i16, half_width: usize) {
    if half_width == 0 {
        if let Some(sample) = samples.get_mut(index) {
            *sample = amplitude;
        }
        return;
    }
    for offset in 0..=half_width {
        let value =
            (amplitude as f64 * (1.0 - offset as f64 / (half_width + 1) as f64)).round() as i16;
        if let Some(sample) = samples.get_mut(index + offset) {
            *sample = value;
        }
        if offset > 0 && index >= offset {
            if let Some(sample) = samples.get_mut(index - offset) {
                *sample = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: u64 = 42;

    #[test]
    fn test_noise_statistics() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let samples = noise(100_000, 10.0, &mut rng);
        assert_eq!(samples.len(), 100_000);

        let n = samples.len() as f64;
        let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
        let var = samples
            .iter()
            .map(|&x| (x as f64 - mean) * (x as f64 - mean))
            .sum::<f64>()
            / n;
        assert!(mean.abs() < 0.5);
        assert!((var.sqrt() - 10.0).abs() < 0.5);
    }

    #[test]
    fn test_inject_pulse_shape() {
        let mut samples = vec![0i16; 100];
        inject_pulse(&mut samples, 50, 900, 2);

        assert_eq!(samples[50], 900);
        assert_eq!(samples[49], samples[51]);
        assert_eq!(samples[48], samples[52]);
        assert!(samples[49] < 900 && samples[49] > 0);
        assert!(samples[48] < samples[49]);
        assert_eq!(samples[47], 0);
    }

    #[test]
    fn test_inject_pulse_at_buffer_edges() {
        let mut samples = vec![0i16; 10];
        inject_pulse(&mut samples, 0, 500, 3);
        inject_pulse(&mut samples, 9, 500, 3);
        assert_eq!(samples[0], 500);
        assert_eq!(samples[9], 500);
    }
}
