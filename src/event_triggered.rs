//! Module implementing event-triggered averaging.
//!
//! Unlike the spike-train analyses, this one is keyed on externally supplied
//! labelled markers (stimulus onsets, behavioral events, ...) rather than on
//! detected spikes: for every channel and every distinct marker label, the
//! mean waveform of a fixed window around each occurrence is computed, plus a
//! cross-event grand average with a band, normalized for display.

use std::sync::Arc;

use derivative::Derivative;
use itertools::Itertools;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::EphysError;
use crate::runner::CancelToken;
use crate::source::SampleSource;

/// The default window extent on each side of an event, in seconds.
pub const ETA_WINDOW_OFFSET: f32 = 0.7;

/// An externally supplied labelled timestamp marker.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct EventMarker {
    /// The time of the event in seconds.
    time: f32,
    /// An opaque label tag; no enumerated domain at this layer.
    label: String,
}

impl EventMarker {
    /// Create a new event marker with the specified parameters.
    pub fn new(time: f32, label: impl Into<String>) -> Self {
        EventMarker {
            time,
            label: label.into(),
        }
    }

    /// Returns the time of the event in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Returns the label of the event.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A caller-supplied predicate marking a sample range as noise.
///
/// The exact noise-interval semantics (how intervals are recorded, stored,
/// edited) belong to the caller; the analyzer only asks whether a window
/// `[start, end)` should be excluded from accumulation.
pub type NoisePredicate = Arc<dyn Fn(usize, usize) -> bool + Send + Sync>;

/// Configuration of an event-triggered-average run.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct EtaConfig {
    /// The window extent left of each event, in seconds.
    pub left_offset: f32,
    /// The window extent right of each event, in seconds.
    pub right_offset: f32,
    /// Whether windows flagged by the noise predicate are excluded.
    pub remove_noise_intervals: bool,
    /// The noise predicate; consulted only when `remove_noise_intervals` is set.
    #[derivative(Debug = "ignore")]
    pub noise_predicate: Option<NoisePredicate>,
    /// When set, the grand-average band is computed from this label's
    /// occurrences only; otherwise from all events.
    pub confidence_label: Option<String>,
}

impl Default for EtaConfig {
    fn default() -> Self {
        EtaConfig {
            left_offset: ETA_WINDOW_OFFSET,
            right_offset: ETA_WINDOW_OFFSET,
            remove_noise_intervals: false,
            noise_predicate: None,
            confidence_label: None,
        }
    }
}

/// The event-triggered averages of one channel.
///
/// All waveform arrays have length `left + right + 1` samples. Labels appear
/// in order of first occurrence in the marker list.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct EventTriggeredAverage {
    /// The channel the averages were computed on.
    pub channel: usize,
    /// The distinct event labels, in order of first occurrence.
    pub event_labels: Vec<String>,
    /// One raw mean waveform per label.
    pub raw_averages: Vec<Vec<f32>>,
    /// One [0, 1]-normalized mean waveform per label, sharing the channel scale.
    pub norm_averages: Vec<Vec<f32>>,
    /// The normalized grand average over all events, independent of label.
    pub norm_all_events_average: Vec<f32>,
    /// The normalized upper band line of the grand average.
    pub norm_top: Vec<f32>,
    /// The normalized lower band line of the grand average.
    pub norm_bottom: Vec<f32>,
    /// The smallest raw value across all averages, used as the display scale.
    pub min: f32,
    /// The largest raw value across all averages, used as the display scale.
    pub max: f32,
}

/// Window accumulator: running sum, sum of squares and count.
struct Accumulator {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
    count: usize,
}

impl Accumulator {
    fn new(width: usize) -> Self {
        Accumulator {
            sum: vec![0.0; width],
            sum_sq: vec![0.0; width],
            count: 0,
        }
    }

    fn add(&mut self, window: &[i16]) {
        for (pos, &sample) in window.iter().enumerate() {
            let value = sample as f64;
            self.sum[pos] += value;
            self.sum_sq[pos] += value * value;
        }
        self.count += 1;
    }

    fn mean(&self) -> Vec<f32> {
        if self.count == 0 {
            return vec![0.0; self.sum.len()];
        }
        self.sum
            .iter()
            .map(|&s| (s / self.count as f64) as f32)
            .collect()
    }

    /// Mean plus/minus one standard deviation; zeros with fewer than two windows.
    fn band(&self) -> (Vec<f32>, Vec<f32>) {
        let width = self.sum.len();
        if self.count < 2 {
            return (vec![0.0; width], vec![0.0; width]);
        }
        let n = self.count as f64;
        let mut top = Vec::with_capacity(width);
        let mut bottom = Vec::with_capacity(width);
        for pos in 0..width {
            let mean = self.sum[pos] / n;
            let var = (self.sum_sq[pos] / n - mean * mean).max(0.0);
            let std = var.sqrt();
            top.push((mean + std) as f32);
            bottom.push((mean - std) as f32);
        }
        (top, bottom)
    }
}

/// Computes the event-triggered averages of every channel of the source.
///
/// Channels are processed in parallel; cancellation is checked per channel.
pub fn event_triggered_average(
    source: &dyn SampleSource,
    markers: &[EventMarker],
    config: &EtaConfig,
    token: &CancelToken,
) -> Result<Vec<EventTriggeredAverage>, EphysError> {
    (0..source.channel_count())
        .into_par_iter()
        .map(|channel| {
            if token.is_cancelled() {
                return Err(EphysError::Cancelled);
            }
            channel_average(source, channel, markers, config)
        })
        .collect()
}

/// Computes the event-triggered averages of a single channel.
pub fn channel_average(
    source: &dyn SampleSource,
    channel: usize,
    markers: &[EventMarker],
    config: &EtaConfig,
) -> Result<EventTriggeredAverage, EphysError> {
    let rate = source.sample_rate();
    let left = (config.left_offset * rate as f32).round() as usize;
    let right = (config.right_offset * rate as f32).round() as usize;
    let width = left + right + 1;
    let num_samples = source.num_samples();

    let event_labels: Vec<String> = markers
        .iter()
        .map(|marker| marker.label().to_string())
        .unique()
        .collect();

    let mut per_label: Vec<Accumulator> =
        event_labels.iter().map(|_| Accumulator::new(width)).collect();
    let mut all_events = Accumulator::new(width);
    let mut band_source = Accumulator::new(width);

    for marker in markers {
        let event_index = (marker.time() * rate as f32).round() as usize;
        if event_index < left || event_index + right >= num_samples {
            debug!("Event at {} s outside the recording, skipped", marker.time());
            continue;
        }
        let start = event_index - left;
        if config.remove_noise_intervals {
            if let Some(predicate) = &config.noise_predicate {
                if predicate(start, start + width) {
                    debug!("Event at {} s inside a noise interval, skipped", marker.time());
                    continue;
                }
            }
        }

        let window = source.read(channel, start, width)?;
        let label_pos = event_labels
            .iter()
            .position(|label| label == marker.label())
            .ok_or_else(|| EphysError::InvalidParameter("unknown event label".to_string()))?;
        per_label[label_pos].add(&window);
        all_events.add(&window);
        match &config.confidence_label {
            Some(label) if label == marker.label() => band_source.add(&window),
            Some(_) => {}
            None => band_source.add(&window),
        }
    }

    let raw_averages: Vec<Vec<f32>> = per_label.iter().map(Accumulator::mean).collect();
    let all_events_average = all_events.mean();
    let (top, bottom) = band_source.band();

    // One shared display scale per channel
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for values in raw_averages
        .iter()
        .chain([&all_events_average, &top, &bottom])
    {
        for &value in values {
            min = min.min(value);
            max = max.max(value);
        }
    }
    if !min.is_finite() || !max.is_finite() {
        (min, max) = (0.0, 0.0);
    }

    let normalize = |values: &[f32]| -> Vec<f32> {
        if max > min {
            values.iter().map(|&x| (x - min) / (max - min)).collect()
        } else {
            vec![0.0; values.len()]
        }
    };

    Ok(EventTriggeredAverage {
        channel,
        norm_averages: raw_averages.iter().map(|avg| normalize(avg)).collect(),
        norm_all_events_average: normalize(&all_events_average),
        norm_top: normalize(&top),
        norm_bottom: normalize(&bottom),
        event_labels,
        raw_averages,
        min,
        max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BufferSource;
    use approx::assert_relative_eq;

    const RATE: u32 = 1000;

    /// A two-channel, 10 s recording with rectangular pulses on channel 0 at
    /// the given sample indices. Channel 1 stays flat.
    fn source_with_pulses(peaks: &[usize], amplitude: i16) -> BufferSource {
        let mut samples = vec![0i16; 10_000];
        for &peak in peaks {
            samples[peak] = amplitude;
        }
        BufferSource::build(vec![samples, vec![0i16; 10_000]], RATE).unwrap()
    }

    fn config() -> EtaConfig {
        EtaConfig {
            left_offset: 0.1,
            right_offset: 0.1,
            ..EtaConfig::default()
        }
    }

    #[test]
    fn test_labels_in_order_of_first_occurrence() {
        let source = source_with_pulses(&[], 0);
        let markers = vec![
            EventMarker::new(2.0, "b"),
            EventMarker::new(3.0, "a"),
            EventMarker::new(4.0, "b"),
        ];
        let result = channel_average(&source, 0, &markers, &config()).unwrap();
        assert_eq!(result.event_labels, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(result.raw_averages.len(), 2);
        assert_eq!(result.norm_averages.len(), 2);
    }

    #[test]
    fn test_average_keyed_by_label() {
        // Label "s" events sit on pulses, label "q" events on flat signal
        let source = source_with_pulses(&[2000, 4000], 600);
        let markers = vec![
            EventMarker::new(2.0, "s"),
            EventMarker::new(4.0, "s"),
            EventMarker::new(6.0, "q"),
        ];
        let result = channel_average(&source, 0, &markers, &config()).unwrap();

        let width = 201; // 0.1 s on each side at 1 kHz
        assert_eq!(result.raw_averages[0].len(), width);
        // The pulse sits at the window center for label "s"
        assert_relative_eq!(result.raw_averages[0][100], 600.0);
        assert_relative_eq!(result.raw_averages[0][0], 0.0);
        // and label "q" saw nothing
        assert!(result.raw_averages[1].iter().all(|&x| x == 0.0));

        // Channel scale: the all-events band tops out above the grand mean.
        // Center values are 600, 600, 0, so mean 400 and std sqrt(80000).
        let expected_max = 400.0 + 80_000.0f32.sqrt();
        assert_relative_eq!(result.min, 0.0);
        assert_relative_eq!(result.max, expected_max, max_relative = 1e-4);
        assert_relative_eq!(
            result.norm_averages[0][100],
            600.0 / expected_max,
            max_relative = 1e-4
        );
        // Two of three events saw the pulse
        assert_relative_eq!(
            result.norm_all_events_average[100],
            400.0 / expected_max,
            max_relative = 1e-4
        );
    }

    #[test]
    fn test_out_of_bounds_events_skipped() {
        let source = source_with_pulses(&[2000], 600);
        let markers = vec![
            EventMarker::new(0.05, "s"),  // window starts before the recording
            EventMarker::new(9.95, "s"),  // window ends after the recording
            EventMarker::new(2.0, "s"),
        ];
        let result = channel_average(&source, 0, &markers, &config()).unwrap();
        assert_relative_eq!(result.raw_averages[0][100], 600.0);
    }

    #[test]
    fn test_noise_intervals_excluded_when_requested() {
        let source = source_with_pulses(&[2000, 4000], 600);
        let markers = vec![EventMarker::new(2.0, "s"), EventMarker::new(4.0, "s")];

        // Flag everything around the second event as noise
        let predicate: NoisePredicate = Arc::new(|start, end| start < 4200 && end > 3800);
        let mut config = config();
        config.remove_noise_intervals = true;
        config.noise_predicate = Some(predicate.clone());

        let result = channel_average(&source, 0, &markers, &config).unwrap();
        // Only the first event was accumulated; the pulse is not diluted
        assert_relative_eq!(result.raw_averages[0][100], 600.0);

        // The same predicate is ignored when the flag is off
        config.remove_noise_intervals = false;
        let result = channel_average(&source, 0, &markers, &config).unwrap();
        assert_relative_eq!(result.raw_averages[0][100], 600.0);
    }

    #[test]
    fn test_band_source_follows_confidence_label() {
        let source = source_with_pulses(&[2000, 4000], 600);
        let markers = vec![
            EventMarker::new(2.0, "s"),
            EventMarker::new(4.0, "s"),
            EventMarker::new(6.0, "q"),
            EventMarker::new(8.0, "q"),
        ];

        // Band from the flat "q" events collapses onto their mean
        let mut config = config();
        config.confidence_label = Some("q".to_string());
        let result = channel_average(&source, 0, &markers, &config).unwrap();
        assert_eq!(result.norm_top, result.norm_bottom);

        // Band from all events has spread at the window center
        config.confidence_label = None;
        let result = channel_average(&source, 0, &markers, &config).unwrap();
        assert!(result.norm_top[100] > result.norm_bottom[100]);
    }

    #[test]
    fn test_all_channels_processed() {
        let source = source_with_pulses(&[2000], 600);
        let markers = vec![EventMarker::new(2.0, "s"), EventMarker::new(3.0, "s")];
        let results =
            event_triggered_average(&source, &markers, &config(), &CancelToken::new()).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].channel, 0);
        assert_eq!(results[1].channel, 1);
        // The flat channel normalizes to all zeros
        assert!(results[1].norm_all_events_average.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_eta_cancellation() {
        let source = source_with_pulses(&[2000], 600);
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            event_triggered_average(&source, &[], &config(), &token),
            Err(EphysError::Cancelled)
        );
    }
}
