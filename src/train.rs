//! Module implementing spike trains and their classification by amplitude.
//!
//! A spike train is never stored independently: it is the ordered subsequence
//! of a channel's spikes whose amplitude falls within one configured
//! threshold range, recomputed whenever the spikes or the ranges change.
//!
//! # Examples
//!
//! ```rust
//! use rusty_ephys::spike::Spike;
//! use rusty_ephys::train::{classify, ThresholdRange};
//!
//! let spikes = vec![
//!     Spike::new(0, 400, 1000, 10_000),
//!     Spike::new(0, 900, 3000, 10_000),
//!     Spike::new(0, -350, 6000, 10_000),
//! ];
//!
//! // Edge order does not matter
//! let ranges = vec![ThresholdRange::new(800, 300), ThresholdRange::new(-500, -100)];
//! let trains = classify(&spikes, &ranges);
//!
//! assert_eq!(trains.len(), 2);
//! assert_eq!(trains[0].len(), 1);
//! assert_eq!(trains[1].len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::spike::Spike;

/// An amplitude range selecting spikes into a train.
///
/// Built from two unordered edges; which edge the user dragged is a display
/// concern and does not affect membership. Ranges may overlap, in which case
/// a spike belongs to every train whose range contains it.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdRange {
    lower: i16,
    upper: i16,
}

impl ThresholdRange {
    /// Create a range from two unordered edges.
    pub fn new(edge_a: i16, edge_b: i16) -> Self {
        ThresholdRange {
            lower: edge_a.min(edge_b),
            upper: edge_a.max(edge_b),
        }
    }

    /// Returns the lower bound of the range.
    pub fn lower(&self) -> i16 {
        self.lower
    }

    /// Returns the upper bound of the range.
    pub fn upper(&self) -> i16 {
        self.upper
    }

    /// Returns whether the given amplitude falls within the range (inclusive).
    pub fn contains(&self, amplitude: i16) -> bool {
        self.lower <= amplitude && amplitude <= self.upper
    }
}

/// The ordered subsequence of a channel's spikes selected by one threshold range.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SpikeTrain {
    range: ThresholdRange,
    spikes: Vec<Spike>,
}

impl SpikeTrain {
    /// Create a spike train from an already filtered, time-ordered spike list.
    pub fn new(range: ThresholdRange, spikes: Vec<Spike>) -> Self {
        SpikeTrain { range, spikes }
    }

    /// Returns the range that selected this train.
    pub fn range(&self) -> ThresholdRange {
        self.range
    }

    /// Returns the spikes of the train, in time order.
    pub fn spikes(&self) -> &[Spike] {
        &self.spikes
    }

    /// Returns the spike times of the train in seconds, in time order.
    pub fn times(&self) -> Vec<f32> {
        self.spikes.iter().map(|spike| spike.time()).collect()
    }

    /// Returns the number of spikes in the train.
    pub fn len(&self) -> usize {
        self.spikes.len()
    }

    /// Returns whether the train contains no spikes.
    pub fn is_empty(&self) -> bool {
        self.spikes.is_empty()
    }
}

/// Partitions spikes into one train per range, in range order.
///
/// Pure and deterministic: identical inputs yield identical output, so the
/// caller may cache results keyed on (spike set, ranges). The filter is
/// stable; each train preserves the time order of the input spikes.
pub fn classify(spikes: &[Spike], ranges: &[ThresholdRange]) -> Vec<SpikeTrain> {
    ranges
        .iter()
        .map(|&range| {
            let selected = spikes
                .iter()
                .filter(|spike| range.contains(spike.amplitude()))
                .cloned()
                .collect();
            SpikeTrain::new(range, selected)
        })
        .collect()
}
