//! This crate provides tools for detecting and analyzing spikes in digitized
//! extracellular electrophysiology recordings.
//!
//! # Detecting Spikes
//!
//! ```rust
//! use rusty_ephys::detector;
//! use rusty_ephys::source::{BufferSource, SampleSource};
//!
//! // A 1 s recording at 10 kHz with two injected pulses
//! let mut samples: Vec<i16> = (0..10_000).map(|i| if i % 2 == 0 { 1 } else { -1 }).collect();
//! samples[1000] = 1000;
//! samples[5000] = 1200;
//! let source = BufferSource::build(vec![samples], 10_000).unwrap();
//!
//! let spikes = detector::detect(&source, 0).unwrap();
//! assert_eq!(spikes.len(), 2);
//! ```
//!
//! # Classifying Spikes into Trains
//!
//! ```rust
//! use rusty_ephys::spike::Spike;
//! use rusty_ephys::train::{classify, ThresholdRange};
//!
//! let spikes = vec![
//!     Spike::new(0, 400, 1000, 10_000),
//!     Spike::new(0, 900, 3000, 10_000),
//! ];
//! let trains = classify(&spikes, &[ThresholdRange::new(300, 500)]);
//! assert_eq!(trains[0].len(), 1);
//! ```
//!
//! # Running Analyses in the Background
//!
//! Wrap any [`analysis::AnalysisRequest`] in a [`runner::AnalysisRunner`] to
//! execute it off the calling thread with cooperative cancellation; see the
//! [`runner`] module documentation.

pub mod analysis;
pub mod average;
pub mod correlation;
pub mod detector;
pub mod error;
pub mod event_triggered;
pub mod isi;
pub mod runner;
pub mod source;
pub mod spike;
pub mod synth;
pub mod train;

/// The minimum time between two retained spikes of one channel, in seconds.
pub const KILL_INTERVAL: f32 = 0.005;
/// The minimum recording duration for spike detection, in seconds.
pub const MIN_VALID_DURATION: f32 = 0.2;
/// The half-width of the average-spike window, in seconds.
pub const AVERAGING_HALF_WINDOW: f32 = 0.002;
