//! Module implementing the analysis request and result variants.
//!
//! Every analysis the engine offers is one variant of [`AnalysisRequest`];
//! a single generic runner processes any variant, so there is no
//! class-per-analysis dispatch. Requests own their inputs (trains are cheap
//! to clone, sample sources are shared behind an [`Arc`]) and are consumed by
//! one background run.

use std::sync::Arc;

use crate::average::{self, AverageSpike};
use crate::correlation;
use crate::detector;
use crate::error::EphysError;
use crate::event_triggered::{self, EtaConfig, EventMarker, EventTriggeredAverage};
use crate::isi;
use crate::runner::CancelToken;
use crate::source::SampleSource;
use crate::spike::Spike;
use crate::train::SpikeTrain;

/// One analysis invocation with its typed inputs.
#[derive(Clone)]
pub enum AnalysisRequest {
    /// Detect the spikes of one channel.
    SpikeDetection {
        source: Arc<dyn SampleSource>,
        channel: usize,
    },
    /// Autocorrelation histogram per train.
    Autocorrelation { trains: Vec<SpikeTrain> },
    /// Cross-correlation histogram for every ordered train pair.
    CrossCorrelation { trains: Vec<SpikeTrain> },
    /// Inter-spike-interval histogram per train.
    Isi { trains: Vec<SpikeTrain> },
    /// Average spike waveform per train.
    AverageSpike {
        source: Arc<dyn SampleSource>,
        channel: usize,
        trains: Vec<SpikeTrain>,
    },
    /// Event-triggered averages for every channel.
    EventTriggeredAverage {
        source: Arc<dyn SampleSource>,
        markers: Vec<EventMarker>,
        config: EtaConfig,
    },
}

/// The result of one analysis invocation, matching the request variant.
#[derive(Debug, PartialEq, Clone)]
pub enum AnalysisResult {
    Spikes(Vec<Spike>),
    Autocorrelation(Vec<Vec<u32>>),
    CrossCorrelation(Vec<Vec<Vec<u32>>>),
    Isi(Vec<Vec<(f32, u32)>>),
    AverageSpike(Vec<AverageSpike>),
    EventTriggeredAverage(Vec<EventTriggeredAverage>),
}

impl AnalysisRequest {
    /// Runs the analysis to completion or cancellation.
    ///
    /// Pure over its inputs; safe to call from any thread. Cancellation is
    /// checked at least between trains, pairs or channels.
    pub fn process(&self, token: &CancelToken) -> Result<AnalysisResult, EphysError> {
        if token.is_cancelled() {
            return Err(EphysError::Cancelled);
        }
        match self {
            AnalysisRequest::SpikeDetection { source, channel } => {
                Ok(AnalysisResult::Spikes(detector::detect(
                    source.as_ref(),
                    *channel,
                )?))
            }
            AnalysisRequest::Autocorrelation { trains } => Ok(AnalysisResult::Autocorrelation(
                correlation::autocorrelation_all(trains, token)?,
            )),
            AnalysisRequest::CrossCorrelation { trains } => Ok(AnalysisResult::CrossCorrelation(
                correlation::cross_correlation_all(trains, token)?,
            )),
            AnalysisRequest::Isi { trains } => {
                Ok(AnalysisResult::Isi(isi::isi_all(trains, token)?))
            }
            AnalysisRequest::AverageSpike {
                source,
                channel,
                trains,
            } => Ok(AnalysisResult::AverageSpike(average::average_spike_all(
                source.as_ref(),
                *channel,
                trains,
                token,
            )?)),
            AnalysisRequest::EventTriggeredAverage {
                source,
                markers,
                config,
            } => Ok(AnalysisResult::EventTriggeredAverage(
                event_triggered::event_triggered_average(
                    source.as_ref(),
                    markers,
                    config,
                    token,
                )?,
            )),
        }
    }
}
