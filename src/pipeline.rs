//! Single-recording orchestration of the entropy pipeline.
//!
//! raw channel → heartbeat events → heart-rate trajectories → regular grid →
//! successive differences → symbols → entropy rate.

use log::{debug, warn};

use crate::analysis::entropy::{EntropyEstimator, EntropyResult, PredictorStrategy};
use crate::analysis::interpolation::TrajectoryAligner;
use crate::analysis::symbols::{Alphabet, SymbolCodec, SymbolSequence};
use crate::config::PipelineConfig;
use crate::error::{EntropyError, Result};
use crate::preprocessing::segmentation::PeakSegmenter;
use crate::preprocessing::smoothing::RollingSmoother;
use crate::sources::{ChannelSource, HeartRateSource};
use crate::trajectory::{AlignedTrajectorySet, EventTimeSeries};

/// What a run starts from.
pub enum RecordingInput<'a> {
    /// A raw recording; the configured channel is segmented into events.
    Raw(&'a dyn ChannelSource),
    /// Precomputed heartbeat timestamps.
    Events(EventTimeSeries),
}

/// Entropy of one recording.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingEntropy {
    pub recording: String,
    pub result: EntropyResult,
}

impl RecordingEntropy {
    /// Mean entropy over all series; NaN for a degenerate recording.
    pub fn mean(&self) -> f64 {
        self.result.mean()
    }
}

/// Runs every stage for one recording at a time.
///
/// # Example
///
/// ```rust
/// use hrv_entropy::config::PipelineConfig;
/// use hrv_entropy::pipeline::{EntropyPipeline, RecordingInput};
/// use hrv_entropy::sources::HeartRateSource;
/// use hrv_entropy::trajectory::EventTimeSeries;
///
/// let pipeline = EntropyPipeline::new(PipelineConfig::default(), HeartRateSource::Direct).unwrap();
/// let beats = EventTimeSeries::new((1..=100).map(f64::from).collect()).unwrap();
/// let entropy = pipeline.run("ID01", RecordingInput::Events(beats)).unwrap();
/// assert_eq!(entropy.mean(), 0.0);
/// ```
#[derive(Debug)]
pub struct EntropyPipeline {
    config: PipelineConfig,
    source: HeartRateSource,
    segmenter: PeakSegmenter,
    smoother: RollingSmoother,
    aligner: TrajectoryAligner,
    codec: SymbolCodec,
    estimator: EntropyEstimator,
}

impl EntropyPipeline {
    /// Creates a pipeline using the native context tree predictor.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InvalidInput`] if the configuration is invalid.
    pub fn new(config: PipelineConfig, source: HeartRateSource) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            segmenter: PeakSegmenter,
            smoother: config.smoothing.smoother()?,
            aligner: TrajectoryAligner::new(config.sample_rate)?,
            codec: SymbolCodec::new(config.quantizer),
            estimator: EntropyEstimator::new(
                PredictorStrategy::ContextTreeWeighting,
                config.context_order,
            ),
            config,
            source,
        })
    }

    /// Replaces the predictor engine.
    pub fn with_predictor(mut self, predictor: PredictorStrategy) -> Self {
        self.estimator = EntropyEstimator::new(predictor, self.config.context_order);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Heartbeat timestamps from the configured channel of a raw recording.
    pub fn segment_recording(&self, recording: &dyn ChannelSource) -> Result<EventTimeSeries> {
        let raw = recording
            .channel(&self.config.channel)
            .ok_or_else(|| EntropyError::MissingChannel(self.config.channel.clone()))?;
        self.segmenter.segment(raw)
    }

    /// Heart-rate trajectories resampled at the configured rate.
    pub fn heart_rate_trajectories(&self, events: &EventTimeSeries) -> Result<AlignedTrajectorySet> {
        let trajectories = self.source.trajectories(events, &self.smoother)?;
        self.aligner.align(trajectories)
    }

    /// Self-entropy of the successive differences of every aligned series.
    ///
    /// The alphabet is built from the first series of the first trajectory and
    /// shared by all others. Series of a multi-trajectory set are indexed as
    /// `"{trajectory}/{series}"`.
    pub fn trajectory_entropy(&self, aligned: &AlignedTrajectorySet) -> Result<EntropyResult> {
        let diffs: Vec<_> = aligned.trajectories().iter().map(|t| t.diff()).collect();
        let Some(reference) = diffs.first().and_then(|t| t.series_values(0)) else {
            return Err(EntropyError::insufficient("no aligned series to encode"));
        };
        let alphabet: Alphabet = self.codec.build_alphabet(&reference)?;

        let prefixed = diffs.len() > 1;
        let mut sequences: Vec<SymbolSequence> = Vec::new();
        for (t_idx, traj) in diffs.iter().enumerate() {
            for (s_idx, name) in traj.names().iter().enumerate() {
                let values: Vec<f64> = traj.values().column(s_idx).iter().copied().collect();
                let index = if prefixed {
                    format!("{t_idx}/{name}")
                } else {
                    name.clone()
                };
                sequences.push(self.codec.encode(&index, &values, &alphabet)?);
            }
        }
        debug!(
            "encoded {} sequences over an alphabet of {} symbols",
            sequences.len(),
            alphabet.size()
        );
        self.estimator.estimate_self(&alphabet, &sequences)
    }

    /// Runs every stage for one recording.
    ///
    /// A recording without any heartbeat yields no entries and a NaN mean.
    ///
    /// # Errors
    ///
    /// Any stage error; [`EntropyError::InsufficientData`] carries
    /// `recording_id`.
    pub fn run(&self, recording_id: &str, input: RecordingInput<'_>) -> Result<RecordingEntropy> {
        self.run_stages(recording_id, input)
            .map_err(|err| err.for_recording(recording_id))
    }

    fn run_stages(&self, recording_id: &str, input: RecordingInput<'_>) -> Result<RecordingEntropy> {
        let events = match input {
            RecordingInput::Raw(recording) => self.segment_recording(recording)?,
            RecordingInput::Events(events) => events,
        };
        if events.is_empty() {
            warn!("recording `{recording_id}` has no heartbeat events");
            return Ok(RecordingEntropy {
                recording: recording_id.to_owned(),
                result: EntropyResult::default(),
            });
        }
        debug!("recording `{recording_id}`: {} heartbeat events", events.len());

        let aligned = self.heart_rate_trajectories(&events)?;
        let result = self.trajectory_entropy(&aligned)?;
        debug!("recording `{recording_id}`: mean entropy {:.4}", result.mean());
        Ok(RecordingEntropy {
            recording: recording_id.to_owned(),
            result,
        })
    }
}
