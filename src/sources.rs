//! Inputs of the pipeline: raw recordings and heart-rate sources.
//!
//! A raw recording is a set of named, uniformly sampled channels. Heart-rate
//! trajectories are derived from heartbeat events either directly (the
//! instantaneous rate `60 / rr`) or by drawing from a posterior sampler.

use std::collections::HashMap;

use anyhow::Result as AnyResult;
use log::debug;

use crate::error::{EntropyError, Result};
use crate::preprocessing::smoothing::RollingSmoother;
use crate::trajectory::{EventTimeSeries, Trajectory};

/// Access to the named channels of one raw recording.
pub trait ChannelSource {
    /// Samples of channel `name`, if present.
    fn channel(&self, name: &str) -> Option<&[f64]>;
}

/// In-memory raw recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecording {
    sample_rate: f64,
    channels: HashMap<String, Vec<f64>>,
}

impl RawRecording {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            channels: HashMap::new(),
        }
    }

    /// Adds or replaces a channel.
    pub fn with_channel(mut self, name: &str, samples: Vec<f64>) -> Self {
        self.channels.insert(name.to_owned(), samples);
        self
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }
}

impl ChannelSource for RawRecording {
    fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channels.get(name).map(Vec::as_slice)
    }
}

/// Draws heart-rate trajectories from a posterior given observed heartbeats.
///
/// Every returned trajectory holds one column per posterior draw.
#[cfg_attr(test, mockall::automock)]
pub trait PosteriorSampler {
    fn sample_posterior(&self, events: &EventTimeSeries) -> AnyResult<Vec<Trajectory>>;
}

/// Instantaneous heart rate in beats per minute.
///
/// The rate of interval `i` is `60 / rr[i]`, timestamped at the interval
/// midpoint. The single series is named `"hr"`.
///
/// # Errors
///
/// - [`EntropyError::InsufficientData`] with fewer than two events.
/// - [`EntropyError::InvalidInput`] for a non-positive interval.
pub fn direct_heart_rate(events: &EventTimeSeries) -> Result<Trajectory> {
    if events.len() < 2 {
        return Err(EntropyError::insufficient(format!(
            "heart rate needs at least 2 events, got {}",
            events.len()
        )));
    }
    let rr = events.intervals();
    if let Some(bad) = rr.iter().find(|&&r| r <= 0.0) {
        return Err(EntropyError::invalid(format!(
            "non-positive inter-beat interval {bad}"
        )));
    }
    let time = events
        .as_slice()
        .iter()
        .zip(rr.iter())
        .map(|(t, r)| t + r / 2.0)
        .collect();
    let hr = rr.iter().map(|r| 60.0 / r).collect();
    Trajectory::single(time, "hr", hr)
}

/// Available heart-rate sources.
/// Posterior samplers are passed via the `Posterior` variant.
#[derive(Default)]
pub enum HeartRateSource {
    /// Instantaneous rate from the inter-beat intervals.
    #[default]
    Direct,
    /// Posterior draws, smoothed before alignment.
    Posterior(Box<dyn PosteriorSampler + Send + Sync>),
}

impl std::fmt::Debug for HeartRateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeartRateSource::Direct => f.write_str("Direct"),
            HeartRateSource::Posterior(_) => f.write_str("Posterior(..)"),
        }
    }
}

impl HeartRateSource {
    /// Heart-rate trajectories for a set of events.
    ///
    /// Posterior draws are passed through `smoother`; direct estimates are not.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::ExternalFailure`] if the sampler fails or
    /// returns no trajectories.
    pub fn trajectories(
        &self,
        events: &EventTimeSeries,
        smoother: &RollingSmoother,
    ) -> Result<Vec<Trajectory>> {
        match self {
            HeartRateSource::Direct => Ok(vec![direct_heart_rate(events)?]),
            HeartRateSource::Posterior(sampler) => {
                let samples = sampler
                    .sample_posterior(events)
                    .map_err(EntropyError::ExternalFailure)?;
                if samples.is_empty() {
                    return Err(EntropyError::ExternalFailure(anyhow::anyhow!(
                        "posterior sampler returned no trajectories"
                    )));
                }
                debug!(
                    "posterior sampler returned {} trajectories for {} events",
                    samples.len(),
                    events.len()
                );
                samples.iter().map(|t| smoother.smooth(t)).collect()
            }
        }
    }
}
