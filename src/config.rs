//! Pipeline configuration.
//!
//! All knobs have defaults suited to R-R interval recordings: a context order
//! of 30, a 1 Hz output grid, and a 9-sample triangular window decimated by 3
//! for posterior draws.

use crate::analysis::symbols::Quantizer;
use crate::error::{EntropyError, Result};
use crate::preprocessing::smoothing::{RollingSmoother, WindowShape};

/// Name of the R-R channel in the raw recordings.
pub const DEFAULT_CHANNEL: &str = "ECG R-R";

/// Pre-smoothing of posterior draws.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingConfig {
    pub window: usize,
    pub shape: WindowShape,
    pub decimation: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 9,
            shape: WindowShape::Triangular,
            decimation: 3,
        }
    }
}

impl SmoothingConfig {
    /// Builds the smoother described by this configuration.
    pub fn smoother(&self) -> Result<RollingSmoother> {
        RollingSmoother::new(self.window, self.shape, self.decimation)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Raw channel holding the plateau-encoded R-R intervals.
    pub channel: String,
    /// Maximum context length of the predictor.
    pub context_order: usize,
    /// Output grid rate in Hz.
    pub sample_rate: f64,
    pub smoothing: SmoothingConfig,
    pub quantizer: Quantizer,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_owned(),
            context_order: 30,
            sample_rate: 1.0,
            smoothing: SmoothingConfig::default(),
            quantizer: Quantizer::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks every knob.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InvalidInput`] for an empty channel name, a
    /// non-positive or non-finite rate, or a degenerate smoothing window.
    pub fn validate(&self) -> Result<()> {
        if self.channel.is_empty() {
            return Err(EntropyError::invalid("channel name must not be empty"));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(EntropyError::invalid(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if let Quantizer::UniformBins(0) = self.quantizer {
            return Err(EntropyError::invalid("uniform quantizer needs at least one bin"));
        }
        self.smoothing.smoother().map(|_| ())
    }
}
