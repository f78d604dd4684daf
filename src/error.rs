//! Error type shared by every stage of the entropy pipeline.

use thiserror::Error;

/// Errors raised by the segmentation, alignment, coding and estimation stages.
///
/// Collaborators behind a trait (posterior samplers, predictor engines) report
/// failures as [`anyhow::Error`]; those are carried unchanged inside
/// [`EntropyError::ExternalFailure`].
#[derive(Error, Debug)]
pub enum EntropyError {
    /// The named channel is not present in the raw recording.
    #[error("channel `{0}` not found in the raw recording")]
    MissingChannel(String),
    /// Too few points for segmentation or interpolation.
    #[error("insufficient data{}: {reason}", recording_suffix(.recording))]
    InsufficientData {
        recording: Option<String>,
        reason: String,
    },
    /// A symbol was not part of the frozen alphabet.
    #[error("symbol {symbol} is not part of the alphabet (size {alphabet_size})")]
    AlphabetMismatch { symbol: u8, alphabet_size: usize },
    /// The posterior sampler or the predictor engine failed.
    #[error("external collaborator failed: {0}")]
    ExternalFailure(#[source] anyhow::Error),
    /// Malformed arguments: non-monotonic axes, non-finite samples, zero rates.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl EntropyError {
    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        EntropyError::InsufficientData {
            recording: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        EntropyError::InvalidInput(reason.into())
    }

    /// Attaches a recording identifier to `InsufficientData` errors.
    ///
    /// Other variants are returned unchanged.
    pub fn for_recording(self, id: &str) -> Self {
        match self {
            EntropyError::InsufficientData { recording: None, reason } => {
                EntropyError::InsufficientData {
                    recording: Some(id.to_owned()),
                    reason,
                }
            }
            other => other,
        }
    }
}

fn recording_suffix(recording: &Option<String>) -> String {
    match recording {
        Some(id) => format!(" in recording `{id}`"),
        None => String::new(),
    }
}

pub type Result<T, E = EntropyError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_id_is_attached_once() {
        let err = EntropyError::insufficient("need 4 points").for_recording("ID01");
        assert_eq!(
            err.to_string(),
            "insufficient data in recording `ID01`: need 4 points"
        );
        let err = err.for_recording("ID02");
        assert!(err.to_string().contains("ID01"));
    }

    #[test]
    fn other_variants_ignore_recording() {
        let err = EntropyError::MissingChannel("ECG R-R".into()).for_recording("ID01");
        assert!(matches!(err, EntropyError::MissingChannel(_)));
        assert_eq!(
            err.to_string(),
            "channel `ECG R-R` not found in the raw recording"
        );
    }
}
