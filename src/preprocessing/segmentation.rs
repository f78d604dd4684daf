//! Reconstruction of heartbeat timestamps from a repeated-value R-R channel.
//!
//! Acquisition systems export the inter-beat interval as a continuously sampled
//! channel that holds the last interval until the next beat. Each plateau of the
//! channel therefore corresponds to one heartbeat and its value to the interval
//! length in seconds.
//!
//! # Example
//!
//! ```rust
//! use hrv_entropy::preprocessing::segmentation::PeakSegmenter;
//!
//! let raw = [0.0, 0.0, 4.0, 4.0, 4.0, 2.0, 2.0, 2.0, 6.0, 6.0];
//! let events = PeakSegmenter.segment(&raw).unwrap();
//! assert_eq!(events.as_slice(), &[2.0]);
//! ```

use log::{debug, trace};

use crate::error::{EntropyError, Result};
use crate::trajectory::EventTimeSeries;

/// Splits a repeated-value channel into plateaus and accumulates their values.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakSegmenter;

impl PeakSegmenter {
    /// Reconstructs heartbeat timestamps from the raw channel.
    ///
    /// # Algorithm
    ///
    /// 1. Leading samples that are zero or not finite are trimmed.
    /// 2. Plateau boundaries are the positions whose value differs from the
    ///    preceding sample. The start of the trimmed signal is always a boundary;
    ///    it marks the trim point, not a beat, and is discarded.
    /// 3. Every run between two consecutive remaining boundaries is a segment
    ///    represented by its first sample. The trailing run after the last
    ///    boundary is incomplete and dropped.
    /// 4. The timestamps are the cumulative sum of the segment values.
    ///
    /// # Arguments
    ///
    /// * `raw` - Samples of the R-R channel, one interval value held per plateau.
    ///
    /// # Returns
    ///
    /// Heartbeat timestamps in seconds relative to the first complete plateau;
    /// empty if the channel holds no complete segment.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InvalidInput`] if a sample after the trim point is
    /// negative or not finite, or if a complete segment is not strictly positive.
    pub fn segment(&self, raw: &[f64]) -> Result<EventTimeSeries> {
        let Some(first_valid) = raw.iter().position(|&v| v != 0.0 && v.is_finite()) else {
            debug!("no valid sample in raw channel of {} samples", raw.len());
            return Ok(EventTimeSeries::empty());
        };
        let signal = &raw[first_valid..];
        if let Some(pos) = signal.iter().position(|&v| !v.is_finite() || v < 0.0) {
            return Err(EntropyError::invalid(format!(
                "raw sample {} at position {} is negative or not finite",
                signal[pos],
                first_valid + pos
            )));
        }

        let boundaries: Vec<usize> = (1..signal.len())
            .filter(|&i| signal[i] != signal[i - 1])
            .collect();
        trace!(
            "trimmed {} leading samples, {} plateau boundaries",
            first_valid,
            boundaries.len()
        );

        let mut elapsed = 0.0;
        let mut times = Vec::with_capacity(boundaries.len().saturating_sub(1));
        for pair in boundaries.windows(2) {
            let interval = signal[pair[0]];
            if interval <= 0.0 {
                return Err(EntropyError::invalid(format!(
                    "segment at position {} has non-positive interval {}",
                    first_valid + pair[0],
                    interval
                )));
            }
            elapsed += interval;
            times.push(elapsed);
        }
        debug!("segmented {} heartbeats", times.len());
        EventTimeSeries::new(times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_trim_boundary_and_trailing_run() {
        let raw = [0.0, 0.0, 4.0, 4.0, 4.0, 2.0, 2.0, 2.0, 6.0, 6.0];
        let events = PeakSegmenter.segment(&raw).unwrap();
        assert_eq!(events.as_slice(), &[2.0]);
    }

    #[test]
    fn accumulates_complete_segments() {
        let raw = [0.0, 0.9, 0.9, 0.8, 0.8, 0.8, 1.1, 1.0, 1.0, 0.7];
        let events = PeakSegmenter.segment(&raw).unwrap();
        let expected = [0.8, 1.9, 2.9];
        assert_eq!(events.len(), expected.len());
        for (e, x) in events.as_slice().iter().zip(expected.iter()) {
            assert!((e - x).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_channel_has_no_events() {
        let raw = vec![1.0; 500];
        assert!(PeakSegmenter.segment(&raw).unwrap().is_empty());
    }

    #[test]
    fn all_zero_channel_has_no_events() {
        let raw = vec![0.0; 20];
        assert!(PeakSegmenter.segment(&raw).unwrap().is_empty());
        assert!(PeakSegmenter.segment(&[]).unwrap().is_empty());
    }

    #[test]
    fn single_boundary_has_no_events() {
        let raw = [0.0, 5.0, 5.0, 3.0, 3.0];
        assert!(PeakSegmenter.segment(&raw).unwrap().is_empty());
    }

    #[test]
    fn channel_without_leading_zeros() {
        let raw = [1.0, 1.0, 0.5, 0.5, 0.6, 0.6, 0.4];
        let events = PeakSegmenter.segment(&raw).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events.as_slice()[0], 0.5);
        assert!((events.as_slice()[1] - 1.1).abs() < 1e-12);
    }

    #[test]
    fn leading_missing_samples_are_trimmed() {
        let raw = [f64::NAN, 0.0, 3.0, 2.0, 2.0, 4.0];
        let events = PeakSegmenter.segment(&raw).unwrap();
        assert_eq!(events.as_slice(), &[2.0]);
    }

    #[test]
    fn interior_dropout_is_rejected() {
        let raw = [0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.2];
        assert!(matches!(
            PeakSegmenter.segment(&raw),
            Err(EntropyError::InvalidInput(_))
        ));
        let raw = [0.0, 1.0, f64::NAN, 1.0];
        assert!(PeakSegmenter.segment(&raw).is_err());
    }
}
