//! Centered rolling-window smoothing and decimation of posterior trajectories.
//!
//! Posterior draws are sampled far denser than the heart rate changes. Before
//! interpolation onto the output grid each draw is smoothed with a centered
//! weighted moving average and then decimated. Rows whose window would reach
//! past either end of the series are dropped before decimation, so the first
//! kept row is always the first complete window.

use log::trace;
use nalgebra::{DMatrix, DVector};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::{EntropyError, Result};
use crate::trajectory::Trajectory;

/// Shape of the rolling window weights.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowShape {
    /// Uniform weights.
    Boxcar,
    /// Symmetric triangular weights that do not reach zero at the edges.
    #[default]
    Triangular,
    /// Symmetric Hann window; the edge weights are zero.
    Hann,
}

impl WindowShape {
    /// Returns the symmetric weights of a window of `size` samples.
    pub fn weights(&self, size: usize) -> Vec<f64> {
        match self {
            WindowShape::Boxcar => vec![1.0; size],
            WindowShape::Triangular => (0..size)
                .map(|k| {
                    let n = k.min(size - 1 - k) as f64 + 1.0;
                    if size % 2 == 0 {
                        (2.0 * n - 1.0) / size as f64
                    } else {
                        2.0 * n / (size as f64 + 1.0)
                    }
                })
                .collect(),
            WindowShape::Hann => {
                if size == 1 {
                    return vec![1.0];
                }
                (0..size)
                    .map(|k| {
                        0.5 - 0.5
                            * (2.0 * std::f64::consts::PI * k as f64 / (size as f64 - 1.0)).cos()
                    })
                    .collect()
            }
        }
    }
}

/// Rolling weighted mean followed by decimation.
///
/// # Example
///
/// ```rust
/// use hrv_entropy::preprocessing::smoothing::{RollingSmoother, WindowShape};
/// use hrv_entropy::trajectory::Trajectory;
///
/// let time: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
/// let draws = Trajectory::single(time, "draw_0", vec![70.0; 20]).unwrap();
/// let smoother = RollingSmoother::new(9, WindowShape::Triangular, 3).unwrap();
/// let smoothed = smoother.smooth(&draws).unwrap();
/// // rows 4..=15 have complete windows, every third is kept
/// assert_eq!(smoothed.time(), &[1.0, 1.75, 2.5, 3.25]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSmoother {
    window: usize,
    shape: WindowShape,
    decimation: usize,
    weights: Vec<f64>,
}

impl RollingSmoother {
    /// Creates a smoother.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InvalidInput`] if the window size or the
    /// decimation factor is zero.
    pub fn new(window: usize, shape: WindowShape, decimation: usize) -> Result<Self> {
        if window == 0 {
            return Err(EntropyError::invalid("rolling window size must be at least 1"));
        }
        if decimation == 0 {
            return Err(EntropyError::invalid("decimation factor must be at least 1"));
        }
        let weights = shape.weights(window);
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(EntropyError::invalid(format!(
                "{shape:?} window of size {window} has no weight"
            )));
        }
        Ok(Self {
            window,
            shape,
            decimation,
            weights,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn shape(&self) -> WindowShape {
        self.shape
    }

    pub fn decimation(&self) -> usize {
        self.decimation
    }

    /// Row indices of `len` samples whose centered window is complete.
    fn complete_rows(&self, len: usize) -> std::ops::Range<usize> {
        // the window of row i spans i - behind ..= i + ahead; even windows lean back
        let ahead = (self.window - 1) / 2;
        let behind = self.window - 1 - ahead;
        if len < self.window {
            return 0..0;
        }
        behind..len - ahead
    }

    /// Smooths every series, drops incomplete windows and decimates.
    ///
    /// An input shorter than the window yields an empty trajectory.
    pub fn smooth(&self, trajectory: &Trajectory) -> Result<Trajectory> {
        let rows = self.complete_rows(trajectory.len());
        let behind = self.window - 1 - (self.window - 1) / 2;
        let kept: Vec<usize> = rows.step_by(self.decimation).collect();
        let weight_sum: f64 = self.weights.iter().sum();

        let columns: Vec<DVector<f64>> = (0..trajectory.n_series())
            .into_par_iter()
            .map(|col| {
                let values = trajectory.values().column(col);
                DVector::from_iterator(
                    kept.len(),
                    kept.iter().map(|&row| {
                        let start = row - behind;
                        self.weights
                            .iter()
                            .enumerate()
                            .map(|(k, w)| w * values[start + k])
                            .sum::<f64>()
                            / weight_sum
                    }),
                )
            })
            .collect();

        trace!(
            "smoothed {} rows to {} rows ({:?}, window {}, decimation {})",
            trajectory.len(),
            kept.len(),
            self.shape,
            self.window,
            self.decimation
        );
        let time = kept.iter().map(|&row| trajectory.time()[row]).collect();
        Ok(Trajectory::from_parts(
            time,
            trajectory.names().to_vec(),
            DMatrix::from_columns(&columns),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Trajectory {
        let time: Vec<f64> = (0..len).map(|i| i as f64).collect();
        let values: Vec<f64> = (0..len).map(|i| (i * i) as f64).collect();
        Trajectory::new(
            time.clone(),
            vec!["sq".into(), "lin".into()],
            vec![values, time],
        )
        .unwrap()
    }

    #[test]
    fn triangular_weights_match_window_definition() {
        let w = WindowShape::Triangular.weights(9);
        let expected = [0.2, 0.4, 0.6, 0.8, 1.0, 0.8, 0.6, 0.4, 0.2];
        for (a, b) in w.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        let w = WindowShape::Triangular.weights(4);
        assert_eq!(w, vec![0.25, 0.75, 0.75, 0.25]);
    }

    #[test]
    fn hann_weights_vanish_at_edges() {
        let w = WindowShape::Hann.weights(5);
        assert!(w[0].abs() < 1e-12 && w[4].abs() < 1e-12);
        assert!((w[2] - 1.0).abs() < 1e-12);
        assert_eq!(WindowShape::Hann.weights(1), vec![1.0]);
    }

    #[test]
    fn invalid_parameters() {
        assert!(RollingSmoother::new(0, WindowShape::Boxcar, 1).is_err());
        assert!(RollingSmoother::new(3, WindowShape::Boxcar, 0).is_err());
        assert!(RollingSmoother::new(2, WindowShape::Hann, 1).is_err());
    }

    #[test]
    fn linear_series_is_preserved_by_symmetric_window() {
        let smoother = RollingSmoother::new(9, WindowShape::Triangular, 1).unwrap();
        let out = smoother.smooth(&ramp(30)).unwrap();
        assert_eq!(out.len(), 30 - 8);
        assert_eq!(out.time()[0], 4.0);
        for (t, v) in out.time().iter().zip(out.series(1).unwrap().iter()) {
            assert!((t - v).abs() < 1e-9);
        }
    }

    #[test]
    fn decimation_starts_at_first_complete_window() {
        let smoother = RollingSmoother::new(9, WindowShape::Triangular, 3).unwrap();
        let out = smoother.smooth(&ramp(30)).unwrap();
        assert_eq!(out.time(), &[4.0, 7.0, 10.0, 13.0, 16.0, 19.0, 22.0, 25.0]);
        assert_eq!(out.names(), &["sq".to_string(), "lin".to_string()]);
    }

    #[test]
    fn boxcar_mean_of_even_window() {
        let smoother = RollingSmoother::new(4, WindowShape::Boxcar, 1).unwrap();
        let out = smoother.smooth(&ramp(6)).unwrap();
        // rows 2..=4; row 2 averages rows 0..=3
        assert_eq!(out.time(), &[2.0, 3.0, 4.0]);
        let sq = out.series_values(0).unwrap();
        assert!((sq[0] - (0.0 + 1.0 + 4.0 + 9.0) / 4.0).abs() < 1e-12);
        assert!((sq[2] - (4.0 + 9.0 + 16.0 + 25.0) / 4.0).abs() < 1e-12);
        assert_eq!(out.series_values(1).unwrap(), vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn even_window_is_labelled_like_centered_rolling_mean() {
        let smoother = RollingSmoother::new(2, WindowShape::Boxcar, 1).unwrap();
        let out = smoother.smooth(&ramp(4)).unwrap();
        // row i averages rows i - 1 and i
        assert_eq!(out.time(), &[1.0, 2.0, 3.0]);
        assert_eq!(out.series_values(1).unwrap(), vec![0.5, 1.5, 2.5]);
    }

    #[test]
    fn short_input_yields_empty_trajectory() {
        let smoother = RollingSmoother::new(9, WindowShape::Triangular, 3).unwrap();
        let out = smoother.smooth(&ramp(5)).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.n_series(), 2);
    }
}
