//! Cubic spline interpolation and alignment of trajectories onto regular axes.
//!
//! Heart rate trajectories arrive on irregular time indices: beat midpoints for
//! the direct estimate, the sampler's own grid for posterior draws. The
//! [`TrajectoryAligner`] evaluates a cubic interpolant of every series on a
//! regular axis so that later stages can difference and quantize them.
//!
//! The interpolant is the not-a-knot cubic spline. There is no fallback to a
//! lower order: fewer than [`CubicSpline::MIN_POINTS`] knots is an error.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::{EntropyError, Result};
use crate::trajectory::{AlignedTrajectorySet, Trajectory};

/// A not-a-knot cubic spline through a set of knots.
///
/// The spline is stored in Hermite form: knot positions, knot values and the
/// first derivative at every knot.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    slopes: Vec<f64>,
}

impl CubicSpline {
    /// Minimum number of knots for a not-a-knot cubic spline.
    pub const MIN_POINTS: usize = 4;

    /// Fits the spline through `(x[i], y[i])`.
    ///
    /// # Errors
    ///
    /// - [`EntropyError::InsufficientData`] if fewer than four knots are given.
    /// - [`EntropyError::InvalidInput`] if the lengths differ, a value is not
    ///   finite, or `x` is not strictly increasing.
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(EntropyError::invalid(format!(
                "spline knots ({}) and values ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        if x.len() < Self::MIN_POINTS {
            return Err(EntropyError::insufficient(format!(
                "cubic interpolation needs at least {} time points, got {}",
                Self::MIN_POINTS,
                x.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(EntropyError::invalid("spline input contains non-finite values"));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EntropyError::invalid(
                "spline knots must be strictly increasing",
            ));
        }

        let n = x.len();
        let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let secant: Vec<f64> = y
            .windows(2)
            .zip(dx.iter())
            .map(|(w, h)| (w[1] - w[0]) / h)
            .collect();

        // tridiagonal system for the knot slopes
        let mut lower = vec![0.0; n];
        let mut diag = vec![0.0; n];
        let mut upper = vec![0.0; n];
        let mut rhs = vec![0.0; n];

        for i in 1..n - 1 {
            lower[i] = dx[i];
            diag[i] = 2.0 * (dx[i - 1] + dx[i]);
            upper[i] = dx[i - 1];
            rhs[i] = 3.0 * (dx[i] * secant[i - 1] + dx[i - 1] * secant[i]);
        }

        // not-a-knot: third derivative continuous across the second knot
        let d = dx[0] + dx[1];
        diag[0] = dx[1];
        upper[0] = d;
        rhs[0] = ((dx[0] + 2.0 * d) * dx[1] * secant[0] + dx[0] * dx[0] * secant[1]) / d;

        // and across the second to last knot
        let d = dx[n - 2] + dx[n - 3];
        lower[n - 1] = d;
        diag[n - 1] = dx[n - 3];
        rhs[n - 1] = (dx[n - 2] * dx[n - 2] * secant[n - 3]
            + (2.0 * d + dx[n - 2]) * dx[n - 3] * secant[n - 2])
            / d;

        let slopes = solve_tridiagonal(&lower, &diag, &upper, &rhs)?;
        Ok(Self {
            knots: x.to_vec(),
            values: y.to_vec(),
            slopes,
        })
    }

    /// Range `(first, last)` covered by the knots.
    pub fn support(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    /// Evaluates the spline at `t`.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InvalidInput`] if `t` lies outside the knot range;
    /// the spline never extrapolates.
    pub fn evaluate(&self, t: f64) -> Result<f64> {
        let (first, last) = self.support();
        if !(first..=last).contains(&t) {
            return Err(EntropyError::invalid(format!(
                "time {t} outside interpolation range [{first}, {last}]"
            )));
        }
        let n = self.knots.len();
        let i = self
            .knots
            .partition_point(|&k| k <= t)
            .saturating_sub(1)
            .min(n - 2);

        let h = self.knots[i + 1] - self.knots[i];
        let secant = (self.values[i + 1] - self.values[i]) / h;
        let (s0, s1) = (self.slopes[i], self.slopes[i + 1]);
        let c2 = (3.0 * secant - 2.0 * s0 - s1) / h;
        let c3 = (s0 + s1 - 2.0 * secant) / (h * h);
        let u = t - self.knots[i];
        Ok(self.values[i] + u * (s0 + u * (c2 + u * c3)))
    }
}

/// Thomas algorithm for a tridiagonal system.
///
/// `lower[0]` and `upper[n - 1]` are ignored.
fn solve_tridiagonal(lower: &[f64], diag: &[f64], upper: &[f64], rhs: &[f64]) -> Result<Vec<f64>> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];
    c[0] = upper[0] / diag[0];
    d[0] = rhs[0] / diag[0];
    for i in 1..n {
        let pivot = diag[i] - lower[i] * c[i - 1];
        if pivot.abs() < f64::EPSILON * diag[i].abs().max(1.0) {
            return Err(EntropyError::invalid(
                "spline system is singular for the given knots",
            ));
        }
        c[i] = upper[i] / pivot;
        d[i] = (rhs[i] - lower[i] * d[i - 1]) / pivot;
    }
    let mut solution = vec![0.0; n];
    solution[n - 1] = d[n - 1];
    for i in (0..n - 1).rev() {
        solution[i] = d[i] - c[i] * solution[i + 1];
    }
    Ok(solution)
}

/// Resamples trajectories onto regular axes at a fixed rate.
///
/// # Example
///
/// ```rust
/// use hrv_entropy::analysis::interpolation::TrajectoryAligner;
/// use hrv_entropy::trajectory::Trajectory;
///
/// let time = vec![0.4, 1.3, 2.1, 3.2, 4.4, 5.6];
/// let hr = vec![61.0, 63.5, 62.0, 60.5, 64.0, 62.5];
/// let traj = Trajectory::single(time, "hr", hr).unwrap();
/// let aligned = TrajectoryAligner::new(1.0).unwrap().align(vec![traj]).unwrap();
/// assert_eq!(aligned.trajectories()[0].time(), &[1.0, 2.0, 3.0, 4.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryAligner {
    rate: f64,
}

impl TrajectoryAligner {
    /// Creates an aligner producing `rate` samples per second.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InvalidInput`] if `rate` is not finite and positive.
    pub fn new(rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EntropyError::invalid(format!(
                "alignment rate must be positive, got {rate}"
            )));
        }
        Ok(Self { rate })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Regular axis from `ceil(first)` up to, but excluding, `floor(last)`.
    pub fn common_axis(&self, time: &[f64]) -> Vec<f64> {
        let (Some(&first), Some(&last)) = (time.first(), time.last()) else {
            return Vec::new();
        };
        let start = first.ceil();
        let stop = last.floor();
        if stop <= start {
            return Vec::new();
        }
        let step = 1.0 / self.rate;
        let len = ((stop - start) / step).ceil() as usize;
        (0..len).map(|k| start + k as f64 * step).collect()
    }

    /// Interpolates every series of one trajectory onto its regular axis.
    pub fn align_one(&self, trajectory: &Trajectory) -> Result<Trajectory> {
        let axis = self.common_axis(trajectory.time());
        let columns: Vec<DVector<f64>> = (0..trajectory.n_series())
            .into_par_iter()
            .map(|col| -> Result<DVector<f64>> {
                let values: Vec<f64> = trajectory.values().column(col).iter().copied().collect();
                let spline = CubicSpline::fit(trajectory.time(), &values)?;
                let resampled = axis
                    .iter()
                    .map(|&t| spline.evaluate(t))
                    .collect::<Result<Vec<f64>>>()?;
                Ok(DVector::from_vec(resampled))
            })
            .collect::<Result<Vec<_>>>()?;
        trace!(
            "aligned {} series from {} to {} points",
            trajectory.n_series(),
            trajectory.len(),
            axis.len()
        );
        Ok(Trajectory::from_parts(
            axis,
            trajectory.names().to_vec(),
            DMatrix::from_columns(&columns),
        ))
    }

    /// Aligns every trajectory independently.
    ///
    /// Axes generally differ between trajectories; use
    /// [`AlignedTrajectorySet::restrict_to_common_span`] to intersect them.
    ///
    /// # Arguments
    ///
    /// * `trajectories` - Trajectories with strictly increasing time indices and
    ///   at least four points each.
    ///
    /// # Returns
    ///
    /// The resampled trajectories in input order, sharing the aligner's rate.
    pub fn align(&self, trajectories: Vec<Trajectory>) -> Result<AlignedTrajectorySet> {
        let aligned = trajectories
            .iter()
            .map(|t| self.align_one(t))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "aligned {} trajectories at {} Hz",
            aligned.len(),
            self.rate
        );
        Ok(AlignedTrajectorySet::new(self.rate, aligned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(t: f64) -> f64 {
        0.5 * t * t * t - 2.0 * t * t + t + 3.0
    }

    #[test]
    fn spline_reproduces_cubic_polynomial() {
        let x = [0.0, 0.7, 1.5, 2.0, 3.1, 4.0, 5.2];
        let y: Vec<f64> = x.iter().map(|&t| cubic(t)).collect();
        let spline = CubicSpline::fit(&x, &y).unwrap();
        for k in 0..=51 {
            let t = k as f64 * 0.1;
            assert!(
                (spline.evaluate(t).unwrap() - cubic(t)).abs() < 1e-9,
                "mismatch at {t}"
            );
        }
    }

    #[test]
    fn spline_with_minimum_knots() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|&t| cubic(t)).collect();
        let spline = CubicSpline::fit(&x, &y).unwrap();
        assert!((spline.evaluate(1.5).unwrap() - cubic(1.5)).abs() < 1e-9);
    }

    #[test]
    fn spline_passes_through_knots() {
        let x = [0.3, 1.1, 1.9, 3.4, 4.0, 5.5, 6.1];
        let y = [62.0, 65.5, 61.0, 70.2, 68.8, 64.1, 66.0];
        let spline = CubicSpline::fit(&x, &y).unwrap();
        for (&t, &v) in x.iter().zip(y.iter()) {
            assert!((spline.evaluate(t).unwrap() - v).abs() < 1e-9);
        }
    }

    #[test]
    fn spline_rejects_too_few_points() {
        let result = CubicSpline::fit(&[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(EntropyError::InsufficientData { .. })));
    }

    #[test]
    fn spline_rejects_unordered_knots() {
        let result = CubicSpline::fit(&[0.0, 2.0, 1.0, 3.0], &[1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(result, Err(EntropyError::InvalidInput(_))));
        let result = CubicSpline::fit(&[0.0, 1.0, 1.0, 3.0], &[1.0, 2.0, 3.0, 4.0]);
        assert!(result.is_err());
    }

    #[test]
    fn spline_never_extrapolates() {
        let spline = CubicSpline::fit(&[0.0, 1.0, 2.0, 3.0], &[1.0, 2.0, 0.0, 4.0]).unwrap();
        assert!(spline.evaluate(-0.01).is_err());
        assert!(spline.evaluate(3.01).is_err());
        assert!((spline.evaluate(3.0).unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_rate() {
        assert!(TrajectoryAligner::new(0.0).is_err());
        assert!(TrajectoryAligner::new(-1.0).is_err());
        assert!(TrajectoryAligner::new(f64::NAN).is_err());
    }

    #[test]
    fn axis_is_half_open() {
        let aligner = TrajectoryAligner::new(1.0).unwrap();
        assert_eq!(aligner.common_axis(&[0.5, 3.0, 7.9]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(aligner.common_axis(&[0.5, 0.9]).is_empty());
        let aligner = TrajectoryAligner::new(4.0).unwrap();
        let axis = aligner.common_axis(&[0.2, 1.0, 2.7]);
        assert_eq!(axis, vec![1.0, 1.25, 1.5, 1.75]);
    }

    #[test]
    fn axis_length_matches_span() {
        let aligner = TrajectoryAligner::new(1.0).unwrap();
        for (first, last) in [(0.3, 10.2), (1.0, 12.0), (2.9, 100.01)] {
            let axis = aligner.common_axis(&[first, (first + last) / 2.0, last]);
            let expected = (last.floor() - first.ceil()) as usize;
            assert_eq!(axis.len(), expected);
        }
    }

    #[test]
    fn aligned_values_match_samples_on_integer_grid() {
        let time: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let a: Vec<f64> = time.iter().map(|t| 60.0 + (t * 0.7).sin() * 5.0).collect();
        let b: Vec<f64> = time.iter().map(|t| 70.0 - t * 0.5).collect();
        let traj = Trajectory::new(time, vec!["a".into(), "b".into()], vec![a.clone(), b.clone()])
            .unwrap();
        let aligned = TrajectoryAligner::new(1.0).unwrap().align_one(&traj).unwrap();
        assert_eq!(aligned.len(), 11);
        for (row, &t) in aligned.time().iter().enumerate() {
            let idx = t as usize;
            assert!((aligned.values()[(row, 0)] - a[idx]).abs() < 1e-9);
            assert!((aligned.values()[(row, 1)] - b[idx]).abs() < 1e-9);
        }
    }

    #[test]
    fn alignment_is_independent_per_trajectory() {
        let short = Trajectory::single(vec![0.5, 1.5, 2.5, 3.5, 4.5], "s", vec![1.0; 5]).unwrap();
        let long = Trajectory::single(
            (0..10).map(|i| i as f64 * 1.1).collect(),
            "l",
            vec![2.0; 10],
        )
        .unwrap();
        let set = TrajectoryAligner::new(1.0)
            .unwrap()
            .align(vec![short, long])
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.trajectories()[0].time(), &[1.0, 2.0, 3.0]);
        assert_eq!(set.trajectories()[1].len(), 9);
    }

    #[test]
    fn too_few_points_fail_alignment() {
        let traj = Trajectory::single(vec![0.0, 1.0, 2.0], "a", vec![1.0, 2.0, 3.0]).unwrap();
        let result = TrajectoryAligner::new(1.0).unwrap().align(vec![traj]);
        assert!(matches!(result, Err(EntropyError::InsufficientData { .. })));
    }
}
