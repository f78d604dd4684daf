//! Data model for heartbeat events and heart-rate trajectories.
//!
//! - [`EventTimeSeries`]: strictly increasing heartbeat timestamps.
//! - [`Trajectory`]: one time index shared by one or more named series ("runs").
//! - [`AlignedTrajectorySet`]: trajectories resampled on regular axes at a common rate.

use nalgebra::{DMatrix, DVector, DVectorView};

use crate::error::{EntropyError, Result};

/// Heartbeat timestamps, strictly increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTimeSeries(Vec<f64>);

impl EventTimeSeries {
    /// Creates an event series from precomputed timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InvalidInput`] if a timestamp is not finite or the
    /// timestamps are not strictly increasing.
    pub fn new(times: Vec<f64>) -> Result<Self> {
        if let Some(t) = times.iter().find(|t| !t.is_finite()) {
            return Err(EntropyError::invalid(format!(
                "event timestamp {t} is not finite"
            )));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EntropyError::invalid(
                "event timestamps must be strictly increasing",
            ));
        }
        Ok(Self(times))
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inter-beat intervals between consecutive events.
    pub fn intervals(&self) -> Vec<f64> {
        self.0.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

/// A set of named series sharing one time index.
///
/// Values are stored column-wise: each row is a time point, each column a run
/// (a posterior draw or the single direct estimate).
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    time: Vec<f64>,
    names: Vec<String>,
    values: DMatrix<f64>,
}

impl Trajectory {
    /// Builds a trajectory from a time index and one column per named series.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InvalidInput`] if no series is given, if the
    /// number of names and columns differ, or if a column length differs from
    /// the time index length.
    pub fn new(time: Vec<f64>, names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(EntropyError::invalid(
                "a trajectory needs at least one series",
            ));
        }
        if names.len() != columns.len() {
            return Err(EntropyError::invalid(format!(
                "{} series names given for {} columns",
                names.len(),
                columns.len()
            )));
        }
        if let Some(col) = columns.iter().position(|c| c.len() != time.len()) {
            return Err(EntropyError::invalid(format!(
                "series `{}` has {} values but the time index has {}",
                names[col],
                columns[col].len(),
                time.len()
            )));
        }
        let columns: Vec<DVector<f64>> = columns.into_iter().map(DVector::from_vec).collect();
        Ok(Self {
            time,
            names,
            values: DMatrix::from_columns(&columns),
        })
    }

    /// Builds a trajectory holding a single series.
    pub fn single(time: Vec<f64>, name: &str, values: Vec<f64>) -> Result<Self> {
        Self::new(time, vec![name.to_owned()], vec![values])
    }

    /// Builds a trajectory from parts whose shapes are already consistent.
    pub(crate) fn from_parts(time: Vec<f64>, names: Vec<String>, values: DMatrix<f64>) -> Self {
        debug_assert_eq!(time.len(), values.nrows());
        debug_assert_eq!(names.len(), values.ncols());
        Self {
            time,
            names,
            values,
        }
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// Number of time points.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Number of series (runs).
    pub fn n_series(&self) -> usize {
        self.names.len()
    }

    pub fn series(&self, idx: usize) -> Option<DVectorView<'_, f64>> {
        (idx < self.n_series()).then(|| self.values.column(idx))
    }

    pub fn series_by_name(&self, name: &str) -> Option<DVectorView<'_, f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values.column(idx))
    }

    /// Copies the values of a series into a vector.
    pub fn series_values(&self, idx: usize) -> Option<Vec<f64>> {
        self.series(idx).map(|col| col.iter().copied().collect())
    }

    /// Successive differences of every series.
    ///
    /// Row `i` of the result holds `x[i + 1] - x[i]` and keeps the time label of
    /// row `i + 1`; the first row has no predecessor and is dropped.
    pub fn diff(&self) -> Trajectory {
        let n = self.len();
        if n < 2 {
            return Trajectory::from_parts(
                Vec::new(),
                self.names.clone(),
                DMatrix::zeros(0, self.n_series()),
            );
        }
        let diffs = self.values.rows(1, n - 1) - self.values.rows(0, n - 1);
        Trajectory::from_parts(self.time[1..].to_vec(), self.names.clone(), diffs)
    }

    /// Keeps the rows whose time lies in `[start, end]`.
    pub(crate) fn restrict(&self, start: f64, end: f64) -> Trajectory {
        let rows: Vec<usize> = self
            .time
            .iter()
            .enumerate()
            .filter(|(_, &t)| t >= start && t <= end)
            .map(|(i, _)| i)
            .collect();
        let time = rows.iter().map(|&i| self.time[i]).collect();
        Trajectory::from_parts(time, self.names.clone(), self.values.select_rows(&rows))
    }
}

/// Trajectories resampled onto regular time axes at a common rate.
///
/// Every trajectory keeps its own axis; [`AlignedTrajectorySet::restrict_to_common_span`]
/// intersects them when joint analysis is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTrajectorySet {
    rate: f64,
    trajectories: Vec<Trajectory>,
}

impl AlignedTrajectorySet {
    pub(crate) fn new(rate: f64, trajectories: Vec<Trajectory>) -> Self {
        Self { rate, trajectories }
    }

    /// Sample rate of every axis in Hz.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    pub fn into_trajectories(self) -> Vec<Trajectory> {
        self.trajectories
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Restricts every trajectory to the time span covered by all of them.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::InsufficientData`] if the spans do not overlap.
    pub fn restrict_to_common_span(&self) -> Result<AlignedTrajectorySet> {
        let mut start = f64::NEG_INFINITY;
        let mut end = f64::INFINITY;
        for traj in &self.trajectories {
            match (traj.time().first(), traj.time().last()) {
                (Some(&first), Some(&last)) => {
                    start = start.max(first);
                    end = end.min(last);
                }
                _ => return Err(EntropyError::insufficient("an aligned trajectory is empty")),
            }
        }
        if start > end {
            return Err(EntropyError::insufficient(format!(
                "aligned trajectories do not overlap (common span {start}..{end})"
            )));
        }
        // half a step of slack absorbs rounding in the generated axes
        let slack = 0.5 / self.rate;
        let trajectories = self
            .trajectories
            .iter()
            .map(|t| t.restrict(start - slack, end + slack))
            .collect();
        Ok(AlignedTrajectorySet::new(self.rate, trajectories))
    }
}
