//! Fixed time grids and covariate markers.
//!
//! [`GridPoints`] defines the skygrid cells `[0, g₀), [g₀, g₁), …, [g_{K−1}, ∞)`
//! shared by every locus. [`CovariateMarkers`] carries `(time, value)` pairs
//! that split intervals and feed a design column of the regression term.
use crate::coalescent::{
    core::validation::{validate_covariate_markers, validate_grid_points},
    errors::{SkyError, SkyResult},
};

/// Strictly increasing, positive grid points.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoints {
    points: Vec<f64>,
}

impl GridPoints {
    /// Use explicit grid points.
    pub fn new(points: Vec<f64>) -> SkyResult<Self> {
        validate_grid_points(&points)?;
        Ok(Self { points })
    }

    /// `count` equally spaced points ending at `cut_off`: `(i + 1)·cut_off / count`.
    pub fn uniform(cut_off: f64, count: usize) -> SkyResult<Self> {
        if count == 0 {
            return Err(SkyError::EmptyGrid);
        }
        if !cut_off.is_finite() || cut_off <= 0.0 {
            return Err(SkyError::InvalidGridPoint {
                index: count - 1,
                value: cut_off,
                reason: "cut-off must be finite and > 0",
            });
        }
        let points = (0..count).map(|i| (i + 1) as f64 * cut_off / count as f64).collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of field cells the grid defines (`len + 1`).
    pub fn cell_count(&self) -> usize {
        self.points.len() + 1
    }

    /// Last grid point.
    pub fn cut_off(&self) -> f64 {
        self.points.last().copied().unwrap_or(0.0)
    }

    /// Widths of the `len + 1` cells; the open last cell repeats the final
    /// finite width.
    pub fn spacings(&self) -> Vec<f64> {
        let mut widths = Vec::with_capacity(self.cell_count());
        let mut previous = 0.0;
        for &g in &self.points {
            widths.push(g - previous);
            previous = g;
        }
        let last = widths.last().copied().unwrap_or(1.0);
        widths.push(last);
        widths
    }
}

/// Covariate `(time, value)` pairs, strictly increasing in time.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateMarkers {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl CovariateMarkers {
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> SkyResult<Self> {
        validate_covariate_markers(&times, &values)?;
        Ok(Self { times, values })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Covariate value in effect for a cell ending at `time`.
    ///
    /// Marker `j` holds on `(t_{j−1}, t_j]`; past the last marker the last
    /// value persists. Returns `None` when there are no markers.
    pub fn value_at_cell_end(&self, time: f64) -> Option<f64> {
        let last = *self.values.last()?;
        let j = self.times.partition_point(|&t| t < time);
        Some(self.values.get(j).copied().unwrap_or(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Uniform grids follow `(i + 1)·cut_off / count` and expose one more cell
    // than points.
    fn uniform_grid_matches_formula() {
        let grid = GridPoints::uniform(3.0, 3).unwrap();
        assert_eq!(grid.points(), &[1.0, 2.0, 3.0]);
        assert_eq!(grid.cell_count(), 4);
        assert_eq!(grid.cut_off(), 3.0);
        assert_eq!(grid.spacings(), vec![1.0, 1.0, 1.0, 1.0]);
        assert!(GridPoints::uniform(3.0, 0).is_err());
        assert!(GridPoints::uniform(-1.0, 2).is_err());
    }

    #[test]
    fn spacings_repeat_last_width_for_open_cell() {
        let grid = GridPoints::new(vec![0.5, 2.0]).unwrap();
        assert_eq!(grid.spacings(), vec![0.5, 1.5, 1.5]);
    }

    #[test]
    // Purpose
    // -------
    // Covariate lookup uses right-closed epochs and carries the last value
    // forward.
    fn covariate_value_at_cell_end_uses_right_closed_epochs() {
        let markers = CovariateMarkers::new(vec![1.0, 2.0], vec![10.0, 20.0]).unwrap();
        assert_eq!(markers.value_at_cell_end(0.5), Some(10.0));
        assert_eq!(markers.value_at_cell_end(1.0), Some(10.0));
        assert_eq!(markers.value_at_cell_end(1.5), Some(20.0));
        assert_eq!(markers.value_at_cell_end(9.0), Some(20.0));
        let empty = CovariateMarkers::new(vec![], vec![]).unwrap();
        assert_eq!(empty.value_at_cell_end(1.0), None);
    }
}
