//! Likelihood configuration — field layout, smoothing mode, and per-locus
//! scaling.
//!
//! Purpose
//! -------
//! Collect the structural choices that fix the shape of the field at
//! construction: which cells the field lives on ([`FieldLayout`]), how
//! adjacent cells are weighted ([`Smoothing`]), and optional ploidy factors
//! and covariate markers. Hyperparameter *values* live in
//! [`FieldParams`](crate::coalescent::core::params::FieldParams).
//!
//! Conventions
//! -----------
//! - [`SkyOptions::default`] is the single-locus skyride with time-aware
//!   smoothing and no rescaling.
//! - Validation happens in [`SkyOptions::validate`], called by the
//!   likelihood constructor once the number of loci is known.
use crate::coalescent::{
    core::{
        grid::{CovariateMarkers, GridPoints},
        validation::validate_ploidy,
    },
    errors::SkyResult,
};

/// Where field cells come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLayout {
    /// One cell per coalescent event (plus one per covariate marker).
    Skyride,
    /// Fixed grid cells shared by all loci.
    Skygrid(GridPoints),
}

impl FieldLayout {
    pub fn grid(&self) -> Option<&GridPoints> {
        match self {
            FieldLayout::Skyride => None,
            FieldLayout::Skygrid(grid) => Some(grid),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldLayout::Skyride => "skyride",
            FieldLayout::Skygrid(_) => "skygrid",
        }
    }
}

/// Off-diagonal weighting of the GMRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Smoothing {
    /// Weights inversely proportional to the mean adjacent cell length.
    #[default]
    TimeAware,
    /// Unit weights.
    TimeUnaware,
}

/// Structural options for [`SkyLikelihood`](crate::coalescent::models::skyride::SkyLikelihood).
#[derive(Debug, Clone, PartialEq)]
pub struct SkyOptions {
    pub layout: FieldLayout,
    pub smoothing: Smoothing,
    /// Multiply time-aware weights by the root height of the first locus.
    pub rescale_by_root_height: bool,
    /// One factor per locus; `None` means 1.0 everywhere.
    pub ploidy: Option<Vec<f64>>,
    /// Covariate `(time, value)` markers. They split skyride cells and fill the
    /// regression term's marker column.
    pub covariate_markers: Option<CovariateMarkers>,
}

impl Default for SkyOptions {
    fn default() -> Self {
        Self {
            layout: FieldLayout::Skyride,
            smoothing: Smoothing::TimeAware,
            rescale_by_root_height: false,
            ploidy: None,
            covariate_markers: None,
        }
    }
}

impl SkyOptions {
    pub fn skygrid(grid: GridPoints) -> Self {
        Self { layout: FieldLayout::Skygrid(grid), ..Self::default() }
    }

    pub fn with_smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_ploidy(mut self, ploidy: Vec<f64>) -> Self {
        self.ploidy = Some(ploidy);
        self
    }

    pub fn with_root_height_rescaling(mut self, on: bool) -> Self {
        self.rescale_by_root_height = on;
        self
    }

    pub fn with_covariate_markers(mut self, markers: CovariateMarkers) -> Self {
        self.covariate_markers = Some(markers);
        self
    }

    /// Ploidy factors resolved for `loci` genealogies.
    pub fn resolved_ploidy(&self, loci: usize) -> Vec<f64> {
        self.ploidy.clone().unwrap_or_else(|| vec![1.0; loci])
    }

    /// Check per-locus options against the number of genealogies.
    pub fn validate(&self, loci: usize) -> SkyResult<()> {
        if let Some(ploidy) = &self.ploidy {
            validate_ploidy(ploidy, loci)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coalescent::errors::SkyError;

    #[test]
    fn builders_and_defaults() {
        let opts = SkyOptions::default();
        assert_eq!(opts.layout.name(), "skyride");
        assert!(opts.layout.grid().is_none());
        assert_eq!(opts.resolved_ploidy(2), vec![1.0, 1.0]);

        let grid = GridPoints::uniform(2.0, 4).unwrap();
        let opts = SkyOptions::skygrid(grid.clone())
            .with_smoothing(Smoothing::TimeUnaware)
            .with_ploidy(vec![0.5]);
        assert_eq!(opts.layout.grid(), Some(&grid));
        assert_eq!(opts.smoothing, Smoothing::TimeUnaware);
        assert!(opts.validate(1).is_ok());
        assert!(matches!(opts.validate(2), Err(SkyError::PloidyLengthMismatch { .. })));
    }
}
