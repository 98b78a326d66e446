//! Coalescent validation helpers — reusable checks for heights, hyperparameters,
//! field vectors, and grids.
//!
//! Purpose
//! -------
//! Centralize the small checks used by constructors and setters across the
//! coalescent stack so that every public entry point fails fast with a
//! structured [`SkyError`] instead of producing a silently wrong likelihood.
//!
//! Key behaviors
//! -------------
//! - Validate node heights (finite, non-negative) and tip/internal counts.
//! - Validate the GMRF hyperparameters `precision > 0` and `lambda ∈ [0, 1]`.
//! - Validate vectors against an expected length and finiteness.
//! - Validate ascending point sequences (grid points, covariate times).
//!
//! Conventions
//! -----------
//! - Helpers return [`SkyResult<()>`] and never panic on invalid inputs.
//! - No I/O and no logging; callers decide whether an anomaly is fatal.
use crate::coalescent::errors::{SkyError, SkyResult};
use ndarray::ArrayView1;

/// Validate one locus worth of node heights.
///
/// Rules
/// -----
/// - at least two tips;
/// - between 1 and `tips - 1` internal nodes (fewer than `tips - 1` describes a
///   multifurcating genealogy, which is accepted and logged by the extractor);
/// - every height finite and `>= 0`.
///
/// Errors
/// ------
/// - [`SkyError::InvalidNodeCount`], [`SkyError::NonFiniteHeight`],
///   [`SkyError::NegativeHeight`]. Internal node indices are reported after
///   the tips (`tips.len() + i`).
pub fn validate_node_heights(locus: usize, tips: &[f64], internal: &[f64]) -> SkyResult<()> {
    if tips.len() < 2 {
        return Err(SkyError::InvalidNodeCount {
            locus,
            tips: tips.len(),
            internal: internal.len(),
            reason: "a genealogy needs at least two tips",
        });
    }
    if internal.is_empty() || internal.len() >= tips.len() {
        return Err(SkyError::InvalidNodeCount {
            locus,
            tips: tips.len(),
            internal: internal.len(),
            reason: "internal node count must lie in [1, tips - 1]",
        });
    }
    for (index, &value) in tips.iter().chain(internal.iter()).enumerate() {
        validate_height(locus, index, value)?;
    }
    Ok(())
}

/// Validate a single node height.
pub fn validate_height(locus: usize, index: usize, value: f64) -> SkyResult<()> {
    if !value.is_finite() {
        return Err(SkyError::NonFiniteHeight { locus, index, value });
    }
    if value < 0.0 {
        return Err(SkyError::NegativeHeight { locus, index, value });
    }
    Ok(())
}

/// Precision must be finite and strictly positive.
pub fn validate_precision(value: f64) -> SkyResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SkyError::InvalidPrecision { value });
    }
    Ok(())
}

/// Lambda must be finite and lie in `[0, 1]`.
pub fn validate_lambda(value: f64) -> SkyResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SkyError::InvalidLambda { value });
    }
    Ok(())
}

/// Validate that `values` has `expected` entries, all finite.
///
/// `name` is carried into [`SkyError::NonFiniteParameter`] for diagnostics.
pub fn validate_field_vector(
    name: &'static str, values: ArrayView1<f64>, expected: usize,
) -> SkyResult<()> {
    if values.len() != expected {
        return Err(SkyError::FieldLengthMismatch { expected, actual: values.len() });
    }
    validate_finite(name, values)
}

/// Every entry of `values` must be finite.
pub fn validate_finite(name: &'static str, values: ArrayView1<f64>) -> SkyResult<()> {
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            return Err(SkyError::NonFiniteParameter { name, index, value });
        }
    }
    Ok(())
}

/// One finite, strictly positive ploidy factor per locus.
pub fn validate_ploidy(ploidy: &[f64], loci: usize) -> SkyResult<()> {
    if ploidy.len() != loci {
        return Err(SkyError::PloidyLengthMismatch { expected: loci, actual: ploidy.len() });
    }
    for (locus, &value) in ploidy.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(SkyError::InvalidPloidy { locus, value });
        }
    }
    Ok(())
}

/// Grid points must be non-empty, finite, `> 0`, and strictly increasing.
pub fn validate_grid_points(points: &[f64]) -> SkyResult<()> {
    if points.is_empty() {
        return Err(SkyError::EmptyGrid);
    }
    let mut previous = 0.0_f64;
    for (index, &value) in points.iter().enumerate() {
        if !value.is_finite() {
            return Err(SkyError::InvalidGridPoint { index, value, reason: "must be finite" });
        }
        if value <= previous {
            let reason = if index == 0 { "must be > 0" } else { "must be strictly increasing" };
            return Err(SkyError::InvalidGridPoint { index, value, reason });
        }
        previous = value;
    }
    Ok(())
}

/// Covariate marker times must be finite, `>= 0`, strictly increasing; values
/// must be finite.
pub fn validate_covariate_markers(times: &[f64], values: &[f64]) -> SkyResult<()> {
    if times.len() != values.len() {
        return Err(SkyError::InvalidCovariateMarker {
            index: times.len().min(values.len()),
            value: f64::NAN,
            reason: "times and values must have equal length",
        });
    }
    let mut previous = f64::NEG_INFINITY;
    for (index, (&time, &value)) in times.iter().zip(values.iter()).enumerate() {
        if !time.is_finite() || time < 0.0 {
            return Err(SkyError::InvalidCovariateMarker {
                index,
                value: time,
                reason: "time must be finite and >= 0",
            });
        }
        if time <= previous {
            return Err(SkyError::InvalidCovariateMarker {
                index,
                value: time,
                reason: "times must be strictly increasing",
            });
        }
        if !value.is_finite() {
            return Err(SkyError::InvalidCovariateMarker {
                index,
                value,
                reason: "value must be finite",
            });
        }
        previous = time;
    }
    Ok(())
}
