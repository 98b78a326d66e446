//! Likelihood terms — coalescent, GMRF field, sampling, and covariate
//! regression.
//!
//! Purpose
//! -------
//! Evaluate the individual additive pieces of the composite log-likelihood
//! from precomputed statistics and matrices. Nothing here caches; the
//! composite likelihood decides when each term must be re-evaluated.
//!
//! Key behaviors
//! -------------
//! - [`coalescent_log_density`]:
//!   `Σ_i −num_coal_i·γ_i + ploidy_sums_i − stats_i·e^{−γ_i}`.
//! - [`field_log_density`]: `½(n−1) ln τ − ½ rᵀQr − c·½ ln 2π`, with
//!   `c = n − 1` for `λ = 1` and `c = n` otherwise.
//! - [`SamplingTerm`]: Poisson-process sampling intensity
//!   `e^{β₀}·N(t)^{β₁}` integrated over per-cell exposure.
//! - [`RegressionTerm`]: covariate mean `Xβ` for the field, plus random-walk
//!   densities for missing covariate values before the first and after the
//!   last observed cell.
//!
//! Invariants & assumptions
//! ------------------------
//! - All vectors share the field length; the likelihood validates this at
//!   construction and never re-checks on the hot path.
//! - The residual `r = γ − Xβ` enters the field term only; the coalescent term
//!   always uses `γ` directly.
use crate::coalescent::{
    core::{
        statistics::SufficientStatistics,
        validation::{validate_finite, validate_precision},
        weights::{FreeEnd, SymTridiagonal},
    },
    errors::{SkyError, SkyResult},
};
use ndarray::{Array1, Array2, ArrayView1};
use statrs::consts::LN_SQRT_2PI;

/// `ln 2π`.
pub const LN_2PI: f64 = 2.0 * LN_SQRT_2PI;

/// Coalescent log-density of `γ` given the sufficient statistics.
pub fn coalescent_log_density(gamma: ArrayView1<f64>, stats: &SufficientStatistics) -> f64 {
    gamma
        .iter()
        .zip(stats.num_coal_events.iter())
        .zip(stats.ploidy_sums.iter())
        .zip(stats.stats.iter())
        .map(|(((&g, &k), &p), &s)| -k * g + p - s * (-g).exp())
        .sum()
}

/// `∂/∂γ` of coalescent + field (+ sampling), given `Q r` under the scaled
/// matrix.
pub fn log_pop_size_gradient(
    gamma: ArrayView1<f64>, stats: &SufficientStatistics, qr: ArrayView1<f64>,
    sampling: Option<&SamplingTerm>,
) -> Array1<f64> {
    Array1::from_shape_fn(gamma.len(), |i| {
        let mut g = -stats.num_coal_events[i] + stats.stats[i] * (-gamma[i]).exp() - qr[i];
        if let Some(sampling) = sampling {
            g += sampling.gradient_at(gamma[i], stats.sample_counts[i], stats.exposures[i]);
        }
        g
    })
}

/// GMRF log-density of the residual under the already-scaled matrix.
pub fn field_log_density(
    residual: ArrayView1<f64>, scaled: &SymTridiagonal, precision: f64, lambda: f64,
) -> f64 {
    let n = residual.len() as f64;
    let constant_terms = if lambda == 1.0 { n - 1.0 } else { n };
    0.5 * (n - 1.0) * precision.ln()
        - 0.5 * scaled.quadratic_form(residual)
        - 0.5 * constant_terms * LN_2PI
}

/// Sampling-time model: intensity `e^{β₀}·N(t)^{β₁}` on the sampling window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingTerm {
    /// `β₀`.
    pub intercept: f64,
    /// `β₁`.
    pub power: f64,
}

impl SamplingTerm {
    pub fn new(intercept: f64, power: f64) -> SkyResult<Self> {
        validate_finite("sampling", ndarray::arr1(&[intercept, power]).view())?;
        Ok(Self { intercept, power })
    }

    /// `Σ_c n_c(β₀ + β₁γ_c) − e^{β₀}·E_c·e^{β₁γ_c}`.
    pub fn log_density(&self, gamma: ArrayView1<f64>, stats: &SufficientStatistics) -> f64 {
        let scale = self.intercept.exp();
        gamma
            .iter()
            .zip(stats.sample_counts.iter())
            .zip(stats.exposures.iter())
            .map(|((&g, &n), &e)| {
                n * (self.intercept + self.power * g) - scale * e * (self.power * g).exp()
            })
            .sum()
    }

    /// Contribution to `∂/∂γ_c`.
    pub fn gradient_at(&self, gamma: f64, count: f64, exposure: f64) -> f64 {
        self.power * count
            - self.power * self.intercept.exp() * exposure * (self.power * gamma).exp()
    }

    /// Contribution to `∂²/∂γ_c²`.
    pub fn hessian_at(&self, gamma: f64, exposure: f64) -> f64 {
        -self.power * self.power * self.intercept.exp() * exposure * (self.power * gamma).exp()
    }
}

/// Random-walk prior on covariate values outside the observed range of one
/// design column.
///
/// Cells `0..first_observed` are the recent block, anchored at the value of
/// `first_observed`; cells `last_observed + 1..n` are the distant block,
/// anchored at the value of `last_observed`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissingCovariateBlock {
    pub column: usize,
    pub first_observed: usize,
    pub last_observed: usize,
    pub precision_recent: f64,
    pub precision_distant: f64,
}

impl MissingCovariateBlock {
    /// `Σ_blocks ½m ln τ − ½ vᵀ(τQ)v` where `v` are the missing values minus
    /// their anchor.
    pub fn log_density(&self, design: &Array2<f64>) -> f64 {
        let column = design.column(self.column);
        let n = column.len();
        let mut total = 0.0;

        let m = self.first_observed;
        if m > 0 {
            let anchor = column[self.first_observed];
            let v: Array1<f64> = column.slice(ndarray::s![..m]).mapv(|x| x - anchor);
            let q = SymTridiagonal::anchored_random_walk(m, FreeEnd::First);
            total += 0.5 * m as f64 * self.precision_recent.ln()
                - 0.5 * self.precision_recent * q.quadratic_form(v.view());
        }

        let m = n - self.last_observed - 1;
        if m > 0 {
            let anchor = column[self.last_observed];
            let v: Array1<f64> =
                column.slice(ndarray::s![self.last_observed + 1..]).mapv(|x| x - anchor);
            let q = SymTridiagonal::anchored_random_walk(m, FreeEnd::Last);
            total += 0.5 * m as f64 * self.precision_distant.ln()
                - 0.5 * self.precision_distant * q.quadratic_form(v.view());
        }
        total
    }
}

/// Covariate regression `γ ~ GMRF(Xβ)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTerm {
    design: Array2<f64>,
    beta: Array1<f64>,
    marker_column: Option<usize>,
    missing: Vec<MissingCovariateBlock>,
}

impl RegressionTerm {
    /// # Errors
    /// - [`SkyError::BetaLengthMismatch`] when `beta.len() != design.ncols()`.
    /// - [`SkyError::NonFiniteParameter`] for non-finite coefficients.
    pub fn new(design: Array2<f64>, beta: Array1<f64>) -> SkyResult<Self> {
        if beta.len() != design.ncols() {
            return Err(SkyError::BetaLengthMismatch {
                expected: design.ncols(),
                actual: beta.len(),
            });
        }
        validate_finite("beta", beta.view())?;
        Ok(Self { design, beta, marker_column: None, missing: Vec::new() })
    }

    /// Design column refilled from covariate marker values whenever intervals
    /// are recomputed.
    pub fn with_marker_column(mut self, column: usize) -> SkyResult<Self> {
        if column >= self.design.ncols() {
            return Err(SkyError::InvalidCovariateColumn { column, reason: "column out of range" });
        }
        self.marker_column = Some(column);
        Ok(self)
    }

    /// Add a random-walk prior for missing values of one design column.
    ///
    /// # Errors
    /// - [`SkyError::InvalidCovariateColumn`] for an unknown or duplicated
    ///   column.
    /// - [`SkyError::InvalidObservedRange`] unless
    ///   `first_observed <= last_observed < rows`.
    /// - [`SkyError::InvalidPrecision`] for non-positive precisions.
    pub fn with_missing_block(mut self, block: MissingCovariateBlock) -> SkyResult<Self> {
        if block.column >= self.design.ncols() {
            return Err(SkyError::InvalidCovariateColumn {
                column: block.column,
                reason: "column out of range",
            });
        }
        if self.missing.iter().any(|b| b.column == block.column) {
            return Err(SkyError::InvalidCovariateColumn {
                column: block.column,
                reason: "column already has a missing-value block",
            });
        }
        let rows = self.design.nrows();
        if block.first_observed > block.last_observed || block.last_observed >= rows {
            return Err(SkyError::InvalidObservedRange {
                first: block.first_observed,
                last: block.last_observed,
                len: rows,
            });
        }
        validate_precision(block.precision_recent)?;
        validate_precision(block.precision_distant)?;
        self.missing.push(block);
        Ok(self)
    }

    pub fn design(&self) -> &Array2<f64> {
        &self.design
    }

    pub fn beta(&self) -> &Array1<f64> {
        &self.beta
    }

    pub fn marker_column(&self) -> Option<usize> {
        self.marker_column
    }

    pub fn missing_blocks(&self) -> &[MissingCovariateBlock] {
        &self.missing
    }

    pub fn set_beta(&mut self, beta: Array1<f64>) -> SkyResult<()> {
        if beta.len() != self.beta.len() {
            return Err(SkyError::BetaLengthMismatch {
                expected: self.beta.len(),
                actual: beta.len(),
            });
        }
        validate_finite("beta", beta.view())?;
        self.beta.assign(&beta);
        Ok(())
    }

    /// Overwrite one design entry (a covariate value or an imputed value).
    pub fn set_design_value(&mut self, row: usize, column: usize, value: f64) -> SkyResult<()> {
        let (rows, cols) = self.design.dim();
        if column >= cols {
            return Err(SkyError::InvalidCovariateColumn { column, reason: "column out of range" });
        }
        if row >= rows {
            return Err(SkyError::NodeOutOfRange { index: row, len: rows });
        }
        if !value.is_finite() {
            return Err(SkyError::NonFiniteParameter { name: "design", index: row, value });
        }
        self.design[[row, column]] = value;
        Ok(())
    }

    /// Precisions of one missing-value block, addressed by column.
    pub fn set_missing_precisions(
        &mut self, column: usize, recent: f64, distant: f64,
    ) -> SkyResult<()> {
        validate_precision(recent)?;
        validate_precision(distant)?;
        let block = self.missing.iter_mut().find(|b| b.column == column).ok_or(
            SkyError::InvalidCovariateColumn { column, reason: "no missing-value block" },
        )?;
        block.precision_recent = recent;
        block.precision_distant = distant;
        Ok(())
    }

    /// Design rows must equal the field length.
    pub fn validate_rows(&self, field_length: usize) -> SkyResult<()> {
        if self.design.nrows() != field_length {
            return Err(SkyError::DesignRowsMismatch {
                expected: field_length,
                actual: self.design.nrows(),
            });
        }
        Ok(())
    }

    /// `Xβ`.
    pub fn predictor(&self) -> Array1<f64> {
        self.design.dot(&self.beta)
    }

    /// Write per-cell covariate values into the marker column.
    pub fn write_marker_values(&mut self, values: &[f64]) {
        if let Some(column) = self.marker_column {
            for (x, &v) in self.design.column_mut(column).iter_mut().zip(values) {
                *x = v;
            }
        }
    }

    /// Sum of all missing-value block densities.
    pub fn missing_log_density(&self) -> f64 {
        self.missing.iter().map(|b| b.log_density(&self.design)).sum()
    }

    /// Value copy of coefficients, design, and block precisions.
    pub fn copy_from(&mut self, other: &Self) {
        self.design.assign(&other.design);
        self.beta.assign(&other.beta);
        for (live, stored) in self.missing.iter_mut().zip(&other.missing) {
            *live = *stored;
        }
    }
}

impl crate::coalescent::core::cache::Snapshot for RegressionTerm {
    fn copy_from(&mut self, other: &Self) {
        RegressionTerm::copy_from(self, other);
    }
}

impl crate::coalescent::core::cache::Snapshot for SamplingTerm {
    fn copy_from(&mut self, other: &Self) {
        *self = *other;
    }
}
