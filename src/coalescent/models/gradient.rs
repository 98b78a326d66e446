//! Gradients of the composite log-likelihood.
//!
//! Purpose
//! -------
//! Provide analytic first derivatives (and the diagonal of the Hessian with
//! respect to `γ`) for gradient-based samplers such as HMC, plus a numerical
//! cross-check by central differences.
//!
//! Key behaviors
//! -------------
//! - [`GradientTarget::LogPopulationSizes`]:
//!   `−num_coal_i + stats_i e^{−γ_i} − (Q r)_i` plus the sampling term
//!   `β₁ n_i − β₁ e^{β₀} E_i e^{β₁γ_i}` when present.
//! - [`GradientTarget::CoalescentIntervalLengths`] (skyride only):
//!   `−stats_i / len_i · e^{−γ_i}`, which for a zero-length cell is the
//!   closing interval's pair weight `−w_i e^{−γ_i}`.
//! - [`GradientTarget::Precision`]: `(n − 1)/(2τ) − ½ rᵀ B(λ) r` with
//!   `B(λ) = (1 − λ)I + λQ_base`.
//! - [`GradientTarget::RegressionCoefficients`]: `Xᵀ Q r`.
//! - [`SkyLikelihood::numerical_gradient`] perturbs the target through the
//!   public setters, forces full recomputation, and restores the original
//!   values afterward.
//!
//! Conventions
//! -----------
//! - All gradients are of the log-likelihood (not a cost).
//! - Unsupported combinations return [`SkyError::NotImplemented`].
use crate::coalescent::{
    core::{genealogy::Genealogy, options::FieldLayout},
    errors::{SkyError, SkyResult},
    models::{skyride::SkyLikelihood, terms::log_pop_size_gradient},
};
use finitediff::FiniteDiff;
use ndarray::{Array1, ArrayView1};
use std::cell::RefCell;

/// Parameter block to differentiate with respect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientTarget {
    LogPopulationSizes,
    CoalescentIntervalLengths,
    Precision,
    RegressionCoefficients,
}

/// Analytic vs. numerical gradient comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientCheck {
    pub analytic: Array1<f64>,
    pub numerical: Array1<f64>,
    /// Mixed error `max_i |a_i − n_i| / max(|a_i|, |n_i|, 1)`: relative for
    /// components of magnitude above 1, absolute below.
    pub max_relative_error: f64,
}

impl GradientCheck {
    pub fn new(analytic: Array1<f64>, numerical: Array1<f64>) -> Self {
        let max_relative_error = analytic
            .iter()
            .zip(numerical.iter())
            .map(|(a, n)| (a - n).abs() / a.abs().max(n.abs()).max(1.0))
            .fold(0.0, f64::max);
        Self { analytic, numerical, max_relative_error }
    }

    pub fn passes(&self, tolerance: f64) -> bool {
        self.max_relative_error <= tolerance
    }
}

impl<G: Genealogy> SkyLikelihood<G> {
    /// Analytic gradient of the log-likelihood with respect to `target`.
    ///
    /// # Errors
    /// - [`SkyError::NotImplemented`] for interval lengths under the skygrid
    ///   layout and for regression coefficients without a regression term.
    /// - Extraction errors when intervals must be recomputed first.
    pub fn gradient_log_density(&mut self, target: GradientTarget) -> SkyResult<Array1<f64>> {
        self.ensure_intervals()?;
        let skygrid = matches!(self.options().layout, FieldLayout::Skygrid(_));
        let state = self.live();
        let gamma = &state.params.log_pop_sizes;
        let stats = &state.stats;

        match target {
            GradientTarget::LogPopulationSizes => {
                let qr = state.scaled_weights().mul_vec(state.residual().view());
                Ok(log_pop_size_gradient(gamma.view(), stats, qr.view(), state.sampling.as_ref()))
            }
            GradientTarget::CoalescentIntervalLengths => {
                if skygrid {
                    return Err(SkyError::NotImplemented {
                        operation: "gradient with respect to coalescent interval lengths",
                        reason: "skygrid cells are fixed by the grid",
                    });
                }
                Ok(Array1::from_shape_fn(gamma.len(), |i| {
                    // For a zero-length cell `∂stats/∂len` is the pair weight
                    // of its closing interval.
                    let rate = if stats.interval_lengths[i] > 0.0 {
                        stats.stats[i] / stats.interval_lengths[i]
                    } else {
                        stats.closing_pair_weights[i]
                    };
                    -rate * (-gamma[i]).exp()
                }))
            }
            GradientTarget::Precision => {
                let n = gamma.len() as f64;
                let tau = state.params.precision;
                let unit = state.weights.scaled(1.0, state.params.lambda);
                let residual = state.residual();
                Ok(Array1::from_elem(
                    1,
                    0.5 * (n - 1.0) / tau - 0.5 * unit.quadratic_form(residual.view()),
                ))
            }
            GradientTarget::RegressionCoefficients => {
                let reg = state.regression.as_ref().ok_or(SkyError::NotImplemented {
                    operation: "gradient with respect to regression coefficients",
                    reason: "no regression term was configured",
                })?;
                let qr = state.scaled_weights().mul_vec(state.residual().view());
                Ok(reg.design().t().dot(&qr))
            }
        }
    }

    /// Diagonal of the Hessian with respect to `γ`:
    /// `−stats_i e^{−γ_i} − Q_ii − β₁² e^{β₀} E_i e^{β₁γ_i}`.
    pub fn diagonal_hessian_log_density(
        &mut self, target: GradientTarget,
    ) -> SkyResult<Array1<f64>> {
        if target != GradientTarget::LogPopulationSizes {
            return Err(SkyError::NotImplemented {
                operation: "diagonal Hessian",
                reason: "only available for log population sizes",
            });
        }
        self.ensure_intervals()?;
        let state = self.live();
        let gamma = &state.params.log_pop_sizes;
        let q = state.scaled_weights();
        let mut diag = Array1::zeros(gamma.len());
        for i in 0..gamma.len() {
            diag[i] = -state.stats.stats[i] * (-gamma[i]).exp() - q.diag()[i];
            if let Some(sampling) = &state.sampling {
                diag[i] += sampling.hessian_at(gamma[i], state.stats.exposures[i]);
            }
        }
        Ok(diag)
    }

    /// Central-difference gradient of `log_likelihood` with respect to
    /// `target`. Original values are restored before returning, also on
    /// error.
    ///
    /// # Errors
    /// - [`SkyError::NotImplemented`] for interval lengths (they are derived
    ///   from node heights and cannot be perturbed independently).
    /// - Any error raised while evaluating a perturbed point.
    pub fn numerical_gradient(&mut self, target: GradientTarget) -> SkyResult<Array1<f64>> {
        let x0 = self.target_values(target)?;
        let closure_err: RefCell<Option<SkyError>> = RefCell::new(None);
        let grad = {
            let this = RefCell::new(&mut *self);
            let f = |x: &Array1<f64>| -> f64 {
                let mut lik = this.borrow_mut();
                let value = lik.set_target(target, x.view()).and_then(|_| {
                    lik.make_dirty();
                    lik.log_likelihood()
                });
                match value {
                    Ok(v) => v,
                    Err(e) => {
                        closure_err.replace(Some(e));
                        f64::NAN
                    }
                }
            };
            x0.central_diff(&f)
        };
        self.set_target(target, x0.view())?;
        self.make_dirty();
        if let Some(err) = closure_err.into_inner() {
            return Err(err);
        }
        Ok(grad)
    }

    /// Compare the analytic gradient with central differences.
    pub fn check_gradient(&mut self, target: GradientTarget) -> SkyResult<GradientCheck> {
        let analytic = self.gradient_log_density(target)?;
        let numerical = self.numerical_gradient(target)?;
        Ok(GradientCheck::new(analytic, numerical))
    }

    fn target_values(&self, target: GradientTarget) -> SkyResult<Array1<f64>> {
        let state = self.live();
        match target {
            GradientTarget::LogPopulationSizes => Ok(state.params.log_pop_sizes.clone()),
            GradientTarget::Precision => Ok(Array1::from_elem(1, state.params.precision)),
            GradientTarget::RegressionCoefficients => state
                .regression
                .as_ref()
                .map(|r| r.beta().clone())
                .ok_or(SkyError::NotImplemented {
                    operation: "numerical gradient with respect to regression coefficients",
                    reason: "no regression term was configured",
                }),
            GradientTarget::CoalescentIntervalLengths => Err(SkyError::NotImplemented {
                operation: "numerical gradient with respect to coalescent interval lengths",
                reason: "interval lengths are derived from node heights",
            }),
        }
    }

    fn set_target(&mut self, target: GradientTarget, values: ArrayView1<f64>) -> SkyResult<()> {
        match target {
            GradientTarget::LogPopulationSizes => self.set_log_pop_sizes(values),
            GradientTarget::Precision => self.set_precision(values[0]),
            GradientTarget::RegressionCoefficients => self.set_beta(values),
            GradientTarget::CoalescentIntervalLengths => Err(SkyError::NotImplemented {
                operation: "set coalescent interval lengths",
                reason: "interval lengths are derived from node heights",
            }),
        }
    }
}
