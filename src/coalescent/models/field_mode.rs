//! Field mode — conditional maximization of the log population sizes.
//!
//! Purpose
//! -------
//! Find the mode of the full conditional of `γ` given the genealogies and
//! hyperparameters, and the Laplace standard errors around it. This is the
//! Gaussian approximation a block-update proposal or an empirical-Bayes
//! summary needs.
//!
//! Key behaviors
//! -------------
//! - [`FieldConditional`] implements the optimizer's [`LogLikelihood`] with
//!   `θ = γ`: value `coalescent + field (+ sampling)`, analytic gradient.
//! - [`SkyLikelihood::fit_field_mode`] snapshots the current statistics and
//!   scaled matrix into [`FieldConditionalData`], runs L-BFGS from the
//!   current `γ`, writes `γ̂` back through the regular setter, and computes
//!   standard errors from the analytic information
//!   `Q + diag(stats·e^{−γ̂}) + diag(β₁² e^{β₀} E e^{β₁γ̂})`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Precision, lambda, regression coefficients, and the genealogies stay
//!   fixed during the fit. Terms that do not depend on `γ` (missing
//!   covariates) are left out of the objective.
//! - The conditional is strictly concave whenever some cell has positive
//!   `stats`, so the information is positive definite at the mode.
use crate::{
    coalescent::{
        core::{genealogy::Genealogy, statistics::SufficientStatistics, weights::SymTridiagonal},
        errors::SkyResult,
        models::{
            skyride::SkyLikelihood,
            terms::{
                SamplingTerm, coalescent_log_density, field_log_density, log_pop_size_gradient,
            },
        },
    },
    inference::hessian::standard_errors_from_information,
    optimization::{
        errors::OptResult,
        loglik_optimizer::{
            Grad, LogLikelihood, MLEOptions, OptimOutcome, Theta, maximize,
            validation::validate_theta,
        },
    },
};
use ndarray::{Array1, Array2};
use tracing::info;

/// Everything the conditional of `γ` depends on, frozen at fit time.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConditionalData {
    pub stats: SufficientStatistics,
    /// `Q = τ((1 − λ)I + λ Q_base)`.
    pub scaled_weights: SymTridiagonal,
    /// Prior mean `Xβ` (zeros without regression).
    pub mean: Array1<f64>,
    pub precision: f64,
    pub lambda: f64,
    pub sampling: Option<SamplingTerm>,
}

impl FieldConditionalData {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Negative Hessian of the conditional at `gamma`.
    pub fn information(&self, gamma: &Array1<f64>) -> Array2<f64> {
        let mut info = self.scaled_weights.to_dense();
        for i in 0..gamma.len() {
            info[[i, i]] += self.stats.stats[i] * (-gamma[i]).exp();
            if let Some(sampling) = &self.sampling {
                info[[i, i]] -= sampling.hessian_at(gamma[i], self.stats.exposures[i]);
            }
        }
        info
    }
}

/// Conditional log-density of `γ` as an optimizer objective.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldConditional;

impl LogLikelihood for FieldConditional {
    type Data = FieldConditionalData;

    fn value(&self, theta: &Theta, data: &FieldConditionalData) -> OptResult<f64> {
        validate_theta(theta, data.len())?;
        let residual = theta - &data.mean;
        let mut value = coalescent_log_density(theta.view(), &data.stats)
            + field_log_density(residual.view(), &data.scaled_weights, data.precision, data.lambda);
        if let Some(sampling) = &data.sampling {
            value += sampling.log_density(theta.view(), &data.stats);
        }
        Ok(value)
    }

    fn check(&self, theta: &Theta, data: &FieldConditionalData) -> OptResult<()> {
        validate_theta(theta, data.len())
    }

    fn grad(&self, theta: &Theta, data: &FieldConditionalData) -> OptResult<Grad> {
        validate_theta(theta, data.len())?;
        let residual = theta - &data.mean;
        let qr = data.scaled_weights.mul_vec(residual.view());
        Ok(log_pop_size_gradient(theta.view(), &data.stats, qr.view(), data.sampling.as_ref()))
    }
}

/// Result of [`SkyLikelihood::fit_field_mode`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMode {
    /// Raw optimizer outcome; `theta_hat` is `γ̂`, `value` the conditional
    /// log-density there.
    pub outcome: OptimOutcome,
    /// Laplace standard errors of `γ̂`.
    pub standard_errors: Array1<f64>,
}

impl<G: Genealogy> SkyLikelihood<G> {
    /// Frozen inputs of the `γ` conditional at the current state.
    pub fn field_conditional_data(&mut self) -> SkyResult<FieldConditionalData> {
        self.ensure_intervals()?;
        let state = self.live();
        let mean = match &state.regression {
            Some(reg) => reg.predictor(),
            None => Array1::zeros(state.params.len()),
        };
        Ok(FieldConditionalData {
            stats: state.stats.clone(),
            scaled_weights: state.scaled_weights(),
            mean,
            precision: state.params.precision,
            lambda: state.params.lambda,
            sampling: state.sampling,
        })
    }

    /// Maximize the conditional of `γ` from its current value and leave the
    /// likelihood at the mode.
    ///
    /// # Errors
    /// - Extraction errors when intervals are dirty.
    /// - [`SkyError::OptimizationFailed`](crate::coalescent::errors::SkyError::OptimizationFailed)
    ///   for solver failures; model errors raised during the run come back
    ///   unchanged.
    pub fn fit_field_mode(&mut self, opts: &MLEOptions) -> SkyResult<FieldMode> {
        let data = self.field_conditional_data()?;
        let start = self.params().log_pop_sizes.clone();
        let outcome = maximize(&FieldConditional, start, &data, opts)?;
        self.set_log_pop_sizes(outcome.theta_hat.view())?;
        let standard_errors = standard_errors_from_information(&data.information(&outcome.theta_hat))?;
        info!(
            cells = data.len(),
            iterations = outcome.iterations,
            converged = outcome.converged,
            log_density = outcome.value,
            "fitted field mode"
        );
        Ok(FieldMode { outcome, standard_errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        coalescent::{
            core::{genealogy::NodeHeights, options::SkyOptions, params::FieldParams},
            models::gradient::GradientTarget,
        },
        inference::hessian::calc_standard_errors,
        optimization::loglik_optimizer::{LineSearcher, Tolerances},
    };
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - agreement of the objective with the composite likelihood,
    // - stationarity of the fitted mode and write-back of `γ̂`,
    // - analytic vs. finite-difference standard errors.
    // -------------------------------------------------------------------------

    fn serial_model(sampling: bool) -> SkyLikelihood<NodeHeights> {
        let tree = NodeHeights::new(vec![0.0, 0.0, 0.3, 0.8], vec![0.5, 1.4, 2.2]).unwrap();
        let params = FieldParams::new(array![0.0, 0.0, 0.0], 2.0, 0.8).unwrap();
        let lik = SkyLikelihood::new(vec![tree], params, SkyOptions::default()).unwrap();
        if sampling {
            lik.with_sampling(SamplingTerm::new(0.2, -1.0).unwrap())
        } else {
            lik
        }
    }

    fn tight() -> MLEOptions {
        let tols = Tolerances::new(Some(1e-8), None, Some(500)).unwrap();
        MLEOptions::new(tols, LineSearcher::MoreThuente, false, None).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // The objective and its gradient match the composite likelihood when no
    // γ-independent terms are present.
    //
    // Given
    // -----
    // - Serial 4-tip tree with a sampling term, γ = (0.3, −0.2, 0.5).
    //
    // Expect
    // ------
    // - `value` equals `log_likelihood`; `grad` equals
    //   `gradient_log_density(LogPopulationSizes)`.
    fn objective_matches_composite_likelihood() {
        // Arrange
        let mut lik = serial_model(true);
        lik.set_log_pop_sizes(array![0.3, -0.2, 0.5].view()).unwrap();
        let data = lik.field_conditional_data().unwrap();
        let theta = lik.params().log_pop_sizes.clone();

        // Act
        let value = FieldConditional.value(&theta, &data).unwrap();
        let grad = FieldConditional.grad(&theta, &data).unwrap();

        // Assert
        assert_abs_diff_eq!(value, lik.log_likelihood().unwrap(), epsilon = 1e-12);
        let expected = lik.gradient_log_density(GradientTarget::LogPopulationSizes).unwrap();
        for i in 0..3 {
            assert_abs_diff_eq!(grad[i], expected[i], epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // The fitted mode is stationary and is written back into the likelihood.
    //
    // Given
    // -----
    // - Serial 4-tip tree, with and without sampling, started at γ = 0.
    //
    // Expect
    // ------
    // - Gradient at the stored γ̂ is ≈ 0; stored γ̂ equals `theta_hat`;
    //   the log-likelihood did not decrease.
    fn fit_reaches_stationary_point_and_writes_back() {
        for sampling in [false, true] {
            // Arrange
            let mut lik = serial_model(sampling);
            let before = lik.log_likelihood().unwrap();

            // Act
            let mode = lik.fit_field_mode(&tight()).unwrap();

            // Assert
            assert_eq!(lik.params().log_pop_sizes, mode.outcome.theta_hat);
            let grad = lik.gradient_log_density(GradientTarget::LogPopulationSizes).unwrap();
            for g in grad.iter() {
                assert_abs_diff_eq!(*g, 0.0, epsilon = 1e-5);
            }
            assert!(lik.log_likelihood().unwrap() >= before);
            assert_abs_diff_eq!(mode.outcome.value, lik.log_likelihood().unwrap(), epsilon = 1e-10);
        }
    }

    #[test]
    // Purpose
    // -------
    // Analytic Laplace standard errors agree with a finite-difference
    // Hessian of the cost gradient.
    //
    // Given
    // -----
    // - The fitted mode of the serial tree with sampling.
    //
    // Expect
    // ------
    // - Both routes agree to 1e-5; all errors are positive and finite.
    fn standard_errors_match_finite_difference_hessian() {
        // Arrange
        let mut lik = serial_model(true);
        let mode = lik.fit_field_mode(&tight()).unwrap();
        let data = lik.field_conditional_data().unwrap();
        let cost_grad = |theta: &Array1<f64>| -> Array1<f64> {
            -FieldConditional.grad(theta, &data).unwrap()
        };

        // Act
        let numerical = calc_standard_errors(&cost_grad, &mode.outcome.theta_hat).unwrap();

        // Assert
        for i in 0..3 {
            assert!(mode.standard_errors[i].is_finite() && mode.standard_errors[i] > 0.0);
            assert_abs_diff_eq!(mode.standard_errors[i], numerical[i], epsilon = 1e-5);
        }
    }
}
