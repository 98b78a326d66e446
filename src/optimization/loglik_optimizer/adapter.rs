//! Bridge from a [`LogLikelihood`] to `argmin`'s minimization traits.
//!
//! The backend minimizes, so the adapter exposes `c(θ) = −ℓ(θ)` and
//! `∇c(θ) = −∇ℓ(θ)`. Objectives without an analytic gradient are
//! differentiated numerically on the cost itself (central first, forward
//! when the central pass fails), so no sign flip happens on that path.
use std::cell::RefCell;

use crate::optimization::{
    errors::OptError,
    loglik_optimizer::{
        finite_diff::forward_gradient,
        traits::LogLikelihood,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

/// `argmin` problem wrapping an objective and its data.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }

    fn numerical_gradient(&self, theta: &Theta) -> Result<Grad, Error> {
        let slot: RefCell<Option<Error>> = RefCell::new(None);
        let cost = |x: &Theta| -> f64 {
            self.cost(x).unwrap_or_else(|err| {
                let mut parked = slot.borrow_mut();
                if parked.is_none() {
                    *parked = Some(err);
                }
                f64::NAN
            })
        };
        let central = theta.central_diff(&cost);
        if slot.borrow().is_none() && validate_grad(&central, theta.len()).is_ok() {
            return Ok(central);
        }
        Ok(forward_gradient(theta, &cost, &slot)?)
    }
}

impl<'a, F: LogLikelihood> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    /// `−ℓ(θ)`; a non-finite log-likelihood is an error so line searches
    /// back off instead of accepting the step.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let value = self.f.value(theta, self.data)?;
        if !value.is_finite() {
            return Err(OptError::NonFiniteCost { value }.into());
        }
        Ok(-value)
    }
}

impl<'a, F: LogLikelihood> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(-g)
            }
            Err(OptError::GradientNotImplemented) => self.numerical_gradient(theta),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptResult;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Sign conventions for cost and analytic gradient.
    // - The numerical fallback when no gradient is provided.
    // - Rejection of non-finite log-likelihood values.
    // -------------------------------------------------------------------------

    /// `ℓ(θ) = −Σ (θ_i − m_i)²`, optionally with an analytic gradient.
    struct Bowl {
        analytic: bool,
    }

    impl LogLikelihood for Bowl {
        type Data = Theta;

        fn value(&self, theta: &Theta, data: &Theta) -> OptResult<f64> {
            let d = theta - data;
            Ok(-d.dot(&d))
        }

        fn check(&self, _theta: &Theta, _data: &Theta) -> OptResult<()> {
            Ok(())
        }

        fn grad(&self, theta: &Theta, data: &Theta) -> OptResult<Grad> {
            if self.analytic {
                Ok((theta - data) * -2.0)
            } else {
                Err(OptError::GradientNotImplemented)
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // The adapter negates value and analytic gradient.
    //
    // Given
    // -----
    // - `Bowl` centered at (1, −1) with an analytic gradient, θ = (0, 0).
    //
    // Expect
    // ------
    // - Cost 2 and cost gradient (−2, 2).
    fn analytic_path_flips_signs() {
        // Arrange
        let center = array![1.0, -1.0];
        let model = Bowl { analytic: true };
        let adapter = ArgMinAdapter::new(&model, &center);
        let theta = array![0.0, 0.0];

        // Act
        let cost = adapter.cost(&theta).unwrap();
        let grad = adapter.gradient(&theta).unwrap();

        // Assert
        assert_eq!(cost, 2.0);
        assert_eq!(grad, array![-2.0, 2.0]);
    }

    #[test]
    // Purpose
    // -------
    // Without an analytic gradient the adapter differentiates the cost.
    //
    // Given
    // -----
    // - `Bowl` without a gradient, same center and θ.
    //
    // Expect
    // ------
    // - Numerical cost gradient ≈ (−2, 2).
    fn numerical_fallback_differentiates_cost() {
        // Arrange
        let center = array![1.0, -1.0];
        let model = Bowl { analytic: false };
        let adapter = ArgMinAdapter::new(&model, &center);
        let theta = array![0.0, 0.0];

        // Act
        let grad = adapter.gradient(&theta).unwrap();

        // Assert
        assert_abs_diff_eq!(grad[0], -2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(grad[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // Non-finite log-likelihoods are reported as errors.
    //
    // Given
    // -----
    // - `Bowl` evaluated at θ = (∞, 0).
    //
    // Expect
    // ------
    // - `cost` fails with `NonFiniteCost`.
    fn non_finite_value_is_an_error() {
        // Arrange
        let center = array![0.0, 0.0];
        let model = Bowl { analytic: true };
        let adapter = ArgMinAdapter::new(&model, &center);

        // Act
        let err = adapter.cost(&array![f64::INFINITY, 0.0]).unwrap_err();

        // Assert
        assert!(matches!(OptError::from(err), OptError::NonFiniteCost { .. }));
    }
}
