//! Finite-difference derivatives with error capture and validation.
//!
//! `finitediff` closures must return a bare `f64`, so objective errors are
//! parked in a `RefCell` slot and the closure returns `NaN`. The helpers here
//! turn that slot back into an [`OptError`] and validate what comes out.
//!
//! - [`forward_gradient`]: forward differences of a scalar function.
//! - [`compute_hessian`]: central differences of a gradient function, with a
//!   forward-difference retry when the central pass is non-finite, then
//!   symmetrized.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        types::{Grad, Hessian, Theta},
        validation::{validate_grad, validate_hessian},
    },
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Forward-difference gradient of `func` at `theta`.
///
/// Clears `closure_err` first; if `func` parks an error there during the
/// pass, that error is returned instead of the gradient.
///
/// # Errors
/// The captured error, or a validation error for a non-finite result.
pub fn forward_gradient<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let grad = theta.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&grad, theta.len())?;
    Ok(grad)
}

/// Symmetric finite-difference Hessian of a gradient function.
///
/// # Errors
/// [`OptError::InvalidHessian`](crate::optimization::errors::OptError::InvalidHessian)
/// if both the central and forward passes contain non-finite entries.
pub fn compute_hessian<F: Fn(&Theta) -> Grad>(f: &F, theta: &Theta) -> OptResult<Hessian> {
    let dim = theta.len();
    let mut hess = theta.central_hessian(f);
    if validate_hessian(&hess, dim).is_err() {
        hess = theta.forward_hessian(f);
        validate_hessian(&hess, dim)?;
    }
    symmetrize(&mut hess);
    Ok(hess)
}

fn symmetrize(hess: &mut Hessian) {
    for i in 0..hess.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hess[[i, j]] + hess[[j, i]]);
            hess[[i, j]] = avg;
            hess[[j, i]] = avg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptError;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Forward gradients on a smooth function and with a parked error.
    // - Hessians of a linear gradient map and the non-finite failure path.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Forward differences recover the gradient of a smooth function.
    //
    // Given
    // -----
    // - `f(θ) = θ₀² + 3θ₁` at θ = (1, −2).
    //
    // Expect
    // ------
    // - Gradient ≈ (2, 3).
    fn forward_gradient_matches_analytic_gradient() {
        // Arrange
        let theta: Theta = array![1.0, -2.0];
        let slot: RefCell<Option<Error>> = RefCell::new(None);
        let f = |x: &Theta| x[0] * x[0] + 3.0 * x[1];

        // Act
        let grad = forward_gradient(&theta, &f, &slot).unwrap();

        // Assert
        assert_abs_diff_eq!(grad[0], 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(grad[1], 3.0, epsilon = 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // An error parked by the closure wins over the (NaN) gradient.
    //
    // Given
    // -----
    // - A closure that stores `OptError::NonFiniteCost` and returns NaN.
    //
    // Expect
    // ------
    // - `forward_gradient` returns that error.
    fn forward_gradient_returns_parked_error() {
        // Arrange
        let theta: Theta = array![0.5];
        let slot: RefCell<Option<Error>> = RefCell::new(None);
        let f = |_: &Theta| {
            slot.replace(Some(OptError::NonFiniteCost { value: f64::NAN }.into()));
            f64::NAN
        };

        // Act
        let result = forward_gradient(&theta, &f, &slot);

        // Assert
        assert!(matches!(result, Err(OptError::NonFiniteCost { .. })));
    }

    #[test]
    // Purpose
    // -------
    // The Hessian of a linear gradient map is that map's matrix, symmetric.
    //
    // Given
    // -----
    // - g(θ) = Aθ with A = [[2, 1], [1, 4]].
    //
    // Expect
    // ------
    // - `compute_hessian` ≈ A and exactly symmetric.
    fn compute_hessian_recovers_linear_map() {
        // Arrange
        let a = array![[2.0, 1.0], [1.0, 4.0]];
        let g = |x: &Theta| a.dot(x);
        let theta: Theta = array![0.3, -0.7];

        // Act
        let hess = compute_hessian(&g, &theta).unwrap();

        // Assert
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(hess[[i, j]], a[[i, j]], epsilon = 1e-6);
            }
        }
        assert_eq!(hess[[0, 1]], hess[[1, 0]]);
    }

    #[test]
    // Purpose
    // -------
    // Non-finite gradients in both passes surface as `InvalidHessian`.
    //
    // Given
    // -----
    // - A gradient function returning NaN everywhere.
    //
    // Expect
    // ------
    // - `Err(OptError::InvalidHessian { .. })`.
    fn compute_hessian_rejects_non_finite_gradients() {
        // Arrange
        let g = |_: &Theta| Array1::from(vec![f64::NAN]);
        let theta: Theta = array![1.0];

        // Act
        let result = compute_hessian(&g, &theta);

        // Assert
        assert!(matches!(result, Err(OptError::InvalidHessian { .. })));
    }
}
