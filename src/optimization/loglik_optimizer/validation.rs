//! Consistency checks shared by the optimizer layer.
//!
//! - Tolerances: [`verify_tol_grad`], [`verify_tol_cost`] (finite and > 0
//!   when present).
//! - Inputs: [`validate_theta`] (expected length, finite entries).
//! - Derivatives: [`validate_grad`], [`validate_hessian`] (shape, finite).
//! - Outputs: [`validate_theta_hat`], [`validate_value`].
//!
//! All helpers return the matching [`OptError`] variant and never panic.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::types::{Grad, Hessian, Theta},
};

fn verify_positive_finite(tol: f64) -> Result<(), &'static str> {
    if !tol.is_finite() {
        return Err("Tolerance must be finite.");
    }
    if tol <= 0.0 {
        return Err("Tolerance must be positive.");
    }
    Ok(())
}

pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    match tol {
        Some(tol) => {
            verify_positive_finite(tol).map_err(|reason| OptError::InvalidTolGrad { tol, reason })
        }
        None => Ok(()),
    }
}

pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    match tol {
        Some(tol) => {
            verify_positive_finite(tol).map_err(|reason| OptError::InvalidTolCost { tol, reason })
        }
        None => Ok(()),
    }
}

/// `theta` must have `expected` entries, all finite.
pub fn validate_theta(theta: &Theta, expected: usize) -> OptResult<()> {
    if theta.len() != expected {
        return Err(OptError::ThetaLengthMismatch { expected, actual: theta.len() });
    }
    match theta.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::NonFiniteTheta { index, value: theta[index] }),
        None => Ok(()),
    }
}

pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    match grad.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidGradient {
            index,
            value: grad[index],
            reason: "Gradient elements must be finite.",
        }),
        None => Ok(()),
    }
}

pub fn validate_hessian(hessian: &Hessian, dim: usize) -> OptResult<()> {
    if hessian.dim() != (dim, dim) {
        return Err(OptError::HessianDimMismatch { expected: dim, found: hessian.dim() });
    }
    match hessian.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, col), &value)) => Err(OptError::InvalidHessian { row, col, value }),
        None => Ok(()),
    }
}

pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let theta = theta_hat.ok_or(OptError::MissingThetaHat)?;
    match theta.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidThetaHat {
            index,
            value: theta[index],
            reason: "Parameter estimates must be finite.",
        }),
        None => Ok(theta),
    }
}

pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}
