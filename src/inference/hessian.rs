//! Standard errors from observed information.
//!
//! Purpose
//! -------
//! Turn an observed-information matrix `I = −∇²ℓ(θ̂)` into standard errors
//! `se_i = sqrt([I⁺]_ii)`, where `I⁺` is the eigenvalue pseudoinverse.
//! The information either comes in analytically ([`standard_errors_from_information`])
//! or is built by finite differences of a cost gradient
//! ([`calc_standard_errors`]).
//!
//! Key behaviors
//! -------------
//! - Eigenvalues at or below [`EIGEN_EPS`] are dropped from the
//!   pseudoinverse, so flat directions do not blow up the result.
//! - The matrix is symmetrized into `nalgebra` before decomposition.
//!
//! Invariants & assumptions
//! ------------------------
//! - `I` is square, finite, and (near) positive semi-definite at a mode.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{finite_diff::compute_hessian, validation::validate_hessian},
};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

/// Eigenvalues at or below this are treated as zero.
pub const EIGEN_EPS: f64 = 1e-12;

/// Standard errors from an observed-information matrix.
///
/// # Errors
/// Shape or finiteness violations of `information`.
pub fn standard_errors_from_information(information: &Array2<f64>) -> OptResult<Array1<f64>> {
    let n = information.nrows();
    validate_hessian(information, n)?;
    Ok(pseudo_inverse_diagonal(to_dmatrix(information)).mapv(f64::sqrt))
}

/// Standard errors at `theta_hat`, with the information built by finite
/// differences of `cost_grad`, the gradient of `−ℓ`.
///
/// # Errors
/// Non-finite finite-difference Hessians.
pub fn calc_standard_errors<F: Fn(&Array1<f64>) -> Array1<f64>>(
    cost_grad: &F, theta_hat: &Array1<f64>,
) -> OptResult<Array1<f64>> {
    let information = compute_hessian(cost_grad, theta_hat)?;
    standard_errors_from_information(&information)
}

fn to_dmatrix(m: &Array2<f64>) -> DMatrix<f64> {
    let n = m.nrows();
    DMatrix::from_fn(n, n, |i, j| 0.5 * (m[[i, j]] + m[[j, i]]))
}

/// `[I⁺]_ii = Σ_k q_ik² / λ_k` over eigenpairs with `λ_k > EIGEN_EPS`.
fn pseudo_inverse_diagonal(information: DMatrix<f64>) -> Array1<f64> {
    let n = information.nrows();
    let eigen = information.symmetric_eigen();
    let q = eigen.eigenvectors;
    Array1::from_shape_fn(n, |i| {
        eigen
            .eigenvalues
            .iter()
            .enumerate()
            .filter(|(_, lambda)| **lambda > EIGEN_EPS)
            .map(|(k, &lambda)| q[(i, k)] * q[(i, k)] / lambda)
            .sum()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptError;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Analytic standard errors for diagonal and correlated information.
    // - Agreement of the finite-difference route with the analytic one.
    // - Dropping of null directions and rejection of non-finite input.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Diagonal information gives `1 / sqrt(I_ii)`.
    //
    // Given
    // -----
    // - I = diag(4, 1).
    //
    // Expect
    // ------
    // - se = (0.5, 1).
    fn diagonal_information_gives_reciprocal_roots() {
        // Arrange
        let info = array![[4.0, 0.0], [0.0, 1.0]];

        // Act
        let se = standard_errors_from_information(&info).unwrap();

        // Assert
        assert_abs_diff_eq!(se[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(se[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Correlated information uses the diagonal of the inverse, and the
    // finite-difference route agrees.
    //
    // Given
    // -----
    // - I = [[2, 1], [1, 2]], whose inverse has diagonal 2/3; the linear
    //   cost gradient `g(θ) = Iθ`.
    //
    // Expect
    // ------
    // - se = sqrt(2/3) from both routes.
    fn correlated_information_matches_inverse_and_finite_differences() {
        // Arrange
        let info = array![[2.0, 1.0], [1.0, 2.0]];
        let grad = |theta: &Array1<f64>| info.dot(theta);
        let expected = (2.0_f64 / 3.0).sqrt();

        // Act
        let analytic = standard_errors_from_information(&info).unwrap();
        let numerical = calc_standard_errors(&grad, &array![0.4, -1.0]).unwrap();

        // Assert
        for i in 0..2 {
            assert_abs_diff_eq!(analytic[i], expected, epsilon = 1e-12);
            assert_abs_diff_eq!(numerical[i], expected, epsilon = 1e-6);
        }
    }

    #[test]
    // Purpose
    // -------
    // A null direction is excluded instead of producing infinity.
    //
    // Given
    // -----
    // - I = [[1, 1], [1, 1]] (eigenvalues 2 and 0).
    //
    // Expect
    // ------
    // - Finite se = sqrt(1/4) for both entries.
    fn singular_information_drops_null_direction() {
        // Arrange
        let info = array![[1.0, 1.0], [1.0, 1.0]];

        // Act
        let se = standard_errors_from_information(&info).unwrap();

        // Assert
        assert_abs_diff_eq!(se[0], 0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(se[1], 0.5, epsilon = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Non-finite information is rejected.
    //
    // Given
    // -----
    // - A 2×2 matrix with a NaN entry.
    //
    // Expect
    // ------
    // - `OptError::InvalidHessian`.
    fn non_finite_information_is_rejected() {
        // Arrange
        let info = array![[1.0, f64::NAN], [0.0, 1.0]];

        // Act
        let result = standard_errors_from_information(&info);

        // Assert
        assert!(matches!(result, Err(OptError::InvalidHessian { .. })));
    }
}
