//! Objective contract, solver options, and the outcome record.
//!
//! Purpose
//! -------
//! Define what an objective must provide ([`LogLikelihood`]), how a run is
//! configured ([`MLEOptions`], [`Tolerances`], [`LineSearcher`]), and what a
//! run returns ([`OptimOutcome`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Objectives return the log-likelihood `ℓ(θ)` and, optionally, `∇ℓ(θ)`;
//!   the adapter negates both for the minimizing backend.
//! - Options are validated on construction, so the solver layer treats them
//!   as consistent.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        types::{Cost, FnEvalMap, Grad, Theta},
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
};
use argmin::core::TerminationStatus;
use argmin_math::ArgminL2Norm;
use std::str::FromStr;

/// Objective maximized by [`maximize`](crate::optimization::loglik_optimizer::maximize).
///
/// - `value` evaluates `ℓ(θ)`.
/// - `check` rejects an unusable starting point before the solver runs.
/// - `grad` returns `∇ℓ(θ)`; the default reports
///   [`OptError::GradientNotImplemented`], which switches the adapter to
///   finite differences.
pub trait LogLikelihood {
    type Data: 'static;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Line search used inside L-BFGS. Parses case-insensitively from
/// `"MoreThuente"` / `"HagerZhang"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Solver configuration.
///
/// Defaults: `tol_grad = 1e-6`, no cost tolerance, 300 iterations,
/// More–Thuente, quiet, L-BFGS memory [`DEFAULT_LBFGS_MEM`](super::types::DEFAULT_LBFGS_MEM).
#[derive(Debug, Clone, PartialEq)]
pub struct MLEOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    /// Log progress each iteration (needs the `obs_slog` feature for the
    /// per-iteration observer).
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl MLEOptions {
    /// # Errors
    /// [`OptError::InvalidLBFGSMem`] when `lbfgs_mem == Some(0)`.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if lbfgs_mem == Some(0) {
            return Err(OptError::InvalidLBFGSMem {
                mem: 0,
                reason: "L-BFGS memory must be greater than zero.",
            });
        }
        Ok(Self { tols, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for MLEOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances { tol_grad: Some(1e-6), tol_cost: None, max_iter: Some(300) },
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Stopping rules. At least one must be set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] if all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for
    ///   non-finite or non-positive tolerances.
    /// - [`OptError::InvalidMaxIter`] if `max_iter == Some(0)`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_grad(tol_grad)?;
        verify_tol_cost(tol_cost)?;
        if max_iter == Some(0) {
            return Err(OptError::InvalidMaxIter {
                max_iter: 0,
                reason: "Maximum iterations must be greater than zero.",
            });
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

/// Result of a [`maximize`](crate::optimization::loglik_optimizer::maximize) run.
///
/// `value` is the log-likelihood at `theta_hat`, not the cost. `converged`
/// is `true` whenever the backend reports a termination reason.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// Assemble a validated outcome from raw solver state.
    ///
    /// # Errors
    /// Missing or non-finite `theta_hat`, or a non-finite `value`.
    pub fn new(
        theta_hat: Option<Theta>, value: f64, termination: TerminationStatus, iterations: u64,
        fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat)?;
        validate_value(value)?;
        let (converged, status) = match termination {
            TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
            other => (true, format!("{other:?}")),
        };
        Ok(Self {
            theta_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm: grad.map(|g| g.l2_norm()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Option and tolerance validation.
    // - Line-search parsing.
    // - Outcome assembly from raw solver state.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Tolerances require at least one rule and sane values.
    //
    // Given
    // -----
    // - All-`None`, `max_iter = 0`, and a valid combination.
    //
    // Expect
    // ------
    // - The two invalid inputs fail with the matching variant; the valid one
    //   passes.
    fn tolerances_validate_inputs() {
        // Arrange / Act / Assert
        assert_eq!(Tolerances::new(None, None, None), Err(OptError::NoTolerancesProvided));
        assert!(matches!(
            Tolerances::new(None, None, Some(0)),
            Err(OptError::InvalidMaxIter { .. })
        ));
        assert!(Tolerances::new(Some(1e-6), None, Some(100)).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Options reject zero L-BFGS memory; the default matches the documented
    // values.
    //
    // Given
    // -----
    // - `lbfgs_mem = Some(0)` and `MLEOptions::default()`.
    //
    // Expect
    // ------
    // - `InvalidLBFGSMem`; default uses More–Thuente with `tol_grad = 1e-6`.
    fn options_validate_memory_and_defaults() {
        // Arrange
        let tols = Tolerances::new(Some(1e-6), None, None).unwrap();

        // Act
        let bad = MLEOptions::new(tols, LineSearcher::HagerZhang, false, Some(0));
        let default = MLEOptions::default();

        // Assert
        assert!(matches!(bad, Err(OptError::InvalidLBFGSMem { mem: 0, .. })));
        assert_eq!(default.line_searcher, LineSearcher::MoreThuente);
        assert_eq!(default.tols.tol_grad, Some(1e-6));
        assert_eq!(default.tols.max_iter, Some(300));
    }

    #[test]
    // Purpose
    // -------
    // Line-search names parse case-insensitively.
    //
    // Given
    // -----
    // - "hagerzhang", "MORETHUENTE", and "bfgs".
    //
    // Expect
    // ------
    // - Two successes and one `InvalidLineSearch`.
    fn line_searcher_parses_case_insensitively() {
        // Arrange / Act / Assert
        assert_eq!("hagerzhang".parse::<LineSearcher>(), Ok(LineSearcher::HagerZhang));
        assert_eq!("MORETHUENTE".parse::<LineSearcher>(), Ok(LineSearcher::MoreThuente));
        assert!(matches!(
            "bfgs".parse::<LineSearcher>(),
            Err(OptError::InvalidLineSearch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Outcome assembly maps the termination status and computes the
    // gradient norm.
    //
    // Given
    // -----
    // - A finite estimate, `NotTerminated`, and gradient [3, 4].
    //
    // Expect
    // ------
    // - `converged == false`, status "Not terminated", `grad_norm == 5`.
    fn outcome_maps_status_and_gradient_norm() {
        // Arrange
        let theta = array![1.0, 2.0];

        // Act
        let out = OptimOutcome::new(
            Some(theta.clone()),
            -3.5,
            TerminationStatus::NotTerminated,
            4,
            FnEvalMap::new(),
            Some(array![3.0, 4.0]),
        )
        .unwrap();

        // Assert
        assert_eq!(out.theta_hat, theta);
        assert!(!out.converged);
        assert_eq!(out.status, "Not terminated");
        assert_eq!(out.iterations, 4);
        assert_eq!(out.grad_norm, Some(5.0));
    }
}
