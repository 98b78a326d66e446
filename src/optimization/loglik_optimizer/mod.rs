//! loglik_optimizer — `argmin`-backed maximization of log-likelihoods.
//!
//! Purpose
//! -------
//! Let a model implement one trait, [`LogLikelihood`], and hand it to
//! [`maximize`] to run L-BFGS with a chosen line search. The coalescent
//! layer uses it to find the conditional mode of the log population sizes.
//!
//! Key behaviors
//! -------------
//! - [`adapter`] turns `ℓ(θ)` into the cost `c(θ) = −ℓ(θ)` and falls back to
//!   finite differences when no analytic gradient exists.
//! - [`api`] builds the solver, runs the executor, and returns an
//!   [`OptimOutcome`].
//! - [`finite_diff`] provides error-capturing numerical gradients and
//!   Hessians; [`validation`] the shared shape and finiteness checks.
//!
//! Invariants & assumptions
//! ------------------------
//! - Objectives return log-likelihoods, never costs. Invalid inputs are
//!   reported as [`OptError`](crate::optimization::errors::OptError), not
//!   panics.
//! - [`Tolerances`] and [`MLEOptions`] are validated on construction.
//!
//! Testing notes
//! -------------
//! - Unit tests per submodule cover sign conventions, solver wiring on
//!   quadratics with known maximizers, finite-difference error capture, and
//!   option validation. Field-mode fitting is exercised end to end in
//!   `tests/integration_skyride_pipeline.rs`.

pub mod adapter;
pub mod api;
pub mod finite_diff;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Hessian, Theta};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
