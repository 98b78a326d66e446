//! coalescent::models — the composite likelihood and what is built on it.
//!
//! Purpose
//! -------
//! Combine the core building blocks into [`SkyLikelihood`], the cached
//! `coalescent + field + sampling + missing covariates` log-likelihood, and
//! layer analytic gradients and field-mode fitting on top.
//!
//! Key behaviors
//! -------------
//! - [`terms`]: the individual log-density terms and the optional
//!   regression / sampling components.
//! - [`skyride`]: the likelihood, its cache state machine, and derived
//!   quantities (weighted SSE, population-size function, log-determinant).
//! - [`gradient`]: analytic gradients, the diagonal Hessian, and the
//!   central-difference cross-check.
//! - [`field_mode`]: L-BFGS maximization of the `γ` conditional with
//!   Laplace standard errors.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each submodule; randomized cross-module
//!   properties live in `tests/integration_skyride_pipeline.rs`.

pub mod field_mode;
pub mod gradient;
pub mod skyride;
pub mod terms;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::field_mode::{FieldConditional, FieldConditionalData, FieldMode};
pub use self::gradient::{GradientCheck, GradientTarget};
pub use self::skyride::{LikelihoodState, SkyLikelihood, TermValues};
pub use self::terms::{MissingCovariateBlock, RegressionTerm, SamplingTerm};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::field_mode::FieldMode;
    pub use super::gradient::GradientTarget;
    pub use super::skyride::SkyLikelihood;
    pub use super::terms::{MissingCovariateBlock, RegressionTerm, SamplingTerm};
}
