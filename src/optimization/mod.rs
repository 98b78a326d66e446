//! optimization — L-BFGS maximization and its error surface.
//!
//! Purpose
//! -------
//! Provide the optimizer the coalescent layer uses for field-mode fitting:
//! an `argmin`-backed maximizer of log-likelihoods ([`loglik_optimizer`])
//! and a single error type ([`errors::OptError`]) that normalizes
//! configuration mistakes, numerical failures, backend errors, and model
//! errors.
//!
//! Conventions
//! -----------
//! - Solvers maximize `ℓ(θ)` by minimizing `−ℓ(θ)`; every user-facing value
//!   is expressed in terms of `ℓ`.
//! - Fallible entry points return [`errors::OptResult`]; raw `argmin` errors
//!   never cross the module boundary.
//! - Progress is reported through `tracing` events; the optional `obs_slog`
//!   feature adds the `argmin` terminal observer.

pub mod errors;
pub mod loglik_optimizer;

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
}
