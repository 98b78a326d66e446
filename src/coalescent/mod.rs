//! coalescent — GMRF skyride/skygrid coalescent likelihoods.
//!
//! Purpose
//! -------
//! Estimate a piecewise-constant effective population size from one or more
//! genealogies under a Gaussian Markov random field smoothing prior. The
//! module turns node heights into an event sequence, folds it into
//! sufficient statistics, builds the tridiagonal precision, and evaluates a
//! cached composite log-likelihood with analytic gradients for use inside a
//! Markov-chain sampler.
//!
//! Key behaviors
//! -------------
//! - [`core`] holds the layout-independent machinery (genealogy contract,
//!   interval extraction, statistics, weights, options, cache, demographic
//!   functions).
//! - [`models`] combines them into [`SkyLikelihood`](models::SkyLikelihood)
//!   and adds gradients and field-mode fitting.
//! - [`errors`] defines [`SkyError`](errors::SkyError).
//!
//! Invariants & assumptions
//! ------------------------
//! - Single-threaded: the likelihood owns its cache and mutates it only
//!   through `&mut self`.
//! - `field_length == γ.len()` is checked at construction and on every
//!   setter; nothing is truncated or padded.
//!
//! Downstream usage
//! ----------------
//! - `use rust_skygrid::coalescent::prelude::*;` brings in the genealogy
//!   types, options, parameters, and the likelihood.

pub mod core;
pub mod errors;
pub mod models;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::errors::{SkyError, SkyResult};
pub use self::models::{GradientTarget, SkyLikelihood};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::core::prelude::*;
    pub use super::errors::{SkyError, SkyResult};
    pub use super::models::prelude::*;
}
