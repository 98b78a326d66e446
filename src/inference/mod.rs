//! inference — uncertainty for fitted field modes.
//!
//! Purpose
//! -------
//! Convert observed information at a mode into standard errors. The
//! coalescent layer passes the analytic information of the field
//! conditional (`Q + diag(stats·e^{−γ})` plus the sampling curvature);
//! the finite-difference route exists for objectives without one.
//!
//! Conventions
//! -----------
//! - Errors reuse [`OptError`](crate::optimization::errors::OptError), since
//!   every input here is optimizer output.

pub mod hessian;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::hessian::{EIGEN_EPS, calc_standard_errors, standard_errors_from_information};

// ---- Optional convenience prelude for downstream crates ------------------

pub mod prelude {
    pub use super::hessian::{calc_standard_errors, standard_errors_from_information};
}
