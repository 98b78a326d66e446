//! loglik_optimizer::types — numeric aliases and L-BFGS wiring.
//!
//! Every optimizer module names vectors, matrices, and solvers through these
//! aliases so the `ndarray`/`argmin` generics appear in one place only.
//! `Theta` is the free parameter vector (for the field mode, the log
//! population sizes `γ`); `Cost` is always the negated log-likelihood.
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Free parameter vector `θ`.
pub type Theta = Array1<f64>;

/// Gradient of the log-likelihood or of the cost; same shape as [`Theta`].
pub type Grad = Array1<f64>;

/// Dense `θ.len() × θ.len()` second-derivative matrix.
pub type Hessian = Array2<f64>;

/// Scalar cost `c(θ) = −ℓ(θ)`.
pub type Cost = f64;

/// Function-evaluation counters reported by `argmin` (e.g. `"cost_count"`).
pub type FnEvalMap = HashMap<String, u64>;

/// L-BFGS history length used when the options leave it unset.
pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;
