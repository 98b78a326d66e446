//! optimization::errors — error surface for the field-mode optimizer.
//!
//! Purpose
//! -------
//! Collect every failure the optimizer layer can report into one enum,
//! [`OptError`], with the alias [`OptResult<T>`]. Configuration mistakes,
//! invalid objective values, backend (`argmin`) failures, and errors raised
//! by the likelihood model itself all travel through this type.
//!
//! Key behaviors
//! -------------
//! - `From<argmin::core::Error>` downcasts to [`ArgminError`] where possible
//!   so callers see the backend category instead of an opaque message.
//! - `From<SkyError>` wraps model errors unchanged; the reverse conversion
//!   in [`crate::coalescent::errors`] unwraps them again, so a model error
//!   raised inside an objective reaches the caller intact.
//!
//! Conventions
//! -----------
//! - Variants carry plain data (`f64`, `usize`, `&'static str`, `String`)
//!   and derive `Clone + PartialEq` for test assertions.
use argmin::core::{ArgminError, Error};
#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};

use crate::coalescent::errors::SkyError;

/// Result alias used throughout the optimizer layer.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Derivatives ----
    /// The objective does not provide an analytic gradient.
    GradientNotImplemented,
    GradientDimMismatch {
        expected: usize,
        found: usize,
    },
    InvalidGradient {
        index: usize,
        value: f64,
        reason: &'static str,
    },
    HessianDimMismatch {
        expected: usize,
        found: (usize, usize),
    },
    InvalidHessian {
        row: usize,
        col: usize,
        value: f64,
    },

    // ---- Configuration ----
    InvalidTolGrad {
        tol: f64,
        reason: &'static str,
    },
    InvalidTolCost {
        tol: f64,
        reason: &'static str,
    },
    InvalidMaxIter {
        max_iter: usize,
        reason: &'static str,
    },
    NoTolerancesProvided,
    InvalidLineSearch {
        name: String,
        reason: &'static str,
    },
    InvalidLBFGSMem {
        mem: usize,
        reason: &'static str,
    },

    // ---- Parameters and objective values ----
    ThetaLengthMismatch {
        expected: usize,
        actual: usize,
    },
    NonFiniteTheta {
        index: usize,
        value: f64,
    },
    NonFiniteCost {
        value: f64,
    },
    InvalidThetaHat {
        index: usize,
        value: f64,
        reason: &'static str,
    },
    MissingThetaHat,

    // ---- Backend ----
    /// A categorized `argmin` error.
    Solver {
        kind: &'static str,
        text: String,
    },
    /// Any other error surfaced through `argmin`.
    BackendError {
        text: String,
    },

    // ---- Model ----
    /// Error raised by the likelihood model during an evaluation.
    Model(SkyError),
}

impl std::error::Error for OptError {}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptError::GradientNotImplemented => write!(f, "Analytic gradient not implemented"),
            OptError::GradientDimMismatch { expected, found } => {
                write!(f, "Gradient dimension mismatch: expected {expected}, found {found}")
            }
            OptError::InvalidGradient { index, value, reason } => {
                write!(f, "Invalid gradient at index {index}: {value}: {reason}")
            }
            OptError::HessianDimMismatch { expected, found } => write!(
                f,
                "Hessian dimension mismatch: expected ({expected}, {expected}), found {found:?}"
            ),
            OptError::InvalidHessian { row, col, value } => {
                write!(f, "Invalid Hessian at ({row}, {col}): {value}, must be finite")
            }

            OptError::InvalidTolGrad { tol, reason } => {
                write!(f, "Invalid gradient tolerance {tol}: {reason}")
            }
            OptError::InvalidTolCost { tol, reason } => {
                write!(f, "Invalid cost change tolerance {tol}: {reason}")
            }
            OptError::InvalidMaxIter { max_iter, reason } => {
                write!(f, "Invalid maximum iterations {max_iter}: {reason}")
            }
            OptError::NoTolerancesProvided => write!(f, "No tolerances provided"),
            OptError::InvalidLineSearch { name, reason } => {
                write!(f, "Invalid line searcher '{name}': {reason}")
            }
            OptError::InvalidLBFGSMem { mem, reason } => {
                write!(f, "Invalid L-BFGS memory {mem}: {reason}")
            }

            OptError::ThetaLengthMismatch { expected, actual } => {
                write!(f, "Theta length mismatch: expected {expected}, actual {actual}")
            }
            OptError::NonFiniteTheta { index, value } => {
                write!(f, "Non-finite theta at index {index}: {value}")
            }
            OptError::NonFiniteCost { value } => write!(f, "Non-finite objective value: {value}"),
            OptError::InvalidThetaHat { index, value, reason } => {
                write!(f, "Invalid estimated parameter at index {index}: {value}: {reason}")
            }
            OptError::MissingThetaHat => write!(f, "Solver returned no parameter estimate"),

            OptError::Solver { kind, text } => write!(f, "Solver error ({kind}): {text}"),
            OptError::BackendError { text } => write!(f, "Backend error: {text}"),

            OptError::Model(err) => write!(f, "Model error: {err}"),
        }
    }
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast::<ArgminError>() {
            Ok(argmin_err) => {
                let (kind, text) = match argmin_err {
                    ArgminError::InvalidParameter { text } => ("invalid parameter", text),
                    ArgminError::NotImplemented { text } => ("not implemented", text),
                    ArgminError::NotInitialized { text } => ("not initialized", text),
                    ArgminError::ConditionViolated { text } => ("condition violated", text),
                    ArgminError::CheckpointNotFound { text } => ("checkpoint not found", text),
                    ArgminError::PotentialBug { text } => ("potential bug", text),
                    ArgminError::ImpossibleError { text } => ("impossible error", text),
                    other => ("other", other.to_string()),
                };
                OptError::Solver { kind, text }
            }
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

impl From<SkyError> for OptError {
    fn from(err: SkyError) -> Self {
        OptError::Model(err)
    }
}

/// Convert an [`OptError`] into a Python `ValueError`.
#[cfg(feature = "python-bindings")]
impl From<OptError> for PyErr {
    fn from(err: OptError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Recovery of an `OptError` that was boxed into an `argmin` error.
    // - Categorization of `ArgminError` values.
    // - Wrapping of model errors.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // An `OptError` returned from inside an objective comes back unchanged
    // after passing through `argmin::core::Error`.
    //
    // Given
    // -----
    // - `OptError::NonFiniteCost` converted into `argmin::core::Error`.
    //
    // Expect
    // ------
    // - Converting back yields the same variant and value.
    fn from_argmin_error_recovers_boxed_opt_error() {
        // Arrange
        let boxed: Error = OptError::NonFiniteCost { value: f64::INFINITY }.into();

        // Act
        let recovered = OptError::from(boxed);

        // Assert
        assert_eq!(recovered, OptError::NonFiniteCost { value: f64::INFINITY });
    }

    #[test]
    // Purpose
    // -------
    // Backend errors are categorized by kind.
    //
    // Given
    // -----
    // - `ArgminError::ConditionViolated` boxed as `argmin::core::Error`.
    //
    // Expect
    // ------
    // - `OptError::Solver` with kind "condition violated" and the message.
    fn from_argmin_error_categorizes_backend_errors() {
        // Arrange
        let boxed: Error = ArgminError::ConditionViolated { text: "bad step".to_string() }.into();

        // Act
        let converted = OptError::from(boxed);

        // Assert
        assert_eq!(
            converted,
            OptError::Solver { kind: "condition violated", text: "bad step".to_string() }
        );
    }

    #[test]
    // Purpose
    // -------
    // Model errors are wrapped without loss.
    //
    // Given
    // -----
    // - `SkyError::InvalidPrecision`.
    //
    // Expect
    // ------
    // - `OptError::Model` carrying the same error; its message mentions it.
    fn from_sky_error_wraps_model_error() {
        // Arrange
        let err = SkyError::InvalidPrecision { value: -1.0 };

        // Act
        let wrapped = OptError::from(err.clone());

        // Assert
        assert_eq!(wrapped, OptError::Model(err.clone()));
        assert!(wrapped.to_string().contains(&err.to_string()));
    }
}
