//! Errors for the coalescent core (genealogy validation, field dimensions,
//! hyperparameters, unsupported requests, and cache misuse).
//!
//! This module defines [`SkyError`] and the [`SkyResult`] alias used by every
//! layer of the skyride/skygrid stack. The enum implements `Display`/`Error`
//! and, when the `python-bindings` feature is enabled, converts into a Python
//! `ValueError` at the PyO3 boundary.
//!
//! ## Conventions
//! - **Indices are 0-based.** `locus` indexes the genealogy list handed to the
//!   likelihood; `index` indexes the array named in the variant.
//! - Dimension mismatches are fatal and reported at construction time; the
//!   core never truncates or pads a parameter to make it fit.
//! - Non-finite log-likelihood *values* are not errors. They are returned as
//!   plain `f64` and left for the sampler to reject.
use crate::optimization::errors::OptError;
#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*};

/// Result alias for coalescent operations that may produce [`SkyError`].
pub type SkyResult<T> = Result<T, SkyError>;

/// Unified error type for the skyride/skygrid likelihood.
#[derive(Debug, Clone, PartialEq)]
pub enum SkyError {
    // ---- Genealogy validation ----
    /// No genealogy was supplied.
    EmptyGenealogySet,

    /// A node height is NaN/±inf.
    NonFiniteHeight { locus: usize, index: usize, value: f64 },

    /// A node height is negative (heights are measured backward from the
    /// most recent sample).
    NegativeHeight { locus: usize, index: usize, value: f64 },

    /// Tip/internal node counts cannot describe a genealogy.
    InvalidNodeCount { locus: usize, tips: usize, internal: usize, reason: &'static str },

    /// A coalescence was reached with fewer than two lineages in its locus.
    LineageUnderflow { locus: usize, time: f64 },

    /// Requested locus does not exist.
    LocusOutOfRange { locus: usize, loci: usize },

    /// Requested node index does not exist.
    NodeOutOfRange { index: usize, len: usize },

    // ---- Field / dimension checks ----
    /// Population-size field length disagrees with the number of field cells.
    FieldLengthMismatch { expected: usize, actual: usize },

    /// The GMRF needs at least two cells.
    FieldTooShort { length: usize },

    /// A parameter entry is NaN/±inf.
    NonFiniteParameter { name: &'static str, index: usize, value: f64 },

    /// One ploidy factor is required per locus.
    PloidyLengthMismatch { expected: usize, actual: usize },

    /// Ploidy factors must be finite and > 0.
    InvalidPloidy { locus: usize, value: f64 },

    // ---- Hyperparameters ----
    /// Precision must be finite and > 0.
    InvalidPrecision { value: f64 },

    /// Lambda must lie in [0, 1].
    InvalidLambda { value: f64 },

    // ---- Grid / covariates ----
    /// Skygrid needs at least one grid point.
    EmptyGrid,

    /// Grid points must be finite, > 0, and strictly increasing.
    InvalidGridPoint { index: usize, value: f64, reason: &'static str },

    /// Covariate marker times/values must be finite and times strictly increasing.
    InvalidCovariateMarker { index: usize, value: f64, reason: &'static str },

    /// Design matrix rows must equal the field length.
    DesignRowsMismatch { expected: usize, actual: usize },

    /// Regression coefficients must match the number of design columns.
    BetaLengthMismatch { expected: usize, actual: usize },

    /// A design column referenced by a covariate feature does not exist or is
    /// configured inconsistently.
    InvalidCovariateColumn { column: usize, reason: &'static str },

    /// Observed-index bounds for missing covariate imputation are invalid.
    InvalidObservedRange { first: usize, last: usize, len: usize },

    // ---- Unsupported / lifecycle ----
    /// The requested operation is not available for this configuration.
    NotImplemented { operation: &'static str, reason: &'static str },

    /// `restore_state` was called before any `store_state`.
    NoStoredState,

    /// The field-mode optimizer failed; carries the optimizer message.
    OptimizationFailed { status: String },
}

impl std::error::Error for SkyError {}

impl std::fmt::Display for SkyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Genealogy validation ----
            SkyError::EmptyGenealogySet => write!(f, "At least one genealogy is required"),
            SkyError::NonFiniteHeight { locus, index, value } => {
                write!(f, "Node height {index} of locus {locus} must be finite, got {value}")
            }
            SkyError::NegativeHeight { locus, index, value } => {
                write!(f, "Node height {index} of locus {locus} must be >= 0, got {value}")
            }
            SkyError::InvalidNodeCount { locus, tips, internal, reason } => write!(
                f,
                "Locus {locus} has {tips} tips and {internal} internal nodes: {reason}"
            ),
            SkyError::LineageUnderflow { locus, time } => write!(
                f,
                "Locus {locus} coalesces at time {time} with fewer than two lineages"
            ),
            SkyError::LocusOutOfRange { locus, loci } => {
                write!(f, "Locus {locus} out of range for {loci} genealogies")
            }
            SkyError::NodeOutOfRange { index, len } => {
                write!(f, "Node index {index} out of range for {len} nodes")
            }

            // ---- Field / dimension checks ----
            SkyError::FieldLengthMismatch { expected, actual } => {
                write!(f, "Field length mismatch: expected {expected} cells, got {actual}")
            }
            SkyError::FieldTooShort { length } => {
                write!(f, "The GMRF field needs at least 2 cells, got {length}")
            }
            SkyError::NonFiniteParameter { name, index, value } => {
                write!(f, "Parameter {name}[{index}] must be finite, got {value}")
            }
            SkyError::PloidyLengthMismatch { expected, actual } => {
                write!(f, "Ploidy length mismatch: expected {expected}, got {actual}")
            }
            SkyError::InvalidPloidy { locus, value } => {
                write!(f, "Ploidy factor of locus {locus} must be finite and > 0, got {value}")
            }

            // ---- Hyperparameters ----
            SkyError::InvalidPrecision { value } => {
                write!(f, "Precision must be finite and > 0, got {value}")
            }
            SkyError::InvalidLambda { value } => {
                write!(f, "Lambda must lie in [0, 1], got {value}")
            }

            // ---- Grid / covariates ----
            SkyError::EmptyGrid => write!(f, "Skygrid layout requires at least one grid point"),
            SkyError::InvalidGridPoint { index, value, reason } => {
                write!(f, "Invalid grid point {index} ({value}): {reason}")
            }
            SkyError::InvalidCovariateMarker { index, value, reason } => {
                write!(f, "Invalid covariate marker {index} ({value}): {reason}")
            }
            SkyError::DesignRowsMismatch { expected, actual } => {
                write!(f, "Design matrix rows mismatch: expected {expected}, got {actual}")
            }
            SkyError::BetaLengthMismatch { expected, actual } => {
                write!(f, "Regression coefficient length mismatch: expected {expected}, got {actual}")
            }
            SkyError::InvalidCovariateColumn { column, reason } => {
                write!(f, "Invalid covariate column {column}: {reason}")
            }
            SkyError::InvalidObservedRange { first, last, len } => write!(
                f,
                "Observed covariate range [{first}, {last}] is invalid for {len} field cells"
            ),

            // ---- Unsupported / lifecycle ----
            SkyError::NotImplemented { operation, reason } => {
                write!(f, "{operation} is not implemented: {reason}")
            }
            SkyError::NoStoredState => write!(f, "No stored state to restore"),
            SkyError::OptimizationFailed { status } => {
                write!(f, "Field-mode optimization failed: {status}")
            }
        }
    }
}

/// Convert a [`SkyError`] into a Python `ValueError` with the error message.
#[cfg(feature = "python-bindings")]
impl std::convert::From<SkyError> for PyErr {
    fn from(err: SkyError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// Model errors raised inside an objective come back unchanged; every other
/// optimizer failure becomes [`SkyError::OptimizationFailed`].
impl From<OptError> for SkyError {
    fn from(err: OptError) -> SkyError {
        match err {
            OptError::Model(inner) => inner,
            other => SkyError::OptimizationFailed { status: other.to_string() },
        }
    }
}
