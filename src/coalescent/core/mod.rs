//! coalescent::core — genealogies, intervals, statistics, and GMRF structure.
//!
//! Purpose
//! -------
//! Hold the numerical and structural building blocks of the skyride/skygrid
//! likelihood that do not depend on how the terms are combined: the
//! genealogy contract, interval extraction, sufficient statistics, the
//! tridiagonal weight matrix, configuration, parameters, the cache, and the
//! demographic-function contract.
//!
//! Key behaviors
//! -------------
//! - [`intervals`] merges loci, grid points, and covariate markers into one
//!   event sequence with a deterministic tie-break.
//! - [`statistics`] folds that sequence into per-cell arrays for either layout.
//! - [`weights`] builds and scales the symmetric tridiagonal precision.
//! - [`cache`] carries the explicit dirty state and value snapshots.
//!
//! Conventions
//! -----------
//! - Times are heights before the most recent sample; indices are 0-based.
//! - Structural anomalies are logged with `tracing` and never abort;
//!   dimension errors surface as [`SkyError`](crate::coalescent::errors::SkyError).
//!
//! Testing notes
//! -------------
//! - Each submodule carries unit tests for its own invariants (ordering,
//!   cell assignment, matrix properties, cache round trips, closed-form
//!   integrals). Cross-module properties live in the likelihood tests and
//!   `tests/integration_skyride_pipeline.rs`.

pub mod cache;
pub mod demographic;
pub mod events;
pub mod genealogy;
pub mod grid;
pub mod intervals;
pub mod options;
pub mod params;
pub mod statistics;
pub mod validation;
pub mod weights;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::cache::{CacheState, Snapshot, StateCache};
pub use self::demographic::{Demographic, DemographicFunction, coalescent_log_likelihood};
pub use self::events::{CoalescentInterval, Event, EventKind, IntervalList, MarkerPosition};
pub use self::genealogy::{Genealogy, NodeHeights};
pub use self::grid::{CovariateMarkers, GridPoints};
pub use self::intervals::IntervalExtractor;
pub use self::options::{FieldLayout, SkyOptions, Smoothing};
pub use self::params::FieldParams;
pub use self::statistics::{SufficientStatistics, compute_skygrid, compute_skyride};
pub use self::weights::{FreeEnd, SymTridiagonal};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::cache::CacheState;
    pub use super::demographic::{Demographic, DemographicFunction};
    pub use super::genealogy::{Genealogy, NodeHeights};
    pub use super::grid::{CovariateMarkers, GridPoints};
    pub use super::options::{FieldLayout, SkyOptions, Smoothing};
    pub use super::params::FieldParams;
    pub use super::statistics::SufficientStatistics;
    pub use super::weights::SymTridiagonal;
}
