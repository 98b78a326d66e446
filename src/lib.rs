//! rust_skygrid — GMRF skyride/skygrid coalescent likelihoods with Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the skyride/skygrid likelihood to Python via the `_rust_skygrid`
//! extension module. The numerical work lives in the inner modules; this
//! file only wires them together and, with `python-bindings`, defines the
//! Python-facing classes.
//!
//! Key behaviors
//! -------------
//! - Re-export the core modules: [`coalescent`] (genealogies, intervals,
//!   statistics, weight matrices, the cached likelihood, gradients),
//!   [`optimization`] (L-BFGS field-mode fitting), and [`inference`]
//!   (Laplace standard errors).
//! - Define `#[pyclass]` wrappers (`Skyride`, `FieldModeResult`) and the
//!   `#[pymodule]` initializer when `python-bindings` is enabled.
//!
//! Invariants & assumptions
//! ------------------------
//! - The Python wrapper owns exactly one genealogy (tip and internal node
//!   heights); multi-locus likelihoods are available from Rust.
//! - Errors are rich Rust enums internally and become `ValueError` at the
//!   PyO3 boundary.
//!
//! Conventions
//! -----------
//! - Times are heights before the most recent sample; arrays are 0-based.
//! - The library emits `tracing` events but never installs a subscriber.
//!
//! Downstream usage
//! ----------------
//! - Rust callers: `use rust_skygrid::coalescent::prelude::*;`, build a
//!   [`SkyLikelihood`](coalescent::SkyLikelihood) and drive it from a
//!   sampler.
//! - Python callers: `from rust_skygrid import Skyride`.
//!
//! Testing notes
//! -------------
//! - Numerical behavior is covered by unit tests in the inner modules and by
//!   `tests/integration_skyride_pipeline.rs`; the PyO3 layer is thin glue.

pub mod coalescent;
pub mod inference;
pub mod optimization;
pub mod utils;

#[cfg(feature = "python-bindings")]
use ndarray::Array1;

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    coalescent::{
        core::{genealogy::NodeHeights, params::FieldParams},
        models::{
            field_mode::FieldMode, gradient::GradientTarget, skyride::SkyLikelihood,
            terms::SamplingTerm,
        },
    },
    utils::{extract_f64_vec, extract_mle_opts, extract_sky_options},
};

/// Skyride — Python-facing wrapper for a single-genealogy skyride/skygrid
/// likelihood.
///
/// Parameters
/// ----------
/// Constructed from Python via
/// `Skyride(tips, internal, log_pop_sizes=None, precision=1.0, lambda_=1.0,
/// grid=None, smoothing='time_aware', rescale_by_root_height=False,
/// ploidy=None, sampling=None)`:
/// - `tips`, `internal`: node heights (array-likes of float64).
/// - `log_pop_sizes`: initial field; zeros of the field length when `None`.
/// - `grid`: ascending grid points; selects the skygrid layout.
/// - `sampling`: `(β₀, β₁)` for the sampling-time term.
///
/// Notes
/// -----
/// - Marked `unsendable`: the likelihood owns a mutable cache.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "rust_skygrid.coalescent", unsendable)]
pub struct Skyride {
    pub inner: SkyLikelihood<NodeHeights>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl Skyride {
    #[new]
    #[pyo3(
        signature = (
            tips,
            internal,
            log_pop_sizes = None,
            precision = 1.0,
            lambda_ = 1.0,
            grid = None,
            smoothing = None,
            rescale_by_root_height = false,
            ploidy = None,
            sampling = None,
        ),
        text_signature = "(tips, internal, /, log_pop_sizes=None, precision=1.0, lambda_=1.0, \
                          grid=None, smoothing='time_aware', rescale_by_root_height=False, \
                          ploidy=None, sampling=None)"
    )]
    pub fn new<'py>(
        py: Python<'py>, tips: &Bound<'py, PyAny>, internal: &Bound<'py, PyAny>,
        log_pop_sizes: Option<&Bound<'py, PyAny>>, precision: f64, lambda_: f64,
        grid: Option<&Bound<'py, PyAny>>, smoothing: Option<&str>, rescale_by_root_height: bool,
        ploidy: Option<f64>, sampling: Option<(f64, f64)>,
    ) -> PyResult<Self> {
        let tips = extract_f64_vec(py, tips, "tips")?;
        let internal = extract_f64_vec(py, internal, "internal")?;
        let grid = grid.map(|g| extract_f64_vec(py, g, "grid")).transpose()?;
        let field_length = match &grid {
            Some(points) => points.len() + 1,
            None => internal.len(),
        };
        let gamma = match log_pop_sizes {
            Some(raw) => Array1::from(extract_f64_vec(py, raw, "log_pop_sizes")?),
            None => Array1::zeros(field_length),
        };
        let options = extract_sky_options(grid, smoothing, rescale_by_root_height, ploidy)?;
        let params = FieldParams::new(gamma, precision, lambda_)?;
        let genealogy = NodeHeights::new(tips, internal)?;
        let mut inner = SkyLikelihood::new(vec![genealogy], params, options)?;
        if let Some((intercept, power)) = sampling {
            inner = inner.with_sampling(SamplingTerm::new(intercept, power)?);
        }
        Ok(Skyride { inner })
    }

    /// Composite log-likelihood at the current state.
    pub fn log_likelihood(&mut self) -> PyResult<f64> {
        Ok(self.inner.log_likelihood()?)
    }

    /// Analytic gradient; `target` is one of `'log_pop_sizes'`,
    /// `'interval_lengths'`, `'precision'`, `'beta'`.
    #[pyo3(signature = (target = "log_pop_sizes"))]
    pub fn gradient(&mut self, target: &str) -> PyResult<Vec<f64>> {
        let target = match target {
            "log_pop_sizes" => GradientTarget::LogPopulationSizes,
            "interval_lengths" => GradientTarget::CoalescentIntervalLengths,
            "precision" => GradientTarget::Precision,
            "beta" => GradientTarget::RegressionCoefficients,
            other => {
                return Err(PyValueError::new_err(format!("unknown gradient target '{other}'")));
            }
        };
        Ok(self.inner.gradient_log_density(target)?.to_vec())
    }

    /// `(interval_lengths, stats, num_coal_events, ploidy_sums, cell_end_times)`.
    #[allow(clippy::type_complexity)]
    pub fn sufficient_statistics(
        &mut self,
    ) -> PyResult<(Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>)> {
        let s = self.inner.sufficient_statistics()?;
        Ok((
            s.interval_lengths.to_vec(),
            s.stats.to_vec(),
            s.num_coal_events.to_vec(),
            s.ploidy_sums.to_vec(),
            s.cell_end_times.to_vec(),
        ))
    }

    pub fn coalescent_interval_heights(&mut self) -> PyResult<Vec<f64>> {
        Ok(self.inner.coalescent_interval_heights()?.to_vec())
    }

    pub fn store_state(&mut self) {
        self.inner.store_state();
    }

    pub fn restore_state(&mut self) -> PyResult<()> {
        Ok(self.inner.restore_state()?)
    }

    pub fn accept_state(&mut self) {
        self.inner.accept_state();
    }

    pub fn set_log_pop_sizes<'py>(
        &mut self, py: Python<'py>, values: &Bound<'py, PyAny>,
    ) -> PyResult<()> {
        let values = Array1::from(extract_f64_vec(py, values, "values")?);
        Ok(self.inner.set_log_pop_sizes(values.view())?)
    }

    pub fn set_precision(&mut self, precision: f64) -> PyResult<()> {
        Ok(self.inner.set_precision(precision)?)
    }

    pub fn set_lambda(&mut self, lambda_: f64) -> PyResult<()> {
        Ok(self.inner.set_lambda(lambda_)?)
    }

    pub fn set_internal_height(&mut self, index: usize, height: f64) -> PyResult<()> {
        Ok(self.inner.genealogy_mut(0)?.set_internal_height(index, height)?)
    }

    #[getter]
    pub fn log_pop_sizes(&self) -> Vec<f64> {
        self.inner.params().log_pop_sizes.to_vec()
    }

    #[getter]
    pub fn field_length(&self) -> usize {
        self.inner.field_length()
    }

    #[getter]
    pub fn extraction_count(&self) -> usize {
        self.inner.extraction_count()
    }

    /// Maximize the conditional of the log population sizes and leave the
    /// likelihood at the mode.
    #[pyo3(
        signature = (
            tol_grad = None,
            tol_cost = None,
            max_iter = None,
            line_searcher = None,
            lbfgs_mem = None,
            verbose = false,
        ),
        text_signature = "(self, /, tol_grad=None, tol_cost=None, max_iter=None, \
                          line_searcher=None, lbfgs_mem=None, verbose=False)"
    )]
    pub fn fit_field_mode(
        &mut self, tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
        line_searcher: Option<&str>, lbfgs_mem: Option<usize>, verbose: bool,
    ) -> PyResult<FieldModeResult> {
        let opts = extract_mle_opts(tol_grad, tol_cost, max_iter, line_searcher, lbfgs_mem, verbose)?;
        let inner = self.inner.fit_field_mode(&opts)?;
        Ok(FieldModeResult { inner })
    }
}

/// FieldModeResult — read-only view of a fitted field mode.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "rust_skygrid.coalescent")]
pub struct FieldModeResult {
    pub inner: FieldMode,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl FieldModeResult {
    #[getter]
    pub fn log_pop_sizes(&self) -> Vec<f64> {
        self.inner.outcome.theta_hat.to_vec()
    }

    #[getter]
    pub fn standard_errors(&self) -> Vec<f64> {
        self.inner.standard_errors.to_vec()
    }

    #[getter]
    pub fn value(&self) -> f64 {
        self.inner.outcome.value
    }

    #[getter]
    pub fn converged(&self) -> bool {
        self.inner.outcome.converged
    }

    #[getter]
    pub fn status(&self) -> String {
        self.inner.outcome.status.clone()
    }

    #[getter]
    pub fn iterations(&self) -> usize {
        self.inner.outcome.iterations
    }

    #[getter]
    pub fn grad_norm(&self) -> Option<f64> {
        self.inner.outcome.grad_norm
    }

    #[getter]
    pub fn fn_evals(&self) -> Vec<(String, u64)> {
        self.inner.outcome.fn_evals.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }
}

#[cfg(feature = "python-bindings")]
#[pymodule]
fn _rust_skygrid<'py>(py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let coalescent_mod = PyModule::new(py, "coalescent")?;
    coalescent_mod.add_class::<Skyride>()?;
    coalescent_mod.add_class::<FieldModeResult>()?;
    m.add_submodule(&coalescent_mod)?;

    // Register in sys.modules so `import rust_skygrid.coalescent` works.
    py.import("sys")?.getattr("modules")?.set_item("rust_skygrid.coalescent", coalescent_mod)?;
    Ok(())
}
