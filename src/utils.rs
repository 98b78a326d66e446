//! utils — conversion helpers for the Python bindings.
//!
//! Every item here is compiled only with the `python-bindings` feature. The
//! helpers turn loosely typed Python arguments (NumPy arrays, pandas
//! Series, sequences, option strings) into the validated Rust types the
//! coalescent and optimizer layers expect, mapping failures to `PyErr`.
#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArrayMethods, PyReadonlyArray1};

#[cfg(feature = "python-bindings")]
use crate::{
    coalescent::core::{grid::GridPoints, options::SkyOptions, options::Smoothing},
    optimization::loglik_optimizer::{LineSearcher, MLEOptions, Tolerances},
};

/// Borrow a 1-D `f64` array from a NumPy array, a pandas Series, or any
/// float sequence (copied once in the last case).
#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr.as_slice().is_ok() {
            return Ok(arr);
        }
    }
    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(series) = obj.extract::<PyReadonlyArray1<f64>>() {
            if series.as_slice().is_ok() {
                return Ok(series);
            }
        }
    }
    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        pyo3::exceptions::PyTypeError::new_err(
            "expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64",
        )
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Owned copy of an array-like argument; `name` is used in the error message.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_vec<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>, name: &str,
) -> PyResult<Vec<f64>> {
    let arr = extract_f64_array(py, raw_data)?;
    let slice = arr.as_slice().map_err(|_| {
        PyValueError::new_err(format!("{name} must be a 1-D contiguous float64 array or sequence"))
    })?;
    Ok(slice.to_vec())
}

/// Build [`MLEOptions`] from optional Python keyword arguments.
#[cfg(feature = "python-bindings")]
pub fn extract_mle_opts(
    tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    line_searcher: Option<&str>, lbfgs_mem: Option<usize>, verbose: bool,
) -> PyResult<MLEOptions> {
    let defaults = MLEOptions::default();
    let tols = if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
        defaults.tols
    } else {
        Tolerances::new(tol_grad, tol_cost, max_iter)?
    };
    let line_searcher = match line_searcher {
        Some(name) => name.parse::<LineSearcher>()?,
        None => defaults.line_searcher,
    };
    Ok(MLEOptions::new(tols, line_searcher, verbose, lbfgs_mem)?)
}

/// Build [`SkyOptions`]: the skygrid layout when `grid` is given, else the
/// skyride layout.
#[cfg(feature = "python-bindings")]
pub fn extract_sky_options(
    grid: Option<Vec<f64>>, smoothing: Option<&str>, rescale_by_root_height: bool,
    ploidy: Option<f64>,
) -> PyResult<SkyOptions> {
    let mut opts = match grid {
        Some(points) => SkyOptions::skygrid(GridPoints::new(points)?),
        None => SkyOptions::default(),
    };
    let smoothing = match smoothing.map(str::to_ascii_lowercase).as_deref() {
        None | Some("time_aware") => Smoothing::TimeAware,
        Some("time_unaware") => Smoothing::TimeUnaware,
        Some(other) => {
            return Err(PyValueError::new_err(format!(
                "unknown smoothing '{other}': expected 'time_aware' or 'time_unaware'"
            )));
        }
    };
    opts = opts.with_smoothing(smoothing).with_root_height_rescaling(rescale_by_root_height);
    if let Some(p) = ploidy {
        opts = opts.with_ploidy(vec![p]);
    }
    Ok(opts)
}
