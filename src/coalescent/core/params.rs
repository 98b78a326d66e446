//! Field parameters — log population sizes and GMRF hyperparameters.
use crate::coalescent::{
    core::validation::{validate_finite, validate_lambda, validate_precision},
    errors::SkyResult,
};
use ndarray::Array1;

/// `γ` (log population size per cell), precision `τ`, and mixing weight `λ`.
///
/// `λ = 1` gives the intrinsic (improper) random-walk prior; `λ < 1` mixes in
/// an i.i.d. component with weight `1 − λ`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldParams {
    pub log_pop_sizes: Array1<f64>,
    pub precision: f64,
    pub lambda: f64,
}

impl FieldParams {
    /// Validated parameters. The field length is checked later against the
    /// genealogies.
    pub fn new(log_pop_sizes: Array1<f64>, precision: f64, lambda: f64) -> SkyResult<Self> {
        validate_finite("log_pop_sizes", log_pop_sizes.view())?;
        validate_precision(precision)?;
        validate_lambda(lambda)?;
        Ok(Self { log_pop_sizes, precision, lambda })
    }

    /// Constant field `γ_i = level` with `λ = 1`.
    pub fn constant(n: usize, level: f64, precision: f64) -> SkyResult<Self> {
        Self::new(Array1::from_elem(n, level), precision, 1.0)
    }

    pub fn len(&self) -> usize {
        self.log_pop_sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_pop_sizes.is_empty()
    }

    pub fn copy_from(&mut self, other: &Self) {
        self.log_pop_sizes.assign(&other.log_pop_sizes);
        self.precision = other.precision;
        self.lambda = other.lambda;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coalescent::errors::SkyError;
    use ndarray::array;

    #[test]
    fn new_validates_hyperparameters() {
        assert!(FieldParams::new(array![0.0, 1.0], 1.0, 0.5).is_ok());
        assert_eq!(
            FieldParams::new(array![0.0, 1.0], 0.0, 1.0),
            Err(SkyError::InvalidPrecision { value: 0.0 })
        );
        assert!(matches!(
            FieldParams::new(array![0.0, f64::NAN], 1.0, 1.0),
            Err(SkyError::NonFiniteParameter { name: "log_pop_sizes", index: 1, .. })
        ));
        let p = FieldParams::constant(3, 0.5, 2.0).unwrap();
        assert_eq!(p.log_pop_sizes, array![0.5, 0.5, 0.5]);
        assert_eq!(p.lambda, 1.0);
    }
}
