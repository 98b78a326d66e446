//! GMRF weight matrices — symmetric tridiagonal smoothing precision.
//!
//! Purpose
//! -------
//! Build and scale the first-order random-walk precision structure that ties
//! adjacent field cells together. Only the tridiagonal structure is stored;
//! dense and eigen views are produced on demand for checks and determinants.
//!
//! Key behaviors
//! -------------
//! - [`SymTridiagonal::rebuild_time_aware`]: off-diagonals
//!   `−2 / (len_i + len_{i+1}) · field_scalar`.
//! - [`SymTridiagonal::rebuild_time_unaware`]: off-diagonals `−1`.
//! - Diagonals are always rebuilt from the off-diagonals so every row sums to
//!   zero (`diag_i = −(off_{i−1} + off_i)`, ends take the single neighbor).
//! - [`SymTridiagonal::scaled`] returns a *new* matrix
//!   `τ·(1 − λ + λ·diag)` / `τ·λ·off`; the receiver is never modified.
//!
//! Invariants & assumptions
//! ------------------------
//! - Base matrices are symmetric, have non-positive off-diagonals, are
//!   diagonally dominant, and are positive semi-definite with a null space
//!   spanned by the constant vector.
//! - Zero-length adjacent cells give an infinite weight; the value is left to
//!   propagate as a non-finite likelihood.
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1};

/// Eigenvalues at or below this threshold are treated as zero by
/// [`SymTridiagonal::log_generalized_determinant`].
pub const GENERALIZED_DET_EPS: f64 = 1e-5;

/// Which end of an anchored random walk is free (diagonal 1 instead of 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeEnd {
    First,
    Last,
}

/// Symmetric tridiagonal matrix stored as its diagonal and first
/// off-diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct SymTridiagonal {
    diag: Array1<f64>,
    off_diag: Array1<f64>,
}

impl SymTridiagonal {
    /// All-zero `n × n` matrix.
    pub fn zeros(n: usize) -> Self {
        Self { diag: Array1::zeros(n), off_diag: Array1::zeros(n.saturating_sub(1)) }
    }

    /// First-order random-walk structure with unit weights.
    pub fn random_walk(n: usize) -> Self {
        let mut m = Self::zeros(n);
        m.rebuild_time_unaware();
        m
    }

    /// Random walk anchored at one end: diagonal 2 except 1 at the free end,
    /// off-diagonals −1. Used for missing covariate blocks, where the anchored
    /// end sits next to an observed value.
    pub fn anchored_random_walk(n: usize, free_end: FreeEnd) -> Self {
        let mut diag = Array1::from_elem(n, 2.0);
        if n > 0 {
            match free_end {
                FreeEnd::First => diag[0] = 1.0,
                FreeEnd::Last => diag[n - 1] = 1.0,
            }
        }
        Self { diag, off_diag: Array1::from_elem(n.saturating_sub(1), -1.0) }
    }

    pub fn len(&self) -> usize {
        self.diag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diag.is_empty()
    }

    pub fn diag(&self) -> ArrayView1<'_, f64> {
        self.diag.view()
    }

    pub fn off_diag(&self) -> ArrayView1<'_, f64> {
        self.off_diag.view()
    }

    /// Off-diagonals from adjacent cell lengths.
    ///
    /// `lengths` must have `len()` entries; extra entries are ignored.
    pub fn rebuild_time_aware(&mut self, lengths: ArrayView1<f64>, field_scalar: f64) {
        for (i, off) in self.off_diag.iter_mut().enumerate() {
            *off = -2.0 / (lengths[i] + lengths[i + 1]) * field_scalar;
        }
        self.fill_diagonal();
    }

    /// Unit off-diagonals.
    pub fn rebuild_time_unaware(&mut self) {
        self.off_diag.fill(-1.0);
        self.fill_diagonal();
    }

    fn fill_diagonal(&mut self) {
        let n = self.diag.len();
        self.diag.fill(0.0);
        for (i, &off) in self.off_diag.iter().enumerate() {
            self.diag[i] -= off;
            self.diag[i + 1] -= off;
        }
        if n == 1 {
            self.diag[0] = 0.0;
        }
    }

    /// `τ·(1 − λ + λ·diag)` on the diagonal and `τ·λ·off` off it.
    pub fn scaled(&self, precision: f64, lambda: f64) -> Self {
        Self {
            diag: self.diag.mapv(|d| precision * (1.0 - lambda + lambda * d)),
            off_diag: self.off_diag.mapv(|o| precision * lambda * o),
        }
    }

    /// Matrix–vector product `Q v`.
    pub fn mul_vec(&self, v: ArrayView1<f64>) -> Array1<f64> {
        let mut out = &self.diag * &v;
        for (i, &off) in self.off_diag.iter().enumerate() {
            out[i] += off * v[i + 1];
            out[i + 1] += off * v[i];
        }
        out
    }

    /// `vᵀ Q v`.
    pub fn quadratic_form(&self, v: ArrayView1<f64>) -> f64 {
        let diagonal: f64 = self.diag.iter().zip(v.iter()).map(|(d, x)| d * x * x).sum();
        let off: f64 =
            self.off_diag.iter().enumerate().map(|(i, &o)| o * v[i] * v[i + 1]).sum();
        diagonal + 2.0 * off
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let n = self.len();
        let mut out = Array2::zeros((n, n));
        for i in 0..n {
            out[[i, i]] = self.diag[i];
        }
        for (i, &off) in self.off_diag.iter().enumerate() {
            out[[i, i + 1]] = off;
            out[[i + 1, i]] = off;
        }
        out
    }

    /// Eigenvalues in ascending order.
    pub fn eigenvalues(&self) -> Vec<f64> {
        let dense = self.to_dense();
        let n = self.len();
        let m = DMatrix::from_fn(n, n, |r, c| dense[[r, c]]);
        let mut values: Vec<f64> = m.symmetric_eigen().eigenvalues.iter().copied().collect();
        values.sort_by(f64::total_cmp);
        values
    }

    /// Sum of `ln λ` over eigenvalues above [`GENERALIZED_DET_EPS`].
    pub fn log_generalized_determinant(&self) -> f64 {
        self.eigenvalues().into_iter().filter(|&v| v > GENERALIZED_DET_EPS).map(f64::ln).sum()
    }

    /// `|diag_i| >= Σ_j≠i |Q_ij|` for every row.
    pub fn is_diagonally_dominant(&self) -> bool {
        let n = self.len();
        (0..n).all(|i| {
            let left = if i > 0 { self.off_diag[i - 1].abs() } else { 0.0 };
            let right = if i + 1 < n { self.off_diag[i].abs() } else { 0.0 };
            self.diag[i].abs() + 1e-12 >= left + right
        })
    }

    /// Value copy into existing buffers of the same size.
    pub fn copy_from(&mut self, other: &Self) {
        self.diag.assign(&other.diag);
        self.off_diag.assign(&other.off_diag);
    }
}
