//! Demographic functions — population size through time.
//!
//! Purpose
//! -------
//! Provide the narrow "size at time t" contract used to compare the
//! nonparametric field with parametric growth models, and the coalescent
//! log-likelihood of an interval sequence under any such function.
//!
//! Key behaviors
//! -------------
//! - [`DemographicFunction`]: `size_at(t)` and the closed-form
//!   `∫_{t0}^{t1} 1 / N(t) dt`.
//! - [`Demographic`]: constant, exponential, logistic, expansion, and
//!   piecewise-constant variants. The piecewise variant is what the field
//!   describes: `exp(γ_i)` on right-closed cells.
//! - [`coalescent_log_likelihood`]:
//!   `Σ_events ln(1 / (ploidy_l · N(t))) − Σ_intervals pair_weight · ∫ 1/N`.
//!
//! Conventions
//! -----------
//! - Times are heights (backward in time). Growth rates are positive when the
//!   population grows toward the present, i.e. `N` shrinks with height.
//! - A zero growth rate degenerates to the constant model; the closed forms
//!   switch branches instead of dividing by zero.
use crate::coalescent::core::events::IntervalList;

/// Population size as a function of time.
pub trait DemographicFunction {
    /// `N(t)`.
    fn size_at(&self, t: f64) -> f64;

    /// `∫_{t0}^{t1} 1 / N(s) ds` for `t0 <= t1`.
    fn integral_of_inverse_size(&self, t0: f64, t1: f64) -> f64;

    fn log_size_at(&self, t: f64) -> f64 {
        self.size_at(t).ln()
    }
}

/// Closed family of demographic models.
#[derive(Debug, Clone, PartialEq)]
pub enum Demographic {
    /// `N(t) = n0`.
    Constant { n0: f64 },
    /// `N(t) = n0 · e^{−r t}`.
    Exponential { n0: f64, rate: f64 },
    /// `N(t) = n0 (1 + c) / (1 + c · e^{r t})`.
    Logistic { n0: f64, rate: f64, shape: f64 },
    /// `N(t) = n0 (a + (1 − a) e^{−r t})`, `a` the ancestral proportion.
    Expansion { n0: f64, rate: f64, ancestral_proportion: f64 },
    /// `N(t) = sizes[j]` on `(end_{j−1}, end_j]`; the last size extends to
    /// infinity and the first to minus infinity.
    PiecewiseConstant { end_times: Vec<f64>, sizes: Vec<f64> },
}

impl Demographic {
    /// Piecewise-constant function `exp(γ)` on the given cell ends.
    pub fn from_log_sizes(end_times: &[f64], log_sizes: &[f64]) -> Self {
        Demographic::PiecewiseConstant {
            end_times: end_times.to_vec(),
            sizes: log_sizes.iter().map(|g| g.exp()).collect(),
        }
    }

    fn piece_index(end_times: &[f64], t: f64) -> usize {
        end_times.partition_point(|&e| e < t).min(end_times.len().saturating_sub(1))
    }
}

impl DemographicFunction for Demographic {
    fn size_at(&self, t: f64) -> f64 {
        match self {
            Demographic::Constant { n0 } => *n0,
            Demographic::Exponential { n0, rate } => n0 * (-rate * t).exp(),
            Demographic::Logistic { n0, rate, shape } => {
                n0 * (1.0 + shape) / (1.0 + shape * (rate * t).exp())
            }
            Demographic::Expansion { n0, rate, ancestral_proportion: a } => {
                n0 * (a + (1.0 - a) * (-rate * t).exp())
            }
            Demographic::PiecewiseConstant { end_times, sizes } => {
                sizes.get(Self::piece_index(end_times, t)).copied().unwrap_or(f64::NAN)
            }
        }
    }

    fn integral_of_inverse_size(&self, t0: f64, t1: f64) -> f64 {
        match self {
            Demographic::Constant { n0 } => (t1 - t0) / n0,
            Demographic::Exponential { n0, rate } => {
                if *rate == 0.0 {
                    (t1 - t0) / n0
                } else {
                    ((rate * t1).exp() - (rate * t0).exp()) / (n0 * rate)
                }
            }
            Demographic::Logistic { n0, rate, shape } => {
                let antiderivative = |t: f64| {
                    if *rate == 0.0 {
                        t * (1.0 + shape)
                    } else {
                        t + shape * (rate * t).exp() / rate
                    }
                };
                (antiderivative(t1) - antiderivative(t0)) / (n0 * (1.0 + shape))
            }
            Demographic::Expansion { n0, rate, ancestral_proportion: a } => {
                if *rate == 0.0 {
                    (t1 - t0) / n0
                } else if *a == 0.0 {
                    ((rate * t1).exp() - (rate * t0).exp()) / (n0 * rate)
                } else {
                    let antiderivative = |t: f64| (a * (rate * t).exp() + 1.0 - a).ln();
                    (antiderivative(t1) - antiderivative(t0)) / (n0 * a * rate)
                }
            }
            Demographic::PiecewiseConstant { end_times, sizes } => {
                let n = sizes.len().min(end_times.len());
                let mut total = 0.0;
                let mut lo = t0;
                for j in 0..n {
                    if lo >= t1 {
                        break;
                    }
                    let cell_end = if j + 1 == n { f64::INFINITY } else { end_times[j] };
                    if cell_end <= lo {
                        continue;
                    }
                    let hi = t1.min(cell_end);
                    total += (hi - lo) / sizes[j];
                    lo = hi;
                }
                total
            }
        }
    }

    fn log_size_at(&self, t: f64) -> f64 {
        match self {
            Demographic::Exponential { n0, rate } => n0.ln() - rate * t,
            _ => self.size_at(t).ln(),
        }
    }
}

/// Coalescent log-likelihood of an interval sequence under `demographic`.
///
/// Each interval contributes `−pair_weight · ∫ 1/N` over its span; each
/// coalescence of locus `l` at time `t` contributes `−ln ploidy_l − ln N(t)`.
pub fn coalescent_log_likelihood<D: DemographicFunction + ?Sized>(
    list: &IntervalList, ploidy: &[f64], demographic: &D,
) -> f64 {
    let mut total = 0.0;
    for interval in &list.intervals {
        let start = interval.end_time - interval.length;
        if interval.pair_weight > 0.0 {
            total -= interval.pair_weight
                * demographic.integral_of_inverse_size(start, interval.end_time);
        }
        if let (true, Some(locus)) = (interval.ends_in_coalescence(), interval.end_locus) {
            total += (1.0 / ploidy[locus]).ln() - demographic.log_size_at(interval.end_time);
        }
    }
    total
}
