//! SkyLikelihood — composite GMRF skyride/skygrid log-likelihood with caching.
//!
//! Purpose
//! -------
//! Own a set of genealogies, the field parameters, and every derived quantity
//! (intervals, sufficient statistics, base weight matrix, term values), and
//! evaluate
//!
//! `coalescent + field + sampling (optional) + missing covariates (optional)`
//!
//! with the minimum recomputation the current [`CacheState`] allows.
//!
//! Key behaviors
//! -------------
//! - Construction validates genealogies, options, field length, and optional
//!   terms, performs the first extraction, and logs an initialization report.
//! - [`SkyLikelihood::log_likelihood`] dispatches on the cache state:
//!   - `DirtyIntervals` → extract intervals, rebuild statistics and the base
//!     matrix, then recompute the scalar;
//!   - `DirtyLikelihood` → recompute the scalar only;
//!   - `Clean` → return the cached value.
//! - Setters validate, write, and downgrade the cache state; mutating a
//!   genealogy through [`SkyLikelihood::genealogy_mut`] forces interval
//!   recomputation.
//! - [`SkyLikelihood::store_state`] / [`SkyLikelihood::restore_state`] copy
//!   the field-length quantities (statistics, base matrix, term values) plus
//!   owned parameters by value. The interval list is O(nodes) and is not part
//!   of the snapshot: a restore after a re-extraction only marks it stale, and
//!   the interval-level accessors re-extract it on demand.
//!
//! Invariants & assumptions
//! ------------------------
//! - `field_length` is fixed at construction: Σ internal nodes + covariate
//!   markers for the skyride layout, `grid points + 1` for the skygrid
//!   layout, and at least 2.
//! - The base weight matrix is only rebuilt when intervals change; scaled
//!   matrices are fresh values and never alias it.
//! - `restore_state` never extracts intervals; its cost is linear in the field
//!   length (and the design matrix size when a regression is attached).
//! - Non-finite likelihood values are returned as-is.
//!
//! Conventions
//! -----------
//! - Genealogy rollback on rejection is the caller's job; `restore_state`
//!   restores derived state and likelihood-owned parameters only.
//! - Recomputations are logged at `debug` level.
//!
//! Downstream usage
//! ----------------
//! - Build with [`SkyLikelihood::new`], optionally chain
//!   [`SkyLikelihood::with_regression`] / [`SkyLikelihood::with_sampling`],
//!   then drive with setters, `log_likelihood`, and the store/restore cycle.
//! - Gradients live in [`super::gradient`]; field-mode fitting in
//!   [`super::field_mode`].
use crate::coalescent::{
    core::{
        cache::{CacheState, Snapshot, StateCache},
        demographic::{Demographic, DemographicFunction, coalescent_log_likelihood},
        events::IntervalList,
        genealogy::Genealogy,
        intervals::IntervalExtractor,
        options::{FieldLayout, SkyOptions, Smoothing},
        params::FieldParams,
        statistics::{SufficientStatistics, compute_skygrid, compute_skyride, per_event_statistics},
        validation::{
            validate_field_vector, validate_lambda, validate_node_heights, validate_precision,
        },
        weights::SymTridiagonal,
    },
    errors::{SkyError, SkyResult},
    models::terms::{
        RegressionTerm, SamplingTerm, coalescent_log_density, field_log_density,
    },
};
use ndarray::{Array1, ArrayView1};
use tracing::{debug, info};

/// Cached values of the individual terms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TermValues {
    pub coalescent: f64,
    pub field: f64,
    pub sampling: f64,
    pub missing: f64,
    pub total: f64,
}

/// Everything the store/restore cycle copies.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodState {
    pub params: FieldParams,
    pub regression: Option<RegressionTerm>,
    pub sampling: Option<SamplingTerm>,
    pub stats: SufficientStatistics,
    /// Unscaled weight matrix.
    pub weights: SymTridiagonal,
    pub terms: TermValues,
    pub state: CacheState,
}

impl LikelihoodState {
    /// Field residual `γ − Xβ` (or `γ` without regression).
    pub fn residual(&self) -> Array1<f64> {
        match &self.regression {
            Some(reg) => &self.params.log_pop_sizes - &reg.predictor(),
            None => self.params.log_pop_sizes.clone(),
        }
    }

    /// Base matrix scaled with the current precision and lambda.
    pub fn scaled_weights(&self) -> SymTridiagonal {
        self.weights.scaled(self.params.precision, self.params.lambda)
    }
}

impl Snapshot for LikelihoodState {
    fn copy_from(&mut self, other: &Self) {
        self.params.copy_from(&other.params);
        Snapshot::copy_from(&mut self.regression, &other.regression);
        Snapshot::copy_from(&mut self.sampling, &other.sampling);
        self.stats.copy_from(&other.stats);
        self.weights.copy_from(&other.weights);
        self.terms = other.terms;
        self.state = other.state;
    }
}

/// Composite skyride/skygrid likelihood over genealogies of type `G`.
#[derive(Debug, Clone)]
pub struct SkyLikelihood<G: Genealogy> {
    loci: Vec<G>,
    options: SkyOptions,
    ploidy: Vec<f64>,
    field_length: usize,
    cache: StateCache<LikelihoodState>,
    /// Interval list of the most recent extraction.
    intervals: IntervalList,
    /// Set when a restore rolled statistics back past `intervals`.
    intervals_stale: bool,
    extraction_count: usize,
    extractions_at_store: usize,
}

impl<G: Genealogy> SkyLikelihood<G> {
    /// Validate inputs, run the first extraction, and log an initialization
    /// report.
    ///
    /// # Errors
    /// - [`SkyError::EmptyGenealogySet`], node-count/height errors per locus.
    /// - [`SkyError::PloidyLengthMismatch`] / [`SkyError::InvalidPloidy`].
    /// - [`SkyError::FieldTooShort`] when fewer than two cells exist.
    /// - [`SkyError::FieldLengthMismatch`] when `params` does not match.
    /// - [`SkyError::LineageUnderflow`] for inconsistent heights.
    pub fn new(loci: Vec<G>, params: FieldParams, options: SkyOptions) -> SkyResult<Self> {
        if loci.is_empty() {
            return Err(SkyError::EmptyGenealogySet);
        }
        for (locus, g) in loci.iter().enumerate() {
            validate_node_heights(locus, g.tip_heights(), g.internal_heights())?;
        }
        options.validate(loci.len())?;

        let markers = options.covariate_markers.as_ref().map_or(0, |m| m.len());
        let field_length = match &options.layout {
            FieldLayout::Skyride => {
                loci.iter().map(Genealogy::internal_count).sum::<usize>() + markers
            }
            FieldLayout::Skygrid(grid) => grid.cell_count(),
        };
        if field_length < 2 {
            return Err(SkyError::FieldTooShort { length: field_length });
        }
        validate_field_vector("log_pop_sizes", params.log_pop_sizes.view(), field_length)?;
        validate_precision(params.precision)?;
        validate_lambda(params.lambda)?;

        let ploidy = options.resolved_ploidy(loci.len());
        let state = LikelihoodState {
            params,
            regression: None,
            sampling: None,
            stats: SufficientStatistics::zeros(field_length),
            weights: SymTridiagonal::zeros(field_length),
            terms: TermValues::default(),
            state: CacheState::DirtyIntervals,
        };
        let mut likelihood = Self {
            loci,
            options,
            ploidy,
            field_length,
            cache: StateCache::new(state),
            intervals: IntervalList::default(),
            intervals_stale: false,
            extraction_count: 0,
            extractions_at_store: 0,
        };
        likelihood.recompute_intervals()?;

        info!(
            layout = likelihood.options.layout.name(),
            smoothing = ?likelihood.options.smoothing,
            loci = likelihood.loci.len(),
            field_length,
            coalescent_events = likelihood.live().stats.total_coalescent_events(),
            covariate_markers = markers,
            rescale_by_root_height = likelihood.options.rescale_by_root_height,
            "initialized GMRF coalescent likelihood"
        );
        Ok(likelihood)
    }

    /// Attach a covariate regression; the design must have one row per cell.
    pub fn with_regression(mut self, term: RegressionTerm) -> SkyResult<Self> {
        term.validate_rows(self.field_length)?;
        if term.marker_column().is_some() && self.options.covariate_markers.is_none() {
            return Err(SkyError::InvalidCovariateColumn {
                column: term.marker_column().unwrap_or_default(),
                reason: "marker column set but no covariate markers configured",
            });
        }
        let mut state = self.cache.live().clone();
        state.regression = Some(term);
        state.state = CacheState::DirtyIntervals;
        self.cache = StateCache::new(state);
        Ok(self)
    }

    /// Attach a sampling-time term.
    pub fn with_sampling(mut self, term: SamplingTerm) -> Self {
        let mut state = self.cache.live().clone();
        state.sampling = Some(term);
        state.state = state.state.after_parameter_change();
        self.cache = StateCache::new(state);
        self
    }

    // ---- Evaluation -------------------------------------------------------

    /// Composite log-likelihood, recomputing only what the cache state
    /// requires.
    pub fn log_likelihood(&mut self) -> SkyResult<f64> {
        match self.cache_state() {
            CacheState::DirtyIntervals => {
                self.recompute_intervals()?;
                self.recompute_terms();
            }
            CacheState::DirtyLikelihood => self.recompute_terms(),
            CacheState::Clean => {}
        }
        Ok(self.live().terms.total)
    }

    /// Force a full recomputation on the next evaluation.
    pub fn make_dirty(&mut self) {
        self.genealogy_changed();
    }

    /// Signal that one of the genealogies changed in place.
    pub fn genealogy_changed(&mut self) {
        let state = &mut self.cache.live_mut().state;
        *state = state.after_genealogy_change();
    }

    pub(crate) fn parameter_changed(&mut self) {
        let state = &mut self.cache.live_mut().state;
        *state = state.after_parameter_change();
    }

    /// Term values of the most recent evaluation.
    pub fn term_values(&mut self) -> SkyResult<TermValues> {
        self.log_likelihood()?;
        Ok(self.live().terms)
    }

    fn extract_list(&mut self) -> SkyResult<IntervalList> {
        let list = IntervalExtractor::new(&self.ploidy)
            .with_grid(self.options.layout.grid())
            .with_covariates(self.options.covariate_markers.as_ref())
            .extract(&self.loci)?;
        self.extraction_count += 1;
        Ok(list)
    }

    fn recompute_intervals(&mut self) -> SkyResult<()> {
        let list = self.extract_list()?;

        let field_scalar = if self.options.rescale_by_root_height {
            self.loci[0].root_height()
        } else {
            1.0
        };
        let state = self.cache.live_mut();
        match &self.options.layout {
            FieldLayout::Skyride => compute_skyride(&list, &self.ploidy, &mut state.stats)?,
            FieldLayout::Skygrid(grid) => {
                compute_skygrid(&list, &self.ploidy, grid, &mut state.stats)?
            }
        }
        match self.options.smoothing {
            Smoothing::TimeAware => {
                let lengths = smoothing_lengths(&self.options.layout, &state.stats);
                state.weights.rebuild_time_aware(lengths.view(), field_scalar);
            }
            Smoothing::TimeUnaware => state.weights.rebuild_time_unaware(),
        }
        if let (Some(reg), Some(markers)) =
            (state.regression.as_mut(), self.options.covariate_markers.as_ref())
        {
            let values: Vec<f64> = state
                .stats
                .cell_end_times
                .iter()
                .map(|&t| markers.value_at_cell_end(t).unwrap_or(0.0))
                .collect();
            reg.write_marker_values(&values);
        }
        debug!(
            extraction = self.extraction_count,
            intervals = list.len(),
            root = list.end_time,
            anomalies = list.anomalies,
            "recomputed intervals and sufficient statistics"
        );
        state.state = CacheState::DirtyLikelihood;
        self.intervals = list;
        self.intervals_stale = false;
        Ok(())
    }

    fn recompute_terms(&mut self) {
        let state = self.cache.live_mut();
        let gamma = state.params.log_pop_sizes.view();
        let coalescent = coalescent_log_density(gamma, &state.stats);
        let residual = state.residual();
        let field = field_log_density(
            residual.view(),
            &state.scaled_weights(),
            state.params.precision,
            state.params.lambda,
        );
        let sampling = state.sampling.map_or(0.0, |s| s.log_density(gamma, &state.stats));
        let missing = state.regression.as_ref().map_or(0.0, RegressionTerm::missing_log_density);
        let total = coalescent + field + sampling + missing;
        state.terms = TermValues { coalescent, field, sampling, missing, total };
        state.state = CacheState::Clean;
        debug!(coalescent, field, sampling, missing, total, "recomputed log-likelihood");
    }

    /// Bring intervals and statistics up to date without touching the scalar.
    pub(crate) fn ensure_intervals(&mut self) -> SkyResult<()> {
        if self.cache_state() == CacheState::DirtyIntervals {
            self.recompute_intervals()?;
        }
        Ok(())
    }

    /// Like [`Self::ensure_intervals`], and also re-extract the interval list
    /// if a restore left it behind the statistics.
    fn ensure_interval_list(&mut self) -> SkyResult<()> {
        self.ensure_intervals()?;
        if self.intervals_stale {
            self.intervals = self.extract_list()?;
            self.intervals_stale = false;
            debug!(extraction = self.extraction_count, "re-extracted interval list after restore");
        }
        Ok(())
    }

    // ---- Genealogies ------------------------------------------------------

    pub fn loci(&self) -> &[G] {
        &self.loci
    }

    /// Mutable access to one genealogy; marks intervals dirty.
    pub fn genealogy_mut(&mut self, locus: usize) -> SkyResult<&mut G> {
        let loci = self.loci.len();
        if locus >= loci {
            return Err(SkyError::LocusOutOfRange { locus, loci });
        }
        self.genealogy_changed();
        Ok(&mut self.loci[locus])
    }

    // ---- Parameters -------------------------------------------------------

    pub fn params(&self) -> &FieldParams {
        &self.live().params
    }

    pub fn set_log_pop_sizes(&mut self, gamma: ArrayView1<f64>) -> SkyResult<()> {
        validate_field_vector("log_pop_sizes", gamma, self.field_length)?;
        self.cache.live_mut().params.log_pop_sizes.assign(&gamma);
        self.parameter_changed();
        Ok(())
    }

    pub fn set_log_pop_size(&mut self, index: usize, value: f64) -> SkyResult<()> {
        if index >= self.field_length {
            return Err(SkyError::NodeOutOfRange { index, len: self.field_length });
        }
        if !value.is_finite() {
            return Err(SkyError::NonFiniteParameter { name: "log_pop_sizes", index, value });
        }
        self.cache.live_mut().params.log_pop_sizes[index] = value;
        self.parameter_changed();
        Ok(())
    }

    pub fn set_precision(&mut self, precision: f64) -> SkyResult<()> {
        validate_precision(precision)?;
        self.cache.live_mut().params.precision = precision;
        self.parameter_changed();
        Ok(())
    }

    pub fn set_lambda(&mut self, lambda: f64) -> SkyResult<()> {
        validate_lambda(lambda)?;
        self.cache.live_mut().params.lambda = lambda;
        self.parameter_changed();
        Ok(())
    }

    pub fn regression(&self) -> Option<&RegressionTerm> {
        self.live().regression.as_ref()
    }

    pub fn sampling(&self) -> Option<&SamplingTerm> {
        self.live().sampling.as_ref()
    }

    pub fn set_beta(&mut self, beta: ArrayView1<f64>) -> SkyResult<()> {
        self.regression_mut()?.set_beta(beta.to_owned())?;
        self.parameter_changed();
        Ok(())
    }

    pub fn set_design_value(&mut self, row: usize, column: usize, value: f64) -> SkyResult<()> {
        self.regression_mut()?.set_design_value(row, column, value)?;
        self.parameter_changed();
        Ok(())
    }

    pub fn set_missing_precisions(
        &mut self, column: usize, recent: f64, distant: f64,
    ) -> SkyResult<()> {
        self.regression_mut()?.set_missing_precisions(column, recent, distant)?;
        self.parameter_changed();
        Ok(())
    }

    pub fn set_sampling(&mut self, intercept: f64, power: f64) -> SkyResult<()> {
        let term = SamplingTerm::new(intercept, power)?;
        let slot = self.cache.live_mut().sampling.as_mut().ok_or(SkyError::NotImplemented {
            operation: "set_sampling",
            reason: "no sampling term was configured",
        })?;
        *slot = term;
        self.parameter_changed();
        Ok(())
    }

    fn regression_mut(&mut self) -> SkyResult<&mut RegressionTerm> {
        self.cache.live_mut().regression.as_mut().ok_or(SkyError::NotImplemented {
            operation: "regression update",
            reason: "no regression term was configured",
        })
    }

    // ---- Derived quantities -----------------------------------------------

    pub fn field_length(&self) -> usize {
        self.field_length
    }

    pub fn options(&self) -> &SkyOptions {
        &self.options
    }

    pub fn ploidy(&self) -> &[f64] {
        &self.ploidy
    }

    pub fn cache_state(&self) -> CacheState {
        self.live().state
    }

    /// Number of interval extractions performed so far.
    pub fn extraction_count(&self) -> usize {
        self.extraction_count
    }

    pub(crate) fn live(&self) -> &LikelihoodState {
        self.cache.live()
    }

    pub fn intervals(&mut self) -> SkyResult<&IntervalList> {
        self.ensure_interval_list()?;
        Ok(&self.intervals)
    }

    pub fn sufficient_statistics(&mut self) -> SkyResult<&SufficientStatistics> {
        self.ensure_intervals()?;
        Ok(&self.live().stats)
    }

    /// Unscaled weight matrix.
    pub fn weight_matrix(&mut self) -> SkyResult<&SymTridiagonal> {
        self.ensure_intervals()?;
        Ok(&self.live().weights)
    }

    /// Base matrix scaled with arbitrary hyperparameters; the base is not
    /// modified.
    pub fn scaled_weight_matrix(&mut self, precision: f64, lambda: f64) -> SkyResult<SymTridiagonal> {
        self.ensure_intervals()?;
        Ok(self.live().weights.scaled(precision, lambda))
    }

    /// Stored snapshot's base matrix, scaled.
    pub fn stored_scaled_weight_matrix(&self, precision: f64, lambda: f64) -> SkyResult<SymTridiagonal> {
        let stored = self.cache.stored().ok_or(SkyError::NoStoredState)?;
        Ok(stored.weights.scaled(precision, lambda))
    }

    /// Cumulative cell lengths: the height at which each cell ends, measured
    /// from the first event.
    pub fn coalescent_interval_heights(&mut self) -> SkyResult<Array1<f64>> {
        self.ensure_intervals()?;
        let mut acc = 0.0;
        Ok(self.live().stats.interval_lengths.mapv(|len| {
            acc += len;
            acc
        }))
    }

    /// Weight accumulated between consecutive coalescences.
    ///
    /// # Errors
    /// [`SkyError::NotImplemented`] for more than one locus, where events of
    /// different loci interleave.
    pub fn coalescent_event_statistics(&mut self) -> SkyResult<Vec<f64>> {
        if self.loci.len() > 1 {
            return Err(SkyError::NotImplemented {
                operation: "coalescent_event_statistics",
                reason: "per-event statistics are only defined for a single locus",
            });
        }
        self.ensure_interval_list()?;
        Ok(per_event_statistics(&self.intervals))
    }

    /// Piecewise-constant population size `exp(γ)` over the current cells.
    pub fn population_size_function(&mut self) -> SkyResult<Demographic> {
        self.ensure_intervals()?;
        let state = self.live();
        let ends = state.stats.cell_end_times.to_vec();
        let gamma = state.params.log_pop_sizes.to_vec();
        Ok(Demographic::from_log_sizes(&ends, &gamma))
    }

    /// Coalescent log-likelihood of the current intervals under another
    /// demographic model.
    pub fn parametric_log_likelihood<D: DemographicFunction + ?Sized>(
        &mut self, demographic: &D,
    ) -> SkyResult<f64> {
        self.ensure_interval_list()?;
        Ok(coalescent_log_likelihood(&self.intervals, &self.ploidy, demographic))
    }

    /// `Σ_j (γ_j − γ_{j−1})² / ((len_{j−1} + len_j) / 2)` with the smoothing
    /// lengths of the layout.
    pub fn weighted_sse(&mut self) -> SkyResult<f64> {
        self.ensure_intervals()?;
        let state = self.live();
        let lengths = smoothing_lengths(&self.options.layout, &state.stats);
        let gamma = &state.params.log_pop_sizes;
        Ok((1..gamma.len())
            .map(|j| {
                let d = gamma[j] - gamma[j - 1];
                d * d / (0.5 * (lengths[j - 1] + lengths[j]))
            })
            .sum())
    }

    /// Generalized log-determinant of the currently scaled matrix.
    pub fn log_generalized_determinant(&mut self) -> SkyResult<f64> {
        self.ensure_intervals()?;
        Ok(self.live().scaled_weights().log_generalized_determinant())
    }

    // ---- Propose / accept / reject ----------------------------------------

    pub fn store_state(&mut self) {
        self.cache.store();
        self.extractions_at_store = self.extraction_count;
    }

    /// Roll derived state and parameters back to the last `store_state`.
    /// Does not extract intervals.
    ///
    /// # Errors
    /// [`SkyError::NoStoredState`] before the first `store_state`.
    pub fn restore_state(&mut self) -> SkyResult<()> {
        self.cache.restore()?;
        if self.extraction_count != self.extractions_at_store {
            self.intervals_stale = true;
        }
        Ok(())
    }

    pub fn accept_state(&mut self) {
        self.cache.accept();
    }
}

/// Lengths used for time-aware smoothing: cell lengths for the skyride layout,
/// grid spacings (last repeated) for the skygrid layout.
fn smoothing_lengths(layout: &FieldLayout, stats: &SufficientStatistics) -> Array1<f64> {
    match layout {
        FieldLayout::Skyride => stats.interval_lengths.clone(),
        FieldLayout::Skygrid(grid) => Array1::from(grid.spacings()),
    }
}
