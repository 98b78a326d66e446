//! Sufficient statistics — collapse an interval sequence into per-cell arrays.
//!
//! Purpose
//! -------
//! Reduce an [`IntervalList`] to the per-cell quantities that fully determine
//! the coalescent log-likelihood under a piecewise-constant population size:
//! cell lengths, integrated pairwise coalescence weight ("stats"), coalescent
//! event counts, ploidy corrections, cell end times, and the sampling
//! counts/exposures consumed by the sampling-rate term.
//!
//! Key behaviors
//! -------------
//! - Skyride layout ([`compute_skyride`]): a cell closes at every coalescent
//!   event of any locus and at every covariate marker. Cells closed by a
//!   marker that precedes the first lineage are empty. The single-lineage tail
//!   after the last closing event is discarded.
//! - Skygrid layout ([`compute_skygrid`]): the cell index advances at every
//!   grid marker; coalescent events are tallied into the current cell and the
//!   final open cell keeps its partial weight.
//! - Both layouts write into a preallocated [`SufficientStatistics`]; the
//!   caller owns the buffers and they are reused across evaluations.
//!
//! Invariants & assumptions
//! ------------------------
//! - The number of cells produced must equal the preallocated length;
//!   otherwise [`SkyError::FieldLengthMismatch`] is returned and the output is
//!   left untouched.
//! - `stats[i] >= 0`; intervals with one lineage add zero weight.
//! - `ploidy_sums[i] = Σ ln(1 / ploidy_l)` over coalescences closing in cell `i`.
//! - Skyride `closing_pair_weights[i]` is the pair weight of the last interval
//!   in cell `i` (0 for an empty cell), so a zero-length cell still carries
//!   the rate `∂stats/∂len`. Skygrid leaves it at 0.
//!
//! Conventions
//! -----------
//! - Skygrid cells are right-closed: a coalescence exactly at a grid point
//!   belongs to the cell that ends there (the extractor orders nodes before
//!   markers).
//! - Skygrid `interval_lengths` are the grid widths; the open last cell spans
//!   `max(0, end_time − cut_off)`.
use crate::coalescent::{
    core::{events::IntervalList, grid::GridPoints},
    errors::{SkyError, SkyResult},
};
use ndarray::Array1;

/// Per-cell statistics, one entry per field cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStatistics {
    pub interval_lengths: Array1<f64>,
    pub stats: Array1<f64>,
    pub num_coal_events: Array1<f64>,
    pub ploidy_sums: Array1<f64>,
    pub cell_end_times: Array1<f64>,
    /// Number of samples falling in each cell.
    pub sample_counts: Array1<f64>,
    /// Overlap of each cell with `[min sample time, max sample time]`.
    pub exposures: Array1<f64>,
    /// Pair weight of the interval that closes each skyride cell.
    pub closing_pair_weights: Array1<f64>,
}

impl SufficientStatistics {
    /// Zeroed buffers for `n` cells.
    pub fn zeros(n: usize) -> Self {
        Self {
            interval_lengths: Array1::zeros(n),
            stats: Array1::zeros(n),
            num_coal_events: Array1::zeros(n),
            ploidy_sums: Array1::zeros(n),
            cell_end_times: Array1::zeros(n),
            sample_counts: Array1::zeros(n),
            exposures: Array1::zeros(n),
            closing_pair_weights: Array1::zeros(n),
        }
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    fn reset(&mut self) {
        self.interval_lengths.fill(0.0);
        self.stats.fill(0.0);
        self.num_coal_events.fill(0.0);
        self.ploidy_sums.fill(0.0);
        self.cell_end_times.fill(0.0);
        self.sample_counts.fill(0.0);
        self.exposures.fill(0.0);
        self.closing_pair_weights.fill(0.0);
    }

    /// Value copy into existing buffers.
    pub fn copy_from(&mut self, other: &Self) {
        self.interval_lengths.assign(&other.interval_lengths);
        self.stats.assign(&other.stats);
        self.num_coal_events.assign(&other.num_coal_events);
        self.ploidy_sums.assign(&other.ploidy_sums);
        self.cell_end_times.assign(&other.cell_end_times);
        self.sample_counts.assign(&other.sample_counts);
        self.exposures.assign(&other.exposures);
        self.closing_pair_weights.assign(&other.closing_pair_weights);
    }

    /// Total number of coalescent events across cells.
    pub fn total_coalescent_events(&self) -> f64 {
        self.num_coal_events.sum()
    }
}

/// Skyride cells: close at coalescences and covariate markers.
///
/// # Errors
/// [`SkyError::FieldLengthMismatch`] when the number of closing events differs
/// from `out.len()`.
pub fn compute_skyride(
    list: &IntervalList, ploidy: &[f64], out: &mut SufficientStatistics,
) -> SkyResult<()> {
    let covariate_positions: Vec<(usize, f64)> =
        list.markers.iter().filter(|m| !m.is_grid()).map(|m| (m.position, m.time)).collect();
    let closures = list.coalescent_count() + covariate_positions.len();
    if closures != out.len() {
        return Err(SkyError::FieldLengthMismatch { expected: out.len(), actual: closures });
    }
    out.reset();

    let mut open = OpenCell::default();
    let mut next_marker = 0;
    for (i, interval) in list.intervals.iter().enumerate() {
        while next_marker < covariate_positions.len() && covariate_positions[next_marker].0 == i {
            open.close(out, covariate_positions[next_marker].1);
            next_marker += 1;
        }
        open.add(interval.length, interval.pair_weight);
        if interval.ends_in_coalescence() {
            if let Some(locus) = interval.end_locus {
                out.num_coal_events[open.cell] += 1.0;
                out.ploidy_sums[open.cell] += (1.0 / ploidy[locus]).ln();
            }
            open.close(out, interval.end_time);
        }
    }
    while next_marker < covariate_positions.len() {
        open.close(out, covariate_positions[next_marker].1);
        next_marker += 1;
    }

    fill_sampling(&list.sample_times, list.start_time, out);
    Ok(())
}

/// Skyride cell being accumulated.
#[derive(Debug, Default)]
struct OpenCell {
    cell: usize,
    length: f64,
    weight: f64,
    last_pair_weight: f64,
}

impl OpenCell {
    fn add(&mut self, length: f64, pair_weight: f64) {
        self.length += length;
        self.weight += length * pair_weight;
        self.last_pair_weight = pair_weight;
    }

    fn close(&mut self, out: &mut SufficientStatistics, end: f64) {
        out.interval_lengths[self.cell] = self.length;
        out.stats[self.cell] = self.weight;
        out.cell_end_times[self.cell] = end;
        out.closing_pair_weights[self.cell] = self.last_pair_weight;
        *self = Self { cell: self.cell + 1, ..Self::default() };
    }
}

/// Skygrid cells: the cell index advances at every grid marker.
///
/// # Errors
/// [`SkyError::FieldLengthMismatch`] when `grid.cell_count() != out.len()`.
pub fn compute_skygrid(
    list: &IntervalList, ploidy: &[f64], grid: &GridPoints, out: &mut SufficientStatistics,
) -> SkyResult<()> {
    let n = out.len();
    if grid.cell_count() != n {
        return Err(SkyError::FieldLengthMismatch { expected: n, actual: grid.cell_count() });
    }
    out.reset();

    let grid_positions = list.grid_indices();
    let mut next_marker = 0;
    let mut cell = 0;
    for (i, interval) in list.intervals.iter().enumerate() {
        while next_marker < grid_positions.len() && grid_positions[next_marker] == i {
            cell = (cell + 1).min(n - 1);
            next_marker += 1;
        }
        out.stats[cell] += interval.length * interval.pair_weight;
        if interval.ends_in_coalescence() {
            if let Some(locus) = interval.end_locus {
                out.num_coal_events[cell] += 1.0;
                out.ploidy_sums[cell] += (1.0 / ploidy[locus]).ln();
            }
        }
    }

    let mut previous = 0.0;
    for (k, &g) in grid.points().iter().enumerate() {
        out.interval_lengths[k] = g - previous;
        out.cell_end_times[k] = g;
        previous = g;
    }
    let cut_off = grid.cut_off();
    out.interval_lengths[n - 1] = (list.end_time - cut_off).max(0.0);
    out.cell_end_times[n - 1] = list.end_time.max(cut_off);

    fill_sampling(&list.sample_times, 0.0_f64.min(list.start_time), out);
    Ok(())
}

/// Weight accumulated between consecutive coalescent events, ignoring markers.
///
/// One entry per coalescence in time order; for a single locus without
/// covariate markers this equals the skyride `stats`.
pub fn per_event_statistics(list: &IntervalList) -> Vec<f64> {
    let mut out = Vec::with_capacity(list.coalescent_count());
    let mut weight = 0.0;
    for interval in &list.intervals {
        weight += interval.length * interval.pair_weight;
        if interval.ends_in_coalescence() {
            out.push(weight);
            weight = 0.0;
        }
    }
    out
}

/// Per-cell sample counts and exposure inside the sampling window.
///
/// Cell `c` spans `[end_{c−1}, end_c]` with `end_{−1} = origin`; a sample at
/// time `s` falls in the first cell whose end is `>= s` (the last cell
/// catches anything later).
fn fill_sampling(sample_times: &[f64], origin: f64, out: &mut SufficientStatistics) {
    let n = out.len();
    if n == 0 || sample_times.is_empty() {
        return;
    }
    let ends = out.cell_end_times.to_vec();
    for &s in sample_times {
        let c = ends.partition_point(|&e| e < s).min(n - 1);
        out.sample_counts[c] += 1.0;
    }
    let lo = sample_times.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = sample_times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut start = origin;
    for (c, &end) in ends.iter().enumerate() {
        out.exposures[c] = (end.min(hi) - start.max(lo)).max(0.0);
        start = end;
    }
}
