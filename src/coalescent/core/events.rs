//! Timed events and the interval sequence derived from them.
//!
//! Purpose
//! -------
//! Define the value types that flow from the interval extractor into the
//! sufficient-statistics calculator: individual [`Event`]s, the
//! [`CoalescentInterval`]s between consecutive events, and the
//! [`IntervalList`] that bundles intervals with marker insertion positions
//! and sampling times.
//!
//! Invariants & assumptions
//! ------------------------
//! - Events are ordered by `(time, kind rank, locus, insertion order)`; see
//!   [`EventKind::rank`].
//! - Every emitted interval has `lineage_count >= 1` and `length >= 0`.
//! - `pair_weight` is the instantaneous coalescence weight
//!   `Σ_l C(k_l, 2) / ploidy_l` summed over loci during the interval.
//!
//! Conventions
//! -----------
//! - Times are heights measured backward from the most recent sample.
//! - Marker positions index into `intervals`: a marker at position `p` lies
//!   after `intervals[..p]` and before `intervals[p..]`.
use std::cmp::Ordering;

/// What happens at an event time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A tip enters the sample; one more lineage.
    Sample,
    /// Two lineages merge; one fewer lineage.
    Coalescent,
    /// A grid point or covariate time; lineages unchanged.
    Marker,
}

impl EventKind {
    /// Tie-break rank at equal times. Samples enter before coalescences and
    /// markers are placed after node events.
    pub fn rank(self) -> u8 {
        match self {
            EventKind::Sample => 0,
            EventKind::Coalescent => 1,
            EventKind::Marker => 2,
        }
    }
}

/// One timed event on the shared time axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
    /// Covariate value for covariate markers; `None` otherwise.
    pub datum: Option<f64>,
    /// Source locus for node events; markers use `usize::MAX`.
    pub locus: usize,
    /// Insertion order, used as the final tie-break.
    pub order: usize,
}

impl Event {
    pub fn node(time: f64, kind: EventKind, locus: usize, order: usize) -> Self {
        Self { time, kind, datum: None, locus, order }
    }

    pub fn marker(time: f64, datum: Option<f64>, order: usize) -> Self {
        Self { time, kind: EventKind::Marker, datum, locus: usize::MAX, order }
    }

    pub fn is_node(&self) -> bool {
        self.kind != EventKind::Marker
    }

    pub fn is_covariate_marker(&self) -> bool {
        self.kind == EventKind::Marker && self.datum.is_some()
    }

    /// Total order used by the extractor's stable sort.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.kind.rank().cmp(&other.kind.rank()))
            .then(self.locus.cmp(&other.locus))
            .then(self.order.cmp(&other.order))
    }
}

/// Span between two consecutive events with a constant lineage configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoalescentInterval {
    pub length: f64,
    /// Lineages summed over loci.
    pub lineage_count: usize,
    /// `Σ_l C(k_l, 2) / ploidy_l`.
    pub pair_weight: f64,
    /// Kind of the event closing the interval.
    pub end: EventKind,
    pub end_time: f64,
    /// Locus of the closing node event.
    pub end_locus: Option<usize>,
}

impl CoalescentInterval {
    pub fn ends_in_coalescence(&self) -> bool {
        self.end == EventKind::Coalescent
    }
}

/// Where a marker sits in the interval sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPosition {
    pub position: usize,
    pub time: f64,
    pub datum: Option<f64>,
}

impl MarkerPosition {
    pub fn is_grid(&self) -> bool {
        self.datum.is_none()
    }
}

/// Output of interval extraction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntervalList {
    pub intervals: Vec<CoalescentInterval>,
    /// Grid and covariate markers in time order.
    pub markers: Vec<MarkerPosition>,
    /// All tip heights across loci, ascending.
    pub sample_times: Vec<f64>,
    /// Time of the first event.
    pub start_time: f64,
    /// Time of the last node event.
    pub end_time: f64,
    /// Tied event groups flagged during extraction.
    pub anomalies: usize,
}

impl IntervalList {
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Sum of interval lengths.
    pub fn total_length(&self) -> f64 {
        self.intervals.iter().map(|iv| iv.length).sum()
    }

    /// Insertion positions of the grid points.
    pub fn grid_indices(&self) -> Vec<usize> {
        self.markers.iter().filter(|m| m.is_grid()).map(|m| m.position).collect()
    }

    /// Number of coalescent events across all loci.
    pub fn coalescent_count(&self) -> usize {
        self.intervals.iter().filter(|iv| iv.ends_in_coalescence()).count()
    }
}
