//! Interval extraction — genealogies → one time-ordered interval sequence.
//!
//! Purpose
//! -------
//! Turn one or more genealogies (plus optional grid points and covariate
//! markers) into the [`IntervalList`] consumed by the sufficient-statistics
//! calculator. All loci share one time axis; lineage counts are tracked per
//! locus and combined into a single pairwise coalescence weight per interval.
//!
//! Key behaviors
//! -------------
//! - Collect tip heights as `Sample` events and internal heights as
//!   `Coalescent` events for every locus, then add grid and covariate
//!   `Marker` events.
//! - Sort with a stable, total order: time, then kind rank
//!   (`Sample < Coalescent < Marker`), then locus, then insertion order. A grid
//!   point equal to a node time therefore lands *after* the node event.
//! - Walk the events, emitting one interval per event once at least one
//!   lineage exists. Simultaneous samples are merged (no zero-length interval
//!   ending in a sample is emitted).
//! - Record marker insertion positions so grid cells and covariate cells can
//!   be closed even when a marker falls before the first lineage.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every emitted interval has `lineage_count >= 1`.
//! - Without markers past the root, `Σ length == end_time − start_time`, i.e.
//!   the root height for a single locus sampled at time 0.
//! - A coalescence with fewer than two lineages in its locus cannot come from
//!   a genealogy and is reported as [`SkyError::LineageUnderflow`].
//!
//! Conventions
//! -----------
//! - Structural anomalies that still describe a usable event sequence are
//!   logged with `tracing::warn!` and extraction continues. Ties are checked
//!   over each whole group of equal-time events, so a grid marker between
//!   the tied events does not hide them:
//!   - two or more coalescences of one locus at the same time,
//!   - a node event at the same time as a covariate marker,
//!   - a sample and a coalescence of one locus at the same time,
//!   - a locus that does not end with exactly one lineage (multifurcations).
//! - The number of tie anomalies is reported in [`IntervalList::anomalies`].
//! - Ties are resolved by the stable sort, so repeated extraction of the same
//!   input is bit-for-bit deterministic.
use crate::coalescent::{
    core::{
        events::{CoalescentInterval, Event, EventKind, IntervalList, MarkerPosition},
        genealogy::Genealogy,
        grid::{CovariateMarkers, GridPoints},
    },
    errors::{SkyError, SkyResult},
};
use tracing::warn;

/// Configured extractor; borrow-only, cheap to build per evaluation.
#[derive(Debug, Clone, Copy)]
pub struct IntervalExtractor<'a> {
    ploidy: &'a [f64],
    grid: Option<&'a GridPoints>,
    covariates: Option<&'a CovariateMarkers>,
}

impl<'a> IntervalExtractor<'a> {
    /// Extractor with one ploidy factor per locus and no markers.
    pub fn new(ploidy: &'a [f64]) -> Self {
        Self { ploidy, grid: None, covariates: None }
    }

    pub fn with_grid(mut self, grid: Option<&'a GridPoints>) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_covariates(mut self, covariates: Option<&'a CovariateMarkers>) -> Self {
        self.covariates = covariates;
        self
    }

    /// All events of all loci plus markers, sorted with the extractor's
    /// tie-break rules.
    pub fn collect_events<G: Genealogy>(&self, loci: &[G]) -> Vec<Event> {
        let markers = self.grid.map_or(0, GridPoints::len)
            + self.covariates.map_or(0, CovariateMarkers::len);
        let nodes: usize = loci.iter().map(Genealogy::node_count).sum();
        let mut events = Vec::with_capacity(nodes + markers);
        let mut order = 0;
        for (locus, genealogy) in loci.iter().enumerate() {
            for &h in genealogy.tip_heights() {
                events.push(Event::node(h, EventKind::Sample, locus, order));
                order += 1;
            }
            for &h in genealogy.internal_heights() {
                events.push(Event::node(h, EventKind::Coalescent, locus, order));
                order += 1;
            }
        }
        if let Some(grid) = self.grid {
            for &g in grid.points() {
                events.push(Event::marker(g, None, order));
                order += 1;
            }
        }
        if let Some(covariates) = self.covariates {
            for (&t, &v) in covariates.times().iter().zip(covariates.values()) {
                events.push(Event::marker(t, Some(v), order));
                order += 1;
            }
        }
        events.sort_by(Event::sort_cmp);
        events
    }

    /// Extract the interval sequence.
    ///
    /// # Errors
    /// - [`SkyError::EmptyGenealogySet`] when `loci` is empty.
    /// - [`SkyError::PloidyLengthMismatch`] when the ploidy slice does not have
    ///   one entry per locus.
    /// - [`SkyError::LineageUnderflow`] when heights are inconsistent with a
    ///   genealogy.
    pub fn extract<G: Genealogy>(&self, loci: &[G]) -> SkyResult<IntervalList> {
        if loci.is_empty() {
            return Err(SkyError::EmptyGenealogySet);
        }
        if self.ploidy.len() != loci.len() {
            return Err(SkyError::PloidyLengthMismatch {
                expected: loci.len(),
                actual: self.ploidy.len(),
            });
        }
        let events = self.collect_events(loci);
        let anomalies = tie_anomalies(&events);

        let start_time = events.first().map_or(0.0, |e| e.time);
        let mut list =
            IntervalList { start_time, end_time: start_time, anomalies, ..Default::default() };
        list.intervals.reserve(events.len());
        let mut lineages = vec![0usize; loci.len()];
        let mut previous = start_time;

        for event in &events {
            let total: usize = lineages.iter().sum();
            let length = event.time - previous;
            let merged_sample = event.kind == EventKind::Sample && length == 0.0;
            if total > 0 && !merged_sample {
                list.intervals.push(CoalescentInterval {
                    length,
                    lineage_count: total,
                    pair_weight: pair_weight(&lineages, self.ploidy),
                    end: event.kind,
                    end_time: event.time,
                    end_locus: event.is_node().then_some(event.locus),
                });
            }
            match event.kind {
                EventKind::Sample => {
                    lineages[event.locus] += 1;
                    list.sample_times.push(event.time);
                }
                EventKind::Coalescent => {
                    let k = &mut lineages[event.locus];
                    if *k < 2 {
                        return Err(SkyError::LineageUnderflow {
                            locus: event.locus,
                            time: event.time,
                        });
                    }
                    *k -= 1;
                    list.end_time = event.time;
                }
                EventKind::Marker => list.markers.push(MarkerPosition {
                    position: list.intervals.len(),
                    time: event.time,
                    datum: event.datum,
                }),
            }
            previous = event.time;
        }

        for (locus, &k) in lineages.iter().enumerate() {
            if k != 1 {
                warn!(locus, lineages = k, "genealogy does not coalesce to a single root");
            }
        }
        Ok(list)
    }
}

/// `Σ_l C(k_l, 2) / ploidy_l`.
pub fn pair_weight(lineages: &[usize], ploidy: &[f64]) -> f64 {
    lineages
        .iter()
        .zip(ploidy)
        .map(|(&k, &p)| {
            let k = k as f64;
            0.5 * k * (k - 1.0) / p
        })
        .sum()
}

/// Warn about tied event groups that the sort resolves but that usually point
/// at a malformed input; returns the number of anomalies found.
fn tie_anomalies(events: &[Event]) -> usize {
    let mut anomalies = 0;
    let mut start = 0;
    while start < events.len() {
        let time = events[start].time;
        let end = start + events[start..].iter().take_while(|e| e.time == time).count();
        let group = &events[start..end];
        start = end;
        if group.len() < 2 {
            continue;
        }
        if group.iter().any(Event::is_node) && group.iter().any(Event::is_covariate_marker) {
            warn!(time, "node event coincides with a covariate marker; node ordered first");
            anomalies += 1;
        }
        // Coalescences of a group are contiguous and sorted by locus.
        let coalescent_loci: Vec<usize> =
            group.iter().filter(|e| e.kind == EventKind::Coalescent).map(|e| e.locus).collect();
        let mut next = 0;
        while next < coalescent_loci.len() {
            let locus = coalescent_loci[next];
            let count = coalescent_loci[next..].iter().take_while(|&&l| l == locus).count();
            next += count;
            if count > 1 {
                warn!(locus, time, "simultaneous coalescent events; order resolved by node index");
                anomalies += 1;
            }
            if group.iter().any(|e| e.kind == EventKind::Sample && e.locus == locus) {
                warn!(locus, time, "sample and coalescence at the same time; zero-length interval");
                anomalies += 1;
            }
        }
    }
    anomalies
}
