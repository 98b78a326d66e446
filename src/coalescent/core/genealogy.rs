//! Genealogy contract — the narrow view of a tree the likelihood consumes.
//!
//! Purpose
//! -------
//! Decouple the coalescent core from any concrete tree representation. The
//! likelihood only needs node *heights* (time before the most recent sample):
//! tip heights produce sampling events and internal heights produce
//! coalescent events. Topology, branch lengths, and mutation operators live
//! in the caller's tree type.
//!
//! Key behaviors
//! -------------
//! - [`Genealogy`] exposes tip and internal node heights plus derived counts.
//! - [`NodeHeights`] is a validated, owned implementation suitable for tests,
//!   Python bindings, and callers that only track heights.
//!
//! Invariants & assumptions
//! ------------------------
//! - Heights are finite and `>= 0`.
//! - A locus has at least two tips and between 1 and `tips - 1` internal
//!   nodes. Binary trees have exactly `tips - 1`.
//! - Implementations must not change node *counts* after the likelihood has
//!   been constructed; the field length is derived from them.
//!
//! Downstream usage
//! ----------------
//! - `SkyLikelihood` owns a `Vec<G: Genealogy>`. Mutate a locus through
//!   `SkyLikelihood::genealogy_mut`, which marks the interval cache dirty.
use crate::coalescent::{
    core::validation::{validate_height, validate_node_heights},
    errors::{SkyError, SkyResult},
};

/// Read-only height view of one genealogy (one locus).
pub trait Genealogy {
    /// Heights of the external (tip) nodes.
    fn tip_heights(&self) -> &[f64];

    /// Heights of the internal (coalescent) nodes.
    fn internal_heights(&self) -> &[f64];

    fn tip_count(&self) -> usize {
        self.tip_heights().len()
    }

    fn internal_count(&self) -> usize {
        self.internal_heights().len()
    }

    fn node_count(&self) -> usize {
        self.tip_count() + self.internal_count()
    }

    /// Height of the most ancestral internal node.
    fn root_height(&self) -> f64 {
        self.internal_heights().iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Owned tip/internal heights for one locus.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeHeights {
    tips: Vec<f64>,
    internal: Vec<f64>,
}

impl NodeHeights {
    /// Build a validated height set.
    ///
    /// # Errors
    /// Propagates [`validate_node_heights`] failures. The reported `locus` is
    /// always 0; likelihood construction re-validates with the real index.
    pub fn new(tips: Vec<f64>, internal: Vec<f64>) -> SkyResult<Self> {
        validate_node_heights(0, &tips, &internal)?;
        Ok(Self { tips, internal })
    }

    /// `n` contemporaneous tips at height 0 plus the given internal heights.
    pub fn isochronous(n: usize, internal: Vec<f64>) -> SkyResult<Self> {
        Self::new(vec![0.0; n], internal)
    }

    /// Overwrite one internal node height.
    pub fn set_internal_height(&mut self, index: usize, height: f64) -> SkyResult<()> {
        let len = self.internal.len();
        let slot =
            self.internal.get_mut(index).ok_or(SkyError::NodeOutOfRange { index, len })?;
        validate_height(0, index, height)?;
        *slot = height;
        Ok(())
    }

    /// Overwrite one tip height.
    pub fn set_tip_height(&mut self, index: usize, height: f64) -> SkyResult<()> {
        let len = self.tips.len();
        let slot = self.tips.get_mut(index).ok_or(SkyError::NodeOutOfRange { index, len })?;
        validate_height(0, index, height)?;
        *slot = height;
        Ok(())
    }

    /// Multiply every height by `factor` (a whole-tree scale move).
    pub fn scale(&mut self, factor: f64) -> SkyResult<()> {
        for (index, h) in self.tips.iter().chain(self.internal.iter()).enumerate() {
            validate_height(0, index, h * factor)?;
        }
        self.tips.iter_mut().chain(self.internal.iter_mut()).for_each(|h| *h *= factor);
        Ok(())
    }
}

impl Genealogy for NodeHeights {
    fn tip_heights(&self) -> &[f64] {
        &self.tips
    }

    fn internal_heights(&self) -> &[f64] {
        &self.internal
    }
}

impl<G: Genealogy + ?Sized> Genealogy for Box<G> {
    fn tip_heights(&self) -> &[f64] {
        (**self).tip_heights()
    }

    fn internal_heights(&self) -> &[f64] {
        (**self).internal_heights()
    }
}
