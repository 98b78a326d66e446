//! Propose/accept/reject cache — explicit dirty state plus value snapshots.
//!
//! Purpose
//! -------
//! Support the Metropolis–Hastings cycle of a sampler: store derived state
//! before a proposal, restore it verbatim on rejection, and do nothing on
//! acceptance. Recomputation is driven by an explicit [`CacheState`] instead
//! of scattered boolean flags.
//!
//! Key behaviors
//! -------------
//! - [`CacheState`] transitions: a genealogy change always moves to
//!   `DirtyIntervals`; a parameter change moves `Clean` to `DirtyLikelihood`
//!   and leaves the other states alone.
//! - [`StateCache`] holds a live value and a preallocated stored copy.
//!   `store`/`restore` copy element-wise with [`Snapshot::copy_from`], so the
//!   live and stored buffers never alias.
//!
//! Invariants & assumptions
//! ------------------------
//! - `store(); mutate(); restore();` leaves the live value bit-identical to
//!   its pre-store state.
//! - Buffer shapes are fixed at construction; `copy_from` never reallocates.
use crate::coalescent::{
    core::{
        params::FieldParams, statistics::SufficientStatistics, weights::SymTridiagonal,
    },
    errors::{SkyError, SkyResult},
};

/// What must be recomputed before the next likelihood value is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheState {
    /// Intervals, statistics, base matrix, and the scalar.
    #[default]
    DirtyIntervals,
    /// The scalar only.
    DirtyLikelihood,
    /// Nothing; the cached value is current.
    Clean,
}

impl CacheState {
    pub fn after_genealogy_change(self) -> Self {
        CacheState::DirtyIntervals
    }

    pub fn after_parameter_change(self) -> Self {
        match self {
            CacheState::Clean => CacheState::DirtyLikelihood,
            other => other,
        }
    }

    pub fn is_clean(self) -> bool {
        self == CacheState::Clean
    }
}

/// Element-wise copy into an existing value of the same shape.
pub trait Snapshot {
    fn copy_from(&mut self, other: &Self);
}

impl Snapshot for SufficientStatistics {
    fn copy_from(&mut self, other: &Self) {
        SufficientStatistics::copy_from(self, other);
    }
}

impl Snapshot for SymTridiagonal {
    fn copy_from(&mut self, other: &Self) {
        SymTridiagonal::copy_from(self, other);
    }
}

impl Snapshot for FieldParams {
    fn copy_from(&mut self, other: &Self) {
        FieldParams::copy_from(self, other);
    }
}

impl<T: Snapshot> Snapshot for Option<T> {
    fn copy_from(&mut self, other: &Self) {
        if let (Some(live), Some(stored)) = (self.as_mut(), other.as_ref()) {
            live.copy_from(stored);
        }
    }
}

/// Live value plus a stored copy.
#[derive(Debug, Clone)]
pub struct StateCache<T> {
    live: T,
    stored: T,
    has_stored: bool,
}

impl<T: Snapshot + Clone> StateCache<T> {
    pub fn new(initial: T) -> Self {
        Self { stored: initial.clone(), live: initial, has_stored: false }
    }

    pub fn live(&self) -> &T {
        &self.live
    }

    pub fn live_mut(&mut self) -> &mut T {
        &mut self.live
    }

    /// Stored copy, if [`StateCache::store`] has been called.
    pub fn stored(&self) -> Option<&T> {
        self.has_stored.then_some(&self.stored)
    }

    pub fn store(&mut self) {
        self.stored.copy_from(&self.live);
        self.has_stored = true;
    }

    /// Copy the stored value back into the live one.
    ///
    /// # Errors
    /// [`SkyError::NoStoredState`] if nothing was stored yet.
    pub fn restore(&mut self) -> SkyResult<()> {
        if !self.has_stored {
            return Err(SkyError::NoStoredState);
        }
        self.live.copy_from(&self.stored);
        Ok(())
    }

    /// Acceptance keeps the live value; nothing to do.
    pub fn accept(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Parameter changes only downgrade a clean cache; genealogy changes always
    // force interval recomputation.
    fn cache_state_transitions() {
        assert_eq!(CacheState::Clean.after_parameter_change(), CacheState::DirtyLikelihood);
        assert_eq!(
            CacheState::DirtyIntervals.after_parameter_change(),
            CacheState::DirtyIntervals
        );
        assert_eq!(
            CacheState::DirtyLikelihood.after_parameter_change(),
            CacheState::DirtyLikelihood
        );
        assert_eq!(CacheState::Clean.after_genealogy_change(), CacheState::DirtyIntervals);
        assert!(!CacheState::default().is_clean());
    }

    #[test]
    // Purpose
    // -------
    // store → mutate → restore is bit-identical and restore without store
    // fails.
    fn store_mutate_restore_round_trip() {
        let params = FieldParams::new(array![0.1, -0.3, 2.0], 1.5, 0.7).unwrap();
        let mut cache = StateCache::new(params.clone());
        assert_eq!(cache.restore(), Err(SkyError::NoStoredState));
        assert!(cache.stored().is_none());

        cache.store();
        cache.live_mut().log_pop_sizes[1] = 9.0;
        cache.live_mut().precision = 0.1;
        cache.restore().unwrap();

        assert_eq!(cache.live(), &params);
        for (a, b) in cache.live().log_pop_sizes.iter().zip(params.log_pop_sizes.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        cache.accept();
        assert_eq!(cache.live(), &params);
    }
}
