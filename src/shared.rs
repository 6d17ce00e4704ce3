//! Thread-safe handle over a [`CoherenceEngine`].
//!
//! Every operation takes the engine mutex for its whole duration, so the
//! single-writer rules hold across threads: racing `advance_field` calls for
//! one epoch index yield exactly one success and one
//! [`FieldError::StaleEpoch`](crate::error::FieldError::StaleEpoch), and
//! concurrent claims are serialised on the reserves.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{ClaimReceipt, CoherenceEngine, DecoherenceReceipt, EpochReport, PhaseUpdate};
use crate::error::Result;
use crate::field::{CoherenceField, FieldOverrides};
use crate::fixed::Fixed;
use crate::participant::{HarmonicCycle, Participant, ParticipantId};

/// Cloneable, `Send + Sync` handle to one engine.
#[derive(Clone, Debug)]
pub struct SharedEngine {
    inner: Arc<Mutex<CoherenceEngine>>,
}

impl SharedEngine {
    /// Wrap an engine.
    pub fn new(engine: CoherenceEngine) -> Self {
        Self { inner: Arc::new(Mutex::new(engine)) }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut CoherenceEngine) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Copy of the current field record.
    pub fn field(&self) -> CoherenceField {
        self.inner.lock().field().clone()
    }

    /// Copy of one participant record.
    pub fn participant(&self, id: ParticipantId) -> Option<Participant> {
        self.inner.lock().participant(id).cloned()
    }

    /// See [`CoherenceEngine::enter`].
    pub fn enter(&self, amplitude: u64, holdings: u64, cycle: HarmonicCycle) -> Result<ParticipantId> {
        self.inner.lock().enter(amplitude, holdings, cycle)
    }

    /// See [`CoherenceEngine::advance_field`]. Returns a copy of the new field.
    pub fn advance_field(&self, epoch_index: u64, overrides: FieldOverrides) -> Result<CoherenceField> {
        self.inner.lock().advance_field(epoch_index, overrides).cloned()
    }

    /// See [`CoherenceEngine::update_participant_phase`].
    pub fn update_participant_phase(&self, id: ParticipantId) -> Result<PhaseUpdate> {
        self.inner.lock().update_participant_phase(id)
    }

    /// See [`CoherenceEngine::step_epoch`].
    pub fn step_epoch(&self, dt: Fixed) -> Result<EpochReport> {
        self.inner.lock().step_epoch(dt)
    }

    /// See [`CoherenceEngine::claim_emissions`].
    pub fn claim_emissions(&self, id: ParticipantId) -> Result<ClaimReceipt> {
        self.inner.lock().claim_emissions(id)
    }

    /// See [`CoherenceEngine::decohere`].
    pub fn decohere(&self, id: ParticipantId, force: bool) -> Result<DecoherenceReceipt> {
        self.inner.lock().decohere(id, force)
    }

    /// Unwrap the engine if this is the last handle.
    pub fn try_into_inner(self) -> core::result::Result<CoherenceEngine, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl From<CoherenceEngine> for SharedEngine {
    fn from(engine: CoherenceEngine) -> Self {
        Self::new(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldConfig;

    #[test]
    fn handles_share_one_engine() {
        let shared = SharedEngine::new(CoherenceEngine::new(FieldConfig::default(), 0, 0).unwrap());
        let other = shared.clone();
        let id = other.enter(1_000_000, 1_000_000, HarmonicCycle::Quarter).unwrap();
        assert!(shared.participant(id).is_some());
        assert_eq!(shared.with(|e| e.field().participant_count), 1);

        drop(other);
        let engine = shared.try_into_inner().unwrap();
        assert_eq!(engine.field().total_weight, 1_000_000);
    }
}
