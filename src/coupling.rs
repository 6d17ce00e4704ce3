/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Directed phase-coupling edges.
//!
//! An edge `source → target` pulls only the source toward the target's phase.
//! Edges hold participant ids, never copies of participant records.
//!
//! # Invariants
//!
//! - No self-edges; at most one edge per ordered pair.
//! - `strength ∈ [0, max_coupling_strength]`.
//! - While an edge exists its `locked_amplitude` is counted in the source's
//!   `Participant::locked_amplitude`.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::config::FieldConfig;
use crate::error::{FieldError, Result};
use crate::fixed::Fixed;
use crate::participant::{Participant, ParticipantId};

/// Ordered `(source, target)` key.
pub type CouplingKey = (ParticipantId, ParticipantId);

// ─── PhaseCoupling ──────────────────────────────────────────────────────────

/// A directed coupling edge.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseCoupling {
    /// Participant pulled by this edge.
    pub source_id: ParticipantId,
    /// Participant whose phase the source is pulled toward.
    pub target_id: ParticipantId,
    /// Coupling strength κ.
    pub strength: Fixed,
    /// Source amplitude committed to the edge.
    pub locked_amplitude: u64,
    /// Field epoch at creation.
    pub creation_epoch: u64,
    /// Source emissions attributed to the locked amplitude since creation.
    pub shared_emission_accrual: u64,
}

impl PhaseCoupling {
    /// Key of this edge.
    pub fn key(&self) -> CouplingKey {
        (self.source_id, self.target_id)
    }
}

// ─── CouplingGraph ──────────────────────────────────────────────────────────

/// All active edges, keyed by ordered pair.
#[derive(Clone, Debug, Default)]
pub struct CouplingGraph {
    edges: HashMap<CouplingKey, PhaseCoupling>,
}

impl CouplingGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// `true` when there are no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Look up an edge.
    pub fn get(&self, source: ParticipantId, target: ParticipantId) -> Option<&PhaseCoupling> {
        self.edges.get(&(source, target))
    }

    /// Check a prospective edge from `source` to `target`.
    ///
    /// The caller resolves the target record; this only checks the edge itself.
    pub fn validate(
        &self,
        source: &Participant,
        target: ParticipantId,
        strength: Fixed,
        locked_amplitude: u64,
        config: &FieldConfig,
    ) -> Result<()> {
        if source.id == target {
            return Err(FieldError::SelfCoupling(source.id));
        }
        if strength.is_negative() || strength > config.max_coupling_strength {
            return Err(FieldError::InvalidCouplingStrength {
                strength,
                max: config.max_coupling_strength,
            });
        }
        if self.edges.contains_key(&(source.id, target)) {
            return Err(FieldError::DuplicateCoupling { from: source.id, to: target });
        }
        if locked_amplitude > source.free_amplitude() {
            return Err(FieldError::InvalidAmplitude {
                amplitude: locked_amplitude,
                min: 0,
                max: source.free_amplitude(),
            });
        }
        Ok(())
    }

    /// Insert a validated edge.
    pub fn insert(&mut self, edge: PhaseCoupling) {
        self.edges.insert(edge.key(), edge);
    }

    /// Remove one edge.
    pub fn remove(&mut self, source: ParticipantId, target: ParticipantId) -> Option<PhaseCoupling> {
        self.edges.remove(&(source, target))
    }

    /// Remove every edge with `id` as source or target, ordered by key.
    pub fn remove_touching(&mut self, id: ParticipantId) -> Vec<PhaseCoupling> {
        let mut keys: Vec<CouplingKey> =
            self.edges.keys().filter(|(s, t)| *s == id || *t == id).copied().collect();
        keys.sort_unstable();
        keys.iter().filter_map(|k| self.edges.remove(k)).collect()
    }

    /// Edges with `source` as source, ordered by target id.
    pub fn outgoing(&self, source: ParticipantId) -> Vec<&PhaseCoupling> {
        let mut out: Vec<&PhaseCoupling> = self.edges.values().filter(|e| e.source_id == source).collect();
        out.sort_unstable_by_key(|e| e.target_id);
        out
    }

    /// Mutable access to the edges leaving `source`.
    pub fn outgoing_mut(&mut self, source: ParticipantId) -> impl Iterator<Item = &mut PhaseCoupling> {
        self.edges.values_mut().filter(move |e| e.source_id == source)
    }

    /// Every edge, ordered by key.
    pub fn sorted(&self) -> Vec<&PhaseCoupling> {
        let mut all: Vec<&PhaseCoupling> = self.edges.values().collect();
        all.sort_unstable_by_key(|e| e.key());
        all
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
