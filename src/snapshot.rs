//! Persisted engine state.
//!
//! A [`FieldSnapshot`] is the complete persisted layout: one field record, one
//! record per active participant and one record per directed edge. Every
//! real-valued quantity is a [`Fixed`](crate::fixed::Fixed) mantissa, so the
//! serialised form contains integers only and restores bit-identically.
//!
//! Records are written in id order, so two engines in the same state produce
//! byte-identical snapshots.
//!
//! # Example
//!
//! ```rust,ignore
//! let snapshot = engine.snapshot();
//! let json = serde_json::to_string(&snapshot)?;
//! let restored = CoherenceEngine::from_snapshot(serde_json::from_str(&json)?)?;
//! ```

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::config::FieldConfig;
use crate::coupling::{CouplingGraph, PhaseCoupling};
use crate::engine::CoherenceEngine;
use crate::error::{FieldError, Result};
use crate::field::CoherenceField;
use crate::participant::{Participant, ParticipantId};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Serialisable image of a [`CoherenceEngine`].
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct FieldSnapshot {
    /// Format version, [`SNAPSHOT_VERSION`] for new snapshots.
    pub version: u16,
    /// Engine configuration.
    pub config: FieldConfig,
    /// The aggregate field record.
    pub field: CoherenceField,
    /// Participants ordered by id.
    pub participants: Vec<Participant>,
    /// Edges ordered by `(source, target)`.
    pub couplings: Vec<PhaseCoupling>,
    /// Id the next derived entry receives. Exited ids are never reissued.
    pub next_id: ParticipantId,
}

impl CoherenceEngine {
    /// Capture the full engine state.
    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config().clone(),
            field: self.field().clone(),
            participants: self.participants().cloned().collect(),
            couplings: self.couplings().into_iter().cloned().collect(),
            next_id: self.next_id(),
        }
    }

    /// Rebuild an engine from a snapshot.
    ///
    /// Rejects unknown versions, duplicate ids, dangling or duplicate edges,
    /// locked-amplitude totals that disagree with the edge set and a `next_id`
    /// that does not lie above every live id.
    pub fn from_snapshot(snapshot: FieldSnapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(FieldError::InvalidSnapshot("unsupported snapshot version"));
        }
        snapshot.config.validate()?;

        let mut participants: BTreeMap<ParticipantId, Participant> = BTreeMap::new();
        for p in snapshot.participants {
            if participants.insert(p.id, p).is_some() {
                return Err(FieldError::InvalidSnapshot("duplicate participant id"));
            }
        }

        if let Some(highest) = participants.keys().next_back() {
            if snapshot.next_id <= *highest {
                return Err(FieldError::InvalidSnapshot("next_id would reissue a live id"));
            }
        }

        let mut locked: BTreeMap<ParticipantId, u64> = BTreeMap::new();
        let mut couplings = CouplingGraph::new();
        for edge in snapshot.couplings {
            if !participants.contains_key(&edge.source_id) || !participants.contains_key(&edge.target_id) {
                return Err(FieldError::InvalidSnapshot("coupling references a missing participant"));
            }
            if edge.source_id == edge.target_id {
                return Err(FieldError::InvalidSnapshot("self coupling"));
            }
            if couplings.get(edge.source_id, edge.target_id).is_some() {
                return Err(FieldError::InvalidSnapshot("duplicate coupling"));
            }
            let total = locked.entry(edge.source_id).or_insert(0);
            *total = total.checked_add(edge.locked_amplitude).ok_or(FieldError::ArithmeticOverflow)?;
            couplings.insert(edge);
        }
        for p in participants.values() {
            if p.locked_amplitude != locked.get(&p.id).copied().unwrap_or(0) {
                return Err(FieldError::InvalidSnapshot("locked amplitude disagrees with couplings"));
            }
        }

        let weight = participants.values().fold(0u64, |acc, p| acc.saturating_add(p.amplitude));
        if weight != snapshot.field.total_weight || participants.len() as u64 != snapshot.field.participant_count {
            return Err(FieldError::InvalidSnapshot("field totals disagree with participants"));
        }

        Ok(CoherenceEngine::from_parts(
            snapshot.config,
            snapshot.field,
            participants,
            couplings,
            snapshot.next_id.0,
        ))
    }
}
