//! Field events.
//!
//! Every state-changing engine operation produces one or more [`FieldEvent`]s.
//! Each event is emitted as a structured `tracing` record. With the
//! `event-log` feature the engine also keeps the most recent
//! [`EVENT_LOG_CAPACITY`] events in a fixed-size [`EventLog`].

use crate::fixed::Fixed;
use crate::participant::{HarmonicCycle, ParticipantId};
use crate::state::ParticipationState;

/// Number of events retained by [`EventLog`].
pub const EVENT_LOG_CAPACITY: usize = 64;

/// Something observable that happened to the field.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldEvent {
    /// A participant joined.
    Entered {
        /// New participant.
        id: ParticipantId,
        /// Amplitude committed.
        amplitude: u64,
        /// Chosen cycle.
        cycle: HarmonicCycle,
        /// Field epoch at entry.
        epoch: u64,
    },
    /// A participant exited.
    Decohered {
        /// Departed participant.
        id: ParticipantId,
        /// Amplitude handed back.
        returned_amplitude: u64,
        /// Amplitude recycled into the reserve.
        cost: u64,
        /// Unclaimed emissions paid on exit.
        emissions_paid: u64,
        /// Field epoch at exit.
        epoch: u64,
    },
    /// A coupling edge was created.
    Coupled {
        /// Edge source.
        source: ParticipantId,
        /// Edge target.
        target: ParticipantId,
        /// Edge strength.
        strength: Fixed,
        /// Amplitude locked on the source.
        locked_amplitude: u64,
    },
    /// A coupling edge was removed.
    Uncoupled {
        /// Edge source.
        source: ParticipantId,
        /// Edge target.
        target: ParticipantId,
        /// Amplitude released back to the source.
        released_amplitude: u64,
    },
    /// Accrued emissions were paid out.
    EmissionsClaimed {
        /// Claimant.
        id: ParticipantId,
        /// Paid from the main reserve.
        main: u64,
        /// Paid from the golden reserve.
        golden: u64,
        /// Field epoch of the claim.
        epoch: u64,
    },
    /// A participant changed participation state.
    StateTransition {
        /// Participant.
        id: ParticipantId,
        /// Previous state.
        from: ParticipationState,
        /// New state.
        to: ParticipationState,
        /// Field epoch of the evaluation.
        epoch: u64,
    },
    /// A participant reached the Golden state.
    GoldenAchieved {
        /// Participant.
        id: ParticipantId,
        /// Field epoch.
        epoch: u64,
    },
    /// The field accepted a new epoch.
    FieldAdvanced {
        /// New epoch index.
        epoch: u64,
        /// Order parameter R.
        order_parameter: Fixed,
        /// Global phase Ψ.
        global_phase: Fixed,
        /// Active participants.
        participant_count: u64,
    },
    /// R rose through the coherence-peak threshold.
    CoherencePeak {
        /// Epoch at which the peak was reached.
        epoch: u64,
        /// Order parameter R.
        order_parameter: Fixed,
    },
}

impl FieldEvent {
    /// Emit this event as a structured `tracing` record.
    pub fn trace(&self) {
        match self {
            FieldEvent::Entered { id, amplitude, cycle, epoch } => {
                tracing::info!(%id, amplitude, ?cycle, epoch, "participant entered");
            }
            FieldEvent::Decohered { id, returned_amplitude, cost, emissions_paid, epoch } => {
                tracing::info!(%id, returned_amplitude, cost, emissions_paid, epoch, "participant decohered");
            }
            FieldEvent::Coupled { source, target, strength, locked_amplitude } => {
                tracing::info!(%source, %target, %strength, locked_amplitude, "phase coupled");
            }
            FieldEvent::Uncoupled { source, target, released_amplitude } => {
                tracing::info!(%source, %target, released_amplitude, "uncoupled");
            }
            FieldEvent::EmissionsClaimed { id, main, golden, epoch } => {
                tracing::info!(%id, main, golden, epoch, "emissions claimed");
            }
            FieldEvent::StateTransition { id, from, to, epoch } => {
                tracing::info!(%id, ?from, ?to, epoch, "state transition");
            }
            FieldEvent::GoldenAchieved { id, epoch } => {
                tracing::info!(%id, epoch, "golden state achieved");
            }
            FieldEvent::FieldAdvanced { epoch, order_parameter, global_phase, participant_count } => {
                tracing::info!(
                    epoch,
                    r = %order_parameter,
                    psi = %global_phase,
                    participant_count,
                    "field advanced"
                );
            }
            FieldEvent::CoherencePeak { epoch, order_parameter } => {
                tracing::info!(epoch, r = %order_parameter, "coherence peak");
            }
        }
    }
}

// ─── EventLog ───────────────────────────────────────────────────────────────

/// Bounded journal of the most recent events. Oldest entries are dropped first.
#[cfg(feature = "event-log")]
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: heapless::Deque<FieldEvent, EVENT_LOG_CAPACITY>,
    dropped: u64,
}

#[cfg(feature = "event-log")]
impl EventLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, evicting the oldest when full.
    pub fn push(&mut self, event: FieldEvent) {
        if self.events.is_full() {
            self.events.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        // Cannot fail: a slot was freed above.
        let _ = self.events.push_back(event);
    }

    /// Retained events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &FieldEvent> {
        self.events.iter()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` when nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events evicted since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Most recent event.
    pub fn last(&self) -> Option<&FieldEvent> {
        self.events.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_does_not_require_a_subscriber() {
        FieldEvent::GoldenAchieved { id: ParticipantId(1), epoch: 3 }.trace();
    }

    #[cfg(feature = "event-log")]
    #[test]
    fn log_keeps_most_recent() {
        let mut log = EventLog::new();
        for epoch in 0..(EVENT_LOG_CAPACITY as u64 + 10) {
            log.push(FieldEvent::GoldenAchieved { id: ParticipantId(1), epoch });
        }
        assert_eq!(log.len(), EVENT_LOG_CAPACITY);
        assert_eq!(log.dropped(), 10);
        assert_eq!(
            log.iter().next(),
            Some(&FieldEvent::GoldenAchieved { id: ParticipantId(1), epoch: 10 })
        );
        assert_eq!(
            log.last(),
            Some(&FieldEvent::GoldenAchieved { id: ParticipantId(1), epoch: EVENT_LOG_CAPACITY as u64 + 9 })
        );
    }
}
