/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Participation state machine.
//!
//! Each participant is classified once per epoch into one of five states:
//!
//! ```text
//!   Attuning ──10 epochs ℓ>0.5──▶ Resonant ──50 epochs ℓ>0.8, depth>5──▶ Entrained
//!      ▲                              │                                     │
//!      │                              │ drift > π/4                         │ depth>φ⁴, ℓ>0.9
//!      │                              ▼                                     ▼
//!      └──────── drift resolved ── Drifting ◀──────── drift > π/4 ──────  Golden
//!
//!   (drift > π/4 sends every state to Drifting, Attuning included)
//! ```
//!
//! Transitions are evaluated from *counters*, never from a single sample, and
//! move at most one rung per epoch. Every transition resets the phase-lock
//! counter, so the ladder from entry to Golden takes at least
//! `resonant_epochs + entrained_epochs + 1` evaluations.
//!
//! Drift overrides the ladder: any state whose phase sits more than
//! `drift_limit` from Ψ falls to Drifting in that same evaluation, and
//! Drifting returns to Attuning with a cleared counter once the drift resolves.

use crate::config::FieldConfig;
use crate::fixed::Fixed;

// ─── ParticipationState ─────────────────────────────────────────────────────

/// Discrete participation state of a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParticipationState {
    /// Entry state: acquiring the collective phase.
    #[default]
    Attuning,
    /// Phase-locked with the field.
    Resonant,
    /// Deep, sustained synchronization.
    Entrained,
    /// Coherence depth beyond φ⁴ with near-perfect lock.
    Golden,
    /// Lost lock; returns to Attuning once the drift resolves.
    Drifting,
}

impl ParticipationState {
    /// Emission multiplier applied to the channel-weighted reward.
    pub const fn emission_multiplier(self) -> Fixed {
        match self {
            ParticipationState::Attuning => Fixed::HALF,
            ParticipationState::Resonant => Fixed::ONE,
            ParticipationState::Entrained => Fixed::PHI,
            ParticipationState::Golden => Fixed::PHI_SQUARED,
            ParticipationState::Drifting => Fixed::HALF,
        }
    }

    /// Governance weight multiplier applied to amplitude.
    pub const fn governance_multiplier(self) -> Fixed {
        match self {
            ParticipationState::Attuning => Fixed::HALF,
            ParticipationState::Resonant => Fixed::ONE,
            ParticipationState::Entrained => Fixed::from_int(2),
            ParticipationState::Golden => Fixed::PHI,
            ParticipationState::Drifting => Fixed::HALF,
        }
    }

    /// Phase-lock level the counter is measured against in this state.
    pub fn lock_threshold(self, config: &FieldConfig) -> Fixed {
        match self {
            ParticipationState::Attuning | ParticipationState::Drifting => config.resonant_threshold,
            ParticipationState::Resonant => config.entrained_threshold,
            ParticipationState::Entrained | ParticipationState::Golden => config.golden_threshold,
        }
    }
}

// ─── Observation ────────────────────────────────────────────────────────────

/// What the state machine sees of a participant in one epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    /// Phase lock `(cos(θ − Ψ) + 1) / 2`.
    pub lock: Fixed,
    /// Angular drift `|θ − Ψ|` in `[0, π]`.
    pub drift: Fixed,
    /// Current coherence depth.
    pub depth: Fixed,
}

/// Consecutive-epoch counters carried between evaluations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Epochs above the current state's lock threshold.
    pub phase_lock: u32,
    /// Consecutive epochs beyond the drift limit.
    pub drift: u32,
}

// ─── Step ───────────────────────────────────────────────────────────────────

/// Advance the machine by one epoch and return the new state.
///
/// Counters are updated in place. At most one transition happens per call.
pub fn step(
    state: ParticipationState,
    counters: &mut Counters,
    obs: &Observation,
    config: &FieldConfig,
) -> ParticipationState {
    let drifting = obs.drift > config.drift_limit;
    counters.drift = if drifting { counters.drift.saturating_add(1) } else { 0 };

    if drifting {
        counters.phase_lock = 0;
        return ParticipationState::Drifting;
    }
    if state == ParticipationState::Drifting {
        counters.phase_lock = 0;
        return ParticipationState::Attuning;
    }

    if obs.lock > state.lock_threshold(config) {
        counters.phase_lock = counters.phase_lock.saturating_add(1);
    } else {
        counters.phase_lock = 0;
    }

    let next = match state {
        ParticipationState::Attuning if counters.phase_lock >= config.resonant_epochs => {
            ParticipationState::Resonant
        }
        ParticipationState::Resonant
            if counters.phase_lock >= config.entrained_epochs
                && obs.depth > config.entrained_depth =>
        {
            ParticipationState::Entrained
        }
        ParticipationState::Entrained
            if obs.depth > config.golden_depth && obs.lock > config.golden_threshold =>
        {
            ParticipationState::Golden
        }
        s => s,
    };

    if next != state {
        counters.phase_lock = 0;
    }
    next
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(lock: f64, drift: f64, depth: f64) -> Observation {
        Observation {
            lock: Fixed::from_f64(lock),
            drift: Fixed::from_f64(drift),
            depth: Fixed::from_f64(depth),
        }
    }

    fn locked(depth: f64) -> Observation {
        obs(0.99, 0.05, depth)
    }

    #[test]
    fn test_multiplier_table() {
        assert_eq!(ParticipationState::Attuning.emission_multiplier(), Fixed::HALF);
        assert_eq!(ParticipationState::Resonant.emission_multiplier(), Fixed::ONE);
        assert_eq!(ParticipationState::Entrained.emission_multiplier(), Fixed::PHI);
        assert_eq!(ParticipationState::Golden.emission_multiplier(), Fixed::PHI_SQUARED);
    }

    #[test]
    fn test_attuning_to_resonant_after_ten_epochs() {
        let c = FieldConfig::default();
        let mut counters = Counters::default();
        let mut s = ParticipationState::Attuning;
        for epoch in 1..=9 {
            s = step(s, &mut counters, &obs(0.9, 0.5, 5.0), &c);
            assert_eq!(s, ParticipationState::Attuning, "epoch {}", epoch);
        }
        s = step(s, &mut counters, &obs(0.9, 0.5, 5.0), &c);
        assert_eq!(s, ParticipationState::Resonant);
        assert_eq!(counters.phase_lock, 0, "counter resets on transition");
    }

    #[test]
    fn test_counter_resets_on_violation() {
        let c = FieldConfig::default();
        let mut counters = Counters::default();
        let mut s = ParticipationState::Attuning;
        for _ in 0..9 {
            s = step(s, &mut counters, &obs(0.9, 0.5, 5.0), &c);
        }
        s = step(s, &mut counters, &obs(0.4, 0.5, 5.0), &c);
        assert_eq!(counters.phase_lock, 0);
        for _ in 0..9 {
            s = step(s, &mut counters, &obs(0.9, 0.5, 5.0), &c);
        }
        assert_eq!(s, ParticipationState::Attuning);
    }

    #[test]
    fn attuning_drifts_immediately() {
        let c = FieldConfig::default();
        let mut counters = Counters { phase_lock: 9, drift: 0 };
        let s = step(ParticipationState::Attuning, &mut counters, &obs(0.77, 1.0, 5.0), &c);
        assert_eq!(s, ParticipationState::Drifting);
        assert_eq!(counters, Counters { phase_lock: 0, drift: 1 });
    }

    #[test]
    fn drift_never_qualifies_for_resonant() {
        let c = FieldConfig::default();
        let mut counters = Counters::default();
        let mut s = ParticipationState::Attuning;
        for _ in 0..20 {
            s = step(s, &mut counters, &obs(0.77, 1.0, 5.0), &c);
            assert_eq!(s, ParticipationState::Drifting);
        }
        assert_eq!(counters.drift, 20);
    }

    #[test]
    fn test_resonant_to_entrained_requires_depth() {
        let c = FieldConfig::default();
        let mut counters = Counters::default();
        let mut s = ParticipationState::Resonant;
        for _ in 0..60 {
            s = step(s, &mut counters, &locked(5.0), &c);
        }
        assert_eq!(s, ParticipationState::Resonant, "depth 5.0 is not > 5.0");
        s = step(s, &mut counters, &locked(5.1), &c);
        assert_eq!(s, ParticipationState::Entrained);
    }

    #[test]
    fn test_no_state_skipping_under_perfect_metrics() {
        let c = FieldConfig::default();
        let mut counters = Counters::default();
        let mut s = ParticipationState::Attuning;
        let mut golden_at = None;
        for evaluation in 1..=200u32 {
            let prev = s;
            s = step(s, &mut counters, &locked(9.0), &c);
            if prev == ParticipationState::Attuning {
                assert!(matches!(s, ParticipationState::Attuning | ParticipationState::Resonant));
            }
            if prev == ParticipationState::Resonant {
                assert!(matches!(s, ParticipationState::Resonant | ParticipationState::Entrained));
            }
            if s == ParticipationState::Golden && golden_at.is_none() {
                golden_at = Some(evaluation);
            }
        }
        assert_eq!(golden_at, Some(61));
    }

    #[test]
    fn every_state_falls_to_drifting_in_one_epoch() {
        let c = FieldConfig::default();
        for from in [
            ParticipationState::Resonant,
            ParticipationState::Entrained,
            ParticipationState::Golden,
        ] {
            let mut counters = Counters { phase_lock: 7, drift: 0 };
            let s = step(from, &mut counters, &obs(0.1, 2.5, 9.0), &c);
            assert_eq!(s, ParticipationState::Drifting, "from {:?}", from);
            assert_eq!(counters.phase_lock, 0);
        }
    }

    #[test]
    fn test_drifting_returns_to_attuning_once_resolved() {
        let c = FieldConfig::default();
        let mut counters = Counters::default();
        let mut s = ParticipationState::Entrained;

        s = step(s, &mut counters, &obs(0.2, 2.0, 6.0), &c);
        assert_eq!(s, ParticipationState::Drifting);
        s = step(s, &mut counters, &obs(0.2, 2.0, 6.0), &c);
        assert_eq!(s, ParticipationState::Drifting);
        assert_eq!(counters.drift, 2);

        s = step(s, &mut counters, &locked(6.0), &c);
        assert_eq!(s, ParticipationState::Attuning);
        assert_eq!(counters, Counters::default());
    }
}
