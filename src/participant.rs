/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Participants: the phase oscillators of the field.
//!
//! A [`Participant`] is created on entry, mutated once per epoch and destroyed
//! on exit. Besides its oscillator state (phase, natural frequency) it carries
//! three smoothed accumulators that grow through sustained alignment with the
//! global phase and relax when alignment is lost:
//!
//! - `phase_lock_integral`: EMA of the instantaneous phase lock.
//! - `stability`: EMA of how closely each epoch's lock matches that history.
//! - `coherence_depth`: baseline plus overtone-like gains earned while deeply locked.
//!
//! # Invariants
//!
//! - `phase ∈ [0, 2π)` after every update.
//! - `stability` and `phase_lock_integral` stay in `[0, 1]`.
//! - `coherence_depth` never drops below the configured baseline.

use core::fmt;

use crate::config::FieldConfig;
use crate::fixed::Fixed;
use crate::state::ParticipationState;

// ─── ParticipantId ──────────────────────────────────────────────────────────

/// Opaque participant identifier, unique within a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ─── HarmonicCycle ──────────────────────────────────────────────────────────

/// Commitment period chosen on entry.
///
/// The cycle length is the denominator of decoherence progress; longer
/// commitments earn a larger emission base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HarmonicCycle {
    /// 91 epochs.
    #[default]
    Quarter,
    /// 182 epochs.
    Half,
    /// 365 epochs.
    Full,
    /// 591 epochs (≈ φ × 365).
    Golden,
}

impl HarmonicCycle {
    /// Cycle length in epochs.
    pub const fn epochs(self) -> u64 {
        match self {
            HarmonicCycle::Quarter => 91,
            HarmonicCycle::Half => 182,
            HarmonicCycle::Full => 365,
            HarmonicCycle::Golden => 591,
        }
    }

    /// Emission multiplier folded into the per-epoch base.
    pub const fn emission_multiplier(self) -> Fixed {
        match self {
            HarmonicCycle::Quarter => Fixed::ONE,
            HarmonicCycle::Half => Fixed::from_raw(Fixed::ONE.raw() + Fixed::PHI_INVERSE.raw()),
            HarmonicCycle::Full => Fixed::PHI,
            HarmonicCycle::Golden => Fixed::PHI_SQUARED,
        }
    }
}

// ─── Participant ────────────────────────────────────────────────────────────

/// A single oscillator in the coherence field.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Participant {
    /// Unique identifier.
    pub id: ParticipantId,
    /// Weight in the field. At least the configured minimum while active.
    pub amplitude: u64,
    /// Phase θ in `[0, 2π)`.
    pub phase: Fixed,
    /// Phase at the latest field advance. Coupling pulls toward this
    /// participant read it, so every update in an epoch sees the same snapshot.
    pub snapshot_phase: Fixed,
    /// Natural frequency ω (rad/epoch), fixed at creation.
    pub natural_frequency: Fixed,
    /// Smoothed lock consistency in `[0, 1]`.
    pub stability: Fixed,
    /// Smoothed historical phase lock in `[0, 1]`.
    pub phase_lock_integral: Fixed,
    /// Derived depth scalar driving resonance reward and state thresholds.
    pub coherence_depth: Fixed,
    /// Current participation state.
    pub state: ParticipationState,
    /// Consecutive epochs meeting the current state's lock threshold.
    pub phase_lock_epoch_counter: u32,
    /// Consecutive epochs drifting beyond the drift limit.
    pub drift_epoch_counter: u32,
    /// Field epoch at entry.
    pub entry_epoch: u64,
    /// Chosen commitment cycle.
    pub cycle: HarmonicCycle,
    /// Cycle length in epochs (denominator of decoherence progress).
    pub cycle_length: u64,
    /// Epoch of the last phase update; guards per-epoch idempotence.
    pub last_phase_epoch: Option<u64>,
    /// Epoch of the last successful claim.
    pub last_claim_epoch: u64,
    /// Accrued, unpaid emission drawn from the main reserve.
    pub unclaimed_balance: u64,
    /// Accrued, unpaid Golden multiplier bonus drawn from the golden reserve.
    pub unclaimed_golden_bonus: u64,
    /// Lifetime emissions paid out.
    pub total_claimed: u64,
    /// Sum of locked amplitude on this participant's outgoing couplings.
    pub locked_amplitude: u64,
}

impl Participant {
    /// Create a participant in the Attuning state at the given epoch.
    pub fn new(
        id: ParticipantId,
        amplitude: u64,
        cycle: HarmonicCycle,
        phase: Fixed,
        natural_frequency: Fixed,
        epoch: u64,
        config: &FieldConfig,
    ) -> Self {
        Self {
            id,
            amplitude,
            phase: phase.wrap_phase(),
            snapshot_phase: phase.wrap_phase(),
            natural_frequency,
            stability: Fixed::ZERO,
            phase_lock_integral: Fixed::ZERO,
            coherence_depth: config.depth_baseline,
            state: ParticipationState::Attuning,
            phase_lock_epoch_counter: 0,
            drift_epoch_counter: 0,
            entry_epoch: epoch,
            cycle,
            cycle_length: cycle.epochs(),
            last_phase_epoch: Some(epoch),
            last_claim_epoch: epoch,
            unclaimed_balance: 0,
            unclaimed_golden_bonus: 0,
            total_claimed: 0,
            locked_amplitude: 0,
        }
    }

    /// Amplitude not committed to outgoing couplings.
    pub fn free_amplitude(&self) -> u64 {
        self.amplitude.saturating_sub(self.locked_amplitude)
    }

    /// Voting weight: amplitude × state governance multiplier.
    pub fn governance_weight(&self) -> u64 {
        self.state.governance_multiplier().scale_amount(self.amplitude)
    }

    /// Total unpaid emissions across both reserves.
    pub fn total_unclaimed(&self) -> u64 {
        self.unclaimed_balance.saturating_add(self.unclaimed_golden_bonus)
    }

    /// Phase lock against a global phase: `(cos(θ − Ψ) + 1) / 2` in `[0, 1]`.
    pub fn phase_lock(&self, global_phase: Fixed) -> Fixed {
        phase_lock(self.phase, global_phase)
    }

    /// Fold one epoch's observed lock into the smoothed accumulators.
    ///
    /// Depth grows while the lock exceeds the entrained threshold and relaxes
    /// 1 % toward the baseline while it sits below the resonant threshold.
    pub fn absorb_lock(&mut self, lock: Fixed, config: &FieldConfig) {
        let integral = ema(self.phase_lock_integral, lock, config.integral_smoothing);
        let consistency = (Fixed::ONE - (lock - integral).abs()).clamp_unit();
        self.stability = ema(self.stability, consistency, config.stability_smoothing);
        self.phase_lock_integral = integral;

        if lock > config.entrained_threshold {
            self.coherence_depth += config.depth_growth_rate * lock * self.stability;
        } else if lock < config.resonant_threshold {
            let excess = self.coherence_depth - config.depth_baseline;
            if excess.is_positive() {
                self.coherence_depth -= excess.div_int(100).unwrap_or(Fixed::ZERO);
            }
        }
    }

    /// Deterministic initial phase from the participant id and entry epoch.
    pub fn seeded_phase(id: ParticipantId, epoch: u64) -> Fixed {
        // SplitMix64 finaliser over (id, epoch).
        let mut z = id.0 ^ epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        Fixed::from_raw((z % Fixed::TWO_PI.raw() as u64) as i64)
    }

    /// Natural frequency for an amplitude: large holders turn 5 % slower.
    pub fn natural_frequency_for(amplitude: u64, config: &FieldConfig) -> Fixed {
        if amplitude > Fixed::SCALE as u64 {
            config.base_natural_frequency * Fixed::from_ratio(95, 100)
        } else {
            config.base_natural_frequency
        }
    }
}

/// `(cos(θ − Ψ) + 1) / 2`, clamped to `[0, 1]`.
pub fn phase_lock(phase: Fixed, global_phase: Fixed) -> Fixed {
    ((phase - global_phase).cos() + Fixed::ONE)
        .div_int(2)
        .unwrap_or(Fixed::ZERO)
        .clamp_unit()
}

/// Exponential moving average step: `prev + α·(sample − prev)`.
fn ema(prev: Fixed, sample: Fixed, alpha: Fixed) -> Fixed {
    (prev + alpha * (sample - prev)).clamp_unit()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
