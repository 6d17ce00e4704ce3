/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Multi-channel emission: per-epoch accrual and reserve-bounded payout.
//!
//! Four channels are evaluated for each participant every epoch:
//!
//! | Channel | Value |
//! |---|---|
//! | Attunement | `(cos(θ − Ψ) + 1) / 2` |
//! | Resonance | `φ⁻¹ ^ |depth − φ⁴|` |
//! | Entrainment | `stability × D / D_target`, clamped to `[0, 1]` |
//! | Depth | `credit × network_depth / φ⁴`, clamped to `[0, 1]` |
//!
//! ```text
//! reward = amplitude × base_rate × cycle_multiplier × Σ wₖ·channelₖ × state_multiplier
//! ```
//!
//! A Golden participant accrues the 1.0× share against the main reserve and
//! the remaining `φ² − 1` share as a bonus against the golden reserve.
//!
//! # Invariants
//!
//! - Payout is all-or-nothing: if either reserve cannot cover its part,
//!   nothing is paid and nothing changes.
//! - Reserve balances never go below zero.

use crate::config::{ChannelWeights, FieldConfig};
use crate::error::{FieldError, Result};
use crate::field::CoherenceField;
use crate::fixed::Fixed;
use crate::participant::{phase_lock, Participant};
use crate::state::ParticipationState;

// ─── Channels ───────────────────────────────────────────────────────────────

/// The four channel values for one participant in one epoch, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channels {
    /// Instantaneous phase alignment with Ψ.
    pub attunement: Fixed,
    /// Closeness of coherence depth to the golden target.
    pub resonance: Fixed,
    /// Stability scaled by field decentralization.
    pub entrainment: Fixed,
    /// Participation credit scaled by network depth.
    pub depth: Fixed,
}

impl Channels {
    /// Evaluate every channel against the current field snapshot.
    pub fn evaluate(p: &Participant, field: &CoherenceField, config: &FieldConfig) -> Self {
        let attunement = phase_lock(p.phase, field.global_phase);

        let distance = (p.coherence_depth - config.golden_depth).abs();
        let resonance = Fixed::PHI_INVERSE.pow(distance).unwrap_or(Fixed::ZERO).clamp_unit();

        let entrainment = (p.stability * field.decentralization_coefficient)
            .checked_div(config.target_decentralization)
            .unwrap_or(Fixed::ZERO)
            .clamp_unit();

        let depth = (config.participation_credit * field.network_coherence_depth)
            .checked_div(config.golden_depth)
            .unwrap_or(Fixed::ZERO)
            .clamp_unit();

        Self { attunement, resonance, entrainment, depth }
    }

    /// Weighted sum `Σ wₖ·channelₖ`.
    pub fn weighted(&self, weights: &ChannelWeights) -> Fixed {
        weights.attunement * self.attunement
            + weights.resonance * self.resonance
            + weights.entrainment * self.entrainment
            + weights.depth * self.depth
    }
}

// ─── Accrual ────────────────────────────────────────────────────────────────

/// One epoch's emission for a participant, split by reserve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Accrual {
    /// Drawn from the main reserve.
    pub main: u64,
    /// Golden multiplier bonus, drawn from the golden reserve.
    pub golden_bonus: u64,
}

impl Accrual {
    /// Sum of both parts.
    pub fn total(&self) -> u64 {
        self.main.saturating_add(self.golden_bonus)
    }
}

/// Emission earned by `p` for the current epoch.
pub fn epoch_accrual(p: &Participant, field: &CoherenceField, config: &FieldConfig) -> Accrual {
    let weighted = Channels::evaluate(p, field, config).weighted(&config.channel_weights);
    let factor = config.base_emission_rate * p.cycle.emission_multiplier() * weighted;

    match p.state {
        ParticipationState::Golden => {
            let bonus = p.state.emission_multiplier() - Fixed::ONE;
            Accrual {
                main: factor.scale_amount(p.amplitude),
                golden_bonus: (factor * bonus).scale_amount(p.amplitude),
            }
        }
        state => Accrual {
            main: (factor * state.emission_multiplier()).scale_amount(p.amplitude),
            golden_bonus: 0,
        },
    }
}

/// `amount × part / whole`, truncated. Zero when `whole == 0`.
pub fn pro_rata(amount: u64, part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    (amount as u128 * part.min(whole) as u128 / whole as u128) as u64
}

// ─── Payout ─────────────────────────────────────────────────────────────────

/// Amounts moved by a successful payout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Payout {
    /// Paid from the main reserve.
    pub main: u64,
    /// Paid from the golden reserve.
    pub golden: u64,
}

impl Payout {
    /// Sum of both parts.
    pub fn total(&self) -> u64 {
        self.main.saturating_add(self.golden)
    }
}

/// Fail with [`FieldError::ReserveDepleted`] unless both reserves cover `p`'s
/// unclaimed balances.
pub fn check_reserves(p: &Participant, field: &CoherenceField) -> Result<()> {
    if p.unclaimed_balance > field.reserve_balance {
        return Err(FieldError::ReserveDepleted {
            required: p.unclaimed_balance,
            available: field.reserve_balance,
        });
    }
    if p.unclaimed_golden_bonus > field.golden_reserve_balance {
        return Err(FieldError::ReserveDepleted {
            required: p.unclaimed_golden_bonus,
            available: field.golden_reserve_balance,
        });
    }
    Ok(())
}

/// Pay out every unclaimed balance of `p`, debiting the reserves.
///
/// Checks both reserves before touching either.
pub fn pay_unclaimed(p: &mut Participant, field: &mut CoherenceField) -> Result<Payout> {
    check_reserves(p, field)?;
    let total_claimed = p
        .total_claimed
        .checked_add(p.total_unclaimed())
        .ok_or(FieldError::ArithmeticOverflow)?;

    let payout = Payout { main: p.unclaimed_balance, golden: p.unclaimed_golden_bonus };
    field.reserve_balance -= payout.main;
    field.golden_reserve_balance -= payout.golden;
    p.unclaimed_balance = 0;
    p.unclaimed_golden_bonus = 0;
    p.total_claimed = total_claimed;
    p.last_claim_epoch = field.epoch;
    Ok(payout)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
