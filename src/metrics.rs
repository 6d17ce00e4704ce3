/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Aggregate metrics recomputed from the post-update phases.
//!
//! ```text
//! R·e^{iΨ} = (1/W) Σᵢ aᵢ·e^{iθᵢ},   W = Σᵢ aᵢ
//! ```
//!
//! Sums are taken over integer mantissas in 128-bit, so the result does not
//! depend on participant iteration order.
//!
//! # Invariants
//!
//! - `R ∈ [0, 1]`, `Ψ ∈ [0, 2π)`.
//! - Empty field: R = 1, Ψ = 0.
//! - Exactly one weighted participant: R = 1 and Ψ is that participant's phase.
//! - Decentralization lies in `[0, 1]` and peaks when every share equals
//!   `1 / target_participant_count`.

use alloc::vec::Vec;

use crate::config::FieldConfig;
use crate::fixed::Fixed;
use crate::participant::Participant;

const S: i128 = Fixed::SCALE as i128;

/// Everything `advance_field` derives from the participant set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Aggregate {
    /// Order parameter R.
    pub order_parameter: Fixed,
    /// Global phase Ψ.
    pub global_phase: Fixed,
    /// Decentralization coefficient D.
    pub decentralization: Fixed,
    /// Network coherence depth after R-gated smoothing.
    pub network_coherence_depth: Fixed,
    /// Sum of amplitudes.
    pub total_weight: u64,
    /// Number of participants aggregated.
    pub participant_count: u64,
    /// Nakamoto coefficient of the amplitude distribution.
    pub nakamoto_coefficient: u32,
}

/// Compute every aggregate metric in one pass over the participant set.
///
/// `prev_network_depth` is the field's network depth before this epoch; it is
/// returned unchanged for an empty field.
pub fn aggregate<'a, I>(participants: I, prev_network_depth: Fixed, config: &FieldConfig) -> Aggregate
where
    I: IntoIterator<Item = &'a Participant>,
{
    let participants: Vec<&Participant> = participants.into_iter().collect();
    let (order_parameter, global_phase) =
        order_parameter(participants.iter().map(|p| (p.amplitude, p.phase)));
    let amplitudes: Vec<u64> = participants.iter().map(|p| p.amplitude).collect();
    let total_weight = amplitudes.iter().fold(0u64, |acc, a| acc.saturating_add(*a));

    let network_coherence_depth = match weighted_depth(participants.iter().map(|p| (p.amplitude, p.coherence_depth))) {
        Some(target) => next_network_depth(prev_network_depth, target, order_parameter, config),
        None => prev_network_depth,
    };

    Aggregate {
        order_parameter,
        global_phase,
        decentralization: decentralization(&amplitudes, config.target_participant_count),
        network_coherence_depth,
        total_weight,
        participant_count: participants.len() as u64,
        nakamoto_coefficient: nakamoto_coefficient(&amplitudes),
    }
}

// ─── Order parameter ────────────────────────────────────────────────────────

/// Amplitude-weighted mean phasor: returns `(R, Ψ)`.
pub fn order_parameter<I>(phasors: I) -> (Fixed, Fixed)
where
    I: IntoIterator<Item = (u64, Fixed)>,
{
    let mut weight: i128 = 0;
    let mut cos_sum: i128 = 0;
    let mut sin_sum: i128 = 0;
    let mut weighted = 0usize;
    let mut only_phase = Fixed::ZERO;

    for (amplitude, phase) in phasors {
        if amplitude == 0 {
            continue;
        }
        let a = amplitude as i128;
        weight += a;
        cos_sum += a * phase.cos().raw() as i128;
        sin_sum += a * phase.sin().raw() as i128;
        weighted += 1;
        only_phase = phase;
    }

    match weighted {
        0 => (Fixed::ONE, Fixed::ZERO),
        1 => (Fixed::ONE, only_phase.wrap_phase()),
        _ => {
            let c = Fixed::from_raw((cos_sum / weight) as i64);
            let s = Fixed::from_raw((sin_sum / weight) as i64);
            let r = (c * c + s * s).sqrt().clamp_unit();
            (r, Fixed::atan2(s, c).wrap_phase())
        }
    }
}

// ─── Distribution ───────────────────────────────────────────────────────────

/// Evenness of the amplitude distribution relative to the ideal share
/// `1 / target_count`.
///
/// Each participant contributes `min(share, ideal) / max(share, ideal)`, so a
/// holder at the ideal share scores 1 and both whales and dust score less.
/// The sum is normalised by `target_count` and clamped to `[0, 1]`.
pub fn decentralization(amplitudes: &[u64], target_count: u32) -> Fixed {
    let total: u128 = amplitudes.iter().map(|a| *a as u128).sum();
    if total == 0 || target_count == 0 {
        return Fixed::ZERO;
    }
    let ideal = S / target_count as i128;
    if ideal == 0 {
        return Fixed::ZERO;
    }

    let score: i128 = amplitudes
        .iter()
        .map(|a| {
            let share = (*a as u128 * S as u128 / total) as i128;
            let (lo, hi) = if share < ideal { (share, ideal) } else { (ideal, share) };
            if hi == 0 { 0 } else { lo * S / hi }
        })
        .sum();

    Fixed::from_raw((score / target_count as i128).min(S) as i64).clamp_unit()
}

/// Smallest number of participants jointly holding more than half of the
/// total weight. Zero for an empty set.
pub fn nakamoto_coefficient(amplitudes: &[u64]) -> u32 {
    let total: u128 = amplitudes.iter().map(|a| *a as u128).sum();
    if total == 0 {
        return 0;
    }
    let mut sorted: Vec<u64> = amplitudes.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let mut held: u128 = 0;
    for (i, a) in sorted.iter().enumerate() {
        held += *a as u128;
        if held * 2 > total {
            return (i + 1) as u32;
        }
    }
    sorted.len() as u32
}

// ─── Network depth ──────────────────────────────────────────────────────────

/// Amplitude-weighted mean of participant coherence depth. `None` when the
/// total weight is zero.
pub fn weighted_depth<I>(depths: I) -> Option<Fixed>
where
    I: IntoIterator<Item = (u64, Fixed)>,
{
    let (weight, sum) = depths.into_iter().fold((0i128, 0i128), |(w, s), (a, d)| {
        (w + a as i128, s + a as i128 * d.raw() as i128)
    });
    if weight == 0 {
        return None;
    }
    Some(Fixed::from_raw((sum / weight) as i64))
}

/// Move the network depth one epoch toward `target`.
///
/// Growth is capped at `growth_cap × prev` per epoch, and further scaled by R
/// unless R exceeds the gate. Decline closes a tenth of the gap.
pub fn next_network_depth(prev: Fixed, target: Fixed, order_parameter: Fixed, config: &FieldConfig) -> Fixed {
    if target > prev {
        let mut cap = prev * config.network_depth_growth_cap;
        if order_parameter <= config.network_depth_gate {
            cap = cap * order_parameter;
        }
        prev + (target - prev).min(cap)
    } else {
        prev - (prev - target).div_int(10).unwrap_or(Fixed::ZERO)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::{HarmonicCycle, ParticipantId};

    fn f(v: f64) -> Fixed {
        Fixed::from_f64(v)
    }

    #[test]
    fn test_empty_field_convention() {
        let (r, psi) = order_parameter(core::iter::empty());
        assert_eq!(r, Fixed::ONE);
        assert_eq!(psi, Fixed::ZERO);
    }

    #[test]
    fn test_single_participant_is_fully_coherent() {
        let (r, psi) = order_parameter([(5_000_000, f(2.5))]);
        assert_eq!(r, Fixed::ONE);
        assert_eq!(psi, f(2.5));
    }

    #[test]
    fn test_aligned_and_opposed_pairs() {
        let (r, psi) = order_parameter([(1_000_000, f(1.0)), (1_000_000, f(1.0))]);
        assert!((r.to_f64() - 1.0).abs() < 1e-6, "aligned R = {}", r);
        assert!((psi.to_f64() - 1.0).abs() < 1e-6);

        let (r, _) = order_parameter([(1_000_000, f(0.0)), (1_000_000, Fixed::PI)]);
        assert!(r.to_f64() < 1e-6, "opposed R = {}", r);
    }

    #[test]
    fn test_amplitude_weighting_moves_global_phase() {
        let (_, psi) = order_parameter([(3_000_000, f(0.0)), (1_000_000, Fixed::FRAC_PI_2)]);
        let expected = (1.0f64).atan2(3.0);
        assert!((psi.to_f64() - expected).abs() < 1e-6, "psi = {}", psi);
    }

    #[test]
    fn test_r_is_bounded_over_many_sets() {
        for n in 2..20u64 {
            let set: Vec<(u64, Fixed)> = (0..n)
                .map(|i| (1_000_000 + i * 37_000, Fixed::from_raw((i as i64 * 912_345_677) % Fixed::TWO_PI.raw())))
                .collect();
            let (r, psi) = order_parameter(set);
            assert!(r >= Fixed::ZERO && r <= Fixed::ONE);
            assert!(psi >= Fixed::ZERO && psi < Fixed::TWO_PI);
        }
    }

    #[test]
    fn test_decentralization_peaks_at_ideal_share() {
        let even = [1_000_000u64; 10];
        assert_eq!(decentralization(&even, 10), Fixed::ONE);

        let mut whale = [1_000_000u64; 10];
        whale[0] = 10_000_000;
        let d = decentralization(&whale, 10);
        assert!(d < Fixed::ONE && d > Fixed::ZERO, "whale D = {}", d);
        assert_eq!(decentralization(&[], 10), Fixed::ZERO);
    }

    #[test]
    fn test_nakamoto_coefficient() {
        assert_eq!(nakamoto_coefficient(&[]), 0);
        assert_eq!(nakamoto_coefficient(&[10, 1, 1]), 1);
        assert_eq!(nakamoto_coefficient(&[5, 5]), 2);
        assert_eq!(nakamoto_coefficient(&[1; 10]), 6);
    }

    #[test]
    fn test_network_depth_growth_is_gated_by_r() {
        let c = FieldConfig::default();
        let prev = Fixed::from_int(5);
        let target = Fixed::from_int(6);

        let high = next_network_depth(prev, target, f(0.95), &c);
        assert_eq!(high, prev + prev * c.network_depth_growth_cap);

        let low = next_network_depth(prev, target, f(0.4), &c);
        assert!(low > prev && low < high);

        let down = next_network_depth(Fixed::from_int(6), Fixed::from_int(5), f(0.95), &c);
        assert_eq!(down, f(5.9));
    }

    #[test]
    fn test_aggregate_counts_and_weights() {
        let c = FieldConfig::default();
        let ps: Vec<Participant> = (1..=3u64)
            .map(|i| {
                Participant::new(ParticipantId(i), i * 1_000_000, HarmonicCycle::Quarter, f(0.5), Fixed::ZERO, 0, &c)
            })
            .collect();
        let agg = aggregate(&ps, c.depth_baseline, &c);
        assert_eq!(agg.total_weight, 6_000_000);
        assert_eq!(agg.participant_count, 3);
        assert_eq!(agg.nakamoto_coefficient, 2);
        assert!((agg.order_parameter.to_f64() - 1.0).abs() < 1e-6);
        assert_eq!(agg.network_coherence_depth, c.depth_baseline);
    }
}
