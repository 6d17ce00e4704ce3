//! The singleton aggregate record of the coherence field.
//!
//! [`CoherenceField`] is created once with the engine and updated exactly once
//! per accepted `advance_field`. It is never rolled back.
//!
//! # Invariants
//!
//! - `epoch` advances by exactly 1 per accepted update.
//! - `order_parameter ∈ [0, 1]`, `global_phase ∈ [0, 2π)`.
//! - `total_weight` equals the sum of active participants' amplitude.
//! - Reserve balances are unsigned and only ever decremented with a checked floor.

use crate::config::FieldConfig;
use crate::fixed::Fixed;

/// Global aggregate of all participants.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoherenceField {
    /// Monotonic epoch counter.
    pub epoch: u64,
    /// Global phase Ψ in `[0, 2π)`.
    pub global_phase: Fixed,
    /// Order parameter R in `[0, 1]`.
    pub order_parameter: Fixed,
    /// Evenness of the amplitude distribution, in `[0, 1]`.
    pub decentralization_coefficient: Fixed,
    /// Smoothed, R-gated aggregate of participant coherence depth.
    pub network_coherence_depth: Fixed,
    /// Sum of active participants' amplitude.
    pub total_weight: u64,
    /// Number of active participants.
    pub participant_count: u64,
    /// Smallest number of participants jointly holding more than half of `total_weight`.
    pub nakamoto_coefficient: u32,
    /// Main emission reserve.
    pub reserve_balance: u64,
    /// Reserve backing the Golden multiplier bonus.
    pub golden_reserve_balance: u64,
}

impl CoherenceField {
    /// Fresh field at epoch 0 with the empty-field convention R = 1, Ψ = 0.
    pub fn new(config: &FieldConfig, reserve_balance: u64, golden_reserve_balance: u64) -> Self {
        Self {
            epoch: 0,
            global_phase: Fixed::ZERO,
            order_parameter: Fixed::ONE,
            decentralization_coefficient: Fixed::ZERO,
            network_coherence_depth: config.depth_baseline,
            total_weight: 0,
            participant_count: 0,
            nakamoto_coefficient: 0,
            reserve_balance,
            golden_reserve_balance,
        }
    }
}

/// Manual overrides accepted by `advance_field`.
///
/// Each `Some` value replaces the recomputed metric after aggregation.
/// Phases are wrapped into `[0, 2π)` and R is clamped into `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldOverrides {
    /// Replace Ψ.
    pub global_phase: Option<Fixed>,
    /// Replace R.
    pub order_parameter: Option<Fixed>,
    /// Replace the network coherence depth.
    pub network_coherence_depth: Option<Fixed>,
}

impl FieldOverrides {
    /// No overrides.
    pub fn none() -> Self {
        Self::default()
    }

    /// Apply the overrides to a freshly aggregated field.
    pub fn apply(&self, field: &mut CoherenceField) {
        if let Some(psi) = self.global_phase {
            field.global_phase = psi.wrap_phase();
        }
        if let Some(r) = self.order_parameter {
            field.order_parameter = r.clamp_unit();
        }
        if let Some(depth) = self.network_coherence_depth {
            field.network_coherence_depth = depth.max(Fixed::ZERO);
        }
    }
}
