//! Tunable constants of the coherence field.
//!
//! [`FieldConfig`] gathers every threshold, rate and weight the engine reads.
//! The defaults reproduce the reference dynamics: K = 2.0, golden-ratio
//! multipliers, a 10 → 50 epoch qualification ladder and a 10 % maximum
//! decoherence charge.

use crate::error::{FieldError, Result};
use crate::fixed::Fixed;

/// Channel weights of the emission formula. Must sum to 1.0.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelWeights {
    /// Weight of the attunement channel `(cos(θ − Ψ) + 1) / 2`.
    pub attunement: Fixed,
    /// Weight of the resonance channel `φ⁻¹ ^ |depth − φ⁴|`.
    pub resonance: Fixed,
    /// Weight of the entrainment channel `stability × D / D_target`.
    pub entrainment: Fixed,
    /// Weight of the depth channel (participation credit × network depth).
    pub depth: Fixed,
}

impl ChannelWeights {
    /// Sum of the four weights.
    pub fn total(&self) -> Fixed {
        self.attunement + self.resonance + self.entrainment + self.depth
    }
}

impl Default for ChannelWeights {
    fn default() -> Self {
        Self {
            attunement: Fixed::from_ratio(25, 100),
            resonance: Fixed::from_ratio(30, 100),
            entrainment: Fixed::from_ratio(30, 100),
            depth: Fixed::from_ratio(15, 100),
        }
    }
}

/// Configuration for a [`CoherenceEngine`](crate::engine::CoherenceEngine).
///
/// All real-valued fields are [`Fixed`]; construct custom values with
/// [`Fixed::from_ratio`] or [`Fixed::from_f64`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldConfig {
    // ── Phase dynamics ──────────────────────────────────────────────────
    /// Global coupling constant K. Default 2.0.
    pub coupling_constant: Fixed,
    /// Timestep used by per-participant updates. Default 1.0.
    pub default_dt: Fixed,
    /// Natural frequency assigned on entry (rad/epoch). Default 0.01.
    pub base_natural_frequency: Fixed,

    // ── Entry and coupling ──────────────────────────────────────────────
    /// Smallest amplitude accepted by `enter`. Default 1,000,000.
    pub minimum_amplitude: u64,
    /// Upper bound of a coupling edge's strength κ. Default 0.8.
    pub max_coupling_strength: Fixed,

    // ── Aggregate metrics ───────────────────────────────────────────────
    /// Participant count whose equal share `1/n` is the ideal share. Default 10.
    pub target_participant_count: u32,
    /// Decentralization coefficient treated as "fully decentralized" by the
    /// entrainment channel. Default 0.5.
    pub target_decentralization: Fixed,
    /// Order parameter above which network depth may grow at full rate. Default 0.8.
    pub network_depth_gate: Fixed,
    /// Maximum relative growth of network depth per epoch. Default 0.002.
    pub network_depth_growth_cap: Fixed,

    // ── Participant evolution ───────────────────────────────────────────
    /// Coherence depth at entry. Default 5.0.
    pub depth_baseline: Fixed,
    /// Depth gained per epoch at full lock and stability. Default 0.01.
    pub depth_growth_rate: Fixed,
    /// EMA factor of `phase_lock_integral`. Default 0.1.
    pub integral_smoothing: Fixed,
    /// EMA factor of `stability`. Default 0.05.
    pub stability_smoothing: Fixed,

    // ── State machine ───────────────────────────────────────────────────
    /// Phase-lock level counted towards Resonant. Default 0.5.
    pub resonant_threshold: Fixed,
    /// Consecutive qualifying epochs for Attuning → Resonant. Default 10.
    pub resonant_epochs: u32,
    /// Phase-lock level counted towards Entrained. Default 0.8.
    pub entrained_threshold: Fixed,
    /// Consecutive qualifying epochs for Resonant → Entrained. Default 50.
    pub entrained_epochs: u32,
    /// Coherence depth required for Entrained. Default 5.0.
    pub entrained_depth: Fixed,
    /// Phase-lock level required for Golden. Default 0.9.
    pub golden_threshold: Fixed,
    /// Coherence depth required for Golden. Default φ⁴.
    pub golden_depth: Fixed,
    /// Angular drift from Ψ beyond which any state falls to Drifting. Default π/4.
    pub drift_limit: Fixed,

    // ── Emission ────────────────────────────────────────────────────────
    /// Emission per amplitude unit per epoch before channel weighting. Default 0.001.
    pub base_emission_rate: Fixed,
    /// Weights of the four emission channels.
    pub channel_weights: ChannelWeights,
    /// Fixed participation credit of the depth channel. Default 1.0.
    pub participation_credit: Fixed,

    // ── Decoherence ─────────────────────────────────────────────────────
    /// Maximum fraction of amplitude charged on exit. Default 0.1.
    pub decoherence_rate: Fixed,

    // ── Events ──────────────────────────────────────────────────────────
    /// Order parameter above which a rising R emits a coherence peak. Default 0.9.
    pub coherence_peak_threshold: Fixed,
}

impl FieldConfig {
    /// Construct the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every field for range errors.
    pub fn validate(&self) -> Result<()> {
        let unit = |v: Fixed| v >= Fixed::ZERO && v <= Fixed::ONE;

        if self.coupling_constant.is_negative() {
            return Err(FieldError::InvalidConfig("coupling_constant must be >= 0"));
        }
        if !self.default_dt.is_positive() {
            return Err(FieldError::InvalidConfig("default_dt must be > 0"));
        }
        if self.minimum_amplitude == 0 {
            return Err(FieldError::InvalidConfig("minimum_amplitude must be > 0"));
        }
        if !unit(self.max_coupling_strength) {
            return Err(FieldError::InvalidConfig("max_coupling_strength must be in [0, 1]"));
        }
        if self.target_participant_count == 0 {
            return Err(FieldError::InvalidConfig("target_participant_count must be > 0"));
        }
        if !self.target_decentralization.is_positive() {
            return Err(FieldError::InvalidConfig("target_decentralization must be > 0"));
        }
        if !self.depth_baseline.is_positive() {
            return Err(FieldError::InvalidConfig("depth_baseline must be > 0"));
        }
        for (v, what) in [
            (self.integral_smoothing, "integral_smoothing must be in [0, 1]"),
            (self.stability_smoothing, "stability_smoothing must be in [0, 1]"),
            (self.resonant_threshold, "resonant_threshold must be in [0, 1]"),
            (self.entrained_threshold, "entrained_threshold must be in [0, 1]"),
            (self.golden_threshold, "golden_threshold must be in [0, 1]"),
            (self.network_depth_gate, "network_depth_gate must be in [0, 1]"),
            (self.decoherence_rate, "decoherence_rate must be in [0, 1]"),
        ] {
            if !unit(v) {
                return Err(FieldError::InvalidConfig(what));
            }
        }
        if self.drift_limit <= Fixed::ZERO || self.drift_limit > Fixed::PI {
            return Err(FieldError::InvalidConfig("drift_limit must be in (0, π]"));
        }
        if self.channel_weights.total() != Fixed::ONE {
            return Err(FieldError::InvalidConfig("channel weights must sum to 1.0"));
        }
        if self.base_emission_rate.is_negative() {
            return Err(FieldError::InvalidConfig("base_emission_rate must be >= 0"));
        }
        Ok(())
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            coupling_constant: Fixed::from_int(2),
            default_dt: Fixed::ONE,
            base_natural_frequency: Fixed::from_ratio(1, 100),
            minimum_amplitude: 1_000_000,
            max_coupling_strength: Fixed::from_ratio(8, 10),
            target_participant_count: 10,
            target_decentralization: Fixed::HALF,
            network_depth_gate: Fixed::from_ratio(8, 10),
            network_depth_growth_cap: Fixed::from_ratio(2, 1000),
            depth_baseline: Fixed::from_int(5),
            depth_growth_rate: Fixed::from_ratio(1, 100),
            integral_smoothing: Fixed::from_ratio(1, 10),
            stability_smoothing: Fixed::from_ratio(5, 100),
            resonant_threshold: Fixed::HALF,
            resonant_epochs: 10,
            entrained_threshold: Fixed::from_ratio(8, 10),
            entrained_epochs: 50,
            entrained_depth: Fixed::from_int(5),
            golden_threshold: Fixed::from_ratio(9, 10),
            golden_depth: Fixed::PHI_FOURTH,
            drift_limit: Fixed::FRAC_PI_4,
            base_emission_rate: Fixed::from_ratio(1, 1000),
            channel_weights: ChannelWeights::default(),
            participation_credit: Fixed::ONE,
            decoherence_rate: Fixed::from_ratio(1, 10),
            coherence_peak_threshold: Fixed::from_ratio(9, 10),
        }
    }
}
