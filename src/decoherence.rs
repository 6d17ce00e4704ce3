/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Exit pricing.
//!
//! ```text
//! progress = clamp(elapsed / cycle_length, 0, 1)
//! cost     = amplitude × phase_lock_integral × (1 − progress)^φ × decoherence_rate
//! ```
//!
//! Cost is strictly decreasing in progress and exactly zero at progress 1.
//! It is recycled into the main reserve by the engine.

use crate::config::FieldConfig;
use crate::fixed::Fixed;
use crate::participant::Participant;

/// Fraction of the harmonic cycle completed, in `[0, 1]`.
///
/// A zero-length cycle counts as complete.
pub fn progress(elapsed: u64, cycle_length: u64) -> Fixed {
    if cycle_length == 0 || elapsed >= cycle_length {
        return Fixed::ONE;
    }
    let raw = elapsed as u128 * Fixed::SCALE as u128 / cycle_length as u128;
    Fixed::from_raw(raw as i64)
}

/// Amplitude charged for exiting at `progress`.
pub fn cost(amplitude: u64, phase_lock_integral: Fixed, progress: Fixed, config: &FieldConfig) -> u64 {
    if progress >= Fixed::ONE {
        return 0;
    }
    let remaining = (Fixed::ONE - progress.max(Fixed::ZERO)).pow(Fixed::PHI).unwrap_or(Fixed::ZERO);
    (phase_lock_integral.clamp_unit() * remaining.clamp_unit() * config.decoherence_rate)
        .scale_amount(amplitude)
        .min(amplitude)
}

/// Price of a participant's exit at a given field epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitQuote {
    /// Epochs since entry.
    pub elapsed: u64,
    /// Cycle progress.
    pub progress: Fixed,
    /// Amplitude retained by the field.
    pub cost: u64,
    /// Amplitude handed back: `amplitude − cost`.
    pub returned_amplitude: u64,
}

impl ExitQuote {
    /// Quote `p`'s exit at `epoch`.
    pub fn for_participant(p: &Participant, epoch: u64, config: &FieldConfig) -> Self {
        let elapsed = epoch.saturating_sub(p.entry_epoch);
        let progress = progress(elapsed, p.cycle_length);
        let cost = cost(p.amplitude, p.phase_lock_integral, progress, config);
        Self {
            elapsed,
            progress,
            cost,
            returned_amplitude: p.amplitude - cost,
        }
    }

    /// `true` once the full harmonic cycle has elapsed.
    pub fn is_mature(&self) -> bool {
        self.progress >= Fixed::ONE
    }
}
