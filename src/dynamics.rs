/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Phase dynamics: one coupled-oscillator step per epoch.
//!
//! ```text
//! θᵢ' = θᵢ + [ ωᵢ + K·R·sin(Ψ − θᵢ) + Σ_{e: source=i} κₑ·sin(θ_target(e) − θᵢ) ] · dt   (mod 2π)
//! ```
//!
//! The mean-field term pulls every oscillator toward the global phase Ψ with
//! a strength proportional to the collective order R. Coupling edges are
//! one-directional: only the source feels the pull of its target.
//!
//! Every participant's new phase depends only on the *previous* snapshot, so
//! [`advance_all`] reads a shared immutable input slice and writes a fresh
//! output buffer. With the `parallel` feature the per-participant work runs on
//! the rayon pool; results are identical to the sequential path.

use alloc::vec::Vec;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{FieldError, Result};
use crate::field::CoherenceField;
use crate::fixed::Fixed;

// ─── Inputs ─────────────────────────────────────────────────────────────────

/// Mean-field parameters shared by every oscillator in one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeanField {
    /// Global coupling constant K.
    pub coupling_constant: Fixed,
    /// Order parameter R of the previous snapshot.
    pub order_parameter: Fixed,
    /// Global phase Ψ of the previous snapshot.
    pub global_phase: Fixed,
}

impl MeanField {
    /// Read R and Ψ from a field snapshot.
    pub fn from_field(field: &CoherenceField, coupling_constant: Fixed) -> Self {
        Self {
            coupling_constant,
            order_parameter: field.order_parameter,
            global_phase: field.global_phase,
        }
    }
}

/// Pull exerted on a source by one outgoing coupling edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CouplingPull {
    /// Edge strength κ.
    pub strength: Fixed,
    /// Target's phase in the previous snapshot.
    pub target_phase: Fixed,
}

/// One oscillator's slice of the previous snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseInput {
    /// Current phase θ.
    pub phase: Fixed,
    /// Natural frequency ω.
    pub natural_frequency: Fixed,
    /// Outgoing coupling pulls.
    pub pulls: Vec<CouplingPull>,
}

// ─── Integration ────────────────────────────────────────────────────────────

/// Instantaneous phase velocity dθ/dt.
pub fn velocity(input: &PhaseInput, mean_field: &MeanField) -> Fixed {
    let mean_pull = mean_field.coupling_constant
        * mean_field.order_parameter
        * (mean_field.global_phase - input.phase).sin();
    input.pulls.iter().fold(input.natural_frequency + mean_pull, |v, pull| {
        v + pull.strength * (pull.target_phase - input.phase).sin()
    })
}

/// Advance one oscillator by `dt`, wrapping into `[0, 2π)`.
///
/// Fails with [`FieldError::InvalidTimestep`] when `dt ≤ 0`.
pub fn step(input: &PhaseInput, mean_field: &MeanField, dt: Fixed) -> Result<Fixed> {
    check_dt(dt)?;
    Ok(integrate(input, mean_field, dt))
}

/// Advance every oscillator from the same snapshot into a fresh buffer.
///
/// Output order matches input order.
pub fn advance_all(inputs: &[PhaseInput], mean_field: &MeanField, dt: Fixed) -> Result<Vec<Fixed>> {
    check_dt(dt)?;

    #[cfg(feature = "parallel")]
    let phases = inputs.par_iter().map(|i| integrate(i, mean_field, dt)).collect();

    #[cfg(not(feature = "parallel"))]
    let phases = inputs.iter().map(|i| integrate(i, mean_field, dt)).collect();

    Ok(phases)
}

fn integrate(input: &PhaseInput, mean_field: &MeanField, dt: Fixed) -> Fixed {
    (input.phase + velocity(input, mean_field) * dt).wrap_phase()
}

fn check_dt(dt: Fixed) -> Result<()> {
    if dt.is_positive() {
        Ok(())
    } else {
        Err(FieldError::InvalidTimestep(dt))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
