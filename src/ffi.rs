//! Python FFI bindings via PyO3.
//!
//! Exposes the engine to Python. Real-valued quantities cross the boundary as
//! `float` and are converted to fixed point on entry; ids are plain `int`.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from coherence_field import CoherenceEngine, HarmonicCycle
//!
//! engine = CoherenceEngine(reserve=10**12, golden_reserve=10**10)
//! a = engine.enter(2_000_000, 2_000_000, HarmonicCycle.Full)
//! b = engine.enter(1_000_000, 1_000_000, HarmonicCycle.Quarter)
//! engine.phase_couple(a, b, 0.5, 500_000)
//! for _ in range(100):
//!     engine.step_epoch(1.0)
//! print(engine.order_parameter(), engine.state(a))
//! ```

#![allow(non_snake_case)]

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::FieldConfig;
use crate::engine::{CoherenceEngine as RustEngine, Entry};
use crate::error::FieldError;
use crate::field::FieldOverrides;
use crate::fixed::Fixed;
use crate::participant::{HarmonicCycle as RustCycle, ParticipantId};
use crate::state::ParticipationState;

fn to_py_err(e: FieldError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

// ── HarmonicCycle ────────────────────────────────────────────────────────────

/// Commitment cycle chosen on entry: Quarter (91), Half (182), Full (365) or
/// Golden (591 epochs).
#[pyclass(name = "HarmonicCycle")]
#[derive(Clone)]
pub struct PyHarmonicCycle {
    inner: RustCycle,
}

#[pymethods]
impl PyHarmonicCycle {
    /// Quarter class attribute.
    #[classattr]
    pub fn Quarter() -> Self {
        Self { inner: RustCycle::Quarter }
    }

    /// Half class attribute.
    #[classattr]
    pub fn Half() -> Self {
        Self { inner: RustCycle::Half }
    }

    /// Full class attribute.
    #[classattr]
    pub fn Full() -> Self {
        Self { inner: RustCycle::Full }
    }

    /// Golden class attribute.
    #[classattr]
    pub fn Golden() -> Self {
        Self { inner: RustCycle::Golden }
    }

    /// Cycle length in epochs.
    pub fn epochs(&self) -> u64 {
        self.inner.epochs()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!("HarmonicCycle.{:?}", self.inner)
    }
}

// ── ParticipantState ─────────────────────────────────────────────────────────

/// Participation state of one participant.
#[pyclass(name = "ParticipantState")]
#[derive(Clone)]
pub struct PyParticipantState {
    inner: ParticipationState,
}

#[pymethods]
impl PyParticipantState {
    /// State name: Attuning, Resonant, Entrained, Golden or Drifting.
    #[getter]
    pub fn name(&self) -> String {
        format!("{:?}", self.inner)
    }

    /// Emission multiplier of this state.
    pub fn emission_multiplier(&self) -> f64 {
        self.inner.emission_multiplier().to_f64()
    }

    /// Governance multiplier of this state.
    pub fn governance_multiplier(&self) -> f64 {
        self.inner.governance_multiplier().to_f64()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!("ParticipantState.{:?}", self.inner)
    }

    /// Python equality comparison.
    pub fn __eq__(&self, other: &PyParticipantState) -> bool {
        self.inner == other.inner
    }
}

// ── CoherenceEngine ──────────────────────────────────────────────────────────

/// Coherence field engine with default configuration.
#[pyclass(name = "CoherenceEngine")]
pub struct PyCoherenceEngine {
    inner: RustEngine,
}

#[pymethods]
impl PyCoherenceEngine {
    /// Create an empty field with pre-funded reserves.
    #[new]
    #[pyo3(signature = (reserve=0, golden_reserve=0, coupling_constant=2.0))]
    pub fn new(reserve: u64, golden_reserve: u64, coupling_constant: f64) -> PyResult<Self> {
        let config = FieldConfig {
            coupling_constant: Fixed::from_f64(coupling_constant),
            ..FieldConfig::default()
        };
        let inner = RustEngine::new(config, reserve, golden_reserve).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Enter the field. Returns the new participant id.
    ///
    /// Args:
    ///     amplitude: weight to commit (>= 1,000,000 by default)
    ///     holdings:  caller's available balance
    ///     cycle:     HarmonicCycle
    ///     phase:     optional explicit initial phase in radians
    #[pyo3(signature = (amplitude, holdings, cycle, phase=None))]
    pub fn enter(
        &mut self,
        amplitude: u64,
        holdings: u64,
        cycle: &PyHarmonicCycle,
        phase: Option<f64>,
    ) -> PyResult<u64> {
        let mut entry = Entry::new(amplitude, holdings, cycle.inner);
        if let Some(theta) = phase {
            entry = entry.with_phase(Fixed::from_f64(theta));
        }
        self.inner.enter_with(entry).map(|id| id.0).map_err(to_py_err)
    }

    /// Advance the field to `epoch_index`, optionally overriding Ψ, R or depth.
    #[pyo3(signature = (epoch_index, global_phase=None, order_parameter=None, network_depth=None))]
    pub fn advance_field(
        &mut self,
        epoch_index: u64,
        global_phase: Option<f64>,
        order_parameter: Option<f64>,
        network_depth: Option<f64>,
    ) -> PyResult<()> {
        let overrides = FieldOverrides {
            global_phase: global_phase.map(Fixed::from_f64),
            order_parameter: order_parameter.map(Fixed::from_f64),
            network_coherence_depth: network_depth.map(Fixed::from_f64),
        };
        self.inner.advance_field(epoch_index, overrides).map(|_| ()).map_err(to_py_err)
    }

    /// Step one participant. Returns False when it was already current.
    pub fn update_participant_phase(&mut self, id: u64) -> PyResult<bool> {
        use crate::engine::PhaseUpdate;
        match self.inner.update_participant_phase(ParticipantId(id)).map_err(to_py_err)? {
            PhaseUpdate::Applied { .. } => Ok(true),
            PhaseUpdate::AlreadyCurrent => Ok(false),
        }
    }

    /// Run one full epoch. Returns the new epoch index.
    #[pyo3(signature = (dt=1.0))]
    pub fn step_epoch(&mut self, dt: f64) -> PyResult<u64> {
        self.inner.step_epoch(Fixed::from_f64(dt)).map(|r| r.epoch).map_err(to_py_err)
    }

    /// Create the edge source → target.
    pub fn phase_couple(&mut self, source: u64, target: u64, strength: f64, locked_amplitude: u64) -> PyResult<()> {
        self.inner
            .phase_couple(ParticipantId(source), ParticipantId(target), Fixed::from_f64(strength), locked_amplitude)
            .map_err(to_py_err)
    }

    /// Remove the edge source → target.
    pub fn uncouple(&mut self, source: u64, target: u64) -> PyResult<()> {
        self.inner
            .uncouple(ParticipantId(source), ParticipantId(target))
            .map(|_| ())
            .map_err(to_py_err)
    }

    /// Claim accrued emissions. Returns the total paid.
    pub fn claim_emissions(&mut self, id: u64) -> PyResult<u64> {
        self.inner
            .claim_emissions(ParticipantId(id))
            .map(|r| r.paid.total())
            .map_err(to_py_err)
    }

    /// Exit the field. Returns (returned_amplitude, cost, emissions_paid).
    #[pyo3(signature = (id, force=false))]
    pub fn decohere(&mut self, id: u64, force: bool) -> PyResult<(u64, u64, u64)> {
        self.inner
            .decohere(ParticipantId(id), force)
            .map(|r| (r.returned_amplitude, r.cost, r.emissions_paid.total()))
            .map_err(to_py_err)
    }

    /// Current epoch index.
    pub fn epoch(&self) -> u64 {
        self.inner.field().epoch
    }

    /// Order parameter R.
    pub fn order_parameter(&self) -> f64 {
        self.inner.field().order_parameter.to_f64()
    }

    /// Global phase Ψ in radians.
    pub fn global_phase(&self) -> f64 {
        self.inner.field().global_phase.to_f64()
    }

    /// Main reserve balance.
    pub fn reserve_balance(&self) -> u64 {
        self.inner.field().reserve_balance
    }

    /// Phase of one participant in radians.
    pub fn phase(&self, id: u64) -> PyResult<f64> {
        self.participant(id).map(|p| p.phase.to_f64())
    }

    /// Participation state of one participant.
    pub fn state(&self, id: u64) -> PyResult<PyParticipantState> {
        self.participant(id).map(|p| PyParticipantState { inner: p.state })
    }

    /// Unclaimed emissions of one participant across both reserves.
    pub fn unclaimed(&self, id: u64) -> PyResult<u64> {
        self.participant(id).map(|p| p.total_unclaimed())
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        let f = self.inner.field();
        format!(
            "CoherenceEngine(epoch={}, participants={}, R={:.4})",
            f.epoch,
            f.participant_count,
            f.order_parameter.to_f64()
        )
    }
}

impl PyCoherenceEngine {
    fn participant(&self, id: u64) -> PyResult<&crate::participant::Participant> {
        self.inner
            .participant(ParticipantId(id))
            .ok_or_else(|| to_py_err(FieldError::NoParticipantRecord(ParticipantId(id))))
    }
}

// ── Module entry point ───────────────────────────────────────────────────────

/// Coherence field engine Python bindings.
#[pymodule]
pub fn coherence_field(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyHarmonicCycle>()?;
    m.add_class::<PyParticipantState>()?;
    m.add_class::<PyCoherenceEngine>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("PRECISION", Fixed::SCALE)?;
    Ok(())
}
