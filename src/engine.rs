/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! The coherence engine: owner of the field, its participants and their edges.
//!
//! One epoch of the full control flow ([`CoherenceEngine::step_epoch`]):
//!
//! ```text
//! snapshot(e) ──▶ phase step (all pending participants, same snapshot, fresh buffer)
//!             ──▶ advance_field(e + 1): R, Ψ, D, network depth, Nakamoto
//!             ──▶ per participant: lock/stability/depth, state machine, emission accrual
//! ```
//!
//! External drivers may instead call [`CoherenceEngine::update_participant_phase`]
//! per participant and [`CoherenceEngine::advance_field`] once per epoch.
//!
//! # Invariants
//!
//! - Every operation validates completely before it mutates. An `Err` leaves
//!   the engine exactly as it was.
//! - A participant's phase advances at most once per field epoch.
//! - Coupling pulls read each target's phase as of the latest
//!   `advance_field`, so update order within an epoch does not matter.
//! - Only one `advance_field` per epoch index succeeds.
//! - `field.total_weight` and `field.participant_count` track the participant
//!   map on every entry and exit.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::config::FieldConfig;
use crate::coupling::{CouplingGraph, PhaseCoupling};
use crate::decoherence::ExitQuote;
use crate::dynamics::{self, CouplingPull, MeanField, PhaseInput};
use crate::emission::{self, Accrual, Payout};
use crate::error::{FieldError, Result};
use crate::events::FieldEvent;
#[cfg(feature = "event-log")]
use crate::events::EventLog;
use crate::field::{CoherenceField, FieldOverrides};
use crate::fixed::Fixed;
use crate::metrics;
use crate::participant::{HarmonicCycle, Participant, ParticipantId};
use crate::state::{self, Counters, Observation, ParticipationState};

// ─── Operation results ──────────────────────────────────────────────────────

/// Parameters of an entry with explicit identity and oscillator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Requested id; the engine allocates one when `None`.
    pub id: Option<ParticipantId>,
    /// Amplitude to commit.
    pub amplitude: u64,
    /// Caller's available holdings; `amplitude` may not exceed them.
    pub holdings: u64,
    /// Commitment cycle.
    pub cycle: HarmonicCycle,
    /// Initial phase; derived from id and epoch when `None`.
    pub phase: Option<Fixed>,
    /// Natural frequency; derived from amplitude when `None`.
    pub natural_frequency: Option<Fixed>,
}

impl Entry {
    /// Entry committing `amplitude` out of `holdings`.
    pub fn new(amplitude: u64, holdings: u64, cycle: HarmonicCycle) -> Self {
        Self { id: None, amplitude, holdings, cycle, phase: None, natural_frequency: None }
    }

    /// Request a specific id.
    pub fn with_id(mut self, id: ParticipantId) -> Self {
        self.id = Some(id);
        self
    }

    /// Start at an explicit phase.
    pub fn with_phase(mut self, phase: Fixed) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Use an explicit natural frequency.
    pub fn with_natural_frequency(mut self, omega: Fixed) -> Self {
        self.natural_frequency = Some(omega);
        self
    }
}

/// Outcome of [`CoherenceEngine::update_participant_phase`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseUpdate {
    /// The participant was stepped and evaluated.
    Applied {
        /// New phase.
        phase: Fixed,
        /// Phase lock against the evaluation snapshot.
        phase_lock: Fixed,
        /// State after evaluation.
        state: ParticipationState,
        /// Emission accrued for this epoch.
        accrued: Accrual,
    },
    /// Already updated in the current epoch; nothing changed.
    AlreadyCurrent,
}

/// Receipt of a successful claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClaimReceipt {
    /// Claimant.
    pub id: ParticipantId,
    /// Amounts paid from each reserve.
    pub paid: Payout,
    /// Lifetime total after this claim.
    pub total_claimed: u64,
    /// Field epoch of the claim.
    pub epoch: u64,
}

/// Receipt of a successful exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoherenceReceipt {
    /// Departed participant.
    pub id: ParticipantId,
    /// Amplitude handed back.
    pub returned_amplitude: u64,
    /// Amplitude recycled into the main reserve.
    pub cost: u64,
    /// Unclaimed emissions paid as part of the exit.
    pub emissions_paid: Payout,
    /// Epochs between entry and exit.
    pub epochs_elapsed: u64,
    /// Coupling edges removed (either direction).
    pub edges_removed: usize,
}

/// Summary of one [`CoherenceEngine::step_epoch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochReport {
    /// Epoch the field advanced to.
    pub epoch: u64,
    /// Participants stepped and evaluated.
    pub stepped: usize,
    /// State transitions observed.
    pub transitions: usize,
    /// Order parameter after the advance.
    pub order_parameter: Fixed,
    /// Global phase after the advance.
    pub global_phase: Fixed,
}

// ─── CoherenceEngine ────────────────────────────────────────────────────────

/// Epoch-stepped state machine over a population of phase oscillators.
#[derive(Clone, Debug)]
pub struct CoherenceEngine {
    config: FieldConfig,
    field: CoherenceField,
    participants: BTreeMap<ParticipantId, Participant>,
    couplings: CouplingGraph,
    next_id: u64,
    #[cfg(feature = "event-log")]
    log: EventLog,
}

impl CoherenceEngine {
    /// Create an empty field with pre-funded reserves.
    pub fn new(config: FieldConfig, reserve_balance: u64, golden_reserve_balance: u64) -> Result<Self> {
        config.validate()?;
        let field = CoherenceField::new(&config, reserve_balance, golden_reserve_balance);
        Ok(Self::from_parts(config, field, BTreeMap::new(), CouplingGraph::new(), 1))
    }

    pub(crate) fn from_parts(
        config: FieldConfig,
        field: CoherenceField,
        participants: BTreeMap<ParticipantId, Participant>,
        couplings: CouplingGraph,
        next_id: u64,
    ) -> Self {
        Self {
            config,
            field,
            participants,
            couplings,
            next_id,
            #[cfg(feature = "event-log")]
            log: EventLog::new(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Active configuration.
    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// Current field snapshot.
    pub fn field(&self) -> &CoherenceField {
        &self.field
    }

    /// Look up a participant.
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    /// All participants, ordered by id.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Look up an edge.
    pub fn coupling(&self, source: ParticipantId, target: ParticipantId) -> Option<&PhaseCoupling> {
        self.couplings.get(source, target)
    }

    /// Edges leaving `source`, ordered by target.
    pub fn couplings_from(&self, source: ParticipantId) -> Vec<&PhaseCoupling> {
        self.couplings.outgoing(source)
    }

    /// Every edge, ordered by `(source, target)`.
    pub fn couplings(&self) -> Vec<&PhaseCoupling> {
        self.couplings.sorted()
    }

    /// Id the next derived entry will receive.
    pub fn next_id(&self) -> ParticipantId {
        ParticipantId(self.next_id)
    }

    /// Price of exiting now.
    pub fn exit_quote(&self, id: ParticipantId) -> Result<ExitQuote> {
        let p = self.get(id)?;
        Ok(ExitQuote::for_participant(p, self.field.epoch, &self.config))
    }

    /// Sum of governance weights of all participants.
    pub fn total_governance_weight(&self) -> u64 {
        self.participants
            .values()
            .fold(0u64, |acc, p| acc.saturating_add(p.governance_weight()))
    }

    /// Recent events, oldest first.
    #[cfg(feature = "event-log")]
    pub fn events(&self) -> &EventLog {
        &self.log
    }

    // ── Entry ───────────────────────────────────────────────────────────

    /// Enter with a derived initial phase and natural frequency.
    ///
    /// Fails with [`FieldError::InvalidAmplitude`] when `amplitude` is below
    /// the configured minimum or above `holdings`.
    pub fn enter(&mut self, amplitude: u64, holdings: u64, cycle: HarmonicCycle) -> Result<ParticipantId> {
        self.enter_with(Entry::new(amplitude, holdings, cycle))
    }

    /// Enter with explicit parameters.
    pub fn enter_with(&mut self, entry: Entry) -> Result<ParticipantId> {
        let min = self.config.minimum_amplitude;
        if entry.amplitude < min || entry.amplitude > entry.holdings {
            return Err(FieldError::InvalidAmplitude {
                amplitude: entry.amplitude,
                min,
                max: entry.holdings,
            });
        }
        let id = entry.id.unwrap_or(ParticipantId(self.next_id));
        if self.participants.contains_key(&id) {
            return Err(FieldError::ParticipantExists(id));
        }
        let total_weight = self
            .field
            .total_weight
            .checked_add(entry.amplitude)
            .ok_or(FieldError::ArithmeticOverflow)?;

        let epoch = self.field.epoch;
        let phase = entry.phase.unwrap_or_else(|| Participant::seeded_phase(id, epoch));
        let omega = entry
            .natural_frequency
            .unwrap_or_else(|| Participant::natural_frequency_for(entry.amplitude, &self.config));
        let p = Participant::new(id, entry.amplitude, entry.cycle, phase, omega, epoch, &self.config);

        self.participants.insert(id, p);
        self.field.total_weight = total_weight;
        self.field.participant_count += 1;
        self.next_id = self.next_id.max(id.0.saturating_add(1));
        self.emit(FieldEvent::Entered { id, amplitude: entry.amplitude, cycle: entry.cycle, epoch });
        Ok(id)
    }

    // ── Field ───────────────────────────────────────────────────────────

    /// Recompute every aggregate metric and advance the epoch counter.
    ///
    /// `epoch_index` must be exactly `field.epoch + 1`. Lower indices fail
    /// with [`FieldError::StaleEpoch`], higher ones with
    /// [`FieldError::EpochOutOfSequence`].
    pub fn advance_field(&mut self, epoch_index: u64, overrides: FieldOverrides) -> Result<&CoherenceField> {
        let current = self.field.epoch;
        if epoch_index <= current {
            tracing::warn!(requested = epoch_index, current, "stale epoch refused");
            return Err(FieldError::StaleEpoch { requested: epoch_index, current });
        }
        let expected = current + 1;
        if epoch_index != expected {
            return Err(FieldError::EpochOutOfSequence { expected, got: epoch_index });
        }

        let prev_r = self.field.order_parameter;
        let agg = metrics::aggregate(
            self.participants.values(),
            self.field.network_coherence_depth,
            &self.config,
        );

        for p in self.participants.values_mut() {
            p.snapshot_phase = p.phase;
        }

        let field = &mut self.field;
        field.epoch = epoch_index;
        field.order_parameter = agg.order_parameter;
        field.global_phase = agg.global_phase;
        field.decentralization_coefficient = agg.decentralization;
        field.network_coherence_depth = agg.network_coherence_depth;
        field.total_weight = agg.total_weight;
        field.participant_count = agg.participant_count;
        field.nakamoto_coefficient = agg.nakamoto_coefficient;
        overrides.apply(field);

        let (r, psi, count) = (field.order_parameter, field.global_phase, field.participant_count);
        self.emit(FieldEvent::FieldAdvanced {
            epoch: epoch_index,
            order_parameter: r,
            global_phase: psi,
            participant_count: count,
        });
        let peak = self.config.coherence_peak_threshold;
        if prev_r <= peak && r > peak {
            self.emit(FieldEvent::CoherencePeak { epoch: epoch_index, order_parameter: r });
        }
        Ok(&self.field)
    }

    // ── Phase updates ───────────────────────────────────────────────────

    /// Step one participant against the latest field snapshot.
    ///
    /// Idempotent within an epoch: a second call before the next
    /// `advance_field` returns [`PhaseUpdate::AlreadyCurrent`].
    pub fn update_participant_phase(&mut self, id: ParticipantId) -> Result<PhaseUpdate> {
        let p = self.get(id)?;
        if p.last_phase_epoch == Some(self.field.epoch) {
            tracing::debug!(%id, epoch = self.field.epoch, "phase already current");
            return Ok(PhaseUpdate::AlreadyCurrent);
        }
        let input = self.phase_input(p);
        let mean_field = MeanField::from_field(&self.field, self.config.coupling_constant);
        let phase = dynamics::step(&input, &mean_field, self.config.default_dt)?;
        let step_epoch = self.field.epoch;
        Ok(self.evaluate(id, phase, step_epoch))
    }

    /// Run one full epoch: step every pending participant from the same
    /// snapshot, advance the field, then evaluate each stepped participant
    /// against the new snapshot.
    #[tracing::instrument(level = "debug", skip(self), fields(epoch = self.field.epoch))]
    pub fn step_epoch(&mut self, dt: Fixed) -> Result<EpochReport> {
        let epoch = self.field.epoch;
        let next = epoch.checked_add(1).ok_or(FieldError::ArithmeticOverflow)?;

        let pending: Vec<ParticipantId> = self
            .participants
            .values()
            .filter(|p| p.last_phase_epoch != Some(epoch))
            .map(|p| p.id)
            .collect();
        let inputs: Vec<PhaseInput> = pending
            .iter()
            .filter_map(|id| self.participants.get(id))
            .map(|p| self.phase_input(p))
            .collect();
        let mean_field = MeanField::from_field(&self.field, self.config.coupling_constant);
        let phases = dynamics::advance_all(&inputs, &mean_field, dt)?;

        for (id, phase) in pending.iter().zip(&phases) {
            if let Some(p) = self.participants.get_mut(id) {
                p.phase = *phase;
            }
        }
        self.advance_field(next, FieldOverrides::none())?;

        let mut transitions = 0;
        for (id, phase) in pending.iter().zip(phases) {
            let before = self.participants.get(id).map(|p| p.state);
            if let PhaseUpdate::Applied { state, .. } = self.evaluate(*id, phase, epoch) {
                if before != Some(state) {
                    transitions += 1;
                }
            }
        }

        Ok(EpochReport {
            epoch: next,
            stepped: pending.len(),
            transitions,
            order_parameter: self.field.order_parameter,
            global_phase: self.field.global_phase,
        })
    }

    fn phase_input(&self, p: &Participant) -> PhaseInput {
        let pulls = self
            .couplings
            .outgoing(p.id)
            .into_iter()
            .filter_map(|e| {
                self.participants.get(&e.target_id).map(|t| CouplingPull {
                    strength: e.strength,
                    target_phase: t.snapshot_phase,
                })
            })
            .collect();
        PhaseInput { phase: p.phase, natural_frequency: p.natural_frequency, pulls }
    }

    /// Install `phase`, then run accumulators, state machine and accrual
    /// against the current field. Marks the participant as stepped for
    /// `step_epoch`.
    fn evaluate(&mut self, id: ParticipantId, phase: Fixed, step_epoch: u64) -> PhaseUpdate {
        let Some(p) = self.participants.get_mut(&id) else {
            return PhaseUpdate::AlreadyCurrent;
        };
        let config = &self.config;
        let field = &self.field;

        p.phase = phase.wrap_phase();
        let lock = p.phase_lock(field.global_phase);
        let drift = p.phase.angular_distance(field.global_phase);
        p.absorb_lock(lock, config);

        let mut counters = Counters { phase_lock: p.phase_lock_epoch_counter, drift: p.drift_epoch_counter };
        let from = p.state;
        let to = state::step(
            from,
            &mut counters,
            &Observation { lock, drift, depth: p.coherence_depth },
            config,
        );
        p.state = to;
        p.phase_lock_epoch_counter = counters.phase_lock;
        p.drift_epoch_counter = counters.drift;

        let accrued = emission::epoch_accrual(p, field, config);
        p.unclaimed_balance = p.unclaimed_balance.saturating_add(accrued.main);
        p.unclaimed_golden_bonus = p.unclaimed_golden_bonus.saturating_add(accrued.golden_bonus);
        p.last_phase_epoch = Some(step_epoch);
        let amplitude = p.amplitude;
        let phase = p.phase;

        for edge in self.couplings.outgoing_mut(id) {
            let share = emission::pro_rata(accrued.total(), edge.locked_amplitude, amplitude);
            edge.shared_emission_accrual = edge.shared_emission_accrual.saturating_add(share);
        }

        let epoch = self.field.epoch;
        tracing::debug!(%id, %phase, %lock, state = ?to, accrued = accrued.total(), "phase updated");
        if from != to {
            self.emit(FieldEvent::StateTransition { id, from, to, epoch });
            if to == ParticipationState::Golden {
                self.emit(FieldEvent::GoldenAchieved { id, epoch });
            }
        }
        PhaseUpdate::Applied { phase, phase_lock: lock, state: to, accrued }
    }

    // ── Couplings ───────────────────────────────────────────────────────

    /// Create the edge `source → target`, locking `locked_amplitude` of the source.
    pub fn phase_couple(
        &mut self,
        source: ParticipantId,
        target: ParticipantId,
        strength: Fixed,
        locked_amplitude: u64,
    ) -> Result<()> {
        let src = self.get(source)?;
        if source != target && !self.participants.contains_key(&target) {
            return Err(FieldError::NoParticipantRecord(target));
        }
        self.couplings.validate(src, target, strength, locked_amplitude, &self.config)?;

        if let Some(src) = self.participants.get_mut(&source) {
            src.locked_amplitude += locked_amplitude;
        }
        self.couplings.insert(PhaseCoupling {
            source_id: source,
            target_id: target,
            strength,
            locked_amplitude,
            creation_epoch: self.field.epoch,
            shared_emission_accrual: 0,
        });
        self.emit(FieldEvent::Coupled { source, target, strength, locked_amplitude });
        Ok(())
    }

    /// Remove the edge `source → target` and release its locked amplitude.
    pub fn uncouple(&mut self, source: ParticipantId, target: ParticipantId) -> Result<PhaseCoupling> {
        let edge = self
            .couplings
            .remove(source, target)
            .ok_or(FieldError::NoCoupling { from: source, to: target })?;
        self.release(&edge);
        self.emit(FieldEvent::Uncoupled { source, target, released_amplitude: edge.locked_amplitude });
        Ok(edge)
    }

    fn release(&mut self, edge: &PhaseCoupling) {
        if let Some(src) = self.participants.get_mut(&edge.source_id) {
            src.locked_amplitude = src.locked_amplitude.saturating_sub(edge.locked_amplitude);
        }
    }

    // ── Emissions ───────────────────────────────────────────────────────

    /// Pay every accrued emission of `id`.
    ///
    /// All-or-nothing: fails with [`FieldError::ReserveDepleted`] without
    /// paying anything if either reserve cannot cover its part, and with
    /// [`FieldError::NoEmissionsToClaim`] when nothing is owed.
    pub fn claim_emissions(&mut self, id: ParticipantId) -> Result<ClaimReceipt> {
        let p = self.participants.get_mut(&id).ok_or(FieldError::NoParticipantRecord(id))?;
        if p.total_unclaimed() == 0 {
            return Err(FieldError::NoEmissionsToClaim(id));
        }
        let paid = match emission::pay_unclaimed(p, &mut self.field) {
            Ok(paid) => paid,
            Err(e) => {
                tracing::warn!(%id, error = %e, "claim refused");
                return Err(e);
            }
        };
        let receipt = ClaimReceipt { id, paid, total_claimed: p.total_claimed, epoch: self.field.epoch };
        self.emit(FieldEvent::EmissionsClaimed {
            id,
            main: paid.main,
            golden: paid.golden,
            epoch: receipt.epoch,
        });
        Ok(receipt)
    }

    /// Top up the main reserve. Returns the new balance.
    pub fn fund_reserve(&mut self, amount: u64) -> Result<u64> {
        self.field.reserve_balance =
            self.field.reserve_balance.checked_add(amount).ok_or(FieldError::ArithmeticOverflow)?;
        Ok(self.field.reserve_balance)
    }

    /// Top up the golden reserve. Returns the new balance.
    pub fn fund_golden_reserve(&mut self, amount: u64) -> Result<u64> {
        self.field.golden_reserve_balance = self
            .field
            .golden_reserve_balance
            .checked_add(amount)
            .ok_or(FieldError::ArithmeticOverflow)?;
        Ok(self.field.golden_reserve_balance)
    }

    // ── Exit ────────────────────────────────────────────────────────────

    /// Exit the field.
    ///
    /// Before the harmonic cycle completes `force` must be set, otherwise the
    /// call fails with [`FieldError::TooEarlyToDecohere`]. Unclaimed emissions
    /// are paid in the same operation, the decoherence cost is recycled into
    /// the main reserve and every edge touching the participant is removed.
    pub fn decohere(&mut self, id: ParticipantId, force: bool) -> Result<DecoherenceReceipt> {
        let p = self.get(id)?;
        let quote = ExitQuote::for_participant(p, self.field.epoch, &self.config);
        if !quote.is_mature() && !force {
            return Err(FieldError::TooEarlyToDecohere { elapsed: quote.elapsed, cycle: p.cycle_length });
        }
        if let Err(e) = emission::check_reserves(p, &self.field) {
            tracing::warn!(%id, error = %e, "exit refused");
            return Err(e);
        }
        let reserve_after = (self.field.reserve_balance - p.unclaimed_balance)
            .checked_add(quote.cost)
            .ok_or(FieldError::ArithmeticOverflow)?;

        // pay_unclaimed validates before it mutates; nothing below can fail.
        let record = self.participants.get_mut(&id).ok_or(FieldError::NoParticipantRecord(id))?;
        let paid = emission::pay_unclaimed(record, &mut self.field)?;
        let p = self.participants.remove(&id).ok_or(FieldError::NoParticipantRecord(id))?;
        self.field.reserve_balance = reserve_after;
        self.field.total_weight = self.field.total_weight.saturating_sub(p.amplitude);
        self.field.participant_count = self.field.participant_count.saturating_sub(1);

        let removed = self.couplings.remove_touching(id);
        for edge in &removed {
            self.release(edge);
        }

        let receipt = DecoherenceReceipt {
            id,
            returned_amplitude: quote.returned_amplitude,
            cost: quote.cost,
            emissions_paid: paid,
            epochs_elapsed: quote.elapsed,
            edges_removed: removed.len(),
        };
        self.emit(FieldEvent::Decohered {
            id,
            returned_amplitude: receipt.returned_amplitude,
            cost: receipt.cost,
            emissions_paid: paid.total(),
            epoch: self.field.epoch,
        });
        Ok(receipt)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn get(&self, id: ParticipantId) -> Result<&Participant> {
        self.participants.get(&id).ok_or(FieldError::NoParticipantRecord(id))
    }

    fn emit(&mut self, event: FieldEvent) {
        event.trace();
        #[cfg(feature = "event-log")]
        self.log.push(event);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const RESERVE: u64 = 1_000_000_000;

    fn engine() -> CoherenceEngine {
        CoherenceEngine::new(FieldConfig::default(), RESERVE, RESERVE).unwrap()
    }

    fn enter_at(e: &mut CoherenceEngine, phase: f64) -> ParticipantId {
        e.enter_with(
            Entry::new(1_000_000, 1_000_000, HarmonicCycle::Quarter)
                .with_phase(Fixed::from_f64(phase))
                .with_natural_frequency(Fixed::ZERO),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let bad = FieldConfig { target_participant_count: 0, ..FieldConfig::default() };
        assert!(matches!(CoherenceEngine::new(bad, 0, 0), Err(FieldError::InvalidConfig(_))));
    }

    #[test]
    fn test_enter_validates_amplitude() {
        let mut e = engine();
        assert!(matches!(
            e.enter(999_999, 5_000_000, HarmonicCycle::Quarter),
            Err(FieldError::InvalidAmplitude { .. })
        ));
        assert!(matches!(
            e.enter(2_000_000, 1_500_000, HarmonicCycle::Quarter),
            Err(FieldError::InvalidAmplitude { .. })
        ));
        let id = e.enter(1_000_000, 1_500_000, HarmonicCycle::Full).unwrap();
        let p = e.participant(id).unwrap();
        assert_eq!(p.state, ParticipationState::Attuning);
        assert_eq!(p.cycle_length, 365);
        assert_eq!(e.field().total_weight, 1_000_000);
        assert_eq!(e.field().participant_count, 1);
    }

    #[test]
    fn test_enter_with_explicit_id_rejects_duplicates() {
        let mut e = engine();
        let entry = Entry::new(1_000_000, 1_000_000, HarmonicCycle::Quarter).with_id(ParticipantId(9));
        assert_eq!(e.enter_with(entry), Ok(ParticipantId(9)));
        assert_eq!(e.enter_with(entry), Err(FieldError::ParticipantExists(ParticipantId(9))));
        let next = e.enter(1_000_000, 1_000_000, HarmonicCycle::Quarter).unwrap();
        assert_eq!(next, ParticipantId(10));
    }

    #[test]
    fn test_advance_field_sequencing() {
        let mut e = engine();
        assert!(e.advance_field(1, FieldOverrides::none()).is_ok());
        assert_eq!(
            e.advance_field(1, FieldOverrides::none()).unwrap_err(),
            FieldError::StaleEpoch { requested: 1, current: 1 }
        );
        assert_eq!(
            e.advance_field(5, FieldOverrides::none()).unwrap_err(),
            FieldError::EpochOutOfSequence { expected: 2, got: 5 }
        );
        assert_eq!(e.field().epoch, 1);
    }

    #[test]
    fn test_single_participant_field() {
        let mut e = engine();
        let id = enter_at(&mut e, 2.0);
        let field = e.advance_field(1, FieldOverrides::none()).unwrap().clone();
        assert_eq!(field.order_parameter, Fixed::ONE);
        assert_eq!(field.global_phase, e.participant(id).unwrap().phase);
        assert_eq!(e.field().nakamoto_coefficient, 1);
    }

    #[test]
    fn test_overrides_replace_metrics() {
        let mut e = engine();
        enter_at(&mut e, 2.0);
        let overrides = FieldOverrides {
            global_phase: Some(Fixed::ONE),
            order_parameter: Some(Fixed::HALF),
            network_coherence_depth: Some(Fixed::from_int(6)),
        };
        let f = e.advance_field(1, overrides).unwrap();
        assert_eq!(f.global_phase, Fixed::ONE);
        assert_eq!(f.order_parameter, Fixed::HALF);
        assert_eq!(f.network_coherence_depth, Fixed::from_int(6));
    }

    #[test]
    fn test_update_is_idempotent_within_epoch() {
        let mut e = engine();
        let id = enter_at(&mut e, 1.0);
        assert_eq!(e.update_participant_phase(id), Ok(PhaseUpdate::AlreadyCurrent), "entry epoch");

        e.advance_field(1, FieldOverrides::none()).unwrap();
        let first = e.update_participant_phase(id).unwrap();
        assert!(matches!(first, PhaseUpdate::Applied { .. }));
        let snapshot = e.participant(id).unwrap().clone();
        assert_eq!(e.update_participant_phase(id), Ok(PhaseUpdate::AlreadyCurrent));
        assert_eq!(e.participant(id).unwrap(), &snapshot);
    }

    #[test]
    fn test_update_unknown_participant() {
        let mut e = engine();
        assert_eq!(
            e.update_participant_phase(ParticipantId(42)),
            Err(FieldError::NoParticipantRecord(ParticipantId(42)))
        );
    }

    #[test]
    fn test_step_epoch_rejects_bad_dt_without_mutation() {
        let mut e = engine();
        enter_at(&mut e, 1.0);
        e.advance_field(1, FieldOverrides::none()).unwrap();
        let before = e.participants().cloned().collect::<Vec<_>>();
        assert!(matches!(e.step_epoch(Fixed::ZERO), Err(FieldError::InvalidTimestep(_))));
        assert_eq!(e.field().epoch, 1);
        assert_eq!(e.participants().cloned().collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_step_epoch_accrues_emissions() {
        let mut e = engine();
        let id = enter_at(&mut e, 0.0);
        e.step_epoch(Fixed::ONE).unwrap();
        let report = e.step_epoch(Fixed::ONE).unwrap();
        assert_eq!(report.epoch, 2);
        assert_eq!(report.stepped, 1);
        let p = e.participant(id).unwrap();
        assert!(p.unclaimed_balance > 0);
        assert_eq!(p.last_phase_epoch, Some(1));
    }

    #[test]
    fn test_couple_and_uncouple_lock_amplitude() {
        let mut e = engine();
        let a = enter_at(&mut e, 0.0);
        let b = enter_at(&mut e, 1.0);

        assert_eq!(e.phase_couple(a, a, Fixed::HALF, 0), Err(FieldError::SelfCoupling(a)));
        assert_eq!(
            e.phase_couple(a, ParticipantId(99), Fixed::HALF, 0),
            Err(FieldError::NoParticipantRecord(ParticipantId(99)))
        );
        e.phase_couple(a, b, Fixed::HALF, 500_000).unwrap();
        assert_eq!(e.participant(a).unwrap().free_amplitude(), 500_000);
        assert_eq!(
            e.phase_couple(a, b, Fixed::HALF, 0),
            Err(FieldError::DuplicateCoupling { from: a, to: b })
        );
        assert_eq!(e.couplings_from(a).len(), 1);

        let edge = e.uncouple(a, b).unwrap();
        assert_eq!(edge.locked_amplitude, 500_000);
        assert_eq!(e.participant(a).unwrap().free_amplitude(), 1_000_000);
        assert_eq!(e.uncouple(a, b), Err(FieldError::NoCoupling { from: a, to: b }));
    }

    #[test]
    fn test_claim_pays_and_resets() {
        let mut e = engine();
        let id = enter_at(&mut e, 0.0);
        for _ in 0..3 {
            e.step_epoch(Fixed::ONE).unwrap();
        }
        let owed = e.participant(id).unwrap().unclaimed_balance;
        let receipt = e.claim_emissions(id).unwrap();
        assert_eq!(receipt.paid.main, owed);
        assert_eq!(e.field().reserve_balance, RESERVE - owed);
        assert_eq!(e.participant(id).unwrap().unclaimed_balance, 0);
        assert_eq!(e.participant(id).unwrap().last_claim_epoch, 3);
    }

    #[test]
    fn test_claim_fails_atomically_on_empty_reserve() {
        let mut e = CoherenceEngine::new(FieldConfig::default(), 1, 0).unwrap();
        let id = enter_at(&mut e, 0.0);
        e.step_epoch(Fixed::ONE).unwrap();
        e.step_epoch(Fixed::ONE).unwrap();
        let before = e.participant(id).unwrap().clone();
        assert!(matches!(e.claim_emissions(id), Err(FieldError::ReserveDepleted { .. })));
        assert_eq!(e.participant(id).unwrap(), &before);
        assert_eq!(e.field().reserve_balance, 1);

        e.fund_reserve(1_000_000).unwrap();
        assert!(e.claim_emissions(id).is_ok());
    }

    #[test]
    fn test_decohere_requires_force_before_cycle_end() {
        let mut e = engine();
        let id = enter_at(&mut e, 0.0);
        assert_eq!(
            e.decohere(id, false),
            Err(FieldError::TooEarlyToDecohere { elapsed: 0, cycle: 91 })
        );
        let receipt = e.decohere(id, true).unwrap();
        assert_eq!(receipt.cost, 0, "no phase-lock history yet");
        assert_eq!(receipt.returned_amplitude, 1_000_000);
        assert!(e.participant(id).is_none());
        assert_eq!(e.field().total_weight, 0);
        assert_eq!(e.field().participant_count, 0);
    }

    #[test]
    fn test_decohere_recycles_cost_and_removes_edges() {
        let mut e = engine();
        let a = enter_at(&mut e, 0.0);
        let b = enter_at(&mut e, 0.0);
        e.phase_couple(a, b, Fixed::HALF, 400_000).unwrap();
        e.phase_couple(b, a, Fixed::HALF, 300_000).unwrap();
        for _ in 0..5 {
            e.step_epoch(Fixed::ONE).unwrap();
        }
        let owed = e.participant(a).unwrap().unclaimed_balance;
        let reserve = e.field().reserve_balance;

        let receipt = e.decohere(a, true).unwrap();
        assert!(receipt.cost > 0);
        assert_eq!(receipt.edges_removed, 2);
        assert_eq!(receipt.emissions_paid.main, owed);
        assert_eq!(e.field().reserve_balance, reserve - owed + receipt.cost);
        assert_eq!(receipt.returned_amplitude + receipt.cost, 1_000_000);
        assert!(e.couplings().is_empty());
        assert_eq!(e.participant(b).unwrap().locked_amplitude, 0);
    }

    #[test]
    fn test_mature_exit_is_free() {
        let mut e = engine();
        let id = enter_at(&mut e, 0.0);
        for _ in 0..91 {
            e.step_epoch(Fixed::ONE).unwrap();
        }
        let receipt = e.decohere(id, false).unwrap();
        assert_eq!(receipt.cost, 0);
        assert_eq!(receipt.epochs_elapsed, 91);
    }

    #[test]
    fn test_coupled_source_records_shared_accrual() {
        let mut e = engine();
        let a = enter_at(&mut e, 0.0);
        let b = enter_at(&mut e, 0.5);
        e.phase_couple(a, b, Fixed::HALF, 500_000).unwrap();
        e.step_epoch(Fixed::ONE).unwrap();
        e.step_epoch(Fixed::ONE).unwrap();
        let edge = e.coupling(a, b).unwrap();
        assert!(edge.shared_emission_accrual > 0);
        assert!(edge.shared_emission_accrual <= e.participant(a).unwrap().unclaimed_balance);
    }

    #[test]
    fn coupled_updates_do_not_depend_on_call_order() {
        let run = |b_first: bool| {
            let mut e = engine();
            let a = enter_at(&mut e, 0.3);
            let b = enter_at(&mut e, 2.0);
            e.phase_couple(a, b, Fixed::from_ratio(8, 10), 0).unwrap();
            e.phase_couple(b, a, Fixed::from_ratio(3, 10), 0).unwrap();
            e.advance_field(1, FieldOverrides::none()).unwrap();
            let order = if b_first { [b, a] } else { [a, b] };
            for id in order {
                e.update_participant_phase(id).unwrap();
            }
            (e.participant(a).unwrap().clone(), e.participant(b).unwrap().clone())
        };
        assert_eq!(run(false), run(true));
    }

    #[test]
    fn test_update_pulls_toward_target_snapshot_phase() {
        let mut e = engine();
        let a = enter_at(&mut e, 0.3);
        let b = enter_at(&mut e, 2.0);
        e.phase_couple(a, b, Fixed::from_ratio(8, 10), 0).unwrap();
        e.advance_field(1, FieldOverrides::none()).unwrap();
        e.update_participant_phase(b).unwrap();
        let b = e.participant(b).unwrap();
        assert_ne!(b.phase, b.snapshot_phase);
        assert_eq!(b.snapshot_phase, Fixed::from_f64(2.0));
    }

    #[test]
    fn test_claim_with_nothing_owed_is_refused() {
        let mut e = engine();
        let id = enter_at(&mut e, 0.0);
        assert_eq!(e.claim_emissions(id), Err(FieldError::NoEmissionsToClaim(id)));
        assert_eq!(e.field().reserve_balance, RESERVE);

        e.step_epoch(Fixed::ONE).unwrap();
        e.step_epoch(Fixed::ONE).unwrap();
        e.claim_emissions(id).unwrap();
        let after = e.participant(id).unwrap().clone();
        assert_eq!(e.claim_emissions(id), Err(FieldError::NoEmissionsToClaim(id)));
        assert_eq!(e.participant(id).unwrap(), &after);
    }

    #[test]
    fn test_decohere_overflowing_reserve_changes_nothing() {
        let mut e = CoherenceEngine::new(FieldConfig::default(), u64::MAX - 10, u64::MAX).unwrap();
        let a = enter_at(&mut e, 0.0);
        let b = enter_at(&mut e, 0.1);
        e.phase_couple(a, b, Fixed::HALF, 100_000).unwrap();
        for _ in 0..30 {
            e.step_epoch(Fixed::ONE).unwrap();
        }
        let quote = e.exit_quote(a).unwrap();
        let owed = e.participant(a).unwrap().unclaimed_balance;
        assert!(quote.cost > owed + 10, "cost {} owed {}", quote.cost, owed);

        let before = (e.field().clone(), e.participants().cloned().collect::<Vec<_>>(), e.couplings().len());
        assert_eq!(e.decohere(a, true), Err(FieldError::ArithmeticOverflow));
        let after = (e.field().clone(), e.participants().cloned().collect::<Vec<_>>(), e.couplings().len());
        assert_eq!(after, before);
    }

    #[cfg(feature = "event-log")]
    #[test]
    fn test_event_log_records_operations() {
        let mut e = engine();
        let id = enter_at(&mut e, 0.0);
        e.advance_field(1, FieldOverrides::none()).unwrap();
        assert!(matches!(e.events().iter().next(), Some(FieldEvent::Entered { id: got, .. }) if *got == id));
        assert!(matches!(e.events().last(), Some(FieldEvent::FieldAdvanced { epoch: 1, .. })));
    }
}
