//! End-to-end lifecycle tests for the coherence engine.
//!
//! Entry, coupling, epoch stepping, claims and exit, driven through the public
//! API only.

use coherence_field::{
    CoherenceEngine, CoherenceField, Entry, FieldConfig, FieldError, FieldOverrides, Fixed,
    HarmonicCycle, Participant, ParticipantId, ParticipationState, PhaseUpdate,
};

// ─── helpers ─────────────────────────────────────────────────────────────────

const BIG: u64 = 1_000_000_000_000;

fn engine_with(reserve: u64, golden: u64) -> CoherenceEngine {
    CoherenceEngine::new(FieldConfig::default(), reserve, golden).unwrap()
}

fn enter(e: &mut CoherenceEngine, amplitude: u64, phase: f64, cycle: HarmonicCycle) -> ParticipantId {
    e.enter_with(
        Entry::new(amplitude, amplitude, cycle)
            .with_phase(Fixed::from_f64(phase))
            .with_natural_frequency(Fixed::from_ratio(1, 100)),
    )
    .unwrap()
}

fn observable(e: &CoherenceEngine) -> (CoherenceField, Vec<Participant>, usize) {
    (e.field().clone(), e.participants().cloned().collect(), e.couplings().len())
}

// ─── invariants over a run ───────────────────────────────────────────────────

#[test]
fn phases_stay_wrapped_and_r_stays_bounded() {
    let mut e = engine_with(BIG, BIG);
    for i in 0..7u64 {
        let amplitude = 1_000_000 + i * 250_000;
        enter(&mut e, amplitude, i as f64 * 0.9, HarmonicCycle::Quarter);
    }
    for _ in 0..150 {
        e.step_epoch(Fixed::ONE).unwrap();
        let f = e.field();
        assert!(f.order_parameter >= Fixed::ZERO && f.order_parameter <= Fixed::ONE);
        assert!(f.global_phase >= Fixed::ZERO && f.global_phase < Fixed::TWO_PI);
        for p in e.participants() {
            assert!(p.phase >= Fixed::ZERO && p.phase < Fixed::TWO_PI, "{} phase {}", p.id, p.phase);
            assert!(p.stability >= Fixed::ZERO && p.stability <= Fixed::ONE);
            assert!(p.coherence_depth >= e.config().depth_baseline);
        }
    }
    assert_eq!(e.field().epoch, 150);
    assert_eq!(e.field().participant_count, 7);
}

#[test]
fn golden_is_never_reached_before_the_ladder_completes() {
    let mut e = engine_with(BIG, BIG);
    let id = enter(&mut e, 5_000_000, 1.0, HarmonicCycle::Golden);

    let mut seen = Vec::new();
    for _ in 0..400 {
        e.step_epoch(Fixed::ONE).unwrap();
        let state = e.participant(id).unwrap().state;
        if seen.last() != Some(&state) {
            seen.push(state);
            if state == ParticipationState::Golden {
                assert!(e.field().epoch > 60, "golden at epoch {}", e.field().epoch);
            }
        }
    }
    assert_eq!(
        seen,
        [
            ParticipationState::Attuning,
            ParticipationState::Resonant,
            ParticipationState::Entrained,
            ParticipationState::Golden,
        ]
    );
    let p = e.participant(id).unwrap();
    assert!(p.coherence_depth > Fixed::PHI_FOURTH);
    assert!(p.unclaimed_golden_bonus > 0, "golden bonus accrues on the golden reserve");
}

#[test]
fn update_then_advance_drives_the_same_flow() {
    let mut e = engine_with(BIG, BIG);
    let a = enter(&mut e, 1_000_000, 0.2, HarmonicCycle::Quarter);
    let b = enter(&mut e, 1_000_000, 0.4, HarmonicCycle::Quarter);

    for epoch in 1..=20u64 {
        e.advance_field(epoch, FieldOverrides::none()).unwrap();
        for id in [a, b] {
            assert!(matches!(e.update_participant_phase(id).unwrap(), PhaseUpdate::Applied { .. }));
            assert_eq!(e.update_participant_phase(id).unwrap(), PhaseUpdate::AlreadyCurrent);
        }
    }
    assert_eq!(e.participant(a).unwrap().state, ParticipationState::Resonant);
    assert_eq!(e.participant(b).unwrap().state, ParticipationState::Resonant);
}

// ─── reserves ────────────────────────────────────────────────────────────────

#[test]
fn payouts_never_exceed_the_reserve() {
    let initial = 20_000;
    let mut e = engine_with(initial, 0);
    let ids: Vec<ParticipantId> =
        (0..4).map(|i| enter(&mut e, 2_000_000, 0.1 * i as f64, HarmonicCycle::Full)).collect();

    let mut paid = 0u64;
    let mut refused = 0;
    for _ in 0..60 {
        e.step_epoch(Fixed::ONE).unwrap();
        for id in &ids {
            let reserve_before = e.field().reserve_balance;
            match e.claim_emissions(*id) {
                Ok(receipt) => {
                    assert!(receipt.paid.main <= reserve_before);
                    paid += receipt.paid.total();
                }
                Err(FieldError::ReserveDepleted { required, available }) => {
                    assert!(required > available);
                    assert_eq!(e.field().reserve_balance, reserve_before);
                    refused += 1;
                }
                Err(FieldError::NoEmissionsToClaim(_)) => {
                    assert_eq!(e.participant(*id).unwrap().total_unclaimed(), 0);
                }
                Err(other) => panic!("unexpected error {other}"),
            }
        }
    }
    assert!(refused > 0, "reserve should run dry");
    assert_eq!(e.field().reserve_balance, initial - paid);
}

#[test]
fn exit_is_refused_atomically_when_reserve_cannot_cover_emissions() {
    let mut e = engine_with(0, 0);
    let a = enter(&mut e, 1_000_000, 0.0, HarmonicCycle::Quarter);
    let b = enter(&mut e, 1_000_000, 0.0, HarmonicCycle::Quarter);
    e.phase_couple(a, b, Fixed::HALF, 250_000).unwrap();
    for _ in 0..5 {
        e.step_epoch(Fixed::ONE).unwrap();
    }

    let before = observable(&e);
    assert!(matches!(e.decohere(a, true), Err(FieldError::ReserveDepleted { .. })));
    assert_eq!(observable(&e), before);

    e.fund_reserve(1_000_000).unwrap();
    let receipt = e.decohere(a, true).unwrap();
    assert_eq!(receipt.edges_removed, 1);
    assert!(e.participant(a).is_none());
}

// ─── exit ────────────────────────────────────────────────────────────────────

#[test]
fn decoherence_cost_falls_over_the_cycle() {
    let mut costs = Vec::new();
    for exit_epoch in [40u64, 60, 80, 91] {
        let mut e = engine_with(BIG, BIG);
        let id = enter(&mut e, 1_000_000, 0.5, HarmonicCycle::Quarter);
        for _ in 0..exit_epoch {
            e.step_epoch(Fixed::ONE).unwrap();
        }
        let quote = e.exit_quote(id).unwrap();
        let receipt = e.decohere(id, true).unwrap();
        assert_eq!(receipt.cost, quote.cost);
        assert_eq!(receipt.returned_amplitude, 1_000_000 - receipt.cost);
        costs.push(receipt.cost);
    }
    assert!(costs.windows(2).all(|w| w[0] > w[1] || w[1] == 0), "costs {:?}", costs);
    assert_eq!(costs.last(), Some(&0));
}

#[test]
fn governance_weight_tracks_state() {
    let mut e = engine_with(BIG, BIG);
    let id = enter(&mut e, 2_000_000, 0.0, HarmonicCycle::Quarter);
    assert_eq!(e.total_governance_weight(), 1_000_000);
    for _ in 0..12 {
        e.step_epoch(Fixed::ONE).unwrap();
    }
    assert_eq!(e.participant(id).unwrap().state, ParticipationState::Resonant);
    assert_eq!(e.total_governance_weight(), 2_000_000);
}
