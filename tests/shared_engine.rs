//! Concurrent drivers against one engine.

#![cfg(feature = "std")]

use std::thread;

use coherence_field::{
    CoherenceEngine, FieldConfig, FieldError, FieldOverrides, Fixed, HarmonicCycle, SharedEngine,
};

#[test]
fn racing_advances_for_one_epoch_admit_exactly_one() {
    let shared = SharedEngine::new(CoherenceEngine::new(FieldConfig::default(), 0, 0).unwrap());
    shared.enter(1_000_000, 1_000_000, HarmonicCycle::Quarter).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let s = shared.clone();
            thread::spawn(move || s.advance_field(1, FieldOverrides::none()))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for r in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(r, Err(FieldError::StaleEpoch { requested: 1, current: 1 })), "{r:?}");
    }
    assert_eq!(shared.field().epoch, 1);
}

#[test]
fn concurrent_claims_never_overdraw() {
    let initial = 200_000;
    let shared = SharedEngine::new(CoherenceEngine::new(FieldConfig::default(), initial, 0).unwrap());
    let ids: Vec<_> = (0..6)
        .map(|_| shared.enter(2_000_000, 2_000_000, HarmonicCycle::Full).unwrap())
        .collect();
    for _ in 0..40 {
        shared.step_epoch(Fixed::ONE).unwrap();
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let s = shared.clone();
            let id = *id;
            thread::spawn(move || match s.claim_emissions(id) {
                Ok(receipt) => receipt.paid.total(),
                Err(FieldError::ReserveDepleted { .. }) => 0,
                Err(other) => panic!("unexpected error {other}"),
            })
        })
        .collect();
    let paid: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert!(paid <= initial);
    assert_eq!(shared.field().reserve_balance, initial - paid);
}
