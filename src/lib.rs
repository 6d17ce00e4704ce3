//! # coherence-field
//!
//! Coherence Field Engine: a deterministic, epoch-stepped model of a population
//! of phase oscillators that synchronise under coupled-oscillator dynamics,
//! with a participation state machine and reserve-bounded reward emission.
//!
//! ---
//!
//! ## The model
//!
//! Every participant is an oscillator with a phase θ, a natural frequency ω
//! and an amplitude (its weight). Once per epoch each phase is pulled toward
//! the amplitude-weighted mean phase Ψ with a strength proportional to the
//! collective order R, and toward the phase of any participant it has chosen
//! to couple to.
//!
//! Sustained alignment with Ψ is rewarded. A participant climbs
//! Attuning → Resonant → Entrained → Golden only through *consecutive* epochs
//! of phase lock, never through a single good sample, and falls to Drifting
//! in the first epoch its phase strays more than π/4 from Ψ.
//!
//! Everything is fixed point. Any observer replaying the same snapshot obtains
//! the same bits.
//!
//! ---
//!
//! ## The pipeline
//!
//! ```text
//! snapshot(e) → PhaseInput → dynamics::advance_all → metrics::aggregate → state::step → emission
//!                                  ↑                        ↑
//!                            CouplingGraph            CoherenceField(e + 1)
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`fixed`] | [`Fixed`] | Deterministic fixed-point arithmetic and transcendentals |
//! | [`config`] | [`FieldConfig`] | Every threshold, rate and weight |
//! | [`participant`] | [`Participant`], [`HarmonicCycle`] | Oscillator records and their smoothed accumulators |
//! | [`field`] | [`CoherenceField`], [`FieldOverrides`] | The singleton aggregate record |
//! | [`dynamics`] | [`PhaseInput`], [`MeanField`] | One coupled-oscillator step |
//! | [`metrics`] | [`Aggregate`] | R, Ψ, decentralization, network depth, Nakamoto coefficient |
//! | [`state`] | [`ParticipationState`] | Counter-driven participation state machine |
//! | [`emission`] | [`Channels`], [`Accrual`] | Four-channel reward and reserve-bounded payout |
//! | [`coupling`] | [`PhaseCoupling`], [`CouplingGraph`] | Directed phase-coupling edges |
//! | [`decoherence`] | [`ExitQuote`] | Early-exit cost |
//! | [`engine`] | [`CoherenceEngine`] | All operations, all-or-nothing |
//! | [`events`] | [`FieldEvent`] | Structured events, optional bounded log |
//! | `snapshot` | `FieldSnapshot` | Persisted layout (requires `serde`) |
//! | `shared` | `SharedEngine` | Mutex-guarded handle for concurrent drivers (requires `std`) |
//!
//! ## `no_std`
//!
//! This crate is `#![no_std]` by default and needs only `alloc`. Enable `std`
//! for [`SharedEngine`](crate::shared::SharedEngine), `parallel` to step
//! phases on the rayon pool, `serde` for snapshots, `event-log` for the
//! in-engine event journal and `python-ffi` for the Python bindings.
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.
//!
//! ## License
//!
//! Business Source License 1.1.

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub mod config;
pub mod coupling;
pub mod decoherence;
pub mod dynamics;
pub mod emission;
pub mod engine;
pub mod error;
pub mod events;
pub mod field;
pub mod fixed;
pub mod metrics;
pub mod participant;
pub mod state;

#[cfg(feature = "serde")]
pub mod snapshot;

#[cfg(feature = "std")]
pub mod shared;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use config::{ChannelWeights, FieldConfig};
pub use coupling::{CouplingGraph, PhaseCoupling};
pub use decoherence::ExitQuote;
pub use dynamics::{MeanField, PhaseInput};
pub use emission::{Accrual, Channels, Payout};
pub use engine::{ClaimReceipt, CoherenceEngine, DecoherenceReceipt, Entry, EpochReport, PhaseUpdate};
pub use error::{FieldError, Result};
pub use events::FieldEvent;
pub use field::{CoherenceField, FieldOverrides};
pub use fixed::Fixed;
pub use metrics::Aggregate;
pub use participant::{HarmonicCycle, Participant, ParticipantId};
pub use state::ParticipationState;

#[cfg(feature = "event-log")]
pub use events::EventLog;
#[cfg(feature = "serde")]
pub use snapshot::{FieldSnapshot, SNAPSHOT_VERSION};
#[cfg(feature = "std")]
pub use shared::SharedEngine;
