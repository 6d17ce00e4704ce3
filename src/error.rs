//! Error taxonomy for every fallible engine operation.
//!
//! All variants are local, recoverable, caller-facing conditions. The engine
//! validates an operation completely before mutating anything, so an `Err`
//! always means the engine state is byte-identical to its pre-call state.

use crate::fixed::Fixed;
use crate::participant::ParticipantId;

/// Errors returned by [`CoherenceEngine`](crate::engine::CoherenceEngine) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// Amplitude below the minimum, above the caller's holdings, or a locked
    /// amount exceeding the source's free amplitude.
    #[error("invalid amplitude {amplitude} (allowed {min}..={max})")]
    InvalidAmplitude {
        /// Requested amount.
        amplitude: u64,
        /// Smallest acceptable amount.
        min: u64,
        /// Largest acceptable amount.
        max: u64,
    },

    /// Coupling strength outside `[0, max_coupling_strength]`.
    #[error("coupling strength {strength} outside [0, {max}]")]
    InvalidCouplingStrength {
        /// Requested strength.
        strength: Fixed,
        /// Configured ceiling.
        max: Fixed,
    },

    /// A participant tried to couple to itself.
    #[error("participant {0} cannot phase-couple to itself")]
    SelfCoupling(ParticipantId),

    /// An edge for this ordered pair already exists.
    #[error("coupling {from} -> {to} already exists")]
    DuplicateCoupling {
        /// Edge source.
        from: ParticipantId,
        /// Edge target.
        to: ParticipantId,
    },

    /// No edge exists for this ordered pair.
    #[error("no coupling {from} -> {to}")]
    NoCoupling {
        /// Edge source.
        from: ParticipantId,
        /// Edge target.
        to: ParticipantId,
    },

    /// The requested epoch index is not newer than the current epoch.
    #[error("stale epoch {requested}: field already at {current}")]
    StaleEpoch {
        /// Index supplied by the caller.
        requested: u64,
        /// Current field epoch.
        current: u64,
    },

    /// The requested epoch index skips ahead of `current + 1`.
    #[error("epoch {got} out of sequence (expected {expected})")]
    EpochOutOfSequence {
        /// The only acceptable next index.
        expected: u64,
        /// Index supplied by the caller.
        got: u64,
    },

    /// A reserve cannot cover the payout. Nothing was paid.
    #[error("reserve depleted: need {required}, have {available}")]
    ReserveDepleted {
        /// Amount the operation needed.
        required: u64,
        /// Balance of the reserve consulted.
        available: u64,
    },

    /// A claim found nothing owed.
    #[error("participant {0} has no emissions to claim")]
    NoEmissionsToClaim(ParticipantId),

    /// No participant record for this id.
    #[error("no participant record for {0}")]
    NoParticipantRecord(ParticipantId),

    /// A participant with this id is already in the field.
    #[error("participant {0} already in the field")]
    ParticipantExists(ParticipantId),

    /// The harmonic cycle has not completed and `force` was not set.
    #[error("too early to decohere: {elapsed} of {cycle} epochs elapsed")]
    TooEarlyToDecohere {
        /// Epochs since entry.
        elapsed: u64,
        /// Cycle length in epochs.
        cycle: u64,
    },

    /// `dt` must be strictly positive.
    #[error("timestep must be positive, got {0}")]
    InvalidTimestep(Fixed),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// A persisted snapshot is inconsistent or of an unknown version.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(&'static str),

    /// A bookkeeping counter would overflow.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, FieldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_descriptive() {
        let e = FieldError::ReserveDepleted { required: 10, available: 3 };
        assert_eq!(e.to_string(), "reserve depleted: need 10, have 3");

        let e = FieldError::NoEmissionsToClaim(ParticipantId(3));
        assert_eq!(e.to_string(), "participant #3 has no emissions to claim");

        let e = FieldError::SelfCoupling(ParticipantId(7));
        assert_eq!(e.to_string(), "participant #7 cannot phase-couple to itself");
    }
}
