//! Operation classes the Governor tracks independently per account.
//!
//! Each pipeline announces which class of work it is about to perform
//! so the Governor can apply the right timing-obfuscation jitter and
//! keep separate attempt counters — a flood-wait on `Message` traffic
//! should not reset the backoff already accrued on `Invitation` traffic
//! for the same account.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    Message,
    Invitation,
    Discovery,
    Metadata,
}

impl OpClass {
    pub const ALL: [OpClass; 4] = [OpClass::Message, OpClass::Invitation, OpClass::Discovery, OpClass::Metadata];

    /// Inter-operation pacing jitter bounds `(min, max)` applied when the
    /// caller performs a real sleep between operations of this class.
    pub fn pacing_jitter_bounds(self) -> (Duration, Duration) {
        match self {
            OpClass::Message => (Duration::from_millis(200), Duration::from_millis(800)),
            OpClass::Invitation => (Duration::from_secs(120), Duration::from_secs(600)),
            OpClass::Discovery => (Duration::from_secs(1), Duration::from_secs(3)),
            OpClass::Metadata => (Duration::from_millis(200), Duration::from_millis(800)),
        }
    }

    /// Variance `v` used when the class's pacing jitter is drawn as
    /// `U(base * (1-v), base * (1+v))` rather than a flat range.
    pub fn pacing_variance(self) -> f64 {
        match self {
            OpClass::Invitation => 0.3,
            _ => 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invitation_jitter_bounds_match_contract() {
        let (lo, hi) = OpClass::Invitation.pacing_jitter_bounds();
        assert_eq!(lo, Duration::from_secs(120));
        assert_eq!(hi, Duration::from_secs(600));
    }

    #[test]
    fn discovery_jitter_bounds_match_contract() {
        let (lo, hi) = OpClass::Discovery.pacing_jitter_bounds();
        assert_eq!(lo, Duration::from_secs(1));
        assert_eq!(hi, Duration::from_secs(3));
    }
}
