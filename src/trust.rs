//! Trust tiers.
//!
//! One pure function of (completed tasks, reputation) drives both the
//! moderation leniency policy and the profile badge display. Thresholds live
//! here and nowhere else.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    New,
    Rising,
    Verified,
    Trusted,
}

impl TrustTier {
    /// Classify an actor. Tiers are cumulative: an actor qualifying for a
    /// higher tier never falls into a lower one.
    pub fn for_actor(tasks_completed: u32, reputation: f64) -> TrustTier {
        if tasks_completed >= 10 && reputation >= 4.5 {
            TrustTier::Trusted
        } else if tasks_completed >= 3 && reputation >= 4.0 {
            TrustTier::Verified
        } else if tasks_completed >= 1 {
            TrustTier::Rising
        } else {
            TrustTier::New
        }
    }

    /// Label shown next to an actor's name.
    pub fn badge(&self) -> &'static str {
        match self {
            TrustTier::New => "New",
            TrustTier::Rising => "Rising",
            TrustTier::Verified => "Verified",
            TrustTier::Trusted => "Trusted",
        }
    }
}

impl std::fmt::Display for TrustTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.badge())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds() {
        assert_eq!(TrustTier::for_actor(0, 5.0), TrustTier::New);
        assert_eq!(TrustTier::for_actor(1, 0.0), TrustTier::Rising);
        assert_eq!(TrustTier::for_actor(2, 5.0), TrustTier::Rising);
        assert_eq!(TrustTier::for_actor(3, 4.0), TrustTier::Verified);
        assert_eq!(TrustTier::for_actor(3, 3.9), TrustTier::Rising);
        assert_eq!(TrustTier::for_actor(9, 4.9), TrustTier::Verified);
        assert_eq!(TrustTier::for_actor(10, 4.5), TrustTier::Trusted);
        assert_eq!(TrustTier::for_actor(10, 4.4), TrustTier::Verified);
        assert_eq!(TrustTier::for_actor(50, 5.0), TrustTier::Trusted);
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(TrustTier::Trusted > TrustTier::Verified);
        assert!(TrustTier::Verified > TrustTier::Rising);
        assert!(TrustTier::Rising > TrustTier::New);
    }
}
