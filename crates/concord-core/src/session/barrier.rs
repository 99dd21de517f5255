//! Fact-verification completion barrier.
//!
//! Two independent write slots, one per participant. A slot is overwritten
//! on re-submission, never merged. The barrier condition is evaluated on the
//! state *after* the just-completed write: the second writer observes both
//! slots and releases; the first writer never does. Serialization of the two
//! writes is the caller's responsibility (one lock domain per session).

use serde::{Deserialize, Serialize};

use super::fact::VerificationMap;
use super::Party;

/// Outcome of recording one verification submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    /// Only the submitter's slot is populated; the counter-party is pending.
    Waiting,
    /// Both slots are populated as of this write. Fired at most once per
    /// pair of slots because the releasing write is, by definition, the one
    /// that completed the pair.
    Released,
}

/// The two verification slots of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p1: Option<VerificationMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p2: Option<VerificationMap>,
}

impl VerificationSlots {
    /// Writes a participant's submission and evaluates the barrier against
    /// the post-write state.
    pub fn record(&mut self, party: Party, verifications: VerificationMap) -> BarrierState {
        match party {
            Party::P1 => self.p1 = Some(verifications),
            Party::P2 => self.p2 = Some(verifications),
        }
        if self.is_complete() {
            BarrierState::Released
        } else {
            BarrierState::Waiting
        }
    }

    pub fn slot(&self, party: Party) -> Option<&VerificationMap> {
        match party {
            Party::P1 => self.p1.as_ref(),
            Party::P2 => self.p2.as_ref(),
        }
    }

    /// Have both fact-verification slots been written?
    pub fn is_complete(&self) -> bool {
        self.p1.is_some() && self.p2.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fact::{VerificationEntry, VerificationStatus};

    fn submission() -> VerificationMap {
        vec![VerificationEntry {
            position: 0,
            status: VerificationStatus::Agree,
            comment: None,
        }]
    }

    #[test]
    fn single_slot_waits() {
        let mut slots = VerificationSlots::default();
        assert_eq!(slots.record(Party::P1, submission()), BarrierState::Waiting);
        assert!(!slots.is_complete());

        let mut slots = VerificationSlots::default();
        assert_eq!(slots.record(Party::P2, submission()), BarrierState::Waiting);
        assert!(!slots.is_complete());
    }

    #[test]
    fn second_writer_releases_in_either_order() {
        for first in [Party::P1, Party::P2] {
            let mut slots = VerificationSlots::default();
            assert_eq!(slots.record(first, submission()), BarrierState::Waiting);
            assert_eq!(
                slots.record(first.other(), submission()),
                BarrierState::Released
            );
            assert!(slots.is_complete());
        }
    }

    #[test]
    fn resubmission_overwrites_instead_of_appending() {
        let mut slots = VerificationSlots::default();
        slots.record(Party::P1, submission());

        let replacement = vec![VerificationEntry {
            position: 0,
            status: VerificationStatus::Disagree,
            comment: Some("updated".to_string()),
        }];
        slots.record(Party::P1, replacement.clone());

        assert_eq!(slots.slot(Party::P1), Some(&replacement));
        assert_eq!(slots.slot(Party::P1).unwrap().len(), 1);
    }
}
