//! Extracted facts, per-participant filtered views, and verification entries.

use serde::{Deserialize, Serialize};

use super::Party;

/// Which participant a fact was stated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactSource {
    P1,
    P2,
    Both,
}

impl FactSource {
    /// A participant verifies the counter-party's claims: facts sourced from
    /// the other side or from both.
    pub fn verified_by(&self, party: Party) -> bool {
        match (self, party) {
            (FactSource::Both, _) => true,
            (FactSource::P1, Party::P2) => true,
            (FactSource::P2, Party::P1) => true,
            _ => false,
        }
    }
}

/// An atomic, checkable claim extracted once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: u64,
    pub statement: String,
    pub source: FactSource,
}

/// How a participant assessed one of the counter-party's facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Agree,
    Disagree,
    Partially,
}

/// One verification entry, addressed by the fact's position within the
/// filtered list the submitting participant saw (not the global fact list —
/// the two participants see different filtered subsets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationEntry {
    pub position: u32,
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A participant's complete verification submission.
pub type VerificationMap = Vec<VerificationEntry>;

/// The per-participant filtered views over the global fact list, computed
/// once when the fact list is generated and never recomputed at read sites.
///
/// Each view is the ordered list of fact ids the participant is asked to
/// verify. Position within that list is the index space of the participant's
/// `VerificationMap`; `position_of` recovers it from a stable fact id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactViews {
    pub p1: Vec<u64>,
    pub p2: Vec<u64>,
}

impl FactViews {
    /// Builds both views from the global fact list, preserving list order.
    pub fn build(facts: &[Fact]) -> Self {
        let ids_for = |party: Party| {
            facts
                .iter()
                .filter(|f| f.source.verified_by(party))
                .map(|f| f.id)
                .collect()
        };
        Self {
            p1: ids_for(Party::P1),
            p2: ids_for(Party::P2),
        }
    }

    pub fn view(&self, party: Party) -> &[u64] {
        match party {
            Party::P1 => &self.p1,
            Party::P2 => &self.p2,
        }
    }

    /// The filtered facts a participant sees, in view order.
    pub fn filtered<'a>(&self, party: Party, facts: &'a [Fact]) -> Vec<&'a Fact> {
        self.view(party)
            .iter()
            .filter_map(|id| facts.iter().find(|f| f.id == *id))
            .collect()
    }

    /// Position of a global fact id within a participant's filtered view.
    pub fn position_of(&self, party: Party, fact_id: u64) -> Option<u32> {
        self.view(party)
            .iter()
            .position(|id| *id == fact_id)
            .map(|p| p as u32)
    }

    /// Resolves a participant's verification of a global fact id through the
    /// view indirection.
    pub fn verification_for<'a>(
        &self,
        party: Party,
        fact_id: u64,
        verifications: &'a VerificationMap,
    ) -> Option<&'a VerificationEntry> {
        let position = self.position_of(party, fact_id)?;
        verifications.iter().find(|v| v.position == position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(id: u64, source: FactSource) -> Fact {
        Fact {
            id,
            statement: format!("fact {id}"),
            source,
        }
    }

    fn mixed_facts() -> Vec<Fact> {
        vec![
            fact(1, FactSource::P1),
            fact(2, FactSource::P2),
            fact(3, FactSource::Both),
            fact(4, FactSource::P1),
            fact(5, FactSource::P2),
        ]
    }

    #[test]
    fn views_filter_to_counterparty_and_both() {
        let facts = mixed_facts();
        let views = FactViews::build(&facts);

        // P1 verifies facts from P2 or both; P2 verifies facts from P1 or both.
        assert_eq!(views.p1, vec![2, 3, 5]);
        assert_eq!(views.p2, vec![1, 3, 4]);
    }

    #[test]
    fn filtered_position_differs_from_global_position() {
        let facts = mixed_facts();
        let views = FactViews::build(&facts);

        // Fact 5 is the fifth fact globally but third in P1's view.
        assert_eq!(views.position_of(Party::P1, 5), Some(2));
        // Fact 4 is fourth globally but third in P2's view.
        assert_eq!(views.position_of(Party::P2, 4), Some(2));
        // A fact outside the view has no position.
        assert_eq!(views.position_of(Party::P1, 1), None);
    }

    #[test]
    fn verification_lookup_resolves_through_the_view() {
        let facts = mixed_facts();
        let views = FactViews::build(&facts);

        // P1's submission is indexed by their filtered positions 0..3.
        let submission = vec![
            VerificationEntry {
                position: 0,
                status: VerificationStatus::Agree,
                comment: None,
            },
            VerificationEntry {
                position: 1,
                status: VerificationStatus::Disagree,
                comment: Some("never happened".to_string()),
            },
            VerificationEntry {
                position: 2,
                status: VerificationStatus::Partially,
                comment: None,
            },
        ];

        let v3 = views
            .verification_for(Party::P1, 3, &submission)
            .expect("fact 3 is in P1's view");
        assert_eq!(v3.status, VerificationStatus::Disagree);

        let v5 = views
            .verification_for(Party::P1, 5, &submission)
            .expect("fact 5 is in P1's view");
        assert_eq!(v5.status, VerificationStatus::Partially);

        // Facts P1 never saw resolve to nothing.
        assert!(views.verification_for(Party::P1, 1, &submission).is_none());
    }
}
