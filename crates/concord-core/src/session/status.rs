//! Protocol status enumeration and transition graph.

use serde::{Deserialize, Serialize};

/// The stage the negotiation protocol is currently in.
///
/// Transitions are monotonic along the protocol graph; `rejected` and
/// `completed` are terminal and accept no further actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    WaitingP2Join,
    WaitingP2Acceptance,
    P2Answering,
    WaitingP1Context,
    WaitingP2Context,
    FactVerification,
    GeneratingJudgment,
    Completed,
    Rejected,
}

impl SessionStatus {
    /// The set of statuses directly reachable from this one.
    ///
    /// The branch at `waiting_p2_context` depends on the workflow: the
    /// simple path goes straight to judgment, the advanced path inserts the
    /// fact-verification barrier. Both edges are part of the graph.
    pub fn successors(&self) -> &'static [SessionStatus] {
        use SessionStatus::*;
        match self {
            WaitingP2Join => &[WaitingP2Acceptance],
            WaitingP2Acceptance => &[P2Answering, Rejected],
            P2Answering => &[WaitingP1Context],
            WaitingP1Context => &[WaitingP2Context],
            WaitingP2Context => &[FactVerification, GeneratingJudgment],
            FactVerification => &[GeneratingJudgment],
            GeneratingJudgment => &[Completed],
            Completed | Rejected => &[],
        }
    }

    /// True when this status permits a transition to `next`.
    pub fn allows(&self, next: SessionStatus) -> bool {
        self.successors().contains(&next)
    }

    /// Terminal statuses accept read-only queries only.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Rejected)
    }

    /// Wire name, as carried in events and persisted sessions.
    pub fn as_str(&self) -> &'static str {
        use SessionStatus::*;
        match self {
            WaitingP2Join => "waiting_p2_join",
            WaitingP2Acceptance => "waiting_p2_acceptance",
            P2Answering => "p2_answering",
            WaitingP1Context => "waiting_p1_context",
            WaitingP2Context => "waiting_p2_context",
            FactVerification => "fact_verification",
            GeneratingJudgment => "generating_judgment",
            Completed => "completed",
            Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
