//! Orchestrator-emitted events and the notification channel contract.
//!
//! Events are the only way the orchestrator talks back to clients. Each
//! carries the minimal payload its recipient needs; in particular the
//! fact-list event carries only the receiving participant's filtered view.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::fact::Fact;
use super::judgment::Judgment;
use super::model::{AcceptanceDecision, CounterStatement, Language, Party, VisibilityMode, Workflow};
use super::status::SessionStatus;

/// Who an event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    Party(Party),
    Both,
}

/// Events emitted by the orchestrator towards connected participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Snapshot sent to a participant that just joined or reconnected.
    JoinedSession {
        participant_number: u8,
        status: SessionStatus,
        visibility: VisibilityMode,
        workflow: Workflow,
        language: Language,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_description: Option<String>,
    },
    /// Room-wide join notice with the current membership count.
    ParticipantJoined {
        participant_number: u8,
        total_joined: usize,
        total_expected: usize,
    },
    /// Ack to participant 1: statement stored, counter-party can be invited.
    StatementReceived { counterparty_token: String },
    /// The summary and acceptance briefing are available for participant 2.
    SummaryReady { summary: String, briefing: String },
    /// Participant 2 accepted or rejected the negotiation.
    DecisionRecorded { decision: AcceptanceDecision },
    /// Ack to participant 2: response stored.
    ResponseReceived,
    /// Dispute points for participant 1. The raw response rides along only
    /// in open visibility.
    DisputePointsReady {
        dispute_points: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<CounterStatement>,
        response_summary: String,
    },
    /// Ack: a context submission was stored.
    ContextReceived { participant_number: u8 },
    /// Summary of the counter-party's context.
    ContextSummaryReady { summary: String },
    /// The receiving participant's filtered fact list is ready to verify.
    FactListReady { facts: Vec<Fact> },
    /// Ack: a fact-verification submission was stored.
    VerificationRecorded,
    /// The submitter must wait for the counter-party's verification.
    AwaitingCounterpartyVerification,
    /// The terminal judgment is available.
    JudgmentReady { judgment: Judgment },
    /// Ack: a notification email address was stored.
    EmailUpdated,
    /// Generic failure signal; never carries raw engine errors.
    Error { message: String },
}

/// Real-time delivery channel for orchestrator events.
///
/// Delivery is fire-and-forget: implementations log failures, and a failed
/// delivery never rolls back persisted state — a reconnecting participant
/// reconstructs current state from the session store, not from replayed
/// events. The channel owns the connection membership table; the
/// orchestrator queries it only to report join counts, never as
/// authoritative session state.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, session_id: &str, scope: EventScope, event: SessionEvent);

    /// Parties currently connected to the session's room.
    async fn membership(&self, session_id: &str) -> Vec<Party>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = SessionEvent::DecisionRecorded {
            decision: AcceptanceDecision::Rejected,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "decision_recorded");
        assert_eq!(json["decision"], "rejected");
    }

    #[test]
    fn fact_list_event_carries_only_the_given_facts() {
        let event = SessionEvent::FactListReady {
            facts: vec![Fact {
                id: 7,
                statement: "the invoice was paid late".to_string(),
                source: crate::session::fact::FactSource::P2,
            }],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["facts"].as_array().unwrap().len(), 1);
        assert_eq!(json["facts"][0]["id"], 7);
    }
}
