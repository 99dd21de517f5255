//! Session domain model.
//!
//! One `Session` is the complete durable record of a two-party negotiation:
//! configuration, both participants, every narrative submission, every
//! derived artifact, and the terminal judgment. It is mutated exclusively by
//! the orchestrator in response to validated actions and never deleted by
//! the core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConcordError, Result};

use super::barrier::VerificationSlots;
use super::fact::{Fact, FactViews};
use super::insight::ParticipantInsight;
use super::judgment::Judgment;
use super::status::SessionStatus;

/// One of the exactly two roles in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    P1,
    P2,
}

impl Party {
    pub fn other(&self) -> Party {
        match self {
            Party::P1 => Party::P2,
            Party::P2 => Party::P1,
        }
    }

    /// Participant number as exposed on the wire (1 or 2).
    pub fn number(&self) -> u8 {
        match self {
            Party::P1 => 1,
            Party::P2 => 2,
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "participant {}", self.number())
    }
}

/// Whether the counter-party sees raw submissions or only derived summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityMode {
    Open,
    Blind,
}

/// Protocol variant. `Advanced` inserts the fact-verification barrier before
/// judgment; `Dynamic` is accepted for compatibility and follows the simple
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workflow {
    Simple,
    Advanced,
    Dynamic,
}

/// Session language; drives prompt wording and fallback strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Pt,
}

/// The narrative-bearing stages, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    InitialStatement,
    Response,
    ContextP1,
    ContextP2,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::InitialStatement => "initial_statement",
            Stage::Response => "response",
            Stage::ContextP1 => "context_p1",
            Stage::ContextP2 => "context_p2",
        }
    }
}

/// The four structured answers of a narrative statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementAnswers {
    pub what_happened: String,
    pub what_led_to_it: String,
    pub how_it_made_them_feel: String,
    pub desired_outcome: String,
}

/// Participant 2's response: either the same structured answers or a single
/// free-text dispute of participant 1's account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CounterStatement {
    Structured(StatementAnswers),
    Dispute { text: String },
}

impl CounterStatement {
    pub fn desired_outcome(&self) -> &str {
        match self {
            CounterStatement::Structured(answers) => &answers.desired_outcome,
            CounterStatement::Dispute { .. } => "",
        }
    }
}

/// Participant 2's decision on whether to take part at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptanceDecision {
    Accepted,
    Rejected,
}

/// One of the two fixed participants of a session.
///
/// Roles are assigned at creation and never reassigned: participant 1 opens
/// the negotiation, participant 2 responds to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub party: Party,
    pub is_initiator: bool,
    /// Unique join token; possession of the token is the join credential.
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<String>,
}

impl Participant {
    fn new(party: Party) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            party,
            is_initiator: party == Party::P1,
            token: Uuid::new_v4().to_string(),
            email: None,
            joined_at: None,
        }
    }
}

/// The unit of negotiation.
///
/// Plain values are kept ahead of nested structures so the record
/// serializes cleanly to TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    /// Unused by the live protocol; retained for compatibility with stored
    /// sessions from the superseded round-based flow.
    #[serde(default)]
    pub current_round: u32,
    pub visibility: VisibilityMode,
    pub workflow: Workflow,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_description: Option<String>,
    pub created_at: String,
    pub updated_at: String,

    // Accumulated artifacts, filled as the protocol progresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance: Option<AcceptanceDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_for_p2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub briefing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispute_points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_p1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_p2: Option<String>,
    pub participants: Vec<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_statement: Option<StatementAnswers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<CounterStatement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facts: Option<Vec<Fact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_views: Option<FactViews>,
    #[serde(default)]
    pub verifications: VerificationSlots,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight: Option<ParticipantInsight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<Judgment>,
}

/// Parameters for opening a new session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub visibility: VisibilityMode,
    pub workflow: Workflow,
    pub language: Language,
    pub title: Option<String>,
    pub initial_description: Option<String>,
}

impl Session {
    /// Opens a new session with both participants and their join tokens.
    pub fn create(config: SessionConfig) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            status: SessionStatus::WaitingP2Join,
            current_round: 0,
            visibility: config.visibility,
            workflow: config.workflow,
            language: config.language,
            title: config.title,
            initial_description: config.initial_description,
            created_at: now.clone(),
            updated_at: now,
            acceptance: None,
            summary_for_p2: None,
            briefing: None,
            dispute_points: None,
            context_p1: None,
            context_p2: None,
            participants: vec![Participant::new(Party::P1), Participant::new(Party::P2)],
            initial_statement: None,
            response: None,
            facts: None,
            fact_views: None,
            verifications: VerificationSlots::default(),
            insight: None,
            judgment: None,
        }
    }

    pub fn participant(&self, party: Party) -> &Participant {
        self.participants
            .iter()
            .find(|p| p.party == party)
            .expect("session always has both participants")
    }

    pub fn participant_mut(&mut self, party: Party) -> &mut Participant {
        self.participants
            .iter_mut()
            .find(|p| p.party == party)
            .expect("session always has both participants")
    }

    pub fn participant_by_id(&self, participant_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == participant_id)
    }

    pub fn participant_by_token(&self, token: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.token == token)
    }

    /// Resolves the acting participant, requiring a specific role when the
    /// transition is role-bound.
    pub fn require_actor(&self, participant_id: &str, expected: Option<Party>) -> Result<Party> {
        let participant = self.participant_by_id(participant_id).ok_or_else(|| {
            ConcordError::validation(format!(
                "participant '{participant_id}' does not belong to session '{}'",
                self.id
            ))
        })?;
        if let Some(expected) = expected {
            if participant.party != expected {
                return Err(ConcordError::validation(format!(
                    "action reserved for {expected}, submitted by {}",
                    participant.party
                )));
            }
        }
        Ok(participant.party)
    }

    /// Asserts the action's precondition against the current status.
    pub fn require_status(&self, expected: SessionStatus) -> Result<()> {
        if self.status != expected {
            return Err(ConcordError::validation(format!(
                "action requires status '{expected}' but session '{}' is '{}'",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Moves to the next status, refusing any edge outside the protocol
    /// graph.
    pub fn advance(&mut self, next: SessionStatus) -> Result<()> {
        if !self.status.allows(next) {
            return Err(ConcordError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Stamps the modification time.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Raw desired outcomes, used verbatim by the sanitization fallback.
    pub fn desired_outcomes(&self) -> (String, String) {
        let p1 = self
            .initial_statement
            .as_ref()
            .map(|s| s.desired_outcome.clone())
            .unwrap_or_default();
        let p2 = self
            .response
            .as_ref()
            .map(|r| r.desired_outcome().to_string())
            .unwrap_or_default();
        (p1, p2)
    }
}
