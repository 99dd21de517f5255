//! Session domain module.
//!
//! This module contains all session-related domain models, the protocol
//! status graph, the fact-verification barrier, and the persistence and
//! notification contracts.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`, `Participant`)
//! - `status`: Protocol status enumeration and transition graph
//! - `fact`: Extracted facts, filtered views, verification entries
//! - `barrier`: The two-slot fact-verification completion barrier
//! - `insight`: Accumulated participant-identity inference
//! - `judgment`: Verdict scale, sanitized record, terminal judgment
//! - `event`: Orchestrator event contract and `Notifier` trait
//! - `repository`: Repository trait for session persistence

mod barrier;
mod event;
pub mod fact;
mod insight;
mod judgment;
mod model;
mod repository;
mod status;

// Re-export public API
pub use barrier::{BarrierState, VerificationSlots};
pub use event::{EventScope, Notifier, SessionEvent};
pub use fact::{
    Fact, FactSource, FactViews, VerificationEntry, VerificationMap, VerificationStatus,
};
pub use insight::{IdentityGuess, ParticipantInsight, RelationshipGuess};
pub use judgment::{DisputedFact, Judgment, SanitizedRecord, Verdict};
pub use model::{
    AcceptanceDecision, CounterStatement, Language, Participant, Party, Session, SessionConfig,
    Stage, StatementAnswers, VisibilityMode, Workflow,
};
pub use repository::SessionRepository;
pub use status::SessionStatus;
