//! Accumulated inference about who the participants are.
//!
//! The insight blob is replaced wholesale after each narrative stage; merging
//! prior and new evidence is the accumulator's job, never the caller's.

use serde::{Deserialize, Serialize};

use super::Stage;

/// An identity guess for one participant with a confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityGuess {
    pub identity: String,
    pub confidence: f32,
}

impl IdentityGuess {
    pub fn unknown() -> Self {
        Self {
            identity: "unknown".to_string(),
            confidence: 0.0,
        }
    }
}

/// A guess at the relationship between the two participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipGuess {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub details: String,
    pub confidence: f32,
}

impl RelationshipGuess {
    pub fn unknown() -> Self {
        Self {
            kind: "unknown".to_string(),
            details: String::new(),
            confidence: 0.0,
        }
    }
}

/// Confidence-scored inference of participant identities and relationship,
/// revised after every narrative stage.
///
/// Plain values precede the nested guesses so the blob serializes cleanly
/// to TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInsight {
    #[serde(default)]
    pub clues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_stage: Option<Stage>,
    pub last_updated: String,
    pub p1: IdentityGuess,
    pub p2: IdentityGuess,
    pub relationship: RelationshipGuess,
}

impl ParticipantInsight {
    /// Fully-unknown zero-confidence shell, used when no inference exists
    /// yet and the accumulator cannot produce one.
    pub fn unknown() -> Self {
        Self {
            clues: Vec::new(),
            last_stage: None,
            last_updated: chrono::Utc::now().to_rfc3339(),
            p1: IdentityGuess::unknown(),
            p2: IdentityGuess::unknown(),
            relationship: RelationshipGuess::unknown(),
        }
    }

    pub fn has_any_identity(&self) -> bool {
        self.p1.identity != "unknown" || self.p2.identity != "unknown"
    }
}
