//! Terminal judgment artifact and the sanitized record that feeds it.

use serde::{Deserialize, Serialize};

use super::Language;

/// The closed six-point verdict scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    P1Right,
    P1MoreRight,
    BothRight,
    NeitherRight,
    P2MoreRight,
    P2Right,
}

impl Verdict {
    /// Parses a wire label. Anything outside the closed scale is rejected so
    /// callers can coerce to `NeitherRight` and log the anomaly.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "p1_right" => Some(Self::P1Right),
            "p1_more_right" => Some(Self::P1MoreRight),
            "both_right" => Some(Self::BothRight),
            "neither_right" => Some(Self::NeitherRight),
            "p2_more_right" => Some(Self::P2MoreRight),
            "p2_right" => Some(Self::P2Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P1Right => "p1_right",
            Self::P1MoreRight => "p1_more_right",
            Self::BothRight => "both_right",
            Self::NeitherRight => "neither_right",
            Self::P2MoreRight => "p2_more_right",
            Self::P2Right => "p2_right",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One disputed topic with each side's version stated neutrally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisputedFact {
    pub topic: String,
    pub p1_version: String,
    pub p2_version: String,
}

/// Tone-free factual record distilled from the raw narrative.
///
/// The verdict phase only ever sees this record; assertiveness and
/// politeness cues are stripped here so they cannot sway the outcome.
///
/// Disputed facts come last so the record serializes cleanly to TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SanitizedRecord {
    #[serde(default)]
    pub p1_factual_claims: Vec<String>,
    #[serde(default)]
    pub p2_factual_claims: Vec<String>,
    #[serde(default)]
    pub agreed_facts: Vec<String>,
    #[serde(default)]
    pub documented_evidence: Vec<String>,
    #[serde(default)]
    pub p1_desired_outcome: String,
    #[serde(default)]
    pub p2_desired_outcome: String,
    #[serde(default)]
    pub disputed_facts: Vec<DisputedFact>,
}

impl SanitizedRecord {
    /// Empty-but-well-typed fallback used when sanitization fails: all lists
    /// empty, desired outcomes taken verbatim from the raw input.
    pub fn empty_with_outcomes(p1_outcome: String, p2_outcome: String) -> Self {
        Self {
            p1_desired_outcome: p1_outcome,
            p2_desired_outcome: p2_outcome,
            ..Self::default()
        }
    }
}

/// The terminal artifact of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub verdict: Verdict,
    pub p1_correct_behaviors: Vec<String>,
    pub p1_wrong_behaviors: Vec<String>,
    pub p2_correct_behaviors: Vec<String>,
    pub p2_wrong_behaviors: Vec<String>,
    pub justification: String,
    /// Retained for traceability of what the verdict was based on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitized_record: Option<SanitizedRecord>,
}

impl Judgment {
    /// Neutral "unable to assess" judgment, fully populated in the session
    /// language.
    pub fn unable_to_assess(language: Language) -> Self {
        let (unable, justification) = match language {
            Language::Pt => (
                "Não foi possível avaliar",
                "Não foi possível gerar julgamento devido a erro de processamento.",
            ),
            Language::En => (
                "Unable to assess",
                "Unable to generate judgment due to a processing error.",
            ),
        };
        Self {
            verdict: Verdict::NeitherRight,
            p1_correct_behaviors: vec![unable.to_string()],
            p1_wrong_behaviors: vec![unable.to_string()],
            p2_correct_behaviors: vec![unable.to_string()],
            p2_wrong_behaviors: vec![unable.to_string()],
            justification: justification.to_string(),
            sanitized_record: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for label in [
            "p1_right",
            "p1_more_right",
            "both_right",
            "neither_right",
            "p2_more_right",
            "p2_right",
        ] {
            let verdict = Verdict::from_label(label).unwrap();
            assert_eq!(verdict.as_str(), label);
        }
    }

    #[test]
    fn unknown_labels_are_rejected() {
        assert!(Verdict::from_label("p1_wins").is_none());
        assert!(Verdict::from_label("").is_none());
        assert!(Verdict::from_label("NEITHER_RIGHT").is_none());
    }
}
