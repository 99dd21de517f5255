//! Incremental participant-identity inference.
//!
//! After each narrative stage the accumulator feeds the entire prior
//! inference back to the engine so it can revise rather than restart, then
//! replaces the stored blob wholesale. This component never throws past its
//! boundary: on any failure the existing inference is returned unchanged
//! (or a fully-unknown zero-confidence shell if none exists).

use std::sync::Arc;

use concord_core::generation::{ChatMessage, GenerationClient, GenerationRequest};
use concord_core::session::{
    CounterStatement, IdentityGuess, Language, ParticipantInsight, Party, RelationshipGuess,
    Stage, StatementAnswers,
};
use serde::Deserialize;
use serde_json::Value;

use crate::config::GenerationTuning;
use crate::mediator::{format_response, format_statement};
use crate::parse::parse_json;

/// The narrative input of one stage, borrowed from the session.
#[derive(Debug, Clone, Copy)]
pub enum StageInput<'a> {
    Statement(&'a StatementAnswers),
    Response(&'a CounterStatement),
    Context { party: Party, text: &'a str },
}

impl StageInput<'_> {
    fn render(&self) -> String {
        // Inference prompts are always English; the engine reads clues, not
        // the session language.
        match self {
            StageInput::Statement(answers) => format!(
                "P1 INITIAL ANSWERS:\n{}",
                format_statement(answers, Language::En)
            ),
            StageInput::Response(response) => format!(
                "P2 RESPONSE:\n{}",
                format_response(response, Language::En)
            ),
            StageInput::Context { party, text } => {
                format!("{} ADDITIONAL CONTEXT:\n{}", label(*party), text)
            }
        }
    }
}

fn label(party: Party) -> &'static str {
    match party {
        Party::P1 => "P1",
        Party::P2 => "P2",
    }
}

/// Raw engine payload; confidences arrive as arbitrary JSON and are coerced.
#[derive(Deserialize)]
struct RawInsight {
    p1: Option<RawGuess>,
    p2: Option<RawGuess>,
    relationship: Option<RawRelationship>,
    #[serde(default)]
    clues: Vec<String>,
}

#[derive(Deserialize)]
struct RawGuess {
    #[serde(default)]
    identity: Option<String>,
    #[serde(default)]
    confidence: Value,
}

#[derive(Deserialize)]
struct RawRelationship {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    confidence: Value,
}

/// Clamps an arbitrary JSON confidence into [0, 1]; non-numeric becomes 0.
fn coerce_confidence(value: &Value) -> f32 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.unwrap_or(0.0).clamp(0.0, 1.0) as f32
}

/// Accumulates the participant-identity inference across stages.
pub struct InsightAccumulator {
    client: Arc<dyn GenerationClient>,
    tuning: GenerationTuning,
}

impl InsightAccumulator {
    pub fn new(client: Arc<dyn GenerationClient>, tuning: GenerationTuning) -> Self {
        Self { client, tuning }
    }

    /// `(existing inference, new stage input) -> updated inference`.
    pub async fn accumulate(
        &self,
        existing: Option<ParticipantInsight>,
        input: StageInput<'_>,
        stage: Stage,
    ) -> ParticipantInsight {
        let system = "You are an expert analyst identifying participant identities and \
                      relationships from mediation text.\n\
                      Your task is to deduce WHO each participant is (e.g., husband, wife, \
                      employee, manager, neighbor, friend, parent, child, etc.) and their \
                      RELATIONSHIP.\n\n\
                      IMPORTANT RULES:\n\
                      - Extract ONLY what can be reasonably inferred from the text\n\
                      - Assign confidence scores (0.0 to 1.0) for each deduction\n\
                      - If evidence is weak or contradictory, use low confidence scores\n\
                      - Consider pronouns, relationship terms, and context clues\n\
                      - Update your previous analysis if new information confirms or \
                      contradicts it";

        let existing_info = match &existing {
            Some(insight) => format!(
                "\nPREVIOUS ANALYSIS TO VALIDATE/UPDATE:\n\
                 - P1 identity: {} (confidence: {})\n\
                 - P2 identity: {} (confidence: {})\n\
                 - Relationship: {} - {} (confidence: {})\n\
                 - Previous clues: {}\n",
                insight.p1.identity,
                insight.p1.confidence,
                insight.p2.identity,
                insight.p2.confidence,
                insight.relationship.kind,
                insight.relationship.details,
                insight.relationship.confidence,
                insight.clues.join(", ")
            ),
            None => String::new(),
        };

        let user = format!(
            "{existing_info}\nNEW INPUT FROM STAGE \"{}\":\n{}\n\n\
             Analyze and return JSON with this EXACT structure:\n\
             {{\n  \"p1\": {{\"identity\": \"role/relationship term\", \"confidence\": 0.0-1.0}},\n  \
             \"p2\": {{\"identity\": \"role/relationship term\", \"confidence\": 0.0-1.0}},\n  \
             \"relationship\": {{\"type\": \"relationship type\", \"details\": \"brief description \
             of context\", \"confidence\": 0.0-1.0}},\n  \
             \"clues\": [\"list of text clues that led to these conclusions\"]\n}}",
            stage.as_str(),
            input.render()
        );

        let request = GenerationRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ])
        .with_temperature(self.tuning.analysis_temperature)
        .with_max_tokens(self.tuning.derivation_max_tokens);

        let parsed = match self.client.generate(request).await {
            Ok(text) => parse_json::<RawInsight>(&text),
            Err(err) => Err(err),
        };

        match parsed {
            Ok(raw) => {
                let guess = |raw: Option<RawGuess>| match raw {
                    Some(g) => IdentityGuess {
                        identity: g.identity.unwrap_or_else(|| "unknown".to_string()),
                        confidence: coerce_confidence(&g.confidence),
                    },
                    None => IdentityGuess::unknown(),
                };
                let relationship = match raw.relationship {
                    Some(r) => RelationshipGuess {
                        kind: r.kind.unwrap_or_else(|| "unknown".to_string()),
                        details: r.details.unwrap_or_default(),
                        confidence: coerce_confidence(&r.confidence),
                    },
                    None => RelationshipGuess::unknown(),
                };
                ParticipantInsight {
                    p1: guess(raw.p1),
                    p2: guess(raw.p2),
                    relationship,
                    clues: raw.clues,
                    last_stage: Some(stage),
                    last_updated: chrono::Utc::now().to_rfc3339(),
                }
            }
            Err(err) => {
                tracing::warn!(
                    "Insight accumulation failed at stage {}: {err}; keeping prior inference",
                    stage.as_str()
                );
                existing.unwrap_or_else(ParticipantInsight::unknown)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use concord_core::generation::GenerationError;
    use std::sync::Mutex;

    struct StubClient {
        responses: Mutex<Vec<Result<String, ()>>>,
    }

    impl StubClient {
        fn new(responses: Vec<Result<String, ()>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl GenerationClient for StubClient {
        async fn generate(&self, _request: GenerationRequest) -> Result<String, GenerationError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(GenerationError::EmptyResponse);
            }
            responses
                .remove(0)
                .map_err(|_| GenerationError::Transport("stub failure".to_string()))
        }
    }

    fn accumulator(client: Arc<dyn GenerationClient>) -> InsightAccumulator {
        InsightAccumulator::new(client, GenerationTuning::default())
    }

    fn answers() -> StatementAnswers {
        StatementAnswers {
            what_happened: "my husband sold the car".to_string(),
            what_led_to_it: "we argued about money".to_string(),
            how_it_made_them_feel: "betrayed".to_string(),
            desired_outcome: "joint decisions".to_string(),
        }
    }

    const WIFE_HUSBAND: &str = r#"{
        "p1": {"identity": "wife", "confidence": 0.8},
        "p2": {"identity": "husband", "confidence": 0.75},
        "relationship": {"type": "married couple", "details": "dispute over finances", "confidence": 0.9},
        "clues": ["'my husband'"]
    }"#;

    #[tokio::test]
    async fn parses_and_stamps_stage() {
        let acc = accumulator(StubClient::new(vec![Ok(WIFE_HUSBAND.to_string())]));
        let insight = acc
            .accumulate(None, StageInput::Statement(&answers()), Stage::InitialStatement)
            .await;
        assert_eq!(insight.p1.identity, "wife");
        assert_eq!(insight.relationship.kind, "married couple");
        assert_eq!(insight.last_stage, Some(Stage::InitialStatement));
    }

    #[tokio::test]
    async fn out_of_range_confidences_are_clamped() {
        let acc = accumulator(StubClient::new(vec![Ok(r#"{
            "p1": {"identity": "wife", "confidence": 1.7},
            "p2": {"identity": "husband", "confidence": -0.3},
            "relationship": {"type": "married couple", "details": "", "confidence": "0.5"},
            "clues": []
        }"#
            .to_string())]));
        let insight = acc
            .accumulate(None, StageInput::Statement(&answers()), Stage::InitialStatement)
            .await;
        assert_eq!(insight.p1.confidence, 1.0);
        assert_eq!(insight.p2.confidence, 0.0);
        assert_eq!(insight.relationship.confidence, 0.5);
    }

    #[tokio::test]
    async fn non_numeric_confidence_defaults_to_zero() {
        let acc = accumulator(StubClient::new(vec![Ok(r#"{
            "p1": {"identity": "tenant", "confidence": "very high"},
            "p2": {"identity": "landlord", "confidence": null},
            "relationship": {"type": "rental", "details": "", "confidence": {}},
            "clues": []
        }"#
            .to_string())]));
        let insight = acc
            .accumulate(None, StageInput::Statement(&answers()), Stage::InitialStatement)
            .await;
        assert_eq!(insight.p1.confidence, 0.0);
        assert_eq!(insight.p2.confidence, 0.0);
        assert_eq!(insight.relationship.confidence, 0.0);
    }

    #[tokio::test]
    async fn failure_returns_existing_inference_unchanged() {
        let acc = accumulator(StubClient::new(vec![
            Ok(WIFE_HUSBAND.to_string()),
            Err(()),
        ]));
        let first = acc
            .accumulate(None, StageInput::Statement(&answers()), Stage::InitialStatement)
            .await;
        let second = acc
            .accumulate(
                Some(first.clone()),
                StageInput::Context {
                    party: Party::P1,
                    text: "more detail",
                },
                Stage::ContextP1,
            )
            .await;
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn failure_without_prior_yields_unknown_shell() {
        let acc = accumulator(StubClient::new(vec![Err(())]));
        let insight = acc
            .accumulate(None, StageInput::Statement(&answers()), Stage::InitialStatement)
            .await;
        assert_eq!(insight.p1.identity, "unknown");
        assert_eq!(insight.p1.confidence, 0.0);
        assert!(!insight.has_any_identity());
    }

    #[tokio::test]
    async fn replay_with_deterministic_stub_is_deterministic() {
        let run = || async {
            let acc = accumulator(StubClient::new(vec![
                Ok(WIFE_HUSBAND.to_string()),
                Ok(WIFE_HUSBAND.to_string()),
                Ok(WIFE_HUSBAND.to_string()),
                Ok(WIFE_HUSBAND.to_string()),
            ]));
            let statement = answers();
            let response = CounterStatement::Dispute {
                text: "that is one-sided".to_string(),
            };
            let mut insight = None;
            insight = Some(
                acc.accumulate(insight, StageInput::Statement(&statement), Stage::InitialStatement)
                    .await,
            );
            insight = Some(
                acc.accumulate(insight, StageInput::Response(&response), Stage::Response)
                    .await,
            );
            insight = Some(
                acc.accumulate(
                    insight,
                    StageInput::Context {
                        party: Party::P1,
                        text: "context one",
                    },
                    Stage::ContextP1,
                )
                .await,
            );
            acc.accumulate(
                insight,
                StageInput::Context {
                    party: Party::P2,
                    text: "context two",
                },
                Stage::ContextP2,
            )
            .await
        };

        let a = run().await;
        let b = run().await;
        assert_eq!(a.p1.confidence, b.p1.confidence);
        assert_eq!(a.p2.confidence, b.p2.confidence);
        assert_eq!(a.relationship.confidence, b.relationship.confidence);
        assert_eq!(a.clues, b.clues);
    }
}
