//! Two-phase judgment: sanitize, then decide.
//!
//! Phase 1 turns the raw narrative into a tone-free factual record so that
//! assertiveness and politeness cues cannot sway the outcome. Phase 2 sees
//! only that record (plus the accumulated participant insight for background
//! understanding) and returns one verdict from the closed six-point scale.
//! The ordering and the "verdict phase never sees raw narrative" invariant
//! are deliberate bias-reduction measures, not optimizations.

use std::sync::Arc;

use concord_core::generation::{
    ChatMessage, GenerationClient, GenerationError, GenerationRequest,
};
use concord_core::session::{
    Judgment, Language, ParticipantInsight, SanitizedRecord, Session, Verdict,
};
use serde::Deserialize;

use crate::config::GenerationTuning;
use crate::mediator::{AttachmentBundle, format_response, format_statement};
use crate::parse::parse_json;

#[derive(Deserialize)]
struct RawJudgment {
    verdict: String,
    #[serde(default)]
    p1_correct_behaviors: Vec<String>,
    #[serde(default)]
    p1_wrong_behaviors: Vec<String>,
    #[serde(default)]
    p2_correct_behaviors: Vec<String>,
    #[serde(default)]
    p2_wrong_behaviors: Vec<String>,
    #[serde(default)]
    justification: String,
}

/// The sanitize-then-decide judgment pipeline.
pub struct JudgmentPipeline {
    client: Arc<dyn GenerationClient>,
    tuning: GenerationTuning,
}

impl JudgmentPipeline {
    pub fn new(client: Arc<dyn GenerationClient>, tuning: GenerationTuning) -> Self {
        Self { client, tuning }
    }

    /// Runs both phases and returns the terminal judgment.
    ///
    /// Sanitization failures degrade to an empty-but-typed record; a verdict
    /// generation failure is an error the orchestrator surfaces as a
    /// retryable condition.
    pub async fn generate(
        &self,
        session: &Session,
        attachments: &AttachmentBundle,
    ) -> Result<Judgment, GenerationError> {
        let record = self.sanitize(session, attachments).await;
        let mut judgment = self
            .decide(&record, session.insight.as_ref(), session.language)
            .await?;
        judgment.sanitized_record = Some(record);
        Ok(judgment)
    }

    /// Phase 1: raw narrative -> tone-free factual record.
    pub async fn sanitize(
        &self,
        session: &Session,
        attachments: &AttachmentBundle,
    ) -> SanitizedRecord {
        let language = session.language;
        let system = format!(
            "You are a forensic analyst extracting ONLY objective, verifiable facts from \
             dispute narratives. {}\n\n\
             Your task: Remove ALL subjective interpretations, emotional language, and tone \
             markers. Preserve ONLY:\n\
             - Verifiable claims (dates, amounts, actions taken)\n\
             - Documented evidence references\n\
             - Factual statements both parties agree on\n\
             - Conflicting factual claims (state both versions neutrally)\n\n\
             STRIP OUT COMPLETELY:\n\
             - \"Feels like\", \"seems\", \"dismissive\", \"respectful\", etc.\n\
             - Judgments about attitude or tone\n\
             - Inferred intentions (\"trying to control\", \"doesn't care\")\n\
             - Emotional framing\n\
             - Assertive or aggressive language\n\
             - Expressions of frustration or anger\n\
             - Personality characterizations\n\n\
             NEUTRALIZE phrases like:\n\
             - \"I should decide\" -> \"P1 believes they should have decision-making authority\"\n\
             - \"She always ignores\" -> \"P1 claims their opinions are not considered\"\n\
             - \"He is controlling\" -> \"P2 claims P1 makes unilateral decisions\"\n\n\
             Output: Pure factual record with NO editorial commentary.",
            language_rule(language)
        );

        let statement = session
            .initial_statement
            .as_ref()
            .map(|s| format_statement(s, language))
            .unwrap_or_default();
        let response = session
            .response
            .as_ref()
            .map(|r| format_response(r, language))
            .unwrap_or_default();
        let p1_context = session
            .context_p1
            .as_deref()
            .map(|c| format!("\n- Additional context: {c}"))
            .unwrap_or_default();
        let p2_context = session
            .context_p2
            .as_deref()
            .map(|c| format!("\n- Additional context: {c}"))
            .unwrap_or_default();

        let user = format!(
            "Analyze the following perspectives and create a SANITIZED FACTUAL RECORD.\n\n\
             PARTICIPANT 1 Answers:\n{statement}{p1_context}\n\n\
             PARTICIPANT 2 Response:\n{response}{p2_context}{}{}\n\n\
             Return JSON with this structure:\n\
             {{\n  \"p1_factual_claims\": [\"neutral factual statement\"],\n  \
             \"p2_factual_claims\": [\"neutral factual statement\"],\n  \
             \"agreed_facts\": [\"facts both parties agree on\"],\n  \
             \"disputed_facts\": [\n    {{\"topic\": \"topic\", \"p1_version\": \"P1's version\", \
             \"p2_version\": \"P2's version\"}}\n  ],\n  \
             \"documented_evidence\": [\"evidence from attachments\"],\n  \
             \"p1_desired_outcome\": \"neutralized desired outcome\",\n  \
             \"p2_desired_outcome\": \"neutralized desired outcome\"\n}}",
            verification_section(session),
            attachments.text
        );

        let request = GenerationRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ])
        .with_temperature(self.tuning.analysis_temperature)
        .with_max_tokens(self.tuning.judgment_max_tokens)
        .with_images(attachments.images.clone());

        let parsed = match self.client.generate(request).await {
            Ok(text) => parse_json::<SanitizedRecord>(&text),
            Err(err) => Err(err),
        };

        match parsed {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!("Sanitization failed, substituting empty factual record: {err}");
                let (p1_outcome, p2_outcome) = session.desired_outcomes();
                SanitizedRecord::empty_with_outcomes(p1_outcome, p2_outcome)
            }
        }
    }

    /// Phase 2: sanitized record -> verdict. Never sees the raw narrative.
    pub async fn decide(
        &self,
        record: &SanitizedRecord,
        insight: Option<&ParticipantInsight>,
        language: Language,
    ) -> Result<Judgment, GenerationError> {
        let system = format!(
            "You are an expert mediator providing a decisive judgment. {}\n\n\
             CRITICAL RULE: Base your verdict ONLY on the SANITIZED FACTUAL RECORD provided.\n\
             DO NOT CONSIDER:\n\
             - How participants expressed themselves\n\
             - Tone, confidence, or assertiveness\n\
             - Emotional appeals or diplomatic language\n\
             - Whether someone seemed \"rude\" or \"polite\"\n\n\
             EVALUATE ONLY:\n\
             - Logical consistency of factual claims\n\
             - Evidence supporting each position\n\
             - Legal/ethical obligations (contracts, vows, responsibilities)\n\
             - Fairness of outcomes based on objective circumstances\n\n\
             IMPORTANT: A participant who is factually correct but was assertive/direct should \
             NOT be penalized for their tone. Judge the FACTS, not the presentation.\n\n\
             You must choose ONE of these six verdicts:\n\
             1. \"p1_right\" - Participant 1 is right\n\
             2. \"p1_more_right\" - Participant 1 is more right than Participant 2\n\
             3. \"both_right\" - Both participants are right\n\
             4. \"neither_right\" - Neither participant is right\n\
             5. \"p2_more_right\" - Participant 2 is more right than Participant 1\n\
             6. \"p2_right\" - Participant 2 is right\n\n\
             Do NOT force a conciliatory tone if one party is clearly at fault. Be decisive and \
             evidence-based.",
            language_rule(language)
        );

        let user = format!(
            "{}Analyze this SANITIZED FACTUAL RECORD (tone and emotions already removed) and \
             provide your judgment based ONLY on the facts:\n\n{}\n\n\
             REMINDER: Do not penalize any participant for seeming assertive or confident. \
             Judge only factual correctness and ethical/legal obligations.\n\n\
             Return JSON with this EXACT structure:\n\
             {{\n  \"verdict\": \"one of: p1_right, p1_more_right, both_right, neither_right, \
             p2_more_right, p2_right\",\n  \
             \"p1_correct_behaviors\": [\"factually correct behavior\"],\n  \
             \"p1_wrong_behaviors\": [\"factually incorrect behavior\"],\n  \
             \"p2_correct_behaviors\": [\"factually correct behavior\"],\n  \
             \"p2_wrong_behaviors\": [\"factually incorrect behavior\"],\n  \
             \"justification\": \"2-3 paragraph comprehensive explanation of your verdict, \
             focusing on FACTS and OBLIGATIONS, not tone or presentation\"\n}}",
            insight_section(insight),
            format_record(record, language)
        );

        let request = GenerationRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ])
        .with_temperature(self.tuning.judgment_temperature)
        .with_max_tokens(self.tuning.judgment_max_tokens);

        let text = self.client.generate(request).await?;
        let raw: RawJudgment = parse_json(&text)?;

        let verdict = match Verdict::from_label(&raw.verdict) {
            Some(verdict) => verdict,
            None => {
                tracing::warn!(
                    "Invalid verdict received: '{}', defaulting to neither_right",
                    raw.verdict
                );
                Verdict::NeitherRight
            }
        };

        Ok(Judgment {
            verdict,
            p1_correct_behaviors: raw.p1_correct_behaviors,
            p1_wrong_behaviors: raw.p1_wrong_behaviors,
            p2_correct_behaviors: raw.p2_correct_behaviors,
            p2_wrong_behaviors: raw.p2_wrong_behaviors,
            justification: raw.justification,
            sanitized_record: None,
        })
    }
}

fn language_rule(language: Language) -> &'static str {
    match language {
        Language::Pt => {
            "RESPONDA INTEIRAMENTE EM PORTUGUES (exceto os codigos de veredicto que devem \
             permanecer em ingles)."
        }
        Language::En => "RESPOND ENTIRELY IN ENGLISH.",
    }
}

/// Fact list plus both participants' verification entries, resolved through
/// the per-participant views so each comment lands on the right global fact.
fn verification_section(session: &Session) -> String {
    let (Some(facts), Some(views)) = (session.facts.as_ref(), session.fact_views.as_ref()) else {
        return String::new();
    };
    if facts.is_empty() {
        return String::new();
    }

    let mut section = String::from(
        "\n\nFACT VERIFICATION RESULTS (each participant verified facts claimed by the other):",
    );
    for (index, fact) in facts.iter().enumerate() {
        let claimed_by = match fact.source {
            concord_core::session::FactSource::P1 => "P1",
            concord_core::session::FactSource::P2 => "P2",
            concord_core::session::FactSource::Both => "both",
        };
        section.push_str(&format!(
            "\n{}. \"{}\" (claimed by: {})",
            index + 1,
            fact.statement,
            claimed_by
        ));

        for party in [
            concord_core::session::Party::P1,
            concord_core::session::Party::P2,
        ] {
            let Some(submission) = session.verifications.slot(party) else {
                continue;
            };
            if let Some(entry) = views.verification_for(party, fact.id, submission) {
                let comment = entry
                    .comment
                    .as_deref()
                    .map(|c| format!(" - \"{c}\""))
                    .unwrap_or_default();
                section.push_str(&format!(
                    "\n   - {} verification: {:?}{}",
                    match party {
                        concord_core::session::Party::P1 => "P1",
                        concord_core::session::Party::P2 => "P2",
                    },
                    entry.status,
                    comment
                ));
            }
        }
    }
    section.push_str(
        "\n\nIMPORTANT: The verification comments above contain CRUCIAL information that must \
         be considered in the judgment. They represent each participant's objections and \
         clarifications about the alleged facts.",
    );
    section
}

/// Internal participant-context section for the verdict prompt. Low-confidence
/// guesses are marked with a trailing question mark.
fn insight_section(insight: Option<&ParticipantInsight>) -> String {
    let Some(insight) = insight else {
        return String::new();
    };
    if !insight.has_any_identity() {
        return String::new();
    }

    let identity = |guess: &concord_core::session::IdentityGuess, label: &str| {
        if guess.identity == "unknown" {
            return format!("{label}: Unknown");
        }
        let marker = if guess.confidence < 0.5 { "?" } else { "" };
        format!(
            "{label}: {}{marker} ({}%)",
            guess.identity,
            (guess.confidence * 100.0).round() as u32
        )
    };

    let relationship = if insight.relationship.kind == "unknown" {
        "Relationship: Unknown".to_string()
    } else {
        let marker = if insight.relationship.confidence < 0.5 {
            "?"
        } else {
            ""
        };
        let details = if insight.relationship.details.is_empty() {
            String::new()
        } else {
            format!(" - {}", insight.relationship.details)
        };
        format!(
            "Relationship: {}{marker}{details} ({}%)",
            insight.relationship.kind,
            (insight.relationship.confidence * 100.0).round() as u32
        )
    };

    format!(
        "[INTERNAL CONTEXT - Use this to better understand the parties involved]\n{}\n{}\n{}\nKey clues: {}\n\n",
        identity(&insight.p1, "P1"),
        identity(&insight.p2, "P2"),
        relationship,
        insight.clues.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
    )
}

fn format_record(record: &SanitizedRecord, language: Language) -> String {
    let pt = language == Language::Pt;
    let mut formatted = String::new();

    let push_list = |formatted: &mut String, header: &str, items: &[String]| {
        if items.is_empty() {
            return;
        }
        formatted.push_str(&format!("\n{header}:\n"));
        for (i, item) in items.iter().enumerate() {
            formatted.push_str(&format!("{}. {}\n", i + 1, item));
        }
    };

    push_list(
        &mut formatted,
        if pt { "AFIRMACOES FACTUAIS DE P1" } else { "P1 FACTUAL CLAIMS" },
        &record.p1_factual_claims,
    );
    push_list(
        &mut formatted,
        if pt { "AFIRMACOES FACTUAIS DE P2" } else { "P2 FACTUAL CLAIMS" },
        &record.p2_factual_claims,
    );
    push_list(
        &mut formatted,
        if pt { "FATOS ACORDADOS POR AMBOS" } else { "FACTS AGREED BY BOTH" },
        &record.agreed_facts,
    );

    if !record.disputed_facts.is_empty() {
        formatted.push_str(if pt {
            "\nFATOS DISPUTADOS:\n"
        } else {
            "\nDISPUTED FACTS:\n"
        });
        for (i, fact) in record.disputed_facts.iter().enumerate() {
            formatted.push_str(&format!(
                "{}. {}\n   - P1: {}\n   - P2: {}\n",
                i + 1,
                fact.topic,
                fact.p1_version,
                fact.p2_version
            ));
        }
    }

    push_list(
        &mut formatted,
        if pt { "EVIDENCIA DOCUMENTADA" } else { "DOCUMENTED EVIDENCE" },
        &record.documented_evidence,
    );

    let not_specified = if pt { "Nao especificado" } else { "Not specified" };
    let outcome = |value: &str| {
        if value.is_empty() {
            not_specified.to_string()
        } else {
            value.to_string()
        }
    };
    formatted.push_str(&format!(
        "\n{}: {}\n{}: {}\n",
        if pt { "RESULTADO DESEJADO POR P1" } else { "P1 DESIRED OUTCOME" },
        outcome(&record.p1_desired_outcome),
        if pt { "RESULTADO DESEJADO POR P2" } else { "P2 DESIRED OUTCOME" },
        outcome(&record.p2_desired_outcome),
    ));

    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use concord_core::session::{
        CounterStatement, Session, SessionConfig, StatementAnswers, VisibilityMode, Workflow,
    };
    use std::sync::Mutex;

    /// Stub that records every request and replays scripted responses.
    struct RecordingClient {
        responses: Mutex<Vec<Result<String, ()>>>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl RecordingClient {
        fn new(responses: Vec<Result<String, ()>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_texts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| {
                    r.messages
                        .iter()
                        .map(|m| m.content.clone())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .collect()
        }
    }

    #[async_trait]
    impl GenerationClient for RecordingClient {
        async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
            self.requests.lock().unwrap().push(request);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(GenerationError::EmptyResponse);
            }
            responses
                .remove(0)
                .map_err(|_| GenerationError::Transport("stub failure".to_string()))
        }
    }

    const SANITIZED: &str = r#"{
        "p1_factual_claims": ["P1 states the fence was moved in March"],
        "p2_factual_claims": ["P2 states the fence follows the 2019 survey"],
        "agreed_facts": ["a fence separates the two lots"],
        "disputed_facts": [{"topic": "fence position", "p1_version": "moved", "p2_version": "unchanged"}],
        "documented_evidence": [],
        "p1_desired_outcome": "restore the prior position",
        "p2_desired_outcome": "keep the current position"
    }"#;

    const JUDGMENT: &str = r#"{
        "verdict": "p2_more_right",
        "p1_correct_behaviors": ["raised the issue directly"],
        "p1_wrong_behaviors": ["relied on an outdated survey"],
        "p2_correct_behaviors": ["commissioned a new survey"],
        "p2_wrong_behaviors": [],
        "justification": "The 2019 survey is the controlling document."
    }"#;

    fn session() -> Session {
        let mut session = Session::create(SessionConfig {
            visibility: VisibilityMode::Open,
            workflow: Workflow::Simple,
            language: Language::En,
            title: None,
            initial_description: None,
        });
        session.initial_statement = Some(StatementAnswers {
            what_happened: "he moved our shared fence while I was away".to_string(),
            what_led_to_it: "a disagreement over the survey".to_string(),
            how_it_made_them_feel: "furious and ignored".to_string(),
            desired_outcome: "restore the prior position".to_string(),
        });
        session.response = Some(CounterStatement::Structured(StatementAnswers {
            what_happened: "the fence follows the registered survey".to_string(),
            what_led_to_it: "the old fence encroached on my lot".to_string(),
            how_it_made_them_feel: "accused unfairly".to_string(),
            desired_outcome: "keep the current position".to_string(),
        }));
        session
    }

    fn pipeline(client: Arc<dyn GenerationClient>) -> JudgmentPipeline {
        JudgmentPipeline::new(client, GenerationTuning::default())
    }

    #[tokio::test]
    async fn happy_path_attaches_sanitized_record() {
        let client = RecordingClient::new(vec![Ok(SANITIZED.to_string()), Ok(JUDGMENT.to_string())]);
        let judgment = pipeline(client.clone()).generate(&session(), &AttachmentBundle::default())
            .await
            .unwrap();

        assert_eq!(judgment.verdict, Verdict::P2MoreRight);
        let record = judgment.sanitized_record.unwrap();
        assert_eq!(record.disputed_facts.len(), 1);
    }

    #[tokio::test]
    async fn verdict_phase_never_sees_raw_narrative() {
        let client = RecordingClient::new(vec![Ok(SANITIZED.to_string()), Ok(JUDGMENT.to_string())]);
        pipeline(client.clone())
            .generate(&session(), &AttachmentBundle::default())
            .await
            .unwrap();

        let texts = client.request_texts();
        assert_eq!(texts.len(), 2);
        // The raw narrative goes into sanitization only.
        assert!(texts[0].contains("while I was away"));
        assert!(texts[0].contains("furious and ignored"));
        assert!(!texts[1].contains("while I was away"));
        assert!(!texts[1].contains("furious and ignored"));
        // The verdict phase sees the sanitized claims instead.
        assert!(texts[1].contains("P1 states the fence was moved in March"));
    }

    #[tokio::test]
    async fn invalid_verdict_is_coerced_to_neither_right() {
        let bad_judgment = r#"{
            "verdict": "p1_wins_everything",
            "p1_correct_behaviors": [],
            "p1_wrong_behaviors": [],
            "p2_correct_behaviors": [],
            "p2_wrong_behaviors": [],
            "justification": "confused"
        }"#;
        let client =
            RecordingClient::new(vec![Ok(SANITIZED.to_string()), Ok(bad_judgment.to_string())]);
        let judgment = pipeline(client)
            .generate(&session(), &AttachmentBundle::default())
            .await
            .unwrap();
        assert_eq!(judgment.verdict, Verdict::NeitherRight);
    }

    #[tokio::test]
    async fn sanitize_failure_degrades_to_empty_record_with_verbatim_outcomes() {
        let client = RecordingClient::new(vec![Err(()), Ok(JUDGMENT.to_string())]);
        let judgment = pipeline(client)
            .generate(&session(), &AttachmentBundle::default())
            .await
            .unwrap();

        let record = judgment.sanitized_record.unwrap();
        assert!(record.p1_factual_claims.is_empty());
        assert!(record.p2_factual_claims.is_empty());
        assert!(record.agreed_facts.is_empty());
        assert!(record.disputed_facts.is_empty());
        assert_eq!(record.p1_desired_outcome, "restore the prior position");
        assert_eq!(record.p2_desired_outcome, "keep the current position");
    }

    #[tokio::test]
    async fn verdict_generation_failure_is_an_error() {
        let client = RecordingClient::new(vec![Ok(SANITIZED.to_string()), Err(())]);
        let result = pipeline(client)
            .generate(&session(), &AttachmentBundle::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unparseable_verdict_output_is_an_error() {
        let client = RecordingClient::new(vec![
            Ok(SANITIZED.to_string()),
            Ok("the verdict is: whatever".to_string()),
        ]);
        let result = pipeline(client)
            .generate(&session(), &AttachmentBundle::default())
            .await;
        assert!(matches!(result, Err(GenerationError::Unparseable(_))));
    }

    #[test]
    fn insight_section_marks_low_confidence_with_question_mark() {
        let mut insight = ParticipantInsight::unknown();
        insight.p1 = concord_core::session::IdentityGuess {
            identity: "wife".to_string(),
            confidence: 0.9,
        };
        insight.p2 = concord_core::session::IdentityGuess {
            identity: "husband".to_string(),
            confidence: 0.3,
        };
        let section = insight_section(Some(&insight));
        assert!(section.contains("P1: wife (90%)"));
        assert!(section.contains("P2: husband? (30%)"));
    }
}
