//! Derived-artifact generation: summaries, briefings, dispute points and the
//! fact list.
//!
//! Every method applies the uniform failure policy: attempt the generation
//! call once; on failure (or unparseable output) log and substitute a
//! deterministic, language-appropriate fallback so the state machine can
//! always advance.

use std::sync::Arc;

use concord_core::attachment::AttachmentContent;
use concord_core::generation::{
    ChatMessage, GenerationClient, GenerationError, GenerationRequest, ImageContent,
};
use concord_core::session::{
    CounterStatement, Fact, FactSource, Language, Party, StatementAnswers,
};
use serde::Deserialize;

use crate::config::GenerationTuning;
use crate::parse::parse_json;

/// Cap per attached document, to keep prompts inside the token budget.
const MAX_DOCUMENT_CHARS: usize = 5000;

/// Attachment material formatted for inclusion in a generation call: one
/// text block for documents plus the image parts for vision engines.
#[derive(Debug, Clone, Default)]
pub struct AttachmentBundle {
    pub text: String,
    pub images: Vec<ImageContent>,
}

impl AttachmentBundle {
    pub fn from_contents(contents: &[AttachmentContent]) -> Self {
        let mut text = String::new();
        let mut images = Vec::new();

        let documents: Vec<_> = contents
            .iter()
            .filter_map(|c| match c {
                AttachmentContent::Text {
                    name,
                    party,
                    kind,
                    body,
                } => Some((name, party, kind, body)),
                AttachmentContent::Image(_) => None,
            })
            .collect();

        if !documents.is_empty() {
            text.push_str("\n\n=== ATTACHED DOCUMENTS ===\n");
            for (name, party, kind, body) in documents {
                let truncated = if body.len() > MAX_DOCUMENT_CHARS {
                    let mut end = MAX_DOCUMENT_CHARS;
                    while !body.is_char_boundary(end) {
                        end -= 1;
                    }
                    format!("{}\n[... content truncated ...]", &body[..end])
                } else {
                    body.clone()
                };
                text.push_str(&format!(
                    "\n--- {} ({:?} from {}) ---\n{}\n--- END OF DOCUMENT ---\n",
                    name, kind, party, truncated
                ));
            }
        }

        for content in contents {
            if let AttachmentContent::Image(image) = content {
                text.push_str(&format!(
                    "\n[IMAGE ATTACHED: {} from {} - analyze this image for relevant information]\n",
                    image.name, image.party
                ));
                images.push(image.clone());
            }
        }

        Self { text, images }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty()
    }
}

/// Renders the four structured answers as prompt lines.
pub fn format_statement(answers: &StatementAnswers, language: Language) -> String {
    match language {
        Language::Pt => format!(
            "- O que aconteceu: {}\n- O que levou a isso: {}\n- Como isso os fez sentir: {}\n- Resultado desejado: {}",
            answers.what_happened,
            answers.what_led_to_it,
            answers.how_it_made_them_feel,
            answers.desired_outcome
        ),
        Language::En => format!(
            "- What happened: {}\n- What led to it: {}\n- How it made them feel: {}\n- Desired outcome: {}",
            answers.what_happened,
            answers.what_led_to_it,
            answers.how_it_made_them_feel,
            answers.desired_outcome
        ),
    }
}

/// Renders participant 2's response as prompt lines.
pub fn format_response(response: &CounterStatement, language: Language) -> String {
    match response {
        CounterStatement::Dispute { text } => match language {
            Language::Pt => format!("- Resposta: {}", text),
            Language::En => format!("- Response: {}", text),
        },
        CounterStatement::Structured(answers) => format_statement(answers, language),
    }
}

fn language_instruction(language: Language) -> &'static str {
    match language {
        Language::Pt => "RESPONDA INTEIRAMENTE EM PORTUGUES. NAO USE NENHUMA PALAVRA EM INGLES.",
        Language::En => "RESPOND ENTIRELY IN ENGLISH.",
    }
}

fn image_instruction(language: Language, has_images: bool) -> &'static str {
    if !has_images {
        return "";
    }
    match language {
        Language::Pt => " ANALISE CUIDADOSAMENTE as imagens anexadas e extraia informacoes relevantes delas.",
        Language::En => " CAREFULLY ANALYZE any attached images and extract relevant information from them.",
    }
}

#[derive(Deserialize)]
struct DisputePointsPayload {
    #[serde(rename = "disputePoints", default)]
    dispute_points: Vec<String>,
}

#[derive(Deserialize)]
struct FactListPayload {
    #[serde(default)]
    facts: Vec<Fact>,
}

/// Produces every derived artifact of the protocol from raw submissions.
pub struct Mediator {
    client: Arc<dyn GenerationClient>,
    tuning: GenerationTuning,
}

impl Mediator {
    pub fn new(client: Arc<dyn GenerationClient>, tuning: GenerationTuning) -> Self {
        Self { client, tuning }
    }

    async fn generate(
        &self,
        system: String,
        user: String,
        images: Vec<ImageContent>,
    ) -> Result<String, GenerationError> {
        let request = GenerationRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ])
        .with_temperature(self.tuning.derivation_temperature)
        .with_max_tokens(self.tuning.derivation_max_tokens)
        .with_images(images);
        self.client.generate(request).await
    }

    /// Neutral summary of participant 1's statement, for participant 2.
    pub async fn summarize_initial_statement(
        &self,
        answers: &StatementAnswers,
        language: Language,
        attachments: &AttachmentBundle,
    ) -> String {
        let system = format!(
            "You are an AI mediator. {} Create a clear, neutral summary of Participant 1's \
             perspective for Participant 2 to review. If there are attached documents, include \
             relevant information from them (numbers, values, dates).{}",
            language_instruction(language),
            image_instruction(language, !attachments.images.is_empty())
        );
        let user = match language {
            Language::Pt => format!(
                "IMPORTANTE: Escreva sua resposta inteiramente em portugues.\n\n\
                 Participante 1 forneceu estas respostas:\n{}{}\n\n\
                 Crie um resumo conciso e neutro (2-3 paragrafos) que o Participante 2 possa ler \
                 para entender a perspectiva do Participante 1.",
                format_statement(answers, language),
                attachments.text
            ),
            Language::En => format!(
                "Participant 1 provided these answers:\n{}{}\n\n\
                 Create a concise, neutral summary (2-3 paragraphs) that Participant 2 can read \
                 to understand Participant 1's perspective. If there are attached documents or \
                 images, mention relevant facts from them.",
                format_statement(answers, language),
                attachments.text
            ),
        };

        match self.generate(system, user, attachments.images.clone()).await {
            Ok(summary) => summary.trim().to_string(),
            Err(err) => {
                tracing::warn!("Initial-statement summary generation failed: {err}");
                match language {
                    Language::Pt => {
                        "O Participante 1 enviou sua perspectiva sobre o conflito. \
                         Revise as respostas e decida se deseja participar."
                            .to_string()
                    }
                    Language::En => {
                        "Participant 1 has submitted their perspective on the conflict. \
                         Review the answers and decide whether to take part."
                            .to_string()
                    }
                }
            }
        }
    }

    /// Short message asking participant 2 whether they accept the session.
    pub async fn compose_briefing(&self, language: Language) -> String {
        let system = format!(
            "You are an AI mediator. {} Create a brief message for Participant 2 explaining \
             what they need to do next.",
            language_instruction(language)
        );
        let user = match language {
            Language::Pt => {
                "IMPORTANTE: Escreva em portugues.\n\n\
                 O Participante 1 enviou sua perspectiva. Crie uma mensagem breve (2-3 frases) \
                 perguntando ao Participante 2 se ele aceita participar desta sessao de mediacao. \
                 Explique que ele revisara a perspectiva do Participante 1 e fornecera a sua propria."
                    .to_string()
            }
            Language::En => {
                "Participant 1 has submitted their perspective. Create a brief message \
                 (2-3 sentences) asking Participant 2 if they accept to participate in this \
                 mediation session. Explain they will review Participant 1's perspective and \
                 provide their own."
                    .to_string()
            }
        };

        match self.generate(system, user, Vec::new()).await {
            Ok(briefing) => briefing.trim().to_string(),
            Err(err) => {
                tracing::warn!("Briefing generation failed: {err}");
                match language {
                    Language::Pt => {
                        "O Participante 1 iniciou uma sessao de mediacao. Voce aceita participar \
                         e apresentar a sua perspectiva?"
                            .to_string()
                    }
                    Language::En => {
                        "Participant 1 has opened a mediation session. Do you accept to take \
                         part and present your own perspective?"
                            .to_string()
                    }
                }
            }
        }
    }

    /// Key points of disagreement between the two perspectives.
    ///
    /// The model always sees both sides; blind visibility only withholds the
    /// raw response from the event payload towards participant 1.
    pub async fn extract_dispute_points(
        &self,
        answers: &StatementAnswers,
        response: &CounterStatement,
        language: Language,
        attachments: &AttachmentBundle,
    ) -> Vec<String> {
        let system = format!(
            "You are an AI mediator analyzing a conflict. {} Identify key points of \
             disagreement between the two participants. If there are attached documents, \
             consider the facts from them in your analysis.{}",
            language_instruction(language),
            image_instruction(language, !attachments.images.is_empty())
        );

        let user = match language {
            Language::Pt => format!(
                "IMPORTANTE: Todos os pontos devem estar em portugues.\n\n\
                 Analise estas duas perspectivas e identifique 3-5 pontos-chave de disputa:\n\n\
                 Participante 1:\n{}\n\nParticipante 2:\n{}{}\n\n\
                 Retorne JSON: {{\"disputePoints\": [\"ponto 1\", \"ponto 2\", \"ponto 3\"]}}",
                format_statement(answers, language),
                format_response(response, language),
                attachments.text
            ),
            Language::En => format!(
                "Analyze these two perspectives and identify 3-5 key dispute points:\n\n\
                 Participant 1:\n{}\n\nParticipant 2:\n{}{}\n\n\
                 Return JSON: {{\"disputePoints\": [\"point 1\", \"point 2\", \"point 3\"]}}",
                format_statement(answers, language),
                format_response(response, language),
                attachments.text
            ),
        };

        let result = match self.generate(system, user, attachments.images.clone()).await {
            Ok(text) => parse_json::<DisputePointsPayload>(&text).map(|p| p.dispute_points),
            Err(err) => Err(err),
        };

        match result {
            Ok(points) if !points.is_empty() => points,
            Ok(_) | Err(_) => {
                tracing::warn!("Dispute point extraction failed, substituting fallback");
                let fallback = match language {
                    Language::Pt => {
                        "Nao foi possivel identificar pontos de disputa especificos. \
                         Contexto adicional pode ajudar a esclarecer."
                    }
                    Language::En => {
                        "Unable to identify specific dispute points. Additional context may \
                         help clarify."
                    }
                };
                vec![fallback.to_string()]
            }
        }
    }

    /// Summary of participant 2's perspective, shown to participant 1 before
    /// their context submission.
    pub async fn summarize_response_for_context(
        &self,
        answers: &StatementAnswers,
        response: &CounterStatement,
        language: Language,
        attachments: &AttachmentBundle,
    ) -> String {
        let system = format!(
            "You are a neutral mediator. {} Generate a concise summary of Participant 2's \
             perspective and concerns for Participant 1 to review before adding additional \
             context.{}",
            language_instruction(language),
            image_instruction(language, !attachments.images.is_empty())
        );
        let user = match language {
            Language::Pt => format!(
                "IMPORTANTE: Escreva em portugues.\n\n\
                 Com base no seguinte, crie um resumo neutro da perspectiva do Participante 2:\n\n\
                 Perspectiva Inicial do PARTICIPANTE 1:\n{}\n\n\
                 Resposta do PARTICIPANTE 2:\n{}{}\n\n\
                 Forneca um resumo de 2-3 paragrafos que capture a perspectiva e preocupacoes \
                 do Participante 2.",
                format_statement(answers, language),
                format_response(response, language),
                attachments.text
            ),
            Language::En => format!(
                "Based on the following, create a neutral summary of Participant 2's perspective:\n\n\
                 PARTICIPANT 1's Initial Perspective:\n{}\n\n\
                 PARTICIPANT 2's Response:\n{}{}\n\n\
                 Provide a 2-3 paragraph summary that captures Participant 2's perspective, \
                 concerns, and how they view the situation.",
                format_statement(answers, language),
                format_response(response, language),
                attachments.text
            ),
        };

        match self.generate(system, user, attachments.images.clone()).await {
            Ok(summary) => summary.trim().to_string(),
            Err(err) => {
                tracing::warn!("Response summary generation failed: {err}");
                match language {
                    Language::Pt => {
                        "Nao foi possivel gerar o resumo. Por favor, revise os pontos-chave de \
                         disputa acima."
                            .to_string()
                    }
                    Language::En => {
                        "Unable to generate summary. Please review the key dispute points above."
                            .to_string()
                    }
                }
            }
        }
    }

    /// Neutral summary of one participant's additional context. Falls back
    /// to the raw text so the counter-party always sees something.
    pub async fn summarize_context(
        &self,
        context_text: &str,
        party: Party,
        language: Language,
        attachments: &AttachmentBundle,
    ) -> String {
        let label = match (party, language) {
            (Party::P1, Language::Pt) => "Participante 1",
            (Party::P2, Language::Pt) => "Participante 2",
            (Party::P1, Language::En) => "Participant 1",
            (Party::P2, Language::En) => "Participant 2",
        };
        let system = format!(
            "You are a neutral mediator. {} Summarize the additional context provided by {} \
             in a clear, neutral way.{}",
            language_instruction(language),
            label,
            image_instruction(language, !attachments.images.is_empty())
        );
        let user = match language {
            Language::Pt => format!(
                "IMPORTANTE: Escreva em portugues.\n\n\
                 {} forneceu o seguinte contexto adicional:\n\n\"{}\"{}\n\n\
                 Crie um resumo neutro de 1-2 paragrafos deste contexto adicional que destaque \
                 os pontos-chave.",
                label, context_text, attachments.text
            ),
            Language::En => format!(
                "{} provided the following additional context:\n\n\"{}\"{}\n\n\
                 Create a 1-2 paragraph neutral summary of this additional context that \
                 highlights the key points.",
                label, context_text, attachments.text
            ),
        };

        match self.generate(system, user, attachments.images.clone()).await {
            Ok(summary) => summary.trim().to_string(),
            Err(err) => {
                tracing::warn!("Context summary generation failed, falling back to raw text: {err}");
                context_text.to_string()
            }
        }
    }

    /// Extracts the verifiable fact list for the advanced workflow.
    ///
    /// Fact ids are reassigned sequentially from 1 regardless of what the
    /// engine returned, so views and verification positions always have a
    /// stable id space.
    pub async fn extract_fact_list(
        &self,
        answers: &StatementAnswers,
        response: &CounterStatement,
        context_p1: Option<&str>,
        context_p2: Option<&str>,
        language: Language,
        attachments: &AttachmentBundle,
    ) -> Vec<Fact> {
        let system = format!(
            "You are a neutral mediator extracting stated facts. {} Your task is to identify \
             specific facts stated by each participant that can be verified or disputed. Do NOT \
             add interpretations - only stated facts.\n\n\
             IMPORTANT ABOUT ATTACHMENTS:\n\
             - Documents/images attached by Participant 1 should generate facts with source=\"p1\"\n\
             - Documents/images attached by Participant 2 should generate facts with source=\"p2\"\n\
             - Extract relevant facts such as numbers, dates, values, and other verifiable \
             information from attachments{}",
            language_instruction(language),
            image_instruction(language, !attachments.images.is_empty())
        );

        let p1_context = context_p1
            .map(|c| format!("\n- Additional context: {c}"))
            .unwrap_or_default();
        let p2_context = context_p2
            .map(|c| format!("\n- Additional context: {c}"))
            .unwrap_or_default();

        let user = format!(
            "Analyze these perspectives and extract 5-10 specific facts that were stated. Each \
             fact should be a clear statement that the other participant can agree or disagree \
             with.\n\n\
             PARTICIPANT 1:\n{}{}\n\nPARTICIPANT 2:\n{}{}{}\n\n\
             Return JSON:\n\
             {{\n  \"facts\": [\n    {{\"id\": 1, \"statement\": \"fact statement\", \"source\": \
             \"p1\" or \"p2\" or \"both\"}}\n  ]\n}}",
            format_statement(answers, language),
            p1_context,
            format_response(response, language),
            p2_context,
            attachments.text
        );

        let result = match self.generate(system, user, attachments.images.clone()).await {
            Ok(text) => parse_json::<FactListPayload>(&text).map(|p| p.facts),
            Err(err) => Err(err),
        };

        let mut facts = match result {
            Ok(facts) if !facts.is_empty() => facts,
            Ok(_) | Err(_) => {
                tracing::warn!("Fact extraction failed, substituting fallback fact");
                let statement = match language {
                    Language::Pt => "Nao foi possivel extrair fatos especificos das respostas.",
                    Language::En => "Unable to extract specific facts from the responses.",
                };
                vec![Fact {
                    id: 1,
                    statement: statement.to_string(),
                    source: FactSource::Both,
                }]
            }
        };

        for (index, fact) in facts.iter_mut().enumerate() {
            fact.id = index as u64 + 1;
        }
        facts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted generation stub: pops pre-programmed responses in order.
    struct StubClient {
        responses: Mutex<Vec<Result<String, ()>>>,
    }

    impl StubClient {
        fn new(responses: Vec<Result<String, ()>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
            })
        }

        fn failing() -> Arc<Self> {
            Self::new(vec![Err(())])
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

    fn answers() -> StatementAnswers {
        StatementAnswers {
            what_happened: "the fence was moved".to_string(),
            what_led_to_it: "a survey disagreement".to_string(),
            how_it_made_them_feel: "ignored".to_string(),
            desired_outcome: "move it back".to_string(),
        }
    }

    fn mediator(client: Arc<dyn GenerationClient>) -> Mediator {
        Mediator::new(client, GenerationTuning::default())
    }

    #[tokio::test]
    async fn summary_falls_back_in_session_language() {
        let m = mediator(StubClient::failing());
        let summary = m
            .summarize_initial_statement(&answers(), Language::Pt, &AttachmentBundle::default())
            .await;
        assert!(summary.contains("Participante 1"));
    }

    #[tokio::test]
    async fn dispute_points_parse_the_documented_shape() {
        let m = mediator(StubClient::new(vec![Ok(
            "```json\n{\"disputePoints\": [\"who moved the fence\", \"when\"]}\n```".to_string(),
        )]));
        let points = m
            .extract_dispute_points(
                &answers(),
                &CounterStatement::Dispute {
                    text: "that is not what happened".to_string(),
                },
                Language::En,
                &AttachmentBundle::default(),
            )
            .await;
        assert_eq!(points, vec!["who moved the fence", "when"]);
    }

    #[tokio::test]
    async fn unparseable_dispute_points_fall_back_to_single_entry() {
        let m = mediator(StubClient::new(vec![Ok("no json here".to_string())]));
        let points = m
            .extract_dispute_points(
                &answers(),
                &CounterStatement::Structured(answers()),
                Language::En,
                &AttachmentBundle::default(),
            )
            .await;
        assert_eq!(points.len(), 1);
        assert!(points[0].contains("Unable to identify"));
    }

    #[tokio::test]
    async fn context_summary_falls_back_to_raw_text() {
        let m = mediator(StubClient::failing());
        let summary = m
            .summarize_context(
                "I also paid for the survey",
                Party::P1,
                Language::En,
                &AttachmentBundle::default(),
            )
            .await;
        assert_eq!(summary, "I also paid for the survey");
    }

    #[tokio::test]
    async fn fact_list_reassigns_sequential_ids() {
        let m = mediator(StubClient::new(vec![Ok(r#"{"facts": [
            {"id": 10, "statement": "the fence moved", "source": "p1"},
            {"id": 99, "statement": "the survey exists", "source": "both"}
        ]}"#
            .to_string())]));
        let facts = m
            .extract_fact_list(
                &answers(),
                &CounterStatement::Structured(answers()),
                None,
                None,
                Language::En,
                &AttachmentBundle::default(),
            )
            .await;
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].id, 1);
        assert_eq!(facts[1].id, 2);
    }

    #[tokio::test]
    async fn fact_list_failure_yields_single_both_sourced_fact() {
        let m = mediator(StubClient::failing());
        let facts = m
            .extract_fact_list(
                &answers(),
                &CounterStatement::Structured(answers()),
                Some("more context"),
                None,
                Language::En,
                &AttachmentBundle::default(),
            )
            .await;
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].source, FactSource::Both);
    }

    #[test]
    fn attachment_bundle_truncates_long_documents() {
        let long_body = "x".repeat(6000);
        let contents = vec![AttachmentContent::Text {
            name: "log.txt".to_string(),
            party: Party::P1,
            kind: concord_core::attachment::FileKind::Text,
            body: long_body,
        }];
        let bundle = AttachmentBundle::from_contents(&contents);
        assert!(bundle.text.contains("[... content truncated ...]"));
        assert!(bundle.text.len() < 6000);
    }

    #[test]
    fn attachment_bundle_separates_images_from_documents() {
        let contents = vec![
            AttachmentContent::Text {
                name: "notes.txt".to_string(),
                party: Party::P1,
                kind: concord_core::attachment::FileKind::Text,
                body: "short".to_string(),
            },
            AttachmentContent::Image(ImageContent {
                name: "photo.png".to_string(),
                party: Party::P2,
                media_type: "image/png".to_string(),
                data: "aGk=".to_string(),
            }),
        ];
        let bundle = AttachmentBundle::from_contents(&contents);
        assert_eq!(bundle.images.len(), 1);
        assert!(bundle.text.contains("ATTACHED DOCUMENTS"));
        assert!(bundle.text.contains("IMAGE ATTACHED: photo.png"));
    }
}
