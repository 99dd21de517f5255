//! Session orchestrator: the state machine driving the negotiation protocol.
//!
//! Every participant action follows the same contract: load the session,
//! assert the actor's role and the status precondition, persist the payload,
//! run the derivations needed for the next stage, persist the new status
//! together with the derived artifacts, then emit one acknowledgment event to
//! the actor and one artifact event to the counter-party (or both). A
//! mismatched precondition rejects the action without mutating state.
//!
//! All transitions of one session are serialized behind a per-session lock;
//! distinct sessions proceed fully in parallel. Generation calls run inside
//! the critical section: a session has at most two human actors, so the lost
//! concurrency is cheaper than optimistic retry. Notification delivery is
//! fire-and-forget and never rolls back persisted state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use concord_core::attachment::{
    Attachment, AttachmentContent, AttachmentRepository, AttachmentStage, FileKind,
};
use concord_core::error::{ConcordError, Result};
use concord_core::generation::GenerationClient;
use concord_core::session::{
    AcceptanceDecision, BarrierState, CounterStatement, EventScope, Notifier, Party, Session,
    SessionConfig, SessionEvent, SessionRepository, SessionStatus, Stage, StatementAnswers,
    VerificationMap, VisibilityMode, Workflow,
};
use concord_interaction::{
    AttachmentBundle, GenerationTuning, InsightAccumulator, JudgmentPipeline, Mediator, StageInput,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Mutex;
use uuid::Uuid;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Result of resolving a join token.
#[derive(Debug, Clone)]
pub struct JoinInfo {
    pub session_id: String,
    pub participant_id: String,
    pub party: Party,
    pub status: SessionStatus,
}

/// Drives all session state transitions.
pub struct SessionOrchestrator {
    sessions: Arc<dyn SessionRepository>,
    attachments: Arc<dyn AttachmentRepository>,
    notifier: Arc<dyn Notifier>,
    mediator: Mediator,
    insight: InsightAccumulator,
    judgment: JudgmentPipeline,
    /// One lock per session id; the whole load-validate-mutate-persist
    /// sequence of an action runs under it.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        attachments: Arc<dyn AttachmentRepository>,
        notifier: Arc<dyn Notifier>,
        client: Arc<dyn GenerationClient>,
        tuning: GenerationTuning,
    ) -> Self {
        Self {
            sessions,
            attachments,
            notifier,
            mediator: Mediator::new(client.clone(), tuning.clone()),
            insight: InsightAccumulator::new(client.clone(), tuning.clone()),
            judgment: JudgmentPipeline::new(client, tuning),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Convenience constructor wiring the default file-backed storage under
    /// `~/.concord`.
    pub async fn with_default_storage(
        notifier: Arc<dyn Notifier>,
        client: Arc<dyn GenerationClient>,
        tuning: GenerationTuning,
    ) -> Result<Self> {
        let sessions = concord_infrastructure::TomlSessionRepository::default_location()
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))?;
        let attachments = concord_infrastructure::DirAttachmentRepository::default_location()
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))?;
        Ok(Self::new(
            Arc::new(sessions),
            Arc::new(attachments),
            notifier,
            client,
            tuning,
        ))
    }

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .find_by_id(session_id)
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))?
            .ok_or_else(|| ConcordError::not_found("session", session_id))
    }

    async fn save(&self, session: &mut Session) -> Result<()> {
        session.touch();
        self.sessions
            .save(session)
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))
    }

    async fn notify(&self, session_id: &str, scope: EventScope, event: SessionEvent) {
        self.notifier.notify(session_id, scope, event).await;
    }

    /// Loads and formats every readable attachment of the session for
    /// inclusion in generation calls. Unreadable entries are skipped.
    async fn attachment_bundle(&self, session_id: &str) -> AttachmentBundle {
        let attachments = match self.attachments.list(session_id).await {
            Ok(attachments) => attachments,
            Err(e) => {
                tracing::warn!("Failed to list attachments for {session_id}: {e}");
                return AttachmentBundle::default();
            }
        };

        let mut contents: Vec<AttachmentContent> = Vec::new();
        for attachment in &attachments {
            match self.attachments.load_content(attachment).await {
                Ok(Some(content)) => contents.push(content),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Failed to load attachment {}: {e}", attachment.id);
                }
            }
        }
        AttachmentBundle::from_contents(&contents)
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Opens a new session in `waiting_p2_join` with both participants.
    pub async fn create_session(&self, config: SessionConfig) -> Result<Session> {
        let mut session = Session::create(config);
        self.save(&mut session).await?;
        tracing::info!("Created session {} ({:?})", session.id, session.workflow);
        Ok(session)
    }

    /// Resolves a join token, stamps `joined_at` on first join and replays
    /// the state a reconnecting participant needs.
    pub async fn join_session(&self, token: &str) -> Result<JoinInfo> {
        let session = self
            .sessions
            .find_by_token(token)
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))?
            .ok_or_else(|| ConcordError::validation("invalid join token"))?;

        let lock = self.session_lock(&session.id).await;
        let _guard = lock.lock_owned().await;

        let mut session = self.load(&session.id).await?;
        let party = session
            .participant_by_token(token)
            .map(|p| p.party)
            .ok_or_else(|| ConcordError::validation("invalid join token"))?;

        if session.participant(party).joined_at.is_none() {
            session.participant_mut(party).joined_at = Some(chrono::Utc::now().to_rfc3339());
            self.save(&mut session).await?;
        }

        let info = JoinInfo {
            session_id: session.id.clone(),
            participant_id: session.participant(party).id.clone(),
            party,
            status: session.status,
        };

        self.notify(
            &session.id,
            EventScope::Party(party),
            SessionEvent::JoinedSession {
                participant_number: party.number(),
                status: session.status,
                visibility: session.visibility,
                workflow: session.workflow,
                language: session.language,
                title: session.title.clone(),
                initial_description: session.initial_description.clone(),
            },
        )
        .await;

        let connected = self.notifier.membership(&session.id).await;
        self.notify(
            &session.id,
            EventScope::Both,
            SessionEvent::ParticipantJoined {
                participant_number: party.number(),
                total_joined: connected.len(),
                total_expected: 2,
            },
        )
        .await;

        // A participant reconnecting mid-verification gets their filtered
        // fact list and pending state replayed.
        if session.status == SessionStatus::FactVerification {
            if let (Some(facts), Some(views)) = (&session.facts, &session.fact_views) {
                let filtered = views
                    .filtered(party, facts)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>();
                self.notify(
                    &session.id,
                    EventScope::Party(party),
                    SessionEvent::FactListReady { facts: filtered },
                )
                .await;
            }
            if session.verifications.slot(party).is_some() {
                self.notify(
                    &session.id,
                    EventScope::Party(party),
                    SessionEvent::VerificationRecorded,
                )
                .await;
                if session.verifications.slot(party.other()).is_none() {
                    self.notify(
                        &session.id,
                        EventScope::Party(party),
                        SessionEvent::AwaitingCounterpartyVerification,
                    )
                    .await;
                }
            }
        }

        Ok(info)
    }

    /// Stores a notification email address for a participant.
    pub async fn update_participant_email(
        &self,
        session_id: &str,
        participant_id: &str,
        email: &str,
    ) -> Result<()> {
        if !EMAIL.is_match(email) {
            return Err(ConcordError::validation("invalid email format"));
        }

        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock_owned().await;

        let mut session = self.load(session_id).await?;
        if session.status.is_terminal() {
            return Err(ConcordError::validation(format!(
                "session '{}' is {}",
                session.id, session.status
            )));
        }
        let party = session.require_actor(participant_id, None)?;
        session.participant_mut(party).email = Some(email.to_string());
        self.save(&mut session).await?;

        self.notify(session_id, EventScope::Party(party), SessionEvent::EmailUpdated)
            .await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Protocol transitions
    // ------------------------------------------------------------------

    /// Participant 1 submits the opening statement.
    ///
    /// `waiting_p2_join -> waiting_p2_acceptance`
    pub async fn submit_initial_statement(
        &self,
        session_id: &str,
        participant_id: &str,
        answers: StatementAnswers,
    ) -> Result<()> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock_owned().await;

        let mut session = self.load(session_id).await?;
        session.require_actor(participant_id, Some(Party::P1))?;
        session.require_status(SessionStatus::WaitingP2Join)?;

        // The payload is persisted before any derivation so a failed
        // generation call can never lose the submission.
        session.initial_statement = Some(answers.clone());
        self.save(&mut session).await?;

        let updated = self
            .insight
            .accumulate(
                session.insight.clone(),
                StageInput::Statement(&answers),
                Stage::InitialStatement,
            )
            .await;
        session.insight = Some(updated);

        let bundle = self.attachment_bundle(session_id).await;
        let summary = self
            .mediator
            .summarize_initial_statement(&answers, session.language, &bundle)
            .await;
        let briefing = self.mediator.compose_briefing(session.language).await;

        session.summary_for_p2 = Some(summary.clone());
        session.briefing = Some(briefing.clone());
        session.advance(SessionStatus::WaitingP2Acceptance)?;
        self.save(&mut session).await?;

        let counterparty_token = session.participant(Party::P2).token.clone();
        self.notify(
            session_id,
            EventScope::Party(Party::P1),
            SessionEvent::StatementReceived { counterparty_token },
        )
        .await;
        self.notify(
            session_id,
            EventScope::Both,
            SessionEvent::SummaryReady { summary, briefing },
        )
        .await;
        Ok(())
    }

    /// Participant 2 accepts or rejects the negotiation.
    ///
    /// `waiting_p2_acceptance -> p2_answering | rejected`
    pub async fn submit_acceptance(
        &self,
        session_id: &str,
        participant_id: &str,
        decision: AcceptanceDecision,
    ) -> Result<()> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock_owned().await;

        let mut session = self.load(session_id).await?;
        session.require_actor(participant_id, Some(Party::P2))?;
        session.require_status(SessionStatus::WaitingP2Acceptance)?;

        session.acceptance = Some(decision);
        let next = match decision {
            AcceptanceDecision::Accepted => SessionStatus::P2Answering,
            AcceptanceDecision::Rejected => SessionStatus::Rejected,
        };
        session.advance(next)?;
        self.save(&mut session).await?;

        self.notify(
            session_id,
            EventScope::Both,
            SessionEvent::DecisionRecorded { decision },
        )
        .await;
        Ok(())
    }

    /// Participant 2 submits their response to the opening statement.
    ///
    /// `p2_answering -> waiting_p1_context`
    pub async fn submit_response(
        &self,
        session_id: &str,
        participant_id: &str,
        response: CounterStatement,
    ) -> Result<()> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock_owned().await;

        let mut session = self.load(session_id).await?;
        session.require_actor(participant_id, Some(Party::P2))?;
        session.require_status(SessionStatus::P2Answering)?;

        session.response = Some(response.clone());
        self.save(&mut session).await?;

        let updated = self
            .insight
            .accumulate(
                session.insight.clone(),
                StageInput::Response(&response),
                Stage::Response,
            )
            .await;
        session.insight = Some(updated);

        let answers = session
            .initial_statement
            .clone()
            .ok_or_else(|| ConcordError::internal("response without initial statement"))?;
        let bundle = self.attachment_bundle(session_id).await;
        let dispute_points = self
            .mediator
            .extract_dispute_points(&answers, &response, session.language, &bundle)
            .await;
        let response_summary = self
            .mediator
            .summarize_response_for_context(&answers, &response, session.language, &bundle)
            .await;

        session.dispute_points = Some(dispute_points.clone());
        session.advance(SessionStatus::WaitingP1Context)?;
        self.save(&mut session).await?;

        self.notify(
            session_id,
            EventScope::Party(Party::P2),
            SessionEvent::ResponseReceived,
        )
        .await;
        // Blind visibility withholds the raw response from participant 1.
        let raw_response = match session.visibility {
            VisibilityMode::Open => Some(response),
            VisibilityMode::Blind => None,
        };
        self.notify(
            session_id,
            EventScope::Party(Party::P1),
            SessionEvent::DisputePointsReady {
                dispute_points,
                response: raw_response,
                response_summary,
            },
        )
        .await;
        Ok(())
    }

    /// A participant submits their free-text context.
    ///
    /// P1: `waiting_p1_context -> waiting_p2_context`.
    /// P2: `waiting_p2_context -> generating_judgment | fact_verification`.
    /// P2 delivery while already at `generating_judgment` degrades to a
    /// judgment retry without re-persisting the payload.
    pub async fn submit_context(
        &self,
        session_id: &str,
        participant_id: &str,
        context_text: String,
    ) -> Result<()> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock_owned().await;

        let mut session = self.load(session_id).await?;
        let party = session.require_actor(participant_id, None)?;

        match party {
            Party::P1 => {
                session.require_status(SessionStatus::WaitingP1Context)?;
                self.handle_p1_context(&mut session, context_text).await
            }
            Party::P2 => {
                if session.status == SessionStatus::GeneratingJudgment {
                    // Retried delivery after a failed verdict derivation.
                    return self.run_judgment(&mut session).await;
                }
                session.require_status(SessionStatus::WaitingP2Context)?;
                self.handle_p2_context(&mut session, context_text).await
            }
        }
    }

    async fn handle_p1_context(&self, session: &mut Session, context_text: String) -> Result<()> {
        session.context_p1 = Some(context_text.clone());
        self.save(session).await?;

        let updated = self
            .insight
            .accumulate(
                session.insight.clone(),
                StageInput::Context {
                    party: Party::P1,
                    text: &context_text,
                },
                Stage::ContextP1,
            )
            .await;
        session.insight = Some(updated);

        let bundle = self.attachment_bundle(&session.id).await;
        let summary = self
            .mediator
            .summarize_context(&context_text, Party::P1, session.language, &bundle)
            .await;

        session.advance(SessionStatus::WaitingP2Context)?;
        self.save(session).await?;

        self.notify(
            &session.id,
            EventScope::Party(Party::P1),
            SessionEvent::ContextReceived {
                participant_number: 1,
            },
        )
        .await;
        self.notify(
            &session.id,
            EventScope::Party(Party::P2),
            SessionEvent::ContextSummaryReady { summary },
        )
        .await;
        Ok(())
    }

    async fn handle_p2_context(&self, session: &mut Session, context_text: String) -> Result<()> {
        session.context_p2 = Some(context_text.clone());
        self.save(session).await?;

        let updated = self
            .insight
            .accumulate(
                session.insight.clone(),
                StageInput::Context {
                    party: Party::P2,
                    text: &context_text,
                },
                Stage::ContextP2,
            )
            .await;
        session.insight = Some(updated);

        self.notify(
            &session.id,
            EventScope::Party(Party::P2),
            SessionEvent::ContextReceived {
                participant_number: 2,
            },
        )
        .await;

        match session.workflow {
            Workflow::Advanced => self.begin_fact_verification(session).await,
            Workflow::Simple | Workflow::Dynamic => {
                session.advance(SessionStatus::GeneratingJudgment)?;
                self.save(session).await?;
                self.run_judgment(session).await
            }
        }
    }

    /// Extracts the fact list, computes both filtered views once, and opens
    /// the verification barrier.
    async fn begin_fact_verification(&self, session: &mut Session) -> Result<()> {
        let answers = session
            .initial_statement
            .clone()
            .ok_or_else(|| ConcordError::internal("fact extraction without initial statement"))?;
        let response = session
            .response
            .clone()
            .ok_or_else(|| ConcordError::internal("fact extraction without response"))?;

        let bundle = self.attachment_bundle(&session.id).await;
        let facts = self
            .mediator
            .extract_fact_list(
                &answers,
                &response,
                session.context_p1.as_deref(),
                session.context_p2.as_deref(),
                session.language,
                &bundle,
            )
            .await;

        let views = concord_core::session::FactViews::build(&facts);
        tracing::info!(
            "Fact list for session {}: {} total, {} for P1, {} for P2",
            session.id,
            facts.len(),
            views.p1.len(),
            views.p2.len()
        );

        session.facts = Some(facts.clone());
        session.fact_views = Some(views.clone());
        session.advance(SessionStatus::FactVerification)?;
        self.save(session).await?;

        for party in [Party::P1, Party::P2] {
            let filtered = views
                .filtered(party, &facts)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>();
            self.notify(
                &session.id,
                EventScope::Party(party),
                SessionEvent::FactListReady { facts: filtered },
            )
            .await;
        }
        Ok(())
    }

    /// A participant submits (or re-submits) their fact verification.
    ///
    /// The barrier fires on the write that completes the pair: the first
    /// writer is told to wait, the second triggers judgment exactly once.
    /// Delivery while already at `generating_judgment` degrades to a
    /// judgment retry.
    pub async fn submit_fact_verification(
        &self,
        session_id: &str,
        participant_id: &str,
        verifications: VerificationMap,
    ) -> Result<()> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock_owned().await;

        let mut session = self.load(session_id).await?;
        let party = session.require_actor(participant_id, None)?;

        if session.status == SessionStatus::GeneratingJudgment {
            return self.run_judgment(&mut session).await;
        }
        session.require_status(SessionStatus::FactVerification)?;

        let view_len = session
            .fact_views
            .as_ref()
            .map(|views| views.view(party).len())
            .unwrap_or(0);
        if verifications
            .iter()
            .any(|entry| entry.position as usize >= view_len)
        {
            return Err(ConcordError::validation(format!(
                "verification position out of range for {party} (view has {view_len} facts)"
            )));
        }

        let barrier = session.verifications.record(party, verifications);
        self.save(&mut session).await?;

        self.notify(
            session_id,
            EventScope::Party(party),
            SessionEvent::VerificationRecorded,
        )
        .await;

        match barrier {
            BarrierState::Waiting => {
                self.notify(
                    session_id,
                    EventScope::Party(party),
                    SessionEvent::AwaitingCounterpartyVerification,
                )
                .await;
                Ok(())
            }
            BarrierState::Released => {
                session.advance(SessionStatus::GeneratingJudgment)?;
                self.save(&mut session).await?;
                self.run_judgment(&mut session).await
            }
        }
    }

    /// Re-attempts a failed verdict derivation. Narrative data is already
    /// persisted; only the derivation runs again.
    pub async fn retry_judgment(&self, session_id: &str, participant_id: &str) -> Result<()> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock_owned().await;

        let mut session = self.load(session_id).await?;
        session.require_actor(participant_id, None)?;
        session.require_status(SessionStatus::GeneratingJudgment)?;
        self.run_judgment(&mut session).await
    }

    /// Runs the judgment pipeline for a session at `generating_judgment`.
    ///
    /// The verdict has no safe fallback: on derivation failure the session
    /// stays where it is, both participants get a generic error signal, and
    /// the triggering action can be re-delivered.
    async fn run_judgment(&self, session: &mut Session) -> Result<()> {
        let bundle = self.attachment_bundle(&session.id).await;
        match self.judgment.generate(session, &bundle).await {
            Ok(judgment) => {
                session.judgment = Some(judgment.clone());
                session.advance(SessionStatus::Completed)?;
                self.save(session).await?;
                self.notify(
                    &session.id,
                    EventScope::Both,
                    SessionEvent::JudgmentReady { judgment },
                )
                .await;
                Ok(())
            }
            Err(err) => {
                tracing::error!("Judgment generation failed for {}: {err}", session.id);
                self.notify(
                    &session.id,
                    EventScope::Both,
                    SessionEvent::Error {
                        message: "Failed to generate judgment, please retry".to_string(),
                    },
                )
                .await;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Attachments
    // ------------------------------------------------------------------

    /// Stores a piece of evidence for a stage that is still open.
    ///
    /// Uploads addressed to a stage whose submission point has passed are
    /// refused rather than silently folded into later derivations.
    pub async fn store_attachment(
        &self,
        session_id: &str,
        participant_id: &str,
        stage: AttachmentStage,
        original_name: &str,
        media_type: &str,
        bytes: &[u8],
    ) -> Result<Attachment> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock_owned().await;

        let session = self.load(session_id).await?;
        let party = session.require_actor(participant_id, None)?;
        if session.status != stage.submission_status() {
            return Err(ConcordError::validation(format!(
                "attachments for stage '{:?}' are closed while session is '{}'",
                stage, session.status
            )));
        }

        let id = Uuid::new_v4().to_string();
        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let attachment = Attachment {
            id: id.clone(),
            session_id: session_id.to_string(),
            party,
            stage,
            file_name: format!("{id}.{extension}"),
            original_name: original_name.to_string(),
            kind: FileKind::from_media_type(media_type),
            media_type: media_type.to_string(),
            size: bytes.len() as u64,
            uploaded_at: chrono::Utc::now().to_rfc3339(),
        };

        self.attachments
            .store(&attachment, bytes)
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))?;
        Ok(attachment)
    }

    /// Lists a session's attachments, optionally narrowed to one stage.
    pub async fn list_attachments(
        &self,
        session_id: &str,
        stage: Option<AttachmentStage>,
    ) -> Result<Vec<Attachment>> {
        let attachments = self
            .attachments
            .list(session_id)
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))?;
        Ok(match stage {
            Some(stage) => attachments.into_iter().filter(|a| a.stage == stage).collect(),
            None => attachments,
        })
    }

    /// Loads one attachment as generation-ready content. `None` for kinds
    /// that cannot be read into a prompt.
    pub async fn attachment_content(
        &self,
        session_id: &str,
        attachment_id: &str,
    ) -> Result<Option<AttachmentContent>> {
        let attachment = self
            .attachments
            .find_by_id(session_id, attachment_id)
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))?
            .ok_or_else(|| ConcordError::not_found("attachment", attachment_id))?;
        self.attachments
            .load_content(&attachment)
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))
    }

    /// Deletes an attachment; only its owner may do so.
    pub async fn delete_attachment(
        &self,
        session_id: &str,
        participant_id: &str,
        attachment_id: &str,
    ) -> Result<()> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock_owned().await;

        let session = self.load(session_id).await?;
        let party = session.require_actor(participant_id, None)?;

        let attachment = self
            .attachments
            .find_by_id(session_id, attachment_id)
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))?
            .ok_or_else(|| ConcordError::not_found("attachment", attachment_id))?;
        if attachment.party != party {
            return Err(ConcordError::validation(
                "attachments may only be deleted by their owner",
            ));
        }

        self.attachments
            .delete(session_id, attachment_id)
            .await
            .map_err(|e| ConcordError::data_access(e.to_string()))
    }

    // ------------------------------------------------------------------
    // Read-only queries
    // ------------------------------------------------------------------

    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.load(session_id).await
    }

    pub async fn get_judgment(
        &self,
        session_id: &str,
    ) -> Result<Option<concord_core::session::Judgment>> {
        Ok(self.load(session_id).await?.judgment)
    }
}
