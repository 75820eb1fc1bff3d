//! Caller-facing question answering operations.

use crate::config::{retriever_config, PipelineConfig, SessionConfig};
use crate::draft::DraftAgent;
use crate::pipeline::AgentPipeline;
use crate::session::{assemble_query, ConversationHistory, SessionStore, SessionSummary};
use crate::verify::{Verdict, VerifyAgent};
use docqa_core::{AppConfig, AppError, AppResult};
use docqa_knowledge::{serialize_fragments, ContextRetriever, RetrievedFragment, SearchIndex};
use docqa_llm::LlmClient;
use docqa_prompt::{load_prompt, DRAFT_PROMPT_ID, VERIFY_PROMPT_ID};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Answer from the draft-only endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleShotAnswer {
    pub final_answer: String,
    pub fragments_used: Vec<RetrievedFragment>,
    /// Evidence text shown to the agents
    pub context: String,
}

/// Answer from the conversational endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationalAnswer {
    pub final_answer: String,
    pub session_id: String,
    pub turn_number: usize,
    pub fragments_used: Vec<RetrievedFragment>,
    /// Whether prior turns were prepended to the question
    pub history_used: bool,
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

/// Document question answering over one corpus.
pub struct QaService {
    pipeline: AgentPipeline,
    sessions: SessionStore,
    top_k: usize,
    require_verification: bool,
}

impl QaService {
    pub fn new(
        pipeline: AgentPipeline,
        sessions: SessionStore,
        top_k: usize,
        require_verification: bool,
    ) -> Self {
        Self {
            pipeline,
            sessions,
            top_k,
            require_verification,
        }
    }

    /// Wire the agents from application config.
    ///
    /// Prompts are loaded from the workspace, falling back to the built-ins.
    pub fn from_config(
        config: &AppConfig,
        llm: Arc<dyn LlmClient>,
        index: Arc<dyn SearchIndex>,
    ) -> AppResult<Self> {
        let pipeline_config = PipelineConfig::from_app_config(config);
        let retriever_config = retriever_config(config);
        let top_k = retriever_config.top_k;

        let drafter = DraftAgent::new(
            llm.clone(),
            load_prompt(&config.workspace, DRAFT_PROMPT_ID)?,
            pipeline_config.draft.clone(),
            pipeline_config.retry.clone(),
        );
        let verifier = VerifyAgent::new(
            llm,
            load_prompt(&config.workspace, VERIFY_PROMPT_ID)?,
            pipeline_config.verify.clone(),
            pipeline_config.retry.clone(),
        );
        let pipeline = AgentPipeline::new(
            ContextRetriever::new(index, retriever_config),
            drafter,
            verifier,
        );

        Ok(Self::new(
            pipeline,
            SessionStore::new(SessionConfig::from_app_config(config)),
            top_k,
            pipeline_config.require_verification,
        ))
    }

    pub fn pipeline(&self) -> &AgentPipeline {
        &self.pipeline
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Draft-only answer with no session and no verification.
    pub async fn answer_single_shot(&self, question: &str) -> AppResult<SingleShotAnswer> {
        let question = validate_question(question)?;
        tracing::info!(question_len = question.len(), "Single-shot question");

        let result = self.pipeline.run(question, self.top_k, false).await?;

        Ok(SingleShotAnswer {
            context: serialize_fragments(&result.fragments_used),
            final_answer: result.final_answer,
            fragments_used: result.fragments_used,
        })
    }

    /// Answer within a session, recording the turn on success.
    ///
    /// An absent or unknown `session_id` starts a session. A failed run
    /// records nothing.
    pub async fn answer_conversational(
        &self,
        question: &str,
        session_id: Option<&str>,
    ) -> AppResult<ConversationalAnswer> {
        let question = validate_question(question)?;
        let ticket = self.sessions.begin_turn(session_id);
        let window = self.sessions.config().history_window;
        let history_used = window > 0 && !ticket.history().is_empty();
        let query = assemble_query(ticket.history(), window, question);

        tracing::info!(
            session_id = ticket.session_id(),
            history_turns = ticket.history().len(),
            "Conversational question"
        );

        let result = self
            .pipeline
            .run(&query, self.top_k, self.require_verification)
            .await?;

        let context = serialize_fragments(&result.fragments_used);
        let session_id = ticket.session_id().to_string();
        let turn = ticket
            .commit(
                question,
                &result.final_answer,
                result.fragments_used.clone(),
                result.verdict,
            )
            .await;

        Ok(ConversationalAnswer {
            final_answer: result.final_answer,
            session_id,
            turn_number: turn.index,
            fragments_used: result.fragments_used,
            history_used,
            context,
            verdict: result.verdict,
        })
    }

    pub fn new_session(&self) -> String {
        self.sessions.create_session()
    }

    /// # Errors
    /// `SessionNotFound` for unknown ids.
    pub fn get_history(&self, session_id: &str) -> AppResult<ConversationHistory> {
        self.sessions.get_history(session_id)
    }

    pub fn clear_session(&self, session_id: &str) -> AppResult<()> {
        self.sessions.clear(session_id)
    }

    pub fn delete_session(&self, session_id: &str) -> AppResult<()> {
        self.sessions.delete(session_id)
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.sessions.list()
    }

    pub fn cleanup_idle_sessions(&self, max_age: Duration) -> usize {
        self.sessions.cleanup_idle(max_age)
    }
}

fn validate_question(question: &str) -> AppResult<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(
            "Question cannot be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
