//! Draft agent: synthesizes a candidate answer from retrieved fragments.

use crate::config::GenerationSettings;
use crate::retry::RetryPolicy;
use docqa_core::{AppError, AppResult};
use docqa_knowledge::{serialize_fragments, RetrievedFragment};
use docqa_llm::{LlmClient, LlmRequest};
use docqa_prompt::{build_prompt, BuiltPrompt, PromptDefinition};
use std::collections::HashMap;
use std::sync::Arc;

/// Stock answer when there is nothing to ground a draft on.
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "The available document does not contain enough information to answer this question.";

pub struct DraftAgent {
    llm: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    settings: GenerationSettings,
    retry: RetryPolicy,
}

impl DraftAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        settings: GenerationSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            llm,
            prompt,
            settings,
            retry,
        }
    }

    /// Produce a draft answer for `query` from `fragments`.
    ///
    /// With no fragments the stock insufficient-context answer is returned
    /// and the model is not called.
    pub async fn draft(&self, query: &str, fragments: &[RetrievedFragment]) -> AppResult<String> {
        if fragments.is_empty() {
            tracing::info!("No fragments to draft from, returning stock answer");
            return Ok(INSUFFICIENT_CONTEXT_ANSWER.to_string());
        }

        let built = self.build(query, fragments)?;
        let request = to_request(built, &self.settings);

        tracing::debug!(
            prompt_len = request.prompt.len(),
            fragments = fragments.len(),
            "Drafting answer"
        );

        let llm = &self.llm;
        let request = &request;
        let draft = self
            .retry
            .run("draft", self.settings.timeout, move || async move {
                let response = llm.complete(request).await?;
                let text = response.content.trim().to_string();
                if text.is_empty() {
                    return Err(AppError::Llm("Draft completion was empty".to_string()));
                }
                Ok(text)
            })
            .await?;

        tracing::debug!(draft_len = draft.len(), "Draft ready");
        Ok(draft)
    }

    fn build(&self, query: &str, fragments: &[RetrievedFragment]) -> AppResult<BuiltPrompt> {
        let mut variables = HashMap::new();
        variables.insert("question".to_string(), query.to_string());
        variables.insert("context".to_string(), serialize_fragments(fragments));
        build_prompt(&self.prompt, variables)
    }
}

/// Turn a rendered prompt into a completion request.
pub(crate) fn to_request(built: BuiltPrompt, settings: &GenerationSettings) -> LlmRequest {
    let request = LlmRequest::new(built.user, settings.model.clone())
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_tokens);

    match built.system {
        Some(system) => request.with_system(system),
        None => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_llm::LlmResponse;
    use docqa_prompt::{load_builtin, DRAFT_PROMPT_ID};
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingLlm {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl LlmClient for RecordingLlm {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(LlmResponse::text(self.reply.clone(), request.model.clone()))
        }
    }

    fn agent(reply: &str) -> (DraftAgent, Arc<RecordingLlm>) {
        let llm = Arc::new(RecordingLlm {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let retry = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1));
        let agent = DraftAgent::new(
            llm.clone(),
            load_builtin(DRAFT_PROMPT_ID).unwrap(),
            GenerationSettings::default(),
            retry,
        );
        (agent, llm)
    }

    #[tokio::test]
    async fn test_empty_fragments_skip_model() {
        let (agent, llm) = agent("should not be used");

        let draft = agent.draft("What is HNSW?", &[]).await.unwrap();
        assert_eq!(draft, INSUFFICIENT_CONTEXT_ANSWER);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_contains_question_and_evidence() {
        let (agent, llm) = agent("  HNSW is a graph index.\n");
        let fragments =
            vec![RetrievedFragment::new("vec.pdf", "HNSW is a layered graph.", 0.9).with_page(2)];

        let draft = agent.draft("What is HNSW?", &fragments).await.unwrap();
        assert_eq!(draft, "HNSW is a graph index.");

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("What is HNSW?"));
        assert!(prompts[0].contains("Chunk 1 (page=2): HNSW is a layered graph."));
    }

    #[tokio::test]
    async fn test_blank_completion_exhausts_retries() {
        let (agent, llm) = agent("   ");
        let fragments = vec![RetrievedFragment::new("d", "text", 0.9)];

        let result = agent.draft("q", &fragments).await;
        assert!(matches!(result, Err(AppError::Generation(_))));
        assert_eq!(llm.prompts.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_to_request_carries_settings() {
        let built = BuiltPrompt::new(
            Some("system".to_string()),
            "user".to_string(),
            "qa.draft".to_string(),
            HashMap::new(),
        );
        let request = to_request(built, &GenerationSettings::default());

        assert_eq!(request.system.as_deref(), Some("system"));
        assert_eq!(request.max_tokens, Some(1000));
        assert_eq!(request.model, "llama3.2");
    }
}
