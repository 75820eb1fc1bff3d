//! Agent pipeline: retrieval → draft → verification.

pub mod state;

pub use state::{PipelineResult, PipelineState, Stage};

use crate::draft::DraftAgent;
use crate::verify::{VerifyAgent, CANONICAL_REFUSAL};
use docqa_core::AppResult;
use docqa_knowledge::ContextRetriever;
use tracing::Instrument;

/// Per-run options.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Fragments to retrieve
    pub k: usize,
    pub require_verification: bool,
}

/// Sequences the agents for one question at a time.
///
/// Holds no per-run state; concurrent runs share one pipeline.
pub struct AgentPipeline {
    retriever: ContextRetriever,
    drafter: DraftAgent,
    verifier: VerifyAgent,
}

impl AgentPipeline {
    pub fn new(retriever: ContextRetriever, drafter: DraftAgent, verifier: VerifyAgent) -> Self {
        Self {
            retriever,
            drafter,
            verifier,
        }
    }

    pub fn retriever(&self) -> &ContextRetriever {
        &self.retriever
    }

    /// Run the machine to completion.
    ///
    /// Returns a complete result or the error that moved the machine to
    /// `Failed`; never a partial result.
    pub async fn run(
        &self,
        query: &str,
        k: usize,
        require_verification: bool,
    ) -> AppResult<PipelineResult> {
        let options = RunOptions {
            k,
            require_verification,
        };
        let span = tracing::info_span!("pipeline", k, require_verification);

        async move {
            let mut state = PipelineState::start(query);
            let mut stages = vec![state.stage()];

            while !state.is_terminal() {
                state = self.step(state, options).await;
                stages.push(state.stage());
            }

            match state {
                PipelineState::Done(mut result) => {
                    result.stages = stages;
                    tracing::info!(
                        verdict = ?result.verdict,
                        fragments = result.fragments_used.len(),
                        "Pipeline done"
                    );
                    Ok(result)
                }
                PipelineState::Failed(error) => {
                    tracing::warn!(?stages, "Pipeline failed: {}", error);
                    Err(error)
                }
                // loop only exits on a terminal state
                other => Err(docqa_core::AppError::Other(format!(
                    "Pipeline stopped in non-terminal state {}",
                    other.stage()
                ))),
            }
        }
        .instrument(span)
        .await
    }

    /// Perform exactly one transition. Terminal states are returned as is.
    pub async fn step(&self, state: PipelineState, options: RunOptions) -> PipelineState {
        match state {
            PipelineState::Retrieving { query } => {
                tracing::info!("Retrieving context");
                match self.retriever.retrieve(&query, options.k).await {
                    Ok(fragments) => PipelineState::Drafting { query, fragments },
                    Err(e) => PipelineState::Failed(e),
                }
            }

            PipelineState::Drafting { query, fragments } => {
                tracing::info!(fragments = fragments.len(), "Drafting answer");
                let draft = match self.drafter.draft(&query, &fragments).await {
                    Ok(draft) => draft,
                    Err(e) => return PipelineState::Failed(e),
                };

                if options.require_verification {
                    return PipelineState::Verifying {
                        query,
                        fragments,
                        draft,
                    };
                }

                // Bypass mode: the draft is final unless there was no evidence
                let final_answer = if fragments.is_empty() {
                    CANONICAL_REFUSAL.to_string()
                } else {
                    draft.clone()
                };

                PipelineState::Done(PipelineResult {
                    final_answer,
                    fragments_used: fragments,
                    verdict: None,
                    draft_answer: draft,
                    stages: Vec::new(),
                })
            }

            PipelineState::Verifying {
                query,
                fragments,
                draft,
            } => {
                tracing::info!("Verifying draft");
                match self.verifier.verify(&query, &draft, &fragments).await {
                    Ok(verification) => PipelineState::Done(PipelineResult {
                        final_answer: verification.final_answer,
                        fragments_used: fragments,
                        verdict: Some(verification.verdict),
                        draft_answer: draft,
                        stages: Vec::new(),
                    }),
                    Err(e) => PipelineState::Failed(e),
                }
            }

            terminal @ (PipelineState::Done(_) | PipelineState::Failed(_)) => terminal,
        }
    }
}
