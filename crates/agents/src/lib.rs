//! Multi-agent document question answering.
//!
//! A question flows through an [`AgentPipeline`]: the context retriever
//! fetches evidence, the [`DraftAgent`] writes a candidate answer and the
//! [`VerifyAgent`] grades it against the same evidence. [`QaService`] adds
//! session-scoped conversation history on top.

pub mod config;
pub mod draft;
pub mod pipeline;
pub mod retry;
pub mod service;
pub mod session;
pub mod verify;

#[cfg(test)]
mod tests;

pub use config::{GenerationSettings, PipelineConfig, SessionConfig};
pub use docqa_knowledge::RetrieverConfig;
pub use draft::{DraftAgent, INSUFFICIENT_CONTEXT_ANSWER};
pub use pipeline::{AgentPipeline, PipelineResult, PipelineState, RunOptions, Stage};
pub use retry::RetryPolicy;
pub use service::{ConversationalAnswer, QaService, SingleShotAnswer};
pub use session::{
    assemble_query, ConversationHistory, Session, SessionStore, SessionSummary, Turn, TurnTicket,
};
pub use verify::{Verdict, Verification, VerifyAgent, CANONICAL_REFUSAL};
