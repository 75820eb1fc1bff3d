//! Pipeline state machine.
//!
//! Valid transitions:
//! 1. Retrieving → Drafting   (fragments retrieved, possibly none)
//! 2. Retrieving → Failed     (index unreachable or timed out)
//! 3. Drafting   → Verifying  (verification required)
//! 4. Drafting   → Done       (verification bypassed)
//! 5. Drafting   → Failed     (generation retries exhausted)
//! 6. Verifying  → Done
//! 7. Verifying  → Failed
//!
//! `Done` and `Failed` are terminal.

use crate::verify::Verdict;
use docqa_core::AppError;
use docqa_knowledge::RetrievedFragment;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a completed pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub final_answer: String,

    /// Exactly the fragments the answer was produced from
    pub fragments_used: Vec<RetrievedFragment>,

    /// `None` when verification was bypassed
    pub verdict: Option<Verdict>,

    pub draft_answer: String,

    /// States visited, in order
    pub stages: Vec<Stage>,
}

/// Typed per-state payloads for one question-answering invocation.
#[derive(Debug)]
pub enum PipelineState {
    Retrieving {
        query: String,
    },
    Drafting {
        query: String,
        fragments: Vec<RetrievedFragment>,
    },
    Verifying {
        query: String,
        fragments: Vec<RetrievedFragment>,
        draft: String,
    },
    Done(PipelineResult),
    Failed(AppError),
}

/// Payload-free discriminant of [`PipelineState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Retrieving,
    Drafting,
    Verifying,
    Done,
    Failed,
}

impl PipelineState {
    pub fn start(query: impl Into<String>) -> Self {
        PipelineState::Retrieving {
            query: query.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineState::Retrieving { .. } => Stage::Retrieving,
            PipelineState::Drafting { .. } => Stage::Drafting,
            PipelineState::Verifying { .. } => Stage::Verifying,
            PipelineState::Done(_) => Stage::Done,
            PipelineState::Failed(_) => Stage::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage().is_terminal()
    }
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Whether `self → next` is an edge of the machine.
    pub fn can_transition_to(&self, next: Stage) -> bool {
        use Stage::*;

        matches!(
            (self, next),
            (Retrieving, Drafting)
                | (Retrieving, Failed)
                | (Drafting, Verifying)
                | (Drafting, Done)
                | (Drafting, Failed)
                | (Verifying, Done)
                | (Verifying, Failed)
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Retrieving => "Retrieving",
            Stage::Drafting => "Drafting",
            Stage::Verifying => "Verifying",
            Stage::Done => "Done",
            Stage::Failed => "Failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(Stage::Retrieving.can_transition_to(Stage::Drafting));
        assert!(Stage::Drafting.can_transition_to(Stage::Verifying));
        assert!(Stage::Drafting.can_transition_to(Stage::Done));
        assert!(Stage::Verifying.can_transition_to(Stage::Done));
        assert!(Stage::Verifying.can_transition_to(Stage::Failed));
    }

    #[test]
    fn test_no_skipping_or_leaving_terminal_states() {
        assert!(!Stage::Retrieving.can_transition_to(Stage::Verifying));
        assert!(!Stage::Retrieving.can_transition_to(Stage::Done));
        assert!(!Stage::Done.can_transition_to(Stage::Retrieving));
        assert!(!Stage::Failed.can_transition_to(Stage::Drafting));
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Failed(AppError::Other("x".to_string())).is_terminal());
        assert!(!PipelineState::start("q").is_terminal());
        assert_eq!(PipelineState::start("q").stage(), Stage::Retrieving);
    }
}
