//! Session records.

use crate::verify::Verdict;
use chrono::{DateTime, Utc};
use docqa_knowledge::RetrievedFragment;
use serde::{Deserialize, Serialize};

/// One recorded question/answer exchange. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// 1-based, contiguous within a session
    pub index: usize,
    pub question: String,
    pub answer: String,
    /// Fragments the answer was produced from
    pub fragments: Vec<RetrievedFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    pub timestamp: DateTime<Utc>,
}

/// A conversation scope. Owned by the session store.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// The most recent `n` turns, oldest first.
    pub fn recent_turns(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }
}

/// Full turn history of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationHistory {
    pub session_id: String,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub total_turns: usize,
}

/// Listing entry for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl From<&Session> for ConversationHistory {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            turns: session.turns.clone(),
            created_at: session.created_at,
            total_turns: session.turns.len(),
        }
    }
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            turn_count: session.turns.len(),
            created_at: session.created_at,
            last_activity: session.last_activity,
        }
    }
}
