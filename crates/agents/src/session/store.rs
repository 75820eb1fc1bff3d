//! Process-wide session store.
//!
//! Sessions live in a sharded map so requests on different sessions never
//! contend. Within one session, turns are appended in the order their
//! requests were initiated: [`SessionStore::begin_turn`] hands out a
//! [`TurnTicket`] and [`TurnTicket::commit`] waits for every earlier ticket
//! on the same session to commit or be abandoned. The per-session mutex is
//! only held for the bookkeeping, never across agent calls.

use crate::config::SessionConfig;
use crate::session::types::{ConversationHistory, Session, SessionSummary, Turn};
use crate::verify::Verdict;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use docqa_core::{AppError, AppResult};
use docqa_knowledge::RetrievedFragment;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

struct SlotState {
    session: Session,
    /// Next ticket to hand out
    next_ticket: u64,
    /// Ticket allowed to commit now
    serving: u64,
    /// Tickets dropped without committing, not yet reached by `serving`
    abandoned: BTreeSet<u64>,
    /// Set once the slot has left the map
    removed: bool,
}

impl SlotState {
    fn is_idle(&self) -> bool {
        self.next_ticket == self.serving
    }

    fn advance(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }
}

struct SessionSlot {
    state: Mutex<SlotState>,
    committed: Notify,
}

impl SessionSlot {
    fn new(id: &str) -> Self {
        Self {
            state: Mutex::new(SlotState {
                session: Session::new(id),
                next_ticket: 0,
                serving: 0,
                abandoned: BTreeSet::new(),
                removed: false,
            }),
            committed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // bookkeeping never panics mid-update, so a poisoned guard is still consistent
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Maps session ids to sessions.
pub struct SessionStore {
    sessions: DashMap<String, Arc<SessionSlot>>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Create an empty session under a fresh id.
    pub fn create_session(&self) -> String {
        loop {
            let id = uuid::Uuid::new_v4().to_string();
            // the entry guard must be released before eviction walks the map
            let inserted = match self.sessions.entry(id.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(SessionSlot::new(&id)));
                    true
                }
                Entry::Occupied(_) => false,
            };

            if inserted {
                tracing::info!(session_id = %id, "Created session");
                self.enforce_capacity(&id);
                return id;
            }
        }
    }

    /// Start a turn on `session_id`, creating the session when the id is
    /// absent or unknown.
    ///
    /// The returned ticket carries the history window as of now; turns
    /// committed by earlier in-flight requests are not included.
    pub fn begin_turn(&self, session_id: Option<&str>) -> TurnTicket {
        let id = resolve_id(session_id);

        loop {
            let slot = self.get_or_create_slot(&id);
            let mut state = slot.lock();
            if state.removed {
                // evicted or deleted between lookup and lock
                continue;
            }

            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.session.touch();
            let history = state
                .session
                .recent_turns(self.config.history_window)
                .to_vec();
            drop(state);

            tracing::debug!(session_id = %id, ticket, history = history.len(), "Turn started");

            return TurnTicket {
                slot,
                session_id: id,
                ticket,
                history,
                finished: false,
            };
        }
    }

    /// Snapshot of the session under `session_id`, created when the id is
    /// absent or unknown.
    pub fn get_or_create(&self, session_id: Option<&str>) -> Session {
        let id = resolve_id(session_id);

        loop {
            let slot = self.get_or_create_slot(&id);
            let state = slot.lock();
            if !state.removed {
                return state.session.clone();
            }
        }
    }

    /// Full history of a session.
    ///
    /// # Errors
    /// `SessionNotFound` when the id is unknown.
    pub fn get_history(&self, session_id: &str) -> AppResult<ConversationHistory> {
        let slot = self.slot(session_id)?;
        let state = slot.lock();
        Ok(ConversationHistory::from(&state.session))
    }

    /// Drop every turn while keeping the session id.
    pub fn clear(&self, session_id: &str) -> AppResult<()> {
        let slot = self.slot(session_id)?;
        let mut state = slot.lock();
        state.session.turns.clear();
        state.session.touch();
        tracing::info!(session_id, "Cleared session history");
        Ok(())
    }

    /// Remove a session entirely.
    pub fn delete(&self, session_id: &str) -> AppResult<()> {
        let (_, slot) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;
        slot.lock().removed = true;
        tracing::info!(session_id, "Deleted session");
        Ok(())
    }

    /// All sessions, most recently active first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .snapshot()
            .iter()
            .map(|slot| SessionSummary::from(&slot.lock().session))
            .collect();
        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        summaries
    }

    /// Remove idle sessions with no activity for `max_age`. Returns how many
    /// were removed.
    pub fn cleanup_idle(&self, max_age: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().lock().session.last_activity < cutoff)
            .map(|entry| entry.key().clone())
            .collect();

        let removed = stale.iter().filter(|id| self.remove_if_idle(id)).count();
        if removed > 0 {
            tracing::info!("Removed {} idle sessions", removed);
        }
        removed
    }

    /// Remove idle sessions with no activity for the configured TTL.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_idle(self.config.idle_ttl)
    }

    fn slot(&self, session_id: &str) -> AppResult<Arc<SessionSlot>> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))
    }

    fn snapshot(&self) -> Vec<Arc<SessionSlot>> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    fn get_or_create_slot(&self, id: &str) -> Arc<SessionSlot> {
        let (slot, created) = self.get_or_insert(id);
        if created {
            tracing::info!(session_id = %id, "Created session");
            self.enforce_capacity(id);
        }
        slot
    }

    fn get_or_insert(&self, id: &str) -> (Arc<SessionSlot>, bool) {
        if let Some(entry) = self.sessions.get(id) {
            return (entry.value().clone(), false);
        }

        let mut created = false;
        let slot = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(SessionSlot::new(id))
            })
            .value()
            .clone();
        (slot, created)
    }

    fn remove_if_idle(&self, id: &str) -> bool {
        self.sessions
            .remove_if(id, |_, slot| {
                let mut state = slot.lock();
                if state.is_idle() {
                    state.removed = true;
                    true
                } else {
                    false
                }
            })
            .is_some()
    }

    /// Evict least recently active idle sessions until under the cap.
    /// `keep` is never evicted.
    fn enforce_capacity(&self, keep: &str) {
        let excess = self.sessions.len().saturating_sub(self.config.max_sessions);
        if excess == 0 {
            return;
        }

        let mut candidates: Vec<(String, chrono::DateTime<Utc>)> = self
            .sessions
            .iter()
            .filter(|entry| entry.key() != keep)
            .filter_map(|entry| {
                let state = entry.value().lock();
                state
                    .is_idle()
                    .then(|| (entry.key().clone(), state.session.last_activity))
            })
            .collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1));

        let evicted = candidates
            .iter()
            .filter(|(id, _)| self.remove_if_idle(id))
            .take(excess)
            .count();

        tracing::info!(
            evicted,
            max_sessions = self.config.max_sessions,
            "Session capacity reached"
        );
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

/// The right to append one turn to a session.
///
/// Tickets commit in issue order. Dropping a ticket without committing
/// abandons it: nothing is appended and later tickets are released.
pub struct TurnTicket {
    slot: Arc<SessionSlot>,
    session_id: String,
    ticket: u64,
    history: Vec<Turn>,
    finished: bool,
}

impl TurnTicket {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Prior turns visible to this request, oldest first.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Append the turn once every earlier ticket on the session is settled.
    pub async fn commit(
        mut self,
        question: &str,
        answer: &str,
        fragments: Vec<RetrievedFragment>,
        verdict: Option<Verdict>,
    ) -> Turn {
        let mut fragments = Some(fragments);

        loop {
            let notified = self.slot.committed.notified();
            tokio::pin!(notified);
            // register before checking so a commit in between is not missed
            notified.as_mut().enable();

            {
                let mut state = self.slot.lock();
                if state.serving == self.ticket {
                    let turn = Turn {
                        index: state.session.turns.len() + 1,
                        question: question.to_string(),
                        answer: answer.to_string(),
                        fragments: fragments.take().unwrap_or_default(),
                        verdict,
                        timestamp: Utc::now(),
                    };
                    state.session.turns.push(turn.clone());
                    state.session.touch();
                    state.advance();
                    self.finished = true;
                    drop(state);

                    self.slot.committed.notify_waiters();
                    tracing::debug!(session_id = %self.session_id, turn = turn.index, "Turn committed");
                    return turn;
                }
            }

            notified.await;
        }
    }
}

impl Drop for TurnTicket {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        {
            let mut state = self.slot.lock();
            if state.serving == self.ticket {
                state.advance();
            } else if state.serving < self.ticket {
                state.abandoned.insert(self.ticket);
            }
        }

        tracing::debug!(session_id = %self.session_id, ticket = self.ticket, "Turn abandoned");
        self.slot.committed.notify_waiters();
    }
}

/// Blank or absent ids get a fresh UUID.
fn resolve_id(session_id: Option<&str>) -> String {
    match session_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_sessions: usize) -> SessionStore {
        SessionStore::new(SessionConfig {
            history_window: 2,
            max_sessions,
            idle_ttl: Duration::from_secs(3600),
        })
    }

    async fn add_turn(store: &SessionStore, id: &str, question: &str) -> Turn {
        store
            .begin_turn(Some(id))
            .commit(question, "answer", Vec::new(), None)
            .await
    }

    #[tokio::test]
    async fn test_unknown_id_on_write_creates_session_with_that_id() {
        let store = store(10);
        let turn = add_turn(&store, "client-chosen", "q1").await;

        assert_eq!(turn.index, 1);
        assert!(store.contains("client-chosen"));
    }

    #[test]
    fn test_absent_or_blank_id_generates_fresh_session() {
        let store = store(10);
        let a = store.begin_turn(None);
        let b = store.begin_turn(Some("   "));

        assert_ne!(a.session_id(), b.session_id());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_get_history_unknown_session() {
        let store = store(10);
        assert!(matches!(
            store.get_history("missing"),
            Err(AppError::SessionNotFound(_))
        ));
        assert!(store.is_empty(), "read must not create a session");
    }

    #[tokio::test]
    async fn test_get_or_create_returns_existing_session() {
        let store = store(10);
        add_turn(&store, "known", "q1").await;

        let existing = store.get_or_create(Some("known"));
        assert_eq!(existing.id, "known");
        assert_eq!(existing.turns.len(), 1);

        let fresh = store.get_or_create(None);
        assert!(fresh.turns.is_empty());
        assert!(store.contains(&fresh.id));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_history_window_snapshot() {
        let store = store(10);
        for q in ["q1", "q2", "q3"] {
            add_turn(&store, "s", q).await;
        }

        let ticket = store.begin_turn(Some("s"));
        let questions: Vec<&str> = ticket.history().iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3"]);
    }

    #[tokio::test]
    async fn test_abandoned_ticket_releases_later_ones() {
        let store = store(10);
        let first = store.begin_turn(Some("s"));
        let second = store.begin_turn(Some("s"));

        drop(first);
        let turn = second.commit("q2", "a2", Vec::new(), None).await;

        assert_eq!(turn.index, 1);
        assert_eq!(store.get_history("s").unwrap().total_turns, 1);
    }

    #[tokio::test]
    async fn test_out_of_order_abandon_is_skipped() {
        let store = store(10);
        let first = store.begin_turn(Some("s"));
        let second = store.begin_turn(Some("s"));
        let third = store.begin_turn(Some("s"));

        drop(second);
        first.commit("q1", "a1", Vec::new(), None).await;
        let turn = third.commit("q3", "a3", Vec::new(), None).await;

        assert_eq!(turn.index, 2);
    }

    #[tokio::test]
    async fn test_clear_keeps_id_and_restarts_numbering() {
        let store = store(10);
        add_turn(&store, "s", "q1").await;
        add_turn(&store, "s", "q2").await;

        store.clear("s").unwrap();
        assert!(store.get_history("s").unwrap().turns.is_empty());

        let turn = add_turn(&store, "s", "q3").await;
        assert_eq!(turn.index, 1);
    }

    #[test]
    fn test_delete() {
        let store = store(10);
        let id = store.create_session();

        store.delete(&id).unwrap();
        assert!(!store.contains(&id));
        assert!(matches!(store.delete(&id), Err(AppError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent_idle() {
        let store = store(2);
        add_turn(&store, "oldest", "q").await;
        add_turn(&store, "newer", "q").await;

        let busy = store.begin_turn(Some("oldest"));
        store.create_session();

        // "oldest" has a turn in flight, so "newer" goes
        assert_eq!(store.len(), 2);
        assert!(store.contains("oldest"));
        assert!(!store.contains("newer"));
        drop(busy);
    }

    #[tokio::test]
    async fn test_list_orders_by_activity() {
        let store = store(10);
        add_turn(&store, "a", "q").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        add_turn(&store, "b", "q").await;

        let listed: Vec<String> = store.list().into_iter().map(|s| s.session_id).collect();
        assert_eq!(listed, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_idle() {
        let store = store(10);
        add_turn(&store, "a", "q").await;
        let busy = store.begin_turn(Some("b"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = store.cleanup_idle(Duration::from_millis(10));

        assert_eq!(removed, 1);
        assert!(!store.contains("a"));
        assert!(store.contains("b"), "sessions with turns in flight survive");
        drop(busy);

        assert_eq!(store.cleanup_idle(Duration::from_secs(3600)), 0);
    }
}
