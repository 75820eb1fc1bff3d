//! Builds the query sent into the pipeline from prior turns.

use crate::session::types::Turn;

/// Prefix `question` with a labeled transcript of at most `window` of the
/// most recent turns in `history`.
///
/// With no prior turns (or a zero window) the question is returned unchanged.
pub fn assemble_query(history: &[Turn], window: usize, question: &str) -> String {
    let window = &history[history.len().saturating_sub(window)..];
    if window.is_empty() {
        return question.to_string();
    }

    let mut query = String::from("Conversation so far:\n");
    for turn in window {
        query.push_str(&format!(
            "Turn {}:\nQ: {}\nA: {}\n\n",
            turn.index,
            turn.question.trim(),
            turn.answer.trim()
        ));
    }
    query.push_str("Current question: ");
    query.push_str(question);
    query
}
