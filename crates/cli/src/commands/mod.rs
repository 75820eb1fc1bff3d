//! Command handlers for the DocQA CLI.

pub mod ask;
pub mod chat;
pub mod search;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use search::SearchCommand;

use docqa_knowledge::{truncate_snippet, RetrievedFragment, MAX_SNIPPET_LENGTH};

/// One line per fragment: rank, score, source and a short snippet.
pub(crate) fn format_sources(fragments: &[RetrievedFragment]) -> String {
    fragments
        .iter()
        .enumerate()
        .map(|(i, fragment)| {
            let mut source = fragment.document_id.clone();
            if let Some(page) = fragment.page {
                source.push_str(&format!(", page {}", page));
            }
            if let Some(location) = &fragment.location {
                source.push_str(&format!(", {}", location));
            }
            format!(
                "  {}. [{:.2}] {}: {}",
                i + 1,
                fragment.score,
                source,
                truncate_snippet(fragment.text.trim(), MAX_SNIPPET_LENGTH)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
