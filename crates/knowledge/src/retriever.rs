//! Context retrieval: query a search index and shape the evidence.

use crate::search_index::SearchIndex;
use crate::types::RetrievedFragment;
use docqa_core::config::RetrievalSettings;
use docqa_core::{AppError, AppResult};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Minimum cosine similarity score for a fragment to be considered relevant.
pub const MIN_RELEVANCE_SCORE: f32 = 0.20;

/// Maximum snippet length for display.
pub const MAX_SNIPPET_LENGTH: usize = 150;

/// Retriever tuning.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Default number of fragments to request
    pub top_k: usize,

    /// Fragments scoring below this are dropped
    pub min_score: f32,

    /// Budget for one index query
    pub timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_score: MIN_RELEVANCE_SCORE,
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetrieverConfig {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            top_k: settings.top_k,
            min_score: settings.min_score,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// Fetches scored fragments for a query from a [`SearchIndex`].
#[derive(Clone)]
pub struct ContextRetriever {
    index: Arc<dyn SearchIndex>,
    config: RetrieverConfig,
}

impl ContextRetriever {
    pub fn new(index: Arc<dyn SearchIndex>, config: RetrieverConfig) -> Self {
        Self { index, config }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Retrieve at most `k` fragments ordered by descending score.
    ///
    /// Zero matches is not an error: the result is simply empty.
    ///
    /// # Errors
    /// `InvalidInput` when `k` is zero; `Retrieval` when the index fails or
    /// does not answer within the configured timeout.
    pub async fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<RetrievedFragment>> {
        if k == 0 {
            return Err(AppError::InvalidInput(
                "k must be a positive integer".to_string(),
            ));
        }

        let search = self.index.search(query, k);
        let results = match tokio::time::timeout(self.config.timeout, search).await {
            Ok(Ok(results)) => results,
            Ok(Err(AppError::Retrieval(msg))) => return Err(AppError::Retrieval(msg)),
            Ok(Err(e)) => {
                return Err(AppError::Retrieval(format!(
                    "{} index query failed: {}",
                    self.index.backend_name(),
                    e
                )))
            }
            Err(_) => {
                return Err(AppError::Retrieval(format!(
                    "{} index did not respond within {:.1}s",
                    self.index.backend_name(),
                    self.config.timeout.as_secs_f64()
                )))
            }
        };

        tracing::debug!("Retrieved {} fragments before filtering", results.len());

        let mut fragments: Vec<RetrievedFragment> = results
            .into_iter()
            .filter(|fragment| fragment.score >= self.config.min_score)
            .collect();

        fragments.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        fragments.truncate(k);

        match fragments.first() {
            Some(top) => tracing::info!(
                "Retrieved {} relevant fragments (top score: {:.3})",
                fragments.len(),
                top.score
            ),
            None => tracing::info!(
                "No relevant fragments found (all scores below {:.2} threshold)",
                self.config.min_score
            ),
        }

        Ok(fragments)
    }
}

/// Render fragments as the evidence block shown to the agents.
///
/// Format: `Chunk 1 (page=3): ...` blocks separated by blank lines.
pub fn serialize_fragments(fragments: &[RetrievedFragment]) -> String {
    fragments
        .iter()
        .enumerate()
        .map(|(i, fragment)| {
            let page = fragment
                .page
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            format!("Chunk {} (page={}): {}", i + 1, page, fragment.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Truncate snippet to at most `max_len` bytes, breaking on a word boundary.
pub fn truncate_snippet(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    let truncated = &text[..end];
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) => format!("{}...", &truncated[..last_space]),
        None => format!("{}...", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedIndex(Vec<RetrievedFragment>);

    #[async_trait::async_trait]
    impl SearchIndex for FixedIndex {
        fn backend_name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, _text: &str, _top_k: usize) -> AppResult<Vec<RetrievedFragment>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenIndex;

    #[async_trait::async_trait]
    impl SearchIndex for BrokenIndex {
        fn backend_name(&self) -> &str {
            "broken"
        }

        async fn search(&self, _text: &str, _top_k: usize) -> AppResult<Vec<RetrievedFragment>> {
            Err(AppError::Knowledge("connection refused".to_string()))
        }
    }

    struct SlowIndex;

    #[async_trait::async_trait]
    impl SearchIndex for SlowIndex {
        fn backend_name(&self) -> &str {
            "slow"
        }

        async fn search(&self, _text: &str, _top_k: usize) -> AppResult<Vec<RetrievedFragment>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    fn retriever(index: impl SearchIndex + 'static) -> ContextRetriever {
        ContextRetriever::new(Arc::new(index), RetrieverConfig::default())
    }

    #[tokio::test]
    async fn test_sorts_filters_and_truncates() {
        let retriever = retriever(FixedIndex(vec![
            RetrievedFragment::new("d", "low", 0.05),
            RetrievedFragment::new("d", "mid", 0.50),
            RetrievedFragment::new("d", "top", 0.90),
            RetrievedFragment::new("d", "ok", 0.30),
        ]));

        let fragments = retriever.retrieve("q", 2).await.unwrap();
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["top", "mid"]);
    }

    #[tokio::test]
    async fn test_zero_matches_is_empty_not_error() {
        let retriever = retriever(FixedIndex(vec![RetrievedFragment::new("d", "noise", 0.01)]));
        assert!(retriever.retrieve("q", 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_k_rejected() {
        let retriever = retriever(FixedIndex(Vec::new()));
        assert!(matches!(
            retriever.retrieve("q", 0).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_index_failure_becomes_retrieval_error() {
        let retriever = retriever(BrokenIndex);
        match retriever.retrieve("q", 4).await {
            Err(AppError::Retrieval(msg)) => assert!(msg.contains("connection refused")),
            other => panic!("expected retrieval error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_retrieval_error() {
        let config = RetrieverConfig {
            timeout: Duration::from_millis(50),
            ..RetrieverConfig::default()
        };
        let retriever = ContextRetriever::new(Arc::new(SlowIndex), config);
        assert!(matches!(
            retriever.retrieve("q", 4).await,
            Err(AppError::Retrieval(_))
        ));
    }

    #[test]
    fn test_serialize_fragments() {
        let fragments = vec![
            RetrievedFragment::new("a", "First chunk", 0.9).with_page(3),
            RetrievedFragment::new("a", "Second chunk\n", 0.8),
        ];

        assert_eq!(
            serialize_fragments(&fragments),
            "Chunk 1 (page=3): First chunk\n\nChunk 2 (page=unknown): Second chunk"
        );
        assert_eq!(serialize_fragments(&[]), "");
    }

    #[test]
    fn test_truncate_snippet() {
        assert_eq!(truncate_snippet("Short text", 100), "Short text");

        let long = "This is a very long text that needs to be truncated at some point";
        let result = truncate_snippet(long, 30);
        assert!(result.len() <= 33);
        assert!(result.ends_with("..."));

        // must not split a multi-byte character
        let accented = "ééééééééééé";
        assert!(truncate_snippet(accented, 5).ends_with("..."));
    }
}
