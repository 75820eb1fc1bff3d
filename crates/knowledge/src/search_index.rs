//! Search index abstraction for document fragments.
//!
//! The retriever only ever sees this trait; concrete backends are swappable.

use crate::types::RetrievedFragment;
use docqa_core::AppResult;

/// Nearest-neighbour store queried by text.
///
/// Implementations must be idempotent for a given query and must not mutate
/// their contents while searching.
#[async_trait::async_trait]
pub trait SearchIndex: Send + Sync {
    /// Backend identifier for logging.
    fn backend_name(&self) -> &str;

    /// Return up to `top_k` fragments most similar to `text`.
    ///
    /// Ordering is not required; the retriever sorts by score.
    async fn search(&self, text: &str, top_k: usize) -> AppResult<Vec<RetrievedFragment>>;
}
