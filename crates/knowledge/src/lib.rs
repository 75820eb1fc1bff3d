//! Context retrieval for DocQA.
//!
//! A [`ContextRetriever`] queries a [`SearchIndex`] and returns scored
//! fragments ordered by relevance. [`MemoryIndex`] is the bundled backend: a
//! trigram-embedding index over a pre-chunked JSONL corpus.

pub mod embedding;
pub mod memory_index;
pub mod retriever;
pub mod search_index;
pub mod types;


pub use memory_index::MemoryIndex;
pub use retriever::{
    serialize_fragments, truncate_snippet, ContextRetriever, RetrieverConfig,
    MAX_SNIPPET_LENGTH, MIN_RELEVANCE_SCORE,
};
pub use search_index::SearchIndex;
pub use types::{CorpusRecord, RetrievedFragment};
