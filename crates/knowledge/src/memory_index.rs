//! In-process search index over a pre-chunked corpus.

use crate::embedding::{cosine_similarity, embed_text, EMBEDDING_DIM};
use crate::search_index::SearchIndex;
use crate::types::{CorpusRecord, RetrievedFragment};
use docqa_core::{AppError, AppResult};
use std::cmp::Ordering;
use std::path::Path;

struct IndexedRecord {
    record: CorpusRecord,
    embedding: Vec<f32>,
}

/// Trigram-embedding index held entirely in memory.
///
/// Records are embedded once at load time; queries are ranked by cosine
/// similarity against every record.
pub struct MemoryIndex {
    records: Vec<IndexedRecord>,
    dimensions: usize,
}

impl MemoryIndex {
    /// Build an index from corpus records.
    pub fn from_records(records: impl IntoIterator<Item = CorpusRecord>) -> Self {
        Self::with_dimensions(records, EMBEDDING_DIM)
    }

    /// Build an index with a custom embedding dimension.
    pub fn with_dimensions(
        records: impl IntoIterator<Item = CorpusRecord>,
        dimensions: usize,
    ) -> Self {
        let records = records
            .into_iter()
            .map(|record| IndexedRecord {
                embedding: embed_text(&record.text, dimensions),
                record,
            })
            .collect();

        Self {
            records,
            dimensions,
        }
    }

    /// Load a JSONL corpus: one `{"documentId", "text", "page"?, "location"?}`
    /// object per line. Blank lines are skipped.
    pub fn from_jsonl(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Knowledge(format!("Failed to read corpus {:?}: {}", path, e))
        })?;

        let mut records = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let record: CorpusRecord = serde_json::from_str(line).map_err(|e| {
                AppError::Knowledge(format!(
                    "Invalid corpus record at {:?}:{}: {}",
                    path,
                    line_no + 1,
                    e
                ))
            })?;
            records.push(record);
        }

        tracing::info!("Loaded {} corpus records from {:?}", records.len(), path);
        Ok(Self::from_records(records))
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn rank(&self, text: &str, top_k: usize) -> Vec<RetrievedFragment> {
        let query = embed_text(text, self.dimensions);

        let mut scored: Vec<(&IndexedRecord, f32)> = self
            .records
            .iter()
            .map(|indexed| (indexed, cosine_similarity(&query, &indexed.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(indexed, score)| RetrievedFragment {
                document_id: indexed.record.document_id.clone(),
                text: indexed.record.text.clone(),
                score,
                page: indexed.record.page,
                location: indexed.record.location.clone(),
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SearchIndex for MemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn search(&self, text: &str, top_k: usize) -> AppResult<Vec<RetrievedFragment>> {
        let results = self.rank(text, top_k);

        if !results.is_empty() {
            let scores: Vec<f32> = results.iter().map(|f| f.score).collect();
            tracing::debug!("Memory index scores: {:?}", scores);
        }

        Ok(results)
    }
}
