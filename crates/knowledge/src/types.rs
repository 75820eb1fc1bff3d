//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};

/// A scored span of source text returned by a search index.
///
/// Produced fresh for every query and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedFragment {
    /// Originating document identifier
    pub document_id: String,

    /// Fragment text
    pub text: String,

    /// Relevance score (cosine similarity, higher is better)
    pub score: f32,

    /// Page number within the source document, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Human-readable location (e.g. "section 2.1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl RetrievedFragment {
    /// Create a fragment without page or location metadata.
    pub fn new(document_id: impl Into<String>, text: impl Into<String>, score: f32) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
            score,
            page: None,
            location: None,
        }
    }

    /// Attach a page number.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Attach a location label.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// One line of a pre-chunked JSONL corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusRecord {
    /// Originating document identifier
    pub document_id: String,

    /// Chunk text
    pub text: String,

    /// Page number, if the source had pages
    #[serde(default)]
    pub page: Option<u32>,

    /// Location label
    #[serde(default)]
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_serialization_uses_camel_case() {
        let fragment = RetrievedFragment::new("manual.pdf", "HNSW builds a layered graph.", 0.82)
            .with_page(4);

        let json = serde_json::to_value(&fragment).unwrap();
        assert_eq!(json["documentId"], "manual.pdf");
        assert_eq!(json["page"], 4);
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_corpus_record_optional_fields() {
        let record: CorpusRecord =
            serde_json::from_str(r#"{"documentId":"a.pdf","text":"hello"}"#).unwrap();
        assert_eq!(record.document_id, "a.pdf");
        assert!(record.page.is_none());
        assert!(record.location.is_none());
    }
}
