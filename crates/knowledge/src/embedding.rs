//! Deterministic character-trigram embeddings.
//!
//! Not semantically accurate like a neural embedding model, but content
//! dependent and stable across runs, which is enough to rank a local corpus
//! offline.

use std::collections::{HashMap, HashSet};

/// Embedding vector dimension.
pub const EMBEDDING_DIM: usize = 384;

const STOP_WORDS: [&str; 32] = [
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Embed `text` into a unit vector of `dimensions` components.
///
/// Text without any indexable words yields the zero vector.
pub fn embed_text(text: &str, dimensions: usize) -> Vec<f32> {
    let mut embedding = vec![0.0; dimensions];
    if dimensions == 0 {
        return embedding;
    }

    let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let lower = text.to_lowercase();

    let mut word_freq: HashMap<&str, u32> = HashMap::new();
    for word in lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2 && !stop_words.contains(w))
    {
        *word_freq.entry(word).or_insert(0) += 1;
    }

    for (word, freq) in &word_freq {
        let chars: Vec<char> = word.chars().collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            let trigram_hash = trigram
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(37).wrapping_add(b as u64));

            // sqrt damping keeps repeated words from dominating
            embedding[(trigram_hash as usize) % dimensions] += (*freq as f32).sqrt();
        }

        let word_hash = word
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        embedding[(word_hash as usize) % dimensions] += *freq as f32;
    }

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut embedding {
            *v /= norm;
        }
    }

    embedding
}

/// Calculate cosine similarity between two vectors.
///
/// Mismatched lengths and zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_embedding_is_unit_length() {
        let embedding = embed_text("Hierarchical navigable small world graphs", EMBEDDING_DIM);
        assert_eq!(embedding.len(), EMBEDDING_DIM);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_embedding_is_deterministic() {
        let text = "deterministic test";
        assert_eq!(embed_text(text, EMBEDDING_DIM), embed_text(text, EMBEDDING_DIM));
    }

    #[test]
    fn test_stop_words_only_yields_zero_vector() {
        let embedding = embed_text("the and of it", EMBEDDING_DIM);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_utf8_safety() {
        let text = "Gamedex é um aplicativo 🎮 brasileiro para gerenciar jogos!";
        let embedding = embed_text(text, EMBEDDING_DIM);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_related_text_scores_higher() {
        let query = embed_text("What is HNSW indexing?", EMBEDDING_DIM);
        let related = embed_text("HNSW indexing builds a layered proximity graph.", EMBEDDING_DIM);
        let unrelated = embed_text("Bake the bread at 220 degrees.", EMBEDDING_DIM);

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0];
        let d = vec![0.0, 1.0];
        assert!(cosine_similarity(&c, &d).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &c), 0.0);
    }
}
