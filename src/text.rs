//! Term extraction shared by lexical search and the stub reranker.

use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "through",
    "during", "before", "after", "above", "below", "between", "under", "then", "once", "here",
    "there", "when", "where", "why", "how", "all", "each", "more", "most", "other", "some",
    "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "and", "but",
    "if", "or", "because", "until", "while", "what", "which", "who", "whom", "this", "that",
    "these", "those", "it", "its", "their", "they",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercased alphanumeric terms of `text`, stop words removed.
pub fn content_terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1 && !is_stop_word(w))
        .map(str::to_string)
        .collect()
}

/// Fraction of `query_terms` present in `candidate` (0.0 for an empty query).
pub fn term_recall(query_terms: &HashSet<String>, candidate: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let candidate_terms = content_terms(candidate);
    let matches = query_terms.intersection(&candidate_terms).count();
    matches as f32 / query_terms.len() as f32
}

/// Jaccard overlap of the two term sets.
pub fn term_jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
