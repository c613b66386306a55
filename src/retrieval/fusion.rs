//! Weighted fusion of semantic and lexical hits: `score = ws * norm(sem) + wl * norm(lex)`.
//!
//! Each list is min-max normalised first because cosine similarities and term
//! overlap live on different scales. A chunk missing from one list contributes 0
//! for that side.

use std::collections::HashMap;

use crate::store::{ScoredChunk, sort_by_score};

/// Rescales scores into `0.0..=1.0`. A list whose scores are all equal maps to 1.0.
pub fn min_max_normalize(chunks: &mut [ScoredChunk]) {
    let (min, max) = chunks
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), c| {
            (lo.min(c.score), hi.max(c.score))
        });

    let range = max - min;
    for chunk in chunks.iter_mut() {
        chunk.score = if range > f32::EPSILON {
            (chunk.score - min) / range
        } else {
            1.0
        };
    }
}

/// Fuses both lists keyed by chunk id, best first.
pub fn fuse_weighted(
    mut semantic: Vec<ScoredChunk>,
    mut lexical: Vec<ScoredChunk>,
    semantic_weight: f32,
    lexical_weight: f32,
) -> Vec<ScoredChunk> {
    min_max_normalize(&mut semantic);
    min_max_normalize(&mut lexical);

    let mut fused: HashMap<String, ScoredChunk> = HashMap::with_capacity(semantic.len());

    for mut chunk in semantic {
        chunk.score *= semantic_weight;
        fused.insert(chunk.chunk_id.clone(), chunk);
    }

    for chunk in lexical {
        let contribution = chunk.score * lexical_weight;
        fused
            .entry(chunk.chunk_id.clone())
            .and_modify(|existing| existing.score += contribution)
            .or_insert(ScoredChunk {
                score: contribution,
                ..chunk
            });
    }

    let mut candidates: Vec<ScoredChunk> = fused.into_values().collect();
    sort_by_score(&mut candidates);
    candidates
}
