//! Cross-encoder that re-scores (fact, passage) pairs after first-stage retrieval.

pub mod config;
mod cross_encoder;
mod device;
pub mod error;
mod tokenizer;


pub use config::{MAX_SEQ_LEN, RerankerConfig};
pub use error::RerankerError;

use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::text::{content_terms, term_jaccard};
use cross_encoder::CrossEncoder;

/// Cross-encoder model plus the tokenizer that builds its input pairs.
struct PairModel {
    encoder: CrossEncoder,
    tokenizer: Tokenizer,
}

/// Falls back to lexical overlap scoring when no model directory is configured.
pub struct Reranker {
    config: RerankerConfig,
    model: Option<PairModel>,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("config", &self.config)
            .field(
                "device",
                &self.model.as_ref().map(|m| format!("{:?}", m.encoder.device())),
            )
            .finish()
    }
}

impl Reranker {
    pub fn load(config: RerankerConfig) -> Result<Self, RerankerError> {
        config
            .validate()
            .map_err(|reason| RerankerError::InvalidConfig { reason })?;

        let Some(model_dir) = config.model_path.clone() else {
            info!("No reranker model configured, scoring by lexical overlap");
            return Ok(Self {
                config,
                model: None,
            });
        };

        for required in ["config.json", "model.safetensors", "tokenizer.json"] {
            if !model_dir.join(required).exists() {
                return Err(RerankerError::ModelLoadFailed {
                    reason: format!("missing {} in {}", required, model_dir.display()),
                });
            }
        }

        let device = device::select_device();
        debug!(?device, model_dir = %model_dir.display(), "Loading cross-encoder");
        let encoder = CrossEncoder::load(&model_dir, device)?;
        let tokenizer = tokenizer::load_pair_tokenizer(&model_dir, config.max_seq_len)?;
        info!(model_dir = %model_dir.display(), "Cross-encoder loaded");

        Ok(Self {
            config,
            model: Some(PairModel { encoder, tokenizer }),
        })
    }

    pub fn stub() -> Result<Self, RerankerError> {
        Self::load(RerankerConfig::stub())
    }

    /// Relevance of `candidate` to `query` in `0.0..=1.0`.
    pub fn score(&self, query: &str, candidate: &str) -> Result<f32, RerankerError> {
        let Some(model) = &self.model else {
            return Ok(lexical_score(query, candidate));
        };

        let pair = model
            .tokenizer
            .encode((query, candidate), true)
            .map_err(|e| RerankerError::TokenizationFailed {
                reason: e.to_string(),
            })?;
        let logit = model.encoder.logit(&pair)?;

        Ok(sigmoid(logit))
    }

    /// Scores every candidate and returns `(index, score)` pairs, best first.
    pub fn rerank(
        &self,
        query: &str,
        candidates: &[&str],
    ) -> Result<Vec<(usize, f32)>, RerankerError> {
        let mut scored: Vec<(usize, f32)> = candidates
            .iter()
            .enumerate()
            .map(|(idx, candidate)| Ok((idx, self.score(query, candidate)?)))
            .collect::<Result<Vec<_>, RerankerError>>()?;

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        debug!(
            candidates = candidates.len(),
            top_score = scored.first().map(|(_, s)| *s),
            model_loaded = self.is_model_loaded(),
            "Reranked candidates"
        );

        Ok(scored)
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn config(&self) -> &RerankerConfig {
        &self.config
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Recall-weighted term overlap squashed through a logistic curve.
fn lexical_score(query: &str, candidate: &str) -> f32 {
    let query_terms = content_terms(query);
    if query_terms.is_empty() {
        return 0.0;
    }
    let candidate_terms = content_terms(candidate);

    let matches = query_terms.intersection(&candidate_terms).count();
    let recall = matches as f32 / query_terms.len() as f32;
    let base = 0.6 * recall + 0.4 * term_jaccard(&query_terms, &candidate_terms);

    sigmoid(8.0 * (base - 0.5)).clamp(0.0, 1.0)
}
