//! LLM judge: turns a fact and its evidence into a validated-shape [`Assessment`].
//!
//! One model call per attempt. Replies that break the verdict schema are retried a
//! fixed number of times with the bad reply and a correction appended to the
//! conversation. Backend outages are surfaced as [`JudgeError::ModelUnavailable`]
//! and left to the caller's retry policy.

mod backend;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
pub mod parse;
pub mod prompt;


pub use backend::{GenaiBackend, ModelBackend, ModelRequest, Role, Turn};
pub use error::{BackendError, JudgeError};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockModelBackend;
pub use parse::{SchemaViolation, Verdict, parse_verdict};

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::assessment::{Assessment, Confidence};
use crate::catalog::Fact;
use crate::constants::{
    DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MAX_PASSAGE_CHARS, DEFAULT_SCHEMA_RETRIES, MIN_SCORE,
};
use crate::retrieval::EvidencePassage;
use crate::retry::RetryPolicy;

/// Summary recorded when retrieval found nothing for a fact.
pub const NO_EVIDENCE_SUMMARY: &str = "No relevant literature was retrieved for this fact.";
/// Model id recorded on assessments produced without calling the model.
pub const NO_EVIDENCE_MODEL: &str = "none";

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub max_context_chars: usize,
    pub max_passage_chars: usize,
    /// Extra attempts after a schema violation.
    pub schema_retries: u32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            max_passage_chars: DEFAULT_MAX_PASSAGE_CHARS,
            schema_retries: DEFAULT_SCHEMA_RETRIES,
        }
    }
}

/// Anything that can assess a fact against its evidence.
pub trait Assessor: Send + Sync {
    fn assess(
        &self,
        fact: &Fact,
        evidence: &[EvidencePassage],
    ) -> impl Future<Output = Result<Assessment, JudgeError>> + Send;
}

#[derive(Clone)]
pub struct Judge {
    backend: Arc<dyn ModelBackend>,
    config: JudgeConfig,
}

impl std::fmt::Debug for Judge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Judge")
            .field("model", &self.backend.model_id())
            .field("config", &self.config)
            .finish()
    }
}

impl Judge {
    pub fn new(backend: Arc<dyn ModelBackend>, config: JudgeConfig) -> Self {
        Self { backend, config }
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    #[instrument(skip_all, fields(fact_id = fact.id, passages = evidence.len()))]
    pub async fn assess(
        &self,
        fact: &Fact,
        evidence: &[EvidencePassage],
    ) -> Result<Assessment, JudgeError> {
        if evidence.is_empty() {
            info!("No evidence retrieved, recording minimum score");
            return Ok(no_evidence_assessment(fact));
        }

        let (user_prompt, included) = prompt::build_user_prompt(
            fact,
            evidence,
            self.config.max_passage_chars,
            self.config.max_context_chars,
        );
        debug!(included, prompt_chars = user_prompt.len(), "Built assessment prompt");

        let last_rejected: Mutex<Option<SchemaViolation>> = Mutex::new(None);
        let rejected = &last_rejected;
        let policy = RetryPolicy::immediate(self.config.schema_retries.saturating_add(1));

        let verdict = policy
            .run_if(
                "judge_schema",
                |e: &JudgeError| matches!(e, JudgeError::Schema { .. }),
                move |_| {
                    let mut turns = vec![Turn::user(user_prompt.clone())];
                    if let Some(previous) = rejected.lock().as_ref() {
                        turns.push(Turn::assistant(previous.raw.clone()));
                        turns.push(Turn::user(prompt::correction_prompt(&previous.reason)));
                    }
                    let request = ModelRequest {
                        system: prompt::SYSTEM_PROMPT.to_string(),
                        turns,
                    };

                    async move {
                        let raw = self.backend.complete(&request).await?;
                        parse_verdict(&raw).map_err(|violation| {
                            let err = JudgeError::Schema {
                                raw: violation.raw.clone(),
                                reason: violation.reason.clone(),
                            };
                            *rejected.lock() = Some(violation);
                            err
                        })
                    }
                },
            )
            .await?;

        Ok(Assessment {
            fact_id: fact.id,
            score: verdict.score,
            confidence: verdict.confidence,
            supporting_papers: verdict.supporting_papers,
            contradicting_papers: verdict.contradicting_papers,
            evidence_summary: verdict.evidence_summary,
            passages_reviewed: included as u32,
            model: self.backend.model_id().to_string(),
            reviewed_at: Utc::now(),
        })
    }
}

impl Assessor for Judge {
    async fn assess(
        &self,
        fact: &Fact,
        evidence: &[EvidencePassage],
    ) -> Result<Assessment, JudgeError> {
        Judge::assess(self, fact, evidence).await
    }
}

/// Deterministic assessment for a fact with no retrieved evidence.
pub fn no_evidence_assessment(fact: &Fact) -> Assessment {
    Assessment {
        fact_id: fact.id,
        score: MIN_SCORE,
        confidence: Confidence::Low,
        supporting_papers: Vec::new(),
        contradicting_papers: Vec::new(),
        evidence_summary: NO_EVIDENCE_SUMMARY.to_string(),
        passages_reviewed: 0,
        model: NO_EVIDENCE_MODEL.to_string(),
        reviewed_at: Utc::now(),
    }
}
