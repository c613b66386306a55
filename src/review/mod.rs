//! Review orchestrator: drives every fact through retrieval, judging, validation,
//! commit and publish, strictly in catalog order.
//!
//! Per-fact failures are contained and recorded in the [`RunState`]; only checkpoint
//! errors abort the run. An operator stop drops the in-flight fact's work, leaving
//! the checkpoint with every fact committed so far.

pub mod error;
mod state;


pub use error::{ReviewError, ReviewResult};
pub use state::{FactFailure, FactState, FailureKind, RunReport, RunState};

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::assessment::Assessment;
use crate::catalog::{Fact, FactCatalog};
use crate::checkpoint::CheckpointStore;
use crate::config::ReviewConfig;
use crate::constants::{DEFAULT_BACKEND_ATTEMPTS, DEFAULT_TOP_K};
use crate::judge::{Assessor, JudgeError};
use crate::retrieval::EvidenceSource;
use crate::retry::RetryPolicy;
use crate::sink::ResultSink;
use state::FactProgress;

/// Characters of fact text shown in progress logs.
const LOG_PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone)]
pub struct ReviewOptions {
    pub top_k: usize,
    pub use_hybrid: bool,
    pub use_rerank: bool,
    /// Retries for [`JudgeError::ModelUnavailable`].
    pub backend_retry: RetryPolicy,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            use_hybrid: true,
            use_rerank: true,
            backend_retry: RetryPolicy::new(
                DEFAULT_BACKEND_ATTEMPTS,
                Duration::from_secs(2),
                Duration::from_secs(60),
            ),
        }
    }
}

impl ReviewOptions {
    pub fn from_config(config: &ReviewConfig) -> Self {
        let defaults = Self::default();
        Self {
            top_k: config.top_k,
            use_hybrid: config.use_hybrid,
            use_rerank: config.use_rerank,
            backend_retry: RetryPolicy {
                max_attempts: config.backend_attempts.max(1),
                ..defaults.backend_retry
            },
        }
    }
}

/// Outcome of the async part of a fact (retrieve, judge, validate).
type Assessed = Result<Assessment, (FailureKind, String)>;

pub struct ReviewOrchestrator<R, J> {
    retriever: R,
    judge: J,
    catalog: FactCatalog,
    checkpoint: CheckpointStore,
    sink: ResultSink,
    options: ReviewOptions,
    stop: Option<watch::Receiver<bool>>,
}

impl<R, J> ReviewOrchestrator<R, J>
where
    R: EvidenceSource,
    J: Assessor,
{
    pub fn new(
        retriever: R,
        judge: J,
        catalog: FactCatalog,
        checkpoint: CheckpointStore,
        sink: ResultSink,
        options: ReviewOptions,
    ) -> Self {
        Self {
            retriever,
            judge,
            catalog,
            checkpoint,
            sink,
            options,
            stop: None,
        }
    }

    /// The run stops before the next step once `true` is sent on `stop`.
    pub fn with_stop_signal(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    pub fn judge(&self) -> &J {
        &self.judge
    }

    /// Reviews the whole catalog.
    pub async fn run_all(&mut self) -> ReviewResult<RunReport> {
        let facts = self.catalog.facts().to_vec();
        self.run(&facts).await
    }

    /// Reviews `facts` in id order, skipping those already complete.
    #[instrument(skip_all, fields(facts = facts.len()))]
    pub async fn run(&mut self, facts: &[Fact]) -> ReviewResult<RunReport> {
        let mut facts: Vec<&Fact> = facts.iter().collect();
        facts.sort_by_key(|f| f.id);

        let mut state = RunState::new(facts.len());
        let mut stop = self.stop.clone();

        self.republish_pending(&mut state)?;

        info!(
            total = facts.len(),
            completed = self.checkpoint.completed_count(),
            "Starting review"
        );

        for (position, fact) in facts.iter().enumerate() {
            if stop.as_ref().is_some_and(|rx| *rx.borrow()) {
                state.interrupted = true;
                break;
            }

            let mut progress = FactProgress::new(fact.id);
            if self.checkpoint.is_complete(fact.id) {
                progress.advance(FactState::Done);
                state.skipped += 1;
                continue;
            }

            progress.advance(FactState::Retrieving);
            let assessed = tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => {
                    warn!(fact_id = fact.id, "Stop requested, discarding in-flight fact");
                    state.interrupted = true;
                    break;
                }
                assessed = self.assess_fact(fact, &mut progress) => assessed,
            };

            let assessment = match assessed {
                Ok(assessment) => assessment,
                Err((kind, message)) => {
                    progress.advance(FactState::Failed(kind));
                    warn!(fact_id = fact.id, kind = %kind, error = %message, "Fact failed");
                    state.record_failure(fact.id, kind, message);
                    continue;
                }
            };

            progress.advance(FactState::Committing);
            let committed = self.checkpoint.commit(fact.id, assessment)?;

            progress.advance(FactState::Publishing);
            let elapsed = progress.started.elapsed();
            state.record_processed(elapsed);
            if let Err(e) = self.sink.publish(fact, &committed, Some(elapsed)) {
                progress.advance(FactState::Failed(FailureKind::Publish));
                warn!(fact_id = fact.id, error = %e, "Publish failed, fact stays committed");
                state.record_failure(fact.id, FailureKind::Publish, e.to_string());
                continue;
            }
            self.checkpoint.mark_published(fact.id)?;

            progress.advance(FactState::Done);
            state.done += 1;
            info!(
                fact_id = fact.id,
                done = position + 1,
                total = facts.len(),
                score = committed.score,
                support = committed.support_level().label(),
                confidence = %committed.confidence,
                elapsed_ms = elapsed.as_millis() as u64,
                fact = fact.preview(LOG_PREVIEW_CHARS),
                "Fact reviewed"
            );
        }

        self.checkpoint.snapshot()?;

        let report = state.into_report();
        log_summary(&report);
        Ok(report)
    }

    /// Publishes facts that were committed but never fully published.
    fn republish_pending(&mut self, state: &mut RunState) -> ReviewResult<()> {
        for fact_id in self.checkpoint.unpublished() {
            let (Some(fact), Some(assessment)) =
                (self.catalog.get(fact_id), self.checkpoint.assessment(fact_id))
            else {
                warn!(fact_id, "Committed fact is not in the catalog, not republishing");
                continue;
            };

            match self.sink.publish(fact, assessment, None) {
                Ok(()) => {
                    self.checkpoint.mark_published(fact_id)?;
                    state.republished += 1;
                    info!(fact_id, "Republished committed fact");
                }
                Err(e) => {
                    warn!(fact_id, error = %e, "Republish failed");
                    state.record_failure(fact_id, FailureKind::Publish, e.to_string());
                }
            }
        }
        Ok(())
    }

    /// Retrieving -> Judging -> Validating. Leaves `progress` at `Validating` on success.
    async fn assess_fact(&self, fact: &Fact, progress: &mut FactProgress) -> Assessed {
        let evidence = self
            .retriever
            .retrieve(
                fact,
                self.options.top_k,
                self.options.use_hybrid,
                self.options.use_rerank,
            )
            .await
            .map_err(|e| (FailureKind::Retrieval, e.to_string()))?;

        progress.advance(FactState::Judging);
        let judge = &self.judge;
        let evidence = &evidence;
        let assessment = self
            .options
            .backend_retry
            .run_if(
                "model_backend",
                |e: &JudgeError| matches!(e, JudgeError::ModelUnavailable(_)),
                move |_| judge.assess(fact, evidence),
            )
            .await
            .map_err(|e| match e {
                JudgeError::ModelUnavailable(_) => (FailureKind::Backend, e.to_string()),
                JudgeError::Schema { .. } => (FailureKind::Schema, e.to_string()),
            })?;

        progress.advance(FactState::Validating);
        assessment
            .validate(fact.id, &self.catalog)
            .map_err(|e| (FailureKind::Validation, e.to_string()))?;
        Ok(assessment)
    }
}

/// Resolves once a stop is requested; never resolves without a stop signal.
async fn stop_requested(stop: &mut Option<watch::Receiver<bool>>) {
    match stop {
        Some(rx) => {
            if rx.wait_for(|stopped| *stopped).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

fn log_summary(report: &RunReport) {
    info!(
        total = report.total_facts,
        done = report.done,
        skipped = report.skipped,
        republished = report.republished,
        failed = report.failed,
        interrupted = report.interrupted,
        total_s = report.total_time_seconds,
        average_s = report.average_time_seconds,
        "Review finished"
    );
    for (kind, count) in &report.failed_by_kind {
        warn!(kind = %kind, count, "Failed facts");
    }
}
