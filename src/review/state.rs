use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Why a fact did not reach `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Retrieval,
    Backend,
    Schema,
    Validation,
    /// The fact is committed but not fully published; it is republished on resume.
    Publish,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Retrieval => "retrieval",
            FailureKind::Backend => "backend",
            FailureKind::Schema => "schema",
            FailureKind::Validation => "validation",
            FailureKind::Publish => "publish",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-fact lifecycle within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactState {
    Pending,
    Retrieving,
    Judging,
    Validating,
    Committing,
    Publishing,
    Done,
    Failed(FailureKind),
}

impl FactState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FactState::Done | FactState::Failed(_))
    }

    /// Whether `self -> next` is a legal transition.
    pub fn allows(&self, next: FactState) -> bool {
        use FactState::*;
        if self.is_terminal() {
            return false;
        }
        match (*self, next) {
            (_, Failed(_)) => true,
            (Pending, Retrieving | Done)
            | (Retrieving, Judging)
            | (Judging, Validating)
            | (Validating, Committing)
            | (Committing, Publishing)
            | (Publishing, Done) => true,
            _ => false,
        }
    }
}

/// Tracks one fact through its states.
#[derive(Debug)]
pub(crate) struct FactProgress {
    pub fact_id: u32,
    pub state: FactState,
    pub started: Instant,
}

impl FactProgress {
    pub fn new(fact_id: u32) -> Self {
        Self {
            fact_id,
            state: FactState::Pending,
            started: Instant::now(),
        }
    }

    pub fn advance(&mut self, next: FactState) {
        debug_assert!(
            self.state.allows(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(fact_id = self.fact_id, from = ?self.state, to = ?next, "Fact state");
        self.state = next;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactFailure {
    pub fact_id: u32,
    pub kind: FailureKind,
    pub message: String,
}

/// Mutable run state threaded through the review loop.
#[derive(Debug)]
pub struct RunState {
    started_at: DateTime<Utc>,
    started: Instant,
    pub total_facts: usize,
    pub done: usize,
    pub skipped: usize,
    pub republished: usize,
    pub failures: Vec<FactFailure>,
    pub interrupted: bool,
    processing_time: Duration,
    processed: usize,
}

impl RunState {
    pub fn new(total_facts: usize) -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            total_facts,
            done: 0,
            skipped: 0,
            republished: 0,
            failures: Vec::new(),
            interrupted: false,
            processing_time: Duration::ZERO,
            processed: 0,
        }
    }

    pub(crate) fn record_processed(&mut self, elapsed: Duration) {
        self.processed += 1;
        self.processing_time += elapsed;
    }

    pub(crate) fn record_failure(&mut self, fact_id: u32, kind: FailureKind, message: String) {
        self.failures.push(FactFailure {
            fact_id,
            kind,
            message,
        });
    }

    pub fn into_report(self) -> RunReport {
        let mut failed_by_kind = BTreeMap::new();
        for failure in &self.failures {
            *failed_by_kind.entry(failure.kind).or_insert(0) += 1;
        }
        let average_time_seconds = if self.processed == 0 {
            0.0
        } else {
            self.processing_time.as_secs_f64() / self.processed as f64
        };

        RunReport {
            started_at: self.started_at,
            finished_at: Utc::now(),
            total_facts: self.total_facts,
            done: self.done,
            skipped: self.skipped,
            republished: self.republished,
            failed: self.failures.len(),
            failed_by_kind,
            failures: self.failures,
            interrupted: self.interrupted,
            total_time_seconds: self.started.elapsed().as_secs_f64(),
            average_time_seconds,
        }
    }
}

/// End-of-run summary, also written to `run_report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_facts: usize,
    /// Facts completed in this run.
    pub done: usize,
    /// Facts already complete before this run.
    pub skipped: usize,
    /// Committed facts published again at start-up.
    pub republished: usize,
    pub failed: usize,
    pub failed_by_kind: BTreeMap<FailureKind, usize>,
    pub failures: Vec<FactFailure>,
    pub interrupted: bool,
    pub total_time_seconds: f64,
    /// Mean wall time of facts reviewed in this run.
    pub average_time_seconds: f64,
}

impl RunReport {
    /// 130 when interrupted, 1 when any fact failed, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if self.failed > 0 {
            1
        } else {
            0
        }
    }

    pub fn failed_ids(&self) -> Vec<u32> {
        self.failures.iter().map(|f| f.fact_id).collect()
    }

    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.failed_by_kind.get(&kind).copied().unwrap_or(0)
    }
}
