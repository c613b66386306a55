//! Pipeline harness: fact tables on disk, an in-memory corpus and a scripted model.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use litreview::catalog::{Fact, FactCatalog};
use litreview::checkpoint::CheckpointStore;
use litreview::embedding::{MockEmbedder, QueryEmbedder, Reranker};
use litreview::judge::{Assessor, Judge, JudgeConfig, JudgeError, MockModelBackend, ModelRequest};
use litreview::retrieval::{EvidencePassage, EvidenceRetriever, EvidenceSource, RetrievalConfig};
use litreview::retry::RetryPolicy;
use litreview::review::{ReviewOptions, ReviewOrchestrator};
use litreview::sink::ResultSink;
use litreview::store::MockDocumentStore;
use litreview::{Assessment, Confidence};
use tempfile::TempDir;

pub const TEST_DIM: usize = 16;

pub type TestRetriever = EvidenceRetriever<MockDocumentStore, MockEmbedder>;

/// Facts `1..=n` spread over `sections` tables, plus a matching corpus.
pub struct Harness {
    pub dir: TempDir,
    pub fact_count: u32,
}

impl Harness {
    pub fn new(fact_count: u32, sections: u32) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let csv_dir = dir.path().join("facts");
        fs::create_dir_all(&csv_dir).expect("csv dir");

        let per_section = fact_count.div_ceil(sections.max(1));
        for section in 0..sections {
            let first = section * per_section + 1;
            let last = ((section + 1) * per_section).min(fact_count);
            let mut table = String::from("Number,DEB Stylized Fact\n");
            for id in first..=last {
                table.push_str(&format!("{id},\"{}\"\n", fact_text(id)));
            }
            fs::write(csv_dir.join(format!("section_{section:02}.csv")), table)
                .expect("write table");
        }

        Self { dir, fact_count }
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.dir.path().join("facts")
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.dir.path().join("data/checkpoint")
    }

    pub fn assessments_dir(&self) -> PathBuf {
        self.dir.path().join("data/assessments")
    }

    pub fn catalog(&self) -> FactCatalog {
        FactCatalog::load(&self.csv_dir()).expect("catalog")
    }

    pub fn sink(&self) -> ResultSink {
        ResultSink::standard(self.assessments_dir(), self.csv_dir())
    }

    /// One chunk per fact whose vector equals the fact's query vector.
    pub async fn retriever(&self) -> TestRetriever {
        let store = MockDocumentStore::new();
        let embedder = MockEmbedder::new(TEST_DIM);
        for id in 1..=self.fact_count {
            let text = fact_text(id);
            let vector = embedder.embed_query(&text).await.expect("embed");
            store.insert(
                &format!("chunk-{id}"),
                &paper(id),
                &format!("{text} was observed in laboratory cultures."),
                vector,
            );
        }

        EvidenceRetriever::new(
            store,
            embedder,
            Reranker::stub().expect("stub reranker"),
            RetrievalConfig {
                rerank_candidates: 10,
                call_timeout: Duration::from_secs(5),
                retry: RetryPolicy::immediate(3),
                ..RetrievalConfig::default()
            },
        )
    }

    pub fn checkpoint(&self) -> CheckpointStore {
        CheckpointStore::open(self.checkpoint_dir()).expect("checkpoint")
    }

    pub async fn orchestrator<J: Assessor>(
        &self,
        judge: J,
    ) -> ReviewOrchestrator<TestRetriever, J> {
        self.orchestrator_with(self.retriever().await, judge)
    }

    pub fn orchestrator_with<R: EvidenceSource, J: Assessor>(
        &self,
        retriever: R,
        judge: J,
    ) -> ReviewOrchestrator<R, J> {
        ReviewOrchestrator::new(
            retriever,
            judge,
            self.catalog(),
            self.checkpoint(),
            self.sink(),
            test_options(),
        )
    }
}

pub fn test_options() -> ReviewOptions {
    ReviewOptions {
        top_k: 5,
        backend_retry: RetryPolicy::immediate(5),
        ..ReviewOptions::default()
    }
}

pub fn fact_text(id: u32) -> String {
    format!("Species{id} reserve density governs growth{id}")
}

pub fn paper(id: u32) -> String {
    format!("paper_{id:03}.pdf")
}

/// Deterministic score for a fact.
pub fn expected_score(id: u32) -> u8 {
    (id * 7 % 100 + 1) as u8
}

/// Fact id named in an assessment prompt (`STYLIZED FACT #<id>`).
pub fn prompt_fact_id(request: &ModelRequest) -> Option<u32> {
    let rest = request.prompt().split("STYLIZED FACT #").nth(1)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

pub fn verdict_json(id: u32) -> String {
    format!(
        r#"```json
{{"score": {score}, "confidence": "medium", "num_supporting_sources": 1,
 "key_evidence": "Cultures of species {id} match the claim.",
 "supporting_papers": ["{paper}"], "contradicting_papers": []}}
```"#,
        score = expected_score(id),
        paper = paper(id),
    )
}

/// A model that answers every prompt with the fact's deterministic verdict.
pub fn scoring_backend() -> MockModelBackend {
    MockModelBackend::from_fn(|request| {
        let id = prompt_fact_id(request).unwrap_or_default();
        Ok(verdict_json(id))
    })
}

pub fn judge(backend: Arc<MockModelBackend>) -> Judge {
    Judge::new(backend, JudgeConfig::default())
}

/// Fact ids in the order the model was asked about them.
pub fn judged_ids(backend: &MockModelBackend) -> Vec<u32> {
    backend
        .requests()
        .iter()
        .filter_map(prompt_fact_id)
        .collect()
}

/// An assessor that returns a fixed score for every fact.
pub struct FixedAssessor {
    pub score: u8,
}

impl Assessor for FixedAssessor {
    async fn assess(
        &self,
        fact: &Fact,
        evidence: &[EvidencePassage],
    ) -> Result<Assessment, JudgeError> {
        Ok(Assessment {
            fact_id: fact.id,
            score: self.score,
            confidence: Confidence::High,
            supporting_papers: evidence
                .iter()
                .map(|p| p.source_document_id.clone())
                .collect(),
            contradicting_papers: Vec::new(),
            evidence_summary: "fixed".to_string(),
            passages_reviewed: evidence.len() as u32,
            model: "fixed".to_string(),
            reviewed_at: chrono::Utc::now(),
        })
    }
}
