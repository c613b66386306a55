mod common;

use std::sync::Arc;

use common::harness::{
    FixedAssessor, Harness, expected_score, judge, judged_ids, paper, prompt_fact_id,
    scoring_backend, verdict_json,
};
use litreview::catalog::SampleStrategy;
use litreview::judge::{BackendError, MockModelBackend};
use litreview::review::FailureKind;
use litreview::sink::FileAssessmentStore;
use litreview::{Assessment, CheckpointStore, Confidence, SupportLevel};

fn precommitted(fact_id: u32, score: u8) -> Assessment {
    Assessment {
        fact_id,
        score,
        confidence: Confidence::Low,
        supporting_papers: vec![paper(fact_id)],
        contradicting_papers: Vec::new(),
        evidence_summary: "from an earlier run".to_string(),
        passages_reviewed: 2,
        model: "earlier".to_string(),
        reviewed_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_end_to_end_with_precommitted_fact() {
    let harness = Harness::new(3, 1);
    {
        let mut checkpoint = harness.checkpoint();
        checkpoint.commit(2, precommitted(2, 33)).unwrap();
        checkpoint.mark_published(2).unwrap();
    }
    let backend = Arc::new(scoring_backend().with_model("gpt-oss:120b"));
    let mut orch = harness.orchestrator(judge(backend.clone())).await;

    let report = orch.run_all().await.unwrap();

    assert_eq!(report.done, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(judged_ids(&backend), vec![1, 3]);

    let checkpoint = orch.checkpoint();
    assert_eq!(checkpoint.assessment(1).map(|a| a.score), Some(expected_score(1)));
    assert_eq!(checkpoint.assessment(2).map(|a| a.score), Some(33));
    assert_eq!(
        checkpoint.assessment(3).map(|a| a.supporting_papers.clone()),
        Some(vec![paper(3)])
    );
    assert_eq!(checkpoint.assessment(3).map(|a| a.model.as_str()), Some("gpt-oss:120b"));

    let documents = FileAssessmentStore::new(harness.assessments_dir());
    assert_eq!(documents.list().unwrap(), vec![1, 3]);
    let doc = documents.load(1).unwrap().unwrap();
    assert!(doc.processing_time_seconds.is_some());
    assert_eq!(doc.support_level, SupportLevel::from_score(expected_score(1)));
    assert!(doc.assessment.passages_reviewed > 0);

    let table = std::fs::read_to_string(harness.csv_dir().join("section_00.csv")).unwrap();
    assert!(table.contains("Literature Support Score (1-100)"));
    assert!(table.contains(&paper(3)));
}

#[tokio::test]
async fn test_backend_failure_is_contained_to_one_fact() {
    let harness = Harness::new(8, 2);
    let backend = Arc::new(MockModelBackend::from_fn(|request| {
        match prompt_fact_id(request) {
            Some(5) => Err(BackendError::Unavailable {
                model: "mock-model".into(),
                reason: "connection refused".into(),
            }),
            Some(id) => Ok(verdict_json(id)),
            None => Ok(String::new()),
        }
    }));
    let mut orch = harness.orchestrator(judge(backend.clone())).await;

    let report = orch.run_all().await.unwrap();

    assert_eq!(report.done, 7);
    assert_eq!(report.failed_ids(), vec![5]);
    assert_eq!(report.failure_count(FailureKind::Backend), 1);
    assert_ne!(report.exit_code(), 0);
    assert!(!orch.checkpoint().is_complete(5));
    assert_eq!(orch.checkpoint().completed_count(), 7);
    // five attempts from the backend retry policy
    assert_eq!(judged_ids(&backend).iter().filter(|id| **id == 5).count(), 5);
}

#[tokio::test]
async fn test_out_of_range_score_fails_validation_and_persists_nothing() {
    let harness = Harness::new(2, 1);
    let mut orch = harness.orchestrator(FixedAssessor { score: 150 }).await;

    let report = orch.run_all().await.unwrap();

    assert_eq!(report.done, 0);
    assert_eq!(report.failure_count(FailureKind::Validation), 2);
    assert_eq!(orch.checkpoint().completed_count(), 0);
    assert!(
        FileAssessmentStore::new(harness.assessments_dir())
            .list()
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_model_schema_violation_fails_fact() {
    let harness = Harness::new(2, 1);
    let backend = Arc::new(MockModelBackend::from_fn(|request| {
        match prompt_fact_id(request) {
            Some(1) => Ok(r#"{"score": 150, "confidence": "high", "key_evidence": "x"}"#.into()),
            Some(id) => Ok(verdict_json(id)),
            None => Ok(String::new()),
        }
    }));
    let mut orch = harness.orchestrator(judge(backend.clone())).await;

    let report = orch.run_all().await.unwrap();

    assert_eq!(report.failure_count(FailureKind::Schema), 1);
    assert_eq!(report.failed_ids(), vec![1]);
    // first attempt plus two corrections
    assert_eq!(judged_ids(&backend).iter().filter(|id| **id == 1).count(), 3);
    assert!(orch.checkpoint().is_complete(2));
}

#[tokio::test]
async fn test_sampled_run_covers_every_section() {
    let harness = Harness::new(36, 12);
    let catalog = harness.catalog();
    let sample = catalog.sample(12, SampleStrategy::StratifiedBySection);
    let backend = Arc::new(scoring_backend());
    let mut orch = harness.orchestrator(judge(backend.clone())).await;

    let report = orch.run(&sample).await.unwrap();

    assert_eq!(report.total_facts, 12);
    assert_eq!(report.done, 12);
    let mut sections: Vec<&str> = sample.iter().map(|f| f.section.as_str()).collect();
    sections.dedup();
    assert_eq!(sections.len(), 12);
    let expected: Vec<u32> = sample.iter().map(|f| f.id).collect();
    assert_eq!(judged_ids(&backend), expected);
}

#[tokio::test]
async fn test_empty_corpus_records_minimum_scores_without_model_calls() {
    let harness = Harness::new(2, 1);
    let retriever = litreview::retrieval::EvidenceRetriever::new(
        litreview::store::MockDocumentStore::new(),
        litreview::embedding::MockEmbedder::new(common::harness::TEST_DIM),
        litreview::embedding::Reranker::stub().unwrap(),
        litreview::retrieval::RetrievalConfig::default(),
    );
    let backend = Arc::new(scoring_backend());
    let mut orch = harness.orchestrator_with(retriever, judge(backend.clone()));

    let report = orch.run_all().await.unwrap();

    assert_eq!(report.done, 2);
    assert_eq!(backend.calls(), 0);
    let assessment = orch.checkpoint().assessment(1).unwrap();
    assert_eq!(assessment.score, 1);
    assert_eq!(assessment.confidence, Confidence::Low);
    assert!(assessment.supporting_papers.is_empty());
}

#[tokio::test]
async fn test_checkpoint_is_readable_after_run() {
    let harness = Harness::new(3, 1);
    let backend = Arc::new(scoring_backend());
    {
        let mut orch = harness.orchestrator(judge(backend)).await;
        orch.run_all().await.unwrap();
    }

    let record = CheckpointStore::load(harness.checkpoint_dir()).unwrap();

    let scores: Vec<(u32, u8)> = record.completed.iter().map(|(id, a)| (*id, a.score)).collect();
    assert_eq!(
        scores,
        (1..=3).map(|id| (id, expected_score(id))).collect::<Vec<_>>()
    );
    assert!(record.unpublished().is_empty());
}
