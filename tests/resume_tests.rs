mod common;

use std::sync::Arc;

use common::harness::{Harness, expected_score, judge, judged_ids, paper, scoring_backend};
use litreview::CheckpointStore;
use litreview::checkpoint::CheckpointError;

fn scores(record: &litreview::checkpoint::CheckpointRecord) -> Vec<(u32, u8, Vec<String>)> {
    record
        .completed
        .values()
        .map(|a| (a.fact_id, a.score, a.supporting_papers.clone()))
        .collect()
}

#[tokio::test]
async fn test_resume_judges_only_remaining_facts() {
    let harness = Harness::new(6, 2);
    let facts = harness.catalog().facts().to_vec();

    let first = Arc::new(scoring_backend());
    {
        let mut orch = harness.orchestrator(judge(first.clone())).await;
        let report = orch.run(&facts[..3]).await.unwrap();
        assert_eq!(report.done, 3);
    }
    assert_eq!(judged_ids(&first), vec![1, 2, 3]);

    let second = Arc::new(scoring_backend());
    let mut orch = harness.orchestrator(judge(second.clone())).await;
    let report = orch.run_all().await.unwrap();

    assert_eq!(judged_ids(&second), vec![4, 5, 6]);
    assert_eq!(report.skipped, 3);
    assert_eq!(report.done, 3);
    assert_eq!(report.exit_code(), 0);
    drop(orch);

    let uninterrupted = Harness::new(6, 2);
    {
        let mut orch = uninterrupted.orchestrator(judge(Arc::new(scoring_backend()))).await;
        orch.run_all().await.unwrap();
    }

    let resumed = CheckpointStore::load(harness.checkpoint_dir()).unwrap();
    let straight = CheckpointStore::load(uninterrupted.checkpoint_dir()).unwrap();
    assert_eq!(scores(&resumed), scores(&straight));
}

#[tokio::test]
async fn test_completed_catalog_makes_no_model_calls() {
    let harness = Harness::new(4, 1);
    {
        let mut orch = harness.orchestrator(judge(Arc::new(scoring_backend()))).await;
        orch.run_all().await.unwrap();
    }

    let backend = Arc::new(scoring_backend());
    let mut orch = harness.orchestrator(judge(backend.clone())).await;
    let report = orch.run_all().await.unwrap();

    assert_eq!(backend.calls(), 0);
    assert_eq!(report.skipped, 4);
    assert_eq!(report.done, 0);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_reset_fact_is_reviewed_again() {
    let harness = Harness::new(3, 1);
    {
        let mut orch = harness.orchestrator(judge(Arc::new(scoring_backend()))).await;
        orch.run_all().await.unwrap();
    }
    {
        let mut checkpoint = harness.checkpoint();
        assert!(checkpoint.reset(2).unwrap());
        assert!(!checkpoint.reset(2).unwrap());
    }

    let backend = Arc::new(scoring_backend());
    let mut orch = harness.orchestrator(judge(backend.clone())).await;
    let report = orch.run_all().await.unwrap();

    assert_eq!(judged_ids(&backend), vec![2]);
    assert_eq!(report.done, 1);
    assert_eq!(report.skipped, 2);
    let reviewed = orch.checkpoint().assessment(2).unwrap();
    assert_eq!(reviewed.score, expected_score(2));
    assert_eq!(reviewed.supporting_papers, vec![paper(2)]);
}

#[tokio::test]
async fn test_second_run_on_same_directory_is_refused() {
    let harness = Harness::new(2, 1);
    let _held = harness.checkpoint();

    let err = CheckpointStore::open(harness.checkpoint_dir()).unwrap_err();

    assert!(matches!(err, CheckpointError::Locked { .. }));
}
