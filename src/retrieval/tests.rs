use super::*;
use crate::embedding::MockEmbedder;
use crate::store::MockDocumentStore;

fn fact(text: &str) -> Fact {
    Fact::new(1, "Growth", text, "growth.csv")
}

fn config() -> RetrievalConfig {
    RetrievalConfig {
        call_timeout: Duration::from_secs(1),
        retry: RetryPolicy::immediate(3),
        ..RetrievalConfig::default()
    }
}

fn retriever(store: MockDocumentStore) -> EvidenceRetriever<MockDocumentStore, MockEmbedder> {
    EvidenceRetriever::new(
        store,
        MockEmbedder::new(4),
        Reranker::stub().unwrap(),
        config(),
    )
}

fn scored_store(scores: &[(&str, f32)]) -> MockDocumentStore {
    let store = MockDocumentStore::new();
    for (id, score) in scores {
        store.insert_scored(id, &format!("{id}.pdf"), &format!("passage {id}"), Some(*score), None);
    }
    store
}

#[tokio::test]
async fn test_semantic_results_sorted_descending_with_ranks() {
    let retriever = retriever(scored_store(&[("a", 0.9), ("b", 0.3), ("c", 0.7)]));

    let passages = retriever
        .retrieve(&fact("anything"), 10, false, false)
        .await
        .unwrap();

    let scores: Vec<f32> = passages.iter().map(|p| p.relevance_score).collect();
    let ranks: Vec<u32> = passages.iter().map(|p| p.rank).collect();
    assert_eq!(scores, vec![0.9, 0.7, 0.3]);
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(passages[1].source_document_id, "c.pdf");
    assert_eq!(passages[1].passage_text, "passage c");
}

#[tokio::test]
async fn test_result_truncated_to_top_k() {
    let retriever = retriever(scored_store(&[
        ("a", 0.1),
        ("b", 0.2),
        ("c", 0.3),
        ("d", 0.4),
    ]));

    let passages = retriever
        .retrieve(&fact("anything"), 2, false, false)
        .await
        .unwrap();

    let ids: Vec<&str> = passages.iter().map(|p| p.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["d", "c"]);
}

#[tokio::test]
async fn test_zero_top_k_skips_backends() {
    let retriever = retriever(scored_store(&[("a", 0.9)]));

    let passages = retriever.retrieve(&fact("x"), 0, true, true).await.unwrap();

    assert!(passages.is_empty());
    assert_eq!(retriever.store().semantic_calls(), 0);
    assert_eq!(retriever.embedder().calls(), 0);
}

#[tokio::test]
async fn test_empty_store_is_ok_and_empty() {
    let retriever = retriever(MockDocumentStore::new());

    let passages = retriever
        .retrieve(&fact("reserve density"), 20, true, true)
        .await
        .unwrap();

    assert!(passages.is_empty());
}

#[tokio::test]
async fn test_transient_store_failures_are_retried() {
    let store = scored_store(&[("a", 0.9)]);
    store.fail_next(StoreError::Timeout { timeout_ms: 1 });
    store.fail_next(StoreError::ConnectionFailed {
        url: "mock".into(),
        message: "refused".into(),
    });
    let retriever = retriever(store);

    let passages = retriever
        .retrieve(&fact("x"), 5, false, false)
        .await
        .unwrap();

    assert_eq!(passages.len(), 1);
    assert_eq!(retriever.store().semantic_calls(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_yield_error_not_empty() {
    let store = scored_store(&[("a", 0.9)]);
    for _ in 0..3 {
        store.fail_next(StoreError::ConnectionFailed {
            url: "mock".into(),
            message: "refused".into(),
        });
    }
    let retriever = retriever(store);

    let result = retriever.retrieve(&fact("x"), 5, false, false).await;

    assert!(matches!(
        result,
        Err(RetrievalError::Store(StoreError::ConnectionFailed { .. }))
    ));
    assert_eq!(retriever.store().semantic_calls(), 3);
}

#[tokio::test]
async fn test_permanent_store_failure_is_not_retried() {
    let store = scored_store(&[("a", 0.9)]);
    store.fail_next(StoreError::EmptyIndex {
        collection: "document_chunks".into(),
    });
    let retriever = retriever(store);

    let result = retriever.retrieve(&fact("x"), 5, false, false).await;

    assert!(matches!(
        result,
        Err(RetrievalError::Store(StoreError::EmptyIndex { .. }))
    ));
    assert_eq!(retriever.store().semantic_calls(), 1);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let store = scored_store(&[("a", 0.9)]);
    store.set_delay(Duration::from_millis(500));
    let retriever = EvidenceRetriever::new(
        store,
        MockEmbedder::new(4),
        Reranker::stub().unwrap(),
        RetrievalConfig {
            call_timeout: Duration::from_millis(20),
            retry: RetryPolicy::immediate(2),
            ..RetrievalConfig::default()
        },
    );

    let result = retriever.retrieve(&fact("x"), 5, false, false).await;

    assert!(matches!(
        result,
        Err(RetrievalError::Store(StoreError::Timeout { .. }))
    ));
    assert_eq!(retriever.store().semantic_calls(), 2);
}

#[tokio::test]
async fn test_embedding_failure_surfaces_as_retrieval_error() {
    let retriever = retriever(scored_store(&[("a", 0.9)]));
    for _ in 0..3 {
        retriever.embedder().fail_next(EmbeddingError::Unreachable {
            url: "mock".into(),
            reason: "down".into(),
        });
    }

    let result = retriever.retrieve(&fact("x"), 5, false, false).await;

    assert!(matches!(result, Err(RetrievalError::Embedding(_))));
    assert_eq!(retriever.store().semantic_calls(), 0);
}

#[tokio::test]
async fn test_hybrid_includes_lexical_only_hits() {
    let store = MockDocumentStore::new();
    store.insert_scored("sem", "s.pdf", "semantic hit", Some(0.8), None);
    store.insert_scored("lex", "l.pdf", "lexical hit", None, Some(0.6));
    store.insert_scored("both", "b.pdf", "both hit", Some(0.4), Some(0.9));
    let retriever = retriever(store);

    let passages = retriever
        .retrieve(&fact("anything"), 10, true, false)
        .await
        .unwrap();

    let ids: Vec<&str> = passages.iter().map(|p| p.chunk_id.as_str()).collect();
    assert_eq!(passages.len(), 3);
    assert!(ids.contains(&"lex"));
    // sem: 0.7 * 1.0, both: 0.7 * 0.0 + 0.3 * 1.0, lex: 0.3 * 0.0
    assert_eq!(ids, vec!["sem", "both", "lex"]);
    assert_eq!(retriever.store().semantic_calls(), 1);
    assert_eq!(retriever.store().lexical_calls(), 1);
}

#[tokio::test]
async fn test_rerank_reorders_by_cross_encoder_score() {
    let store = MockDocumentStore::new();
    store.insert_scored("off", "o.pdf", "Egg hatching in spring", Some(0.95), None);
    store.insert_scored(
        "on",
        "r.pdf",
        "Somatic maintenance scales with structural volume",
        Some(0.5),
        None,
    );
    let retriever = retriever(store);

    let passages = retriever
        .retrieve(
            &fact("Maintenance scales with structural volume"),
            2,
            false,
            true,
        )
        .await
        .unwrap();

    assert_eq!(passages[0].chunk_id, "on");
    assert_eq!(passages[0].rank, 1);
    assert!(passages[0].relevance_score > passages[1].relevance_score);
    assert!(passages.iter().all(|p| (0.0..=1.0).contains(&p.relevance_score)));
}

#[tokio::test]
async fn test_retrieve_through_evidence_source_trait() {
    async fn via_trait<R: EvidenceSource>(source: &R) -> usize {
        source
            .retrieve(&fact("x"), 5, false, false)
            .await
            .map(|p| p.len())
            .unwrap_or_default()
    }

    let retriever = retriever(scored_store(&[("a", 0.9), ("b", 0.1)]));
    assert_eq!(via_trait(&retriever).await, 2);
}
