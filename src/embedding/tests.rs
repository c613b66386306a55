use super::*;
use crate::retry::Retryable;
use std::time::Duration;

#[tokio::test]
async fn test_mock_embedder_is_deterministic() {
    let embedder = MockEmbedder::new(16);

    let a = embedder.embed_query("reserve density").await.unwrap();
    let b = embedder.embed_query("reserve density").await.unwrap();
    let c = embedder.embed_query("egg size").await.unwrap();

    assert_eq!(a.len(), 16);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
    assert_eq!(embedder.calls(), 3);
}

#[tokio::test]
async fn test_mock_embedder_pinned_vector_and_failures() {
    let embedder = MockEmbedder::new(2).with_vector("fact", vec![1.0, 0.0]);
    embedder.fail_next(EmbeddingError::Timeout { timeout_ms: 5 });

    let first = embedder.embed_query("fact").await;
    assert!(matches!(first, Err(EmbeddingError::Timeout { .. })));

    let second = embedder.embed_query("fact").await.unwrap();
    assert_eq!(second, vec![1.0, 0.0]);
}

#[test]
fn test_embedding_error_retryability() {
    assert!(EmbeddingError::Timeout { timeout_ms: 1 }.is_retryable());
    assert!(
        EmbeddingError::Unreachable {
            url: "http://x".into(),
            reason: "refused".into()
        }
        .is_retryable()
    );
    assert!(
        EmbeddingError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable()
    );
    assert!(
        !EmbeddingError::Status {
            status: 404,
            body: String::new()
        }
        .is_retryable()
    );
    assert!(
        !EmbeddingError::BadResponse {
            reason: "eof".into()
        }
        .is_retryable()
    );
}

#[test]
fn test_ollama_endpoint_normalizes_trailing_slash() {
    let embedder = OllamaEmbedder::new(
        "http://localhost:11434/",
        "nomic-embed-text",
        768,
        Duration::from_secs(5),
    )
    .unwrap();

    assert_eq!(embedder.endpoint(), "http://localhost:11434/api/embeddings");
    assert_eq!(embedder.model(), "nomic-embed-text");
    assert_eq!(embedder.dimension(), 768);
}

#[tokio::test]
async fn test_ollama_unreachable_is_retryable() {
    // Port 9 (discard) is not expected to serve HTTP.
    let embedder = OllamaEmbedder::new(
        "http://127.0.0.1:9",
        "nomic-embed-text",
        768,
        Duration::from_secs(2),
    )
    .unwrap();

    let err = embedder.embed_query("anything").await.unwrap_err();
    assert!(err.is_retryable(), "got {err:?}");
}
