use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, Filter, PointId, RetrievedPoint, ScrollPointsBuilder,
    SearchPointsBuilder, Value,
};
use qdrant_client::{Qdrant, QdrantError};
use tracing::{debug, info, instrument};

use super::{DocumentStore, ScoredChunk, StoreError, sort_by_score};
use crate::text::{content_terms, term_recall};

/// Payload keys written by the indexing job.
const DOC_ID_KEY: &str = "doc_id";
const CHUNK_ID_KEY: &str = "chunk_id";
const TEXT_KEY: &str = "text";
const FILENAME_KEY: &str = "filename";

/// Points fetched per scroll request. Lexical search pages through every filter match,
/// since scroll returns points in id order rather than by relevance.
const LEXICAL_PAGE_SIZE: u32 = 512;
/// Upper bound on `should` conditions in one lexical filter.
const MAX_LEXICAL_TERMS: usize = 16;

// gRPC status codes surfaced by tonic.
const GRPC_DEADLINE_EXCEEDED: i32 = 4;
const GRPC_UNAVAILABLE: i32 = 14;

/// Qdrant-backed document store over a pre-built chunk collection.
#[derive(Clone)]
pub struct QdrantDocumentStore {
    client: Qdrant,
    url: String,
    collection: String,
    timeout: Duration,
}

impl std::fmt::Debug for QdrantDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantDocumentStore")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl QdrantDocumentStore {
    /// Connects to `url` and checks that `collection` exists and holds chunks.
    pub async fn connect(
        url: &str,
        collection: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(url)
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let store = Self {
            client,
            url: url.to_string(),
            collection: collection.to_string(),
            timeout,
        };

        let exists = store
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| store.map_error(e))?;
        if !exists {
            return Err(StoreError::EmptyIndex {
                collection: collection.to_string(),
            });
        }

        let chunks = store.count().await?;
        if chunks == 0 {
            return Err(StoreError::EmptyIndex {
                collection: collection.to_string(),
            });
        }

        info!(url, collection, chunks, "Connected to document store");
        Ok(store)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Approximate number of chunks in the collection.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(false))
            .await
            .map_err(|e| self.map_error(e))?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    fn map_error(&self, err: QdrantError) -> StoreError {
        if let QdrantError::ResponseError { status } = &err {
            match status.code() as i32 {
                GRPC_UNAVAILABLE => {
                    return StoreError::ConnectionFailed {
                        url: self.url.clone(),
                        message: status.message().to_string(),
                    };
                }
                GRPC_DEADLINE_EXCEEDED => {
                    return StoreError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    };
                }
                _ => {}
            }
        }
        StoreError::SearchFailed {
            collection: self.collection.clone(),
            message: err.to_string(),
        }
    }
}

impl DocumentStore for QdrantDocumentStore {
    #[instrument(skip_all, fields(collection = %self.collection, limit = limit))]
    async fn semantic_search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector, limit as u64).with_payload(true),
            )
            .await
            .map_err(|e| self.map_error(e))?;

        let chunks: Vec<ScoredChunk> = response
            .result
            .into_iter()
            .filter_map(|point| chunk_from_payload(point.id, &point.payload, point.score))
            .collect();

        debug!(hits = chunks.len(), "Semantic search complete");
        Ok(chunks)
    }

    #[instrument(skip_all, fields(collection = %self.collection, limit = limit))]
    async fn lexical_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let query_terms = content_terms(query);
        if query_terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut terms: Vec<&String> = query_terms.iter().collect();
        terms.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let conditions: Vec<Condition> = terms
            .into_iter()
            .take(MAX_LEXICAL_TERMS)
            .map(|term| Condition::matches_text(TEXT_KEY, term.as_str()))
            .collect();

        let filter = Filter::should(conditions);

        let mut ranking = LexicalRanking::new(&query_terms, limit);
        let pages = scroll_all(
            |offset| {
                let mut request = ScrollPointsBuilder::new(&self.collection)
                    .filter(filter.clone())
                    .limit(LEXICAL_PAGE_SIZE)
                    .with_payload(true)
                    .with_vectors(false);
                if let Some(offset) = offset {
                    request = request.offset(offset);
                }
                async move {
                    let response = self
                        .client
                        .scroll(request)
                        .await
                        .map_err(|e| self.map_error(e))?;
                    Ok::<_, StoreError>((response.result, response.next_page_offset))
                }
            },
            |point| ranking.offer(point),
        )
        .await?;

        let scanned = ranking.scanned;
        let chunks = ranking.finish();
        debug!(pages, scanned, hits = chunks.len(), "Lexical search complete");
        Ok(chunks)
    }
}

/// Follows `next_page_offset` from the first page until the server reports no more.
/// Returns the number of pages fetched.
async fn scroll_all<F, Fut, V>(mut fetch_page: F, mut visit: V) -> Result<u32, StoreError>
where
    F: FnMut(Option<PointId>) -> Fut,
    Fut: Future<Output = Result<(Vec<RetrievedPoint>, Option<PointId>), StoreError>>,
    V: FnMut(RetrievedPoint),
{
    let mut offset = None;
    let mut pages = 0;
    loop {
        let (points, next) = fetch_page(offset.take()).await?;
        pages += 1;
        points.into_iter().for_each(&mut visit);
        match next {
            Some(next) => offset = Some(next),
            None => return Ok(pages),
        }
    }
}

/// Term-recall scoring over a stream of points, keeping only the best `limit`.
struct LexicalRanking<'a> {
    query_terms: &'a HashSet<String>,
    limit: usize,
    best: Vec<ScoredChunk>,
    scanned: u64,
}

impl<'a> LexicalRanking<'a> {
    fn new(query_terms: &'a HashSet<String>, limit: usize) -> Self {
        Self {
            query_terms,
            limit,
            best: Vec::with_capacity(limit.saturating_mul(2)),
            scanned: 0,
        }
    }

    fn offer(&mut self, point: RetrievedPoint) {
        self.scanned += 1;
        let Some(text) = payload_string(&point.payload, TEXT_KEY) else {
            return;
        };
        let score = term_recall(self.query_terms, &text);
        if score <= 0.0 {
            return;
        }
        if let Some(chunk) = chunk_from_payload(point.id, &point.payload, score) {
            self.best.push(chunk);
        }
        if self.best.len() >= self.limit.saturating_mul(2).max(1) {
            sort_by_score(&mut self.best);
            self.best.truncate(self.limit);
        }
    }

    fn finish(mut self) -> Vec<ScoredChunk> {
        sort_by_score(&mut self.best);
        self.best.truncate(self.limit);
        self.best
    }
}

fn chunk_from_payload(
    id: Option<PointId>,
    payload: &HashMap<String, Value>,
    score: f32,
) -> Option<ScoredChunk> {
    let text = payload_string(payload, TEXT_KEY)?;
    let chunk_id = payload_string(payload, CHUNK_ID_KEY).or_else(|| point_id_string(id))?;
    let doc_id =
        payload_string(payload, FILENAME_KEY).or_else(|| payload_string(payload, DOC_ID_KEY))?;

    Some(ScoredChunk {
        chunk_id,
        doc_id,
        text,
        score,
    })
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    let value = payload.get(key)?;
    value
        .as_str()
        .map(|s| s.to_string())
        .or_else(|| value.as_integer().map(|i| i.to_string()))
        .filter(|s| !s.trim().is_empty())
}

fn point_id_string(id: Option<PointId>) -> Option<String> {
    match id?.point_id_options? {
        PointIdOptions::Num(n) => Some(n.to_string()),
        PointIdOptions::Uuid(u) => Some(u),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_chunk_prefers_filename_as_doc_id() {
        let p = payload(&[
            (DOC_ID_KEY, "a1b2".into()),
            (FILENAME_KEY, "kooijman_2010.pdf".into()),
            (CHUNK_ID_KEY, "a1b2_0003".into()),
            (TEXT_KEY, "Reserve dynamics".into()),
        ]);

        let chunk = chunk_from_payload(None, &p, 0.8).unwrap();
        assert_eq!(chunk.doc_id, "kooijman_2010.pdf");
        assert_eq!(chunk.chunk_id, "a1b2_0003");
        assert_eq!(chunk.score, 0.8);
    }

    #[test]
    fn test_chunk_falls_back_to_point_id_and_doc_id() {
        let p = payload(&[
            (DOC_ID_KEY, "a1b2".into()),
            (TEXT_KEY, "Reserve dynamics".into()),
        ]);
        let id = PointId {
            point_id_options: Some(PointIdOptions::Num(42)),
        };

        let chunk = chunk_from_payload(Some(id), &p, 0.1).unwrap();
        assert_eq!(chunk.doc_id, "a1b2");
        assert_eq!(chunk.chunk_id, "42");
    }

    #[test]
    fn test_chunk_without_text_is_skipped() {
        let p = payload(&[(DOC_ID_KEY, "a1b2".into()), (CHUNK_ID_KEY, "c".into())]);
        assert!(chunk_from_payload(None, &p, 0.5).is_none());
    }

    #[test]
    fn test_integer_payload_ids() {
        let p = payload(&[(CHUNK_ID_KEY, Value::from(7_i64))]);
        assert_eq!(payload_string(&p, CHUNK_ID_KEY), Some("7".to_string()));
    }

    fn point(id: u64, text: &str) -> RetrievedPoint {
        RetrievedPoint {
            id: Some(PointId::from(id)),
            payload: payload(&[
                (DOC_ID_KEY, format!("doc_{id}").into()),
                (TEXT_KEY, text.into()),
            ]),
            ..Default::default()
        }
    }

    /// Pages of 3 points; only the last page holds the full match.
    fn pages() -> Vec<Vec<RetrievedPoint>> {
        vec![
            vec![
                point(1, "reserve turnover in algae"),
                point(2, "growth curves"),
                point(3, "reserve storage"),
            ],
            vec![
                point(4, "density of embryos"),
                point(5, "unrelated text"),
                point(6, "reserve density of fish"),
            ],
            vec![
                point(7, "nothing here"),
                point(8, "reserve density governs growth"),
                point(9, "growth in reserve"),
            ],
        ]
    }

    #[tokio::test]
    async fn test_lexical_scan_follows_every_page() {
        let pages = pages();
        let terms = content_terms("reserve density governs growth");
        let mut ranking = LexicalRanking::new(&terms, 2);
        let mut offsets = Vec::new();

        let fetched = scroll_all(
            |offset: Option<PointId>| {
                offsets.push(offset.clone());
                let index = match offset.and_then(|o| o.point_id_options) {
                    Some(PointIdOptions::Num(n)) => n as usize,
                    _ => 0,
                };
                let next = (index + 1 < pages.len()).then(|| PointId::from(index as u64 + 1));
                let page = pages[index].clone();
                async move { Ok::<_, StoreError>((page, next)) }
            },
            |p| ranking.offer(p),
        )
        .await
        .unwrap();

        assert_eq!(fetched, 3);
        assert_eq!(
            offsets,
            vec![None, Some(PointId::from(1)), Some(PointId::from(2))]
        );
        assert_eq!(ranking.scanned, 9);

        let best = ranking.finish();
        let ids: Vec<&str> = best.iter().map(|c| c.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["doc_8", "doc_6"]);
        assert_eq!(best[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_lexical_scan_stops_on_page_error() {
        let terms = content_terms("reserve density");
        let mut ranking = LexicalRanking::new(&terms, 5);
        let mut calls = 0;

        let result = scroll_all(
            |_| {
                calls += 1;
                let first = calls == 1;
                async move {
                    if first {
                        Ok::<_, StoreError>((
                            vec![point(1, "reserve density")],
                            Some(PointId::from(2)),
                        ))
                    } else {
                        Err(StoreError::Timeout { timeout_ms: 10 })
                    }
                }
            },
            |p| ranking.offer(p),
        )
        .await;

        assert!(matches!(result, Err(StoreError::Timeout { .. })));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_lexical_ranking_keeps_best_within_limit() {
        let terms = content_terms("reserve density growth");
        let mut ranking = LexicalRanking::new(&terms, 1);

        ranking.offer(point(1, "reserve only"));
        ranking.offer(point(2, "reserve density growth"));
        ranking.offer(point(3, "reserve density"));
        ranking.offer(point(4, "no overlap at all"));

        let best = ranking.finish();
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].doc_id, "doc_2");
    }
}
