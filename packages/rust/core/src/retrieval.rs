//! Top-k retrieval over the embedded corpus.
//!
//! A full linear scan: the chunk cap bounds corpus size, so brute-force
//! cosine scoring beats any index at this scale. Exact score ties are broken
//! by the document's priority flag; remaining ties keep their scan order.

use std::cmp::Ordering;

use siteassist_openai::OpenAiClient;
use siteassist_shared::{Result, RetrievedContext, SourceRef};
use siteassist_storage::Storage;
use tracing::{debug, instrument, warn};

/// Delimiter between chunk texts in the assembled context.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Retrieve the top-k chunks for a query.
///
/// Never fails toward the caller's user: a missing provider or a provider
/// error degrades to an empty result so an ungrounded answer can still be
/// produced. Only storage errors propagate.
#[instrument(skip_all, fields(k = k))]
pub async fn retrieve_top_k(
    storage: &Storage,
    provider: Option<&OpenAiClient>,
    query: &str,
    k: usize,
    max_chunks: usize,
) -> Result<RetrievedContext> {
    let Some(client) = provider else {
        debug!("no API key configured, returning empty context");
        return Ok(RetrievedContext::empty());
    };

    let query_vec = match client.embed_one(query).await {
        Ok(vec) => vec,
        Err(e) => {
            warn!(error = %e, "query embedding failed, returning empty context");
            return Ok(RetrievedContext::empty());
        }
    };

    let candidates = storage.embedded_chunks(max_chunks).await?;
    if candidates.is_empty() {
        return Ok(RetrievedContext::empty());
    }

    let mut scored: Vec<Scored> = candidates
        .into_iter()
        .filter_map(|chunk| {
            // Unparseable stored vectors are skipped, not fatal
            let embedding: Vec<f32> = serde_json::from_str(&chunk.embedding_json).ok()?;
            Some(Scored {
                similarity: cosine_similarity(&embedding, &query_vec),
                content: chunk.content,
                url: chunk.url,
                title: chunk.title,
                priority: chunk.priority,
            })
        })
        .collect();

    // Similarity descending; exact ties go to priority-flagged content. The
    // sort is stable, so any remaining ties keep their scan order.
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.priority.cmp(&a.priority))
    });

    let top: Vec<Scored> = scored.into_iter().take(k.max(1)).collect();

    let context = top
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER);

    // Distinct sources in rank order, first occurrence wins
    let mut seen = std::collections::HashSet::new();
    let sources = top
        .into_iter()
        .filter(|s| seen.insert(s.url.clone()))
        .map(|s| SourceRef {
            title: s.title,
            url: s.url,
        })
        .collect();

    Ok(RetrievedContext { context, sources })
}

struct Scored {
    similarity: f32,
    content: String,
    url: String,
    title: String,
    priority: bool,
}

/// Cosine similarity: dot product over the product of Euclidean norms.
///
/// Mismatched lengths compare only the overlapping prefix. A zero norm on
/// either side yields 0.0 rather than a division fault.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for i in 0..len {
        let (x, y) = (a[i] as f64, b[i] as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a > 0.0 && norm_b > 0.0 {
        (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use siteassist_shared::{ChunkRecord, DocStatus, DocumentRecord};
    use uuid::Uuid;

    // -----------------------------------------------------------------------
    // Cosine similarity
    // -----------------------------------------------------------------------

    #[test]
    fn identical_vectors_score_one() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn mismatched_lengths_use_overlapping_prefix() {
        let a = [1.0, 0.0, 5.0];
        let b = [1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&[1.0, 0.0], &b)).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_negative_one() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    // -----------------------------------------------------------------------
    // End-to-end retrieval
    // -----------------------------------------------------------------------

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("sa_retr_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    async fn seed_doc(storage: &Storage, url: &str, title: &str, priority: bool) -> String {
        let doc = DocumentRecord {
            id: Uuid::now_v7().to_string(),
            url: url.into(),
            url_hash: siteassist_extract::sha256_hex(url),
            title: title.into(),
            content_hash: "h".into(),
            last_crawled: Utc::now(),
            priority,
            status: DocStatus::Indexed,
            error: None,
        };
        storage.insert_document(&doc).await.unwrap();
        doc.id
    }

    async fn seed_chunk(storage: &Storage, doc_id: &str, index: u32, content: &str, vec: &[f32]) {
        let chunk = ChunkRecord {
            id: Uuid::now_v7().to_string(),
            doc_id: doc_id.into(),
            chunk_index: index,
            content: content.into(),
            embedding: None,
            tokens: 1,
            created_at: Utc::now(),
        };
        storage.insert_chunk(&chunk).await.unwrap();
        storage.set_chunk_embedding(&chunk.id, vec).await.unwrap();
    }

    /// Mock provider whose query embedding is always `vec`.
    async fn provider_returning(server: &wiremock::MockServer, vec: &[f32]) -> OpenAiClient {
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/embeddings"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": vec}]
            })))
            .mount(server)
            .await;

        OpenAiClient::new("sk-test", "text-embedding-3-small", "gpt-4o-mini")
            .unwrap()
            .with_base_url(format!("{}/v1", server.uri()))
    }

    #[tokio::test]
    async fn missing_credential_returns_empty() {
        let storage = test_storage().await;
        let result = retrieve_top_k(&storage, None, "anything", 3, 300)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(result.sources.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_empty() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/embeddings"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", "m", "m")
            .unwrap()
            .with_base_url(format!("{}/v1", server.uri()));

        let storage = test_storage().await;
        let result = retrieve_top_k(&storage, Some(&client), "q", 3, 300)
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn ranks_by_similarity_with_distinct_sources() {
        let storage = test_storage().await;

        let doc_a = seed_doc(&storage, "https://example.com/a", "Page A", false).await;
        let doc_b = seed_doc(&storage, "https://example.com/b", "Page B", true).await;

        seed_chunk(&storage, &doc_a, 0, "chunk zero", &[1.0, 0.0, 0.0]).await;
        seed_chunk(&storage, &doc_a, 1, "chunk one", &[0.0, 1.0, 0.0]).await;
        seed_chunk(&storage, &doc_b, 0, "chunk two", &[0.0, 0.0, 1.0]).await;

        // Query closest to chunk two, then chunk one, then chunk zero
        let server = wiremock::MockServer::start().await;
        let client = provider_returning(&server, &[0.1, 0.3, 0.95]).await;

        let result = retrieve_top_k(&storage, Some(&client), "q", 3, 300)
            .await
            .unwrap();

        let parts: Vec<&str> = result.context.split(CONTEXT_DELIMITER).collect();
        assert_eq!(parts, vec!["chunk two", "chunk one", "chunk zero"]);

        // Sources: rank order, deduplicated by URL
        assert_eq!(
            result.sources,
            vec![
                SourceRef {
                    title: "Page B".into(),
                    url: "https://example.com/b".into()
                },
                SourceRef {
                    title: "Page A".into(),
                    url: "https://example.com/a".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn exact_ties_favor_priority() {
        let storage = test_storage().await;

        let plain = seed_doc(&storage, "https://example.com/plain", "Plain", false).await;
        let favored = seed_doc(&storage, "https://example.com/favored", "Favored", true).await;

        // Identical vectors: identical similarity to any query
        seed_chunk(&storage, &plain, 0, "plain chunk", &[1.0, 0.0]).await;
        seed_chunk(&storage, &favored, 0, "favored chunk", &[1.0, 0.0]).await;

        let server = wiremock::MockServer::start().await;
        let client = provider_returning(&server, &[1.0, 0.0]).await;

        let result = retrieve_top_k(&storage, Some(&client), "q", 1, 300)
            .await
            .unwrap();

        assert_eq!(result.context, "favored chunk");
        assert_eq!(result.sources[0].url, "https://example.com/favored");
    }

    #[tokio::test]
    async fn degenerate_stored_embedding_ranks_last() {
        let storage = test_storage().await;
        let doc = seed_doc(&storage, "https://example.com/a", "A", false).await;

        seed_chunk(&storage, &doc, 0, "good chunk", &[1.0, 0.0]).await;

        // A second chunk with an empty stored vector
        let bad = ChunkRecord {
            id: Uuid::now_v7().to_string(),
            doc_id: doc.clone(),
            chunk_index: 1,
            content: "bad chunk".into(),
            embedding: None,
            tokens: 1,
            created_at: Utc::now(),
        };
        storage.insert_chunk(&bad).await.unwrap();
        storage.set_chunk_embedding(&bad.id, &[]).await.unwrap();

        let server = wiremock::MockServer::start().await;
        let client = provider_returning(&server, &[1.0, 0.0]).await;

        let result = retrieve_top_k(&storage, Some(&client), "q", 5, 300)
            .await
            .unwrap();

        // The empty vector has zero norm and scores 0.0; the good one ranks
        // first
        let parts: Vec<&str> = result.context.split(CONTEXT_DELIMITER).collect();
        assert_eq!(parts[0], "good chunk");
    }

    #[tokio::test]
    async fn k_is_floored_to_one() {
        let storage = test_storage().await;
        let doc = seed_doc(&storage, "https://example.com/a", "A", false).await;
        seed_chunk(&storage, &doc, 0, "only chunk", &[1.0]).await;

        let server = wiremock::MockServer::start().await;
        let client = provider_returning(&server, &[1.0]).await;

        let result = retrieve_top_k(&storage, Some(&client), "q", 0, 300)
            .await
            .unwrap();
        assert_eq!(result.context, "only chunk");
    }
}
