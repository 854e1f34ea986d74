//! Embedding batcher: fill vectors for chunks that lack them.
//!
//! One bounded batch per invocation, triggered by the operator. The provider
//! returns vectors positionally parallel to the submitted inputs — alignment
//! relies on that order and nothing else. Any provider failure aborts the
//! whole batch with zero updates; there is no partial credit.

use siteassist_openai::OpenAiClient;
use siteassist_shared::Result;
use siteassist_storage::Storage;
use tracing::{debug, info, instrument};

/// Embed up to `limit` pending chunks. Returns the number updated.
///
/// No pending chunks, or no provider configured, is a no-op returning 0.
#[instrument(skip_all, fields(limit = limit))]
pub async fn embed_pending(
    storage: &Storage,
    provider: Option<&OpenAiClient>,
    limit: usize,
) -> Result<usize> {
    let pending = storage.pending_chunks(limit).await?;
    if pending.is_empty() {
        debug!("no pending chunks");
        return Ok(0);
    }

    let Some(client) = provider else {
        debug!("no API key configured, skipping embedding");
        return Ok(0);
    };

    let inputs: Vec<String> = pending.iter().map(|(_, content)| content.clone()).collect();
    let vectors = client.embed_batch(&inputs).await?;

    let mut updated = 0usize;
    for ((chunk_id, _), vector) in pending.iter().zip(&vectors) {
        storage.set_chunk_embedding(chunk_id, vector).await?;
        updated += 1;
    }

    info!(updated, "embeddings persisted");
    Ok(updated)
}
