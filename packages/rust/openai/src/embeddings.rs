//! `/v1/embeddings` — batched embedding generation.
//!
//! The API returns one vector per submitted input, positionally parallel to
//! the request. Alignment relies on that order alone; a count mismatch is an
//! error rather than a partial result.

use serde::{Deserialize, Serialize};
use siteassist_shared::{Result, SiteAssistError};

use crate::{EMBED_TIMEOUT, OpenAiClient};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Embed a batch of texts. Returns one vector per input, in input order.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: inputs,
        };

        let response = self
            .client
            .post(self.endpoint("embeddings"))
            .timeout(EMBED_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| SiteAssistError::Provider(format!("embeddings request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SiteAssistError::Provider(format!(
                "embeddings request returned {status}: {}",
                excerpt(&body)
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| SiteAssistError::Provider(format!("malformed embeddings response: {e}")))?;

        if parsed.data.len() != inputs.len() {
            return Err(SiteAssistError::Provider(format!(
                "provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }

    /// Embed a single text (query embedding).
    pub async fn embed_one(&self, input: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[input.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SiteAssistError::Provider("provider returned no embedding".into()))
    }
}

/// Short single-line excerpt of an error body, safe to log.
pub(crate) fn excerpt(body: &str) -> String {
    let flat: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    flat.chars().take(200).collect()
}
