//! OpenAI API client: batched embeddings and chat completions.
//!
//! The single fixed provider for the knowledge base. Chunk and query
//! embeddings must come from the same model — vectors from different models
//! are not comparable — so the model names are fixed at construction.

mod chat;
mod embeddings;

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use siteassist_shared::{Result, SiteAssistError, USER_AGENT};

pub use chat::{ChatMessage, ChatOptions};

/// Default API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Timeout for embedding requests (batches can be large).
const EMBED_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for chat completion requests.
const CHAT_TIMEOUT: Duration = Duration::from_secs(15);

/// OpenAI client holding credentials and model configuration.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    embedding_model: String,
    chat_model: String,
}

impl OpenAiClient {
    /// Build a client. Fails on an empty key or unusable header value.
    pub fn new(
        api_key: &str,
        embedding_model: impl Into<String>,
        chat_model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SiteAssistError::config("OpenAI API key is empty"));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| SiteAssistError::config(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| SiteAssistError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            embedding_model: embedding_model.into(),
            chat_model: chat_model.into(),
        })
    }

    /// Override the API base URL (integration tests point this at a mock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
