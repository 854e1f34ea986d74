//! Assistant answer composition: retrieval-grounded chat completion.
//!
//! Sanitizes and caps the prompt, retrieves context (which degrades to empty
//! rather than failing), and asks the chat model for an answer citing the
//! retrieved sources. Unlike retrieval, a missing API key here is a hard
//! configuration error — there is no answer without a model.

use siteassist_openai::{ChatMessage, ChatOptions, OpenAiClient};
use siteassist_shared::{Result, SiteAssistError, SourceRef};
use siteassist_storage::Storage;
use tracing::{debug, instrument};

use crate::retrieval::retrieve_top_k;

/// Maximum prompt length in characters after sanitation.
const MAX_PROMPT_CHARS: usize = 2000;

/// Maximum context length in characters merged from the knowledge base.
const MAX_CONTEXT_CHARS: usize = 6000;

/// Tuning for the assistant.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Display name the assistant answers as.
    pub name: String,
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Retrieval candidate bound (the global chunk cap).
    pub max_chunks: usize,
}

/// A composed answer with its grounding sources.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The model's answer text.
    pub answer: String,
    /// Distinct source pages behind the retrieved context (empty for an
    /// ungrounded answer).
    pub sources: Vec<SourceRef>,
}

/// Answer a question, grounded in the knowledge base when possible.
#[instrument(skip_all)]
pub async fn answer(
    storage: &Storage,
    provider: Option<&OpenAiClient>,
    config: &AssistantConfig,
    prompt: &str,
) -> Result<Answer> {
    let Some(client) = provider else {
        return Err(SiteAssistError::config(
            "missing OpenAI API key: set the configured environment variable",
        ));
    };

    let prompt = sanitize_prompt(prompt);
    if prompt.is_empty() {
        return Err(SiteAssistError::validation("empty prompt"));
    }

    // Retrieval degrades to empty internally; an ungrounded answer is still
    // an answer.
    let retrieved = retrieve_top_k(storage, Some(client), &prompt, config.top_k, config.max_chunks)
        .await?;

    let context = truncate_chars(&retrieved.context, MAX_CONTEXT_CHARS);
    if retrieved.is_empty() {
        debug!("no grounding context, answering ungrounded");
    }

    let user_content = if context.is_empty() {
        prompt.clone()
    } else {
        format!("{prompt}\n\nContext:\n{context}")
    };

    let messages = [
        ChatMessage::system(format!(
            "You are {}, a concise and helpful assistant. Cite sources when provided.",
            config.name
        )),
        ChatMessage::user(user_content),
    ];

    let answer = client.chat(&messages, ChatOptions::default()).await?;

    Ok(Answer {
        answer,
        sources: retrieved.sources,
    })
}

/// Strip control characters (keeping tab/newline), trim, and cap the length.
fn sanitize_prompt(prompt: &str) -> String {
    let cleaned: String = prompt
        .chars()
        .map(|c| {
            if c.is_control() && c != '\t' && c != '\n' && c != '\r' {
                ' '
            } else {
                c
            }
        })
        .collect();
    truncate_chars(cleaned.trim(), MAX_PROMPT_CHARS)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn test_config() -> AssistantConfig {
        AssistantConfig {
            name: "Assistant".into(),
            top_k: 3,
            max_chunks: 300,
        }
    }

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("sa_ask_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn client_for(server: &wiremock::MockServer) -> OpenAiClient {
        OpenAiClient::new("sk-test", "text-embedding-3-small", "gpt-4o-mini")
            .unwrap()
            .with_base_url(format!("{}/v1", server.uri()))
    }

    #[test]
    fn sanitize_strips_control_chars() {
        assert_eq!(sanitize_prompt("a\u{0000}b\u{0007}c"), "a b c");
        assert_eq!(sanitize_prompt("  keep\nnewlines  "), "keep\nnewlines");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(5000);
        assert_eq!(sanitize_prompt(&long).len(), MAX_PROMPT_CHARS);
    }

    #[tokio::test]
    async fn missing_key_is_a_config_error() {
        let storage = test_storage().await;
        let err = answer(&storage, None, &test_config(), "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, SiteAssistError::Config { .. }));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let server = wiremock::MockServer::start().await;
        let client = client_for(&server);
        let storage = test_storage().await;

        let err = answer(&storage, Some(&client), &test_config(), "  \u{0001} ")
            .await
            .unwrap_err();
        assert!(matches!(err, SiteAssistError::Validation { .. }));
    }

    #[tokio::test]
    async fn empty_corpus_still_answers_ungrounded() {
        let server = wiremock::MockServer::start().await;

        // Query embedding for retrieval
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/embeddings"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [1.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/chat/completions"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "I don't have site details."}}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let storage = test_storage().await;

        let result = answer(&storage, Some(&client), &test_config(), "What do you sell?")
            .await
            .unwrap();
        assert_eq!(result.answer, "I don't have site details.");
        assert!(result.sources.is_empty());
    }
}
