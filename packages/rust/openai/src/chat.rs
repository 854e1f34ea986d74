//! `/v1/chat/completions` — answer generation for the assistant layer.

use serde::{Deserialize, Serialize};
use siteassist_shared::{Result, SiteAssistError};

use crate::{CHAT_TIMEOUT, OpenAiClient};
use crate::embeddings::excerpt;

/// One message in a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// `system`, `user`, or `assistant`.
    pub role: &'static str,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    /// A system-role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    /// A user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Sampling options for a chat completion.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 900,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiClient {
    /// Run a chat completion and return the assistant's answer text.
    pub async fn chat(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .timeout(CHAT_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| SiteAssistError::Provider(format!("chat request failed: {e}")))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| SiteAssistError::Provider(format!("failed to read chat response: {e}")))?;

        if !status.is_success() {
            // Prefer the API's own error message; fall back to a body excerpt.
            let message = serde_json::from_str::<ApiErrorBody>(&raw)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {status}: {}", excerpt(&raw)));
            return Err(SiteAssistError::Provider(message));
        }

        let parsed: ChatResponse = serde_json::from_str(&raw)
            .map_err(|e| SiteAssistError::Provider(format!("malformed chat response: {e}")))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if answer.is_empty() {
            return Err(SiteAssistError::Provider(
                "the model returned an empty answer".into(),
            ));
        }

        Ok(answer)
    }
}
