// OpenAI-compatible chat completions implementation.
//
// Sends the prompt as a single user message with `response_format` forced
// to `json_object`. Non-2xx replies become errors that carry the response
// body, which is how context-length failures reach the retry controller.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::ExtractionService;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Extraction service backed by `{base_url}/chat/completions`.
pub struct ChatCompletionsService {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsService {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing extraction API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing extraction model name");

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid extraction API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            temperature,
        })
    }
}

#[async_trait]
impl ExtractionService for ChatCompletionsService {
    async fn complete_json(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("Failed to call chat completions endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completions returned {}: {}", status, text);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completions response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        debug!(
            model = %self.model,
            reply_chars = content.len(),
            "Chat completion received"
        );

        Ok(content)
    }
}

// --- Chat completions request/response types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_blank_key() {
        let result = ChatCompletionsService::new(
            DEFAULT_BASE_URL,
            "   ",
            "gpt-4.1-mini",
            0.3,
            Duration::from_secs(5),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let service = ChatCompletionsService::new(
            "https://example.test/v1/",
            "sk-test",
            "gpt-4.1-mini",
            0.3,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(service.endpoint, "https://example.test/v1/chat/completions");
    }

    #[test]
    fn test_request_forces_json_object_mode() {
        let body = ChatRequest {
            model: "m",
            temperature: 0.3,
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_with_null_content_parses() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
