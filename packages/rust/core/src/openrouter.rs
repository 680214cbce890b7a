//! OpenRouter (OpenAI-compatible) chat-completions client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use mdchunk_shared::{MdChunkError, OpenRouterConfig, Result};

use crate::questions::{Prompt, TextModel};

/// Default timeout in seconds for a completion request.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Sampling temperature for question generation.
const TEMPERATURE: f32 = 0.2;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("mdchunk/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// OpenRouterModel
// ---------------------------------------------------------------------------

/// [`TextModel`] backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenRouterModel {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenRouterModel {
    /// Create a client for `model` at `base_url`.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| MdChunkError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    /// Create a client from config, reading the API key from the configured env var.
    pub fn from_config(config: &OpenRouterConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                MdChunkError::config(format!(
                    "OpenRouter API key not found. Set the {} environment variable.",
                    config.api_key_env
                ))
            })?;
        Self::new(api_key, config.default_model.clone(), &config.base_url)
    }
}

impl TextModel for OpenRouterModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, len = prompt.content.len()))]
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.content,
                },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MdChunkError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(MdChunkError::Questions(format!("HTTP {status}: {snippet}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| MdChunkError::Questions(format!("invalid completion response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                MdChunkError::Questions("missing choices[0].message.content".into())
            })?;

        debug!(reply_len = content.len(), "completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::{QuestionGenerator, QuestionSource};

    fn prompt() -> Prompt {
        Prompt {
            system: "ask questions".into(),
            content: "Alice likes badminton.".into(),
        }
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let model = OpenRouterModel::new("k", "m", "https://example.com/api/v1/").unwrap();
        assert_eq!(model.endpoint, "https://example.com/api/v1/chat/completions");
        assert_eq!(model.model_id(), "m");
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let config = OpenRouterConfig {
            api_key_env: "MDCHUNK_TEST_NO_SUCH_KEY_98765".into(),
            ..OpenRouterConfig::default()
        };
        let err = OpenRouterModel::from_config(&config).err().expect("should fail");
        assert!(err.to_string().contains("MDCHUNK_TEST_NO_SUCH_KEY_98765"));
    }

    #[tokio::test]
    async fn test_complete_with_mock_server() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .and(wiremock::matchers::header("authorization", "Bearer secret"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({
                "model": "test/model",
                "messages": [
                    {"role": "system", "content": "ask questions"},
                    {"role": "user", "content": "Alice likes badminton."}
                ]
            })))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [{
                        "message": {"role": "assistant", "content": "1. What does Alice like?"}
                    }]
                })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let model = OpenRouterModel::new("secret", "test/model", &server.uri()).unwrap();
        let reply = model.complete(&prompt()).await.unwrap();
        assert_eq!(reply, "1. What does Alice like?");
    }

    #[tokio::test]
    async fn test_complete_http_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .respond_with(wiremock::ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let model = OpenRouterModel::new("k", "m", &server.uri()).unwrap();
        let err = model.complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, MdChunkError::Questions(_)));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_complete_missing_content() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let model = OpenRouterModel::new("k", "m", &server.uri()).unwrap();
        let err = model.complete(&prompt()).await.unwrap_err();
        assert!(err.to_string().contains("missing choices"));
    }

    #[tokio::test]
    async fn test_generator_over_http() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [{
                        "message": {"content": "Sure!\n1. Who is Alice?\n2. What does she play?"}
                    }]
                })),
            )
            .mount(&server)
            .await;

        let model = OpenRouterModel::new("k", "m", &server.uri()).unwrap();
        let generator = QuestionGenerator::new(model, 1000);
        let questions = generator.ask("Alice plays badminton.").await.unwrap();
        assert_eq!(questions, vec!["Who is Alice?", "What does she play?"]);
    }
}
