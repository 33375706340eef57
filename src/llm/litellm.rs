//! OpenAI-compatible chat completion client.
//!
//! Talks to LiteLLM/OpenRouter style `/chat/completions` endpoints. The
//! harness treats the model as a black box: one request, one text completion.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LlmError;

/// Default endpoint used when no API base is configured.
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Generous enough for long completions from slow models.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// One chat message, serialized as-is into the request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of a `/chat/completions` call. Unset sampling options are left to
/// the provider.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The first completion choice of a response, flattened.
#[derive(Debug, Clone, Default)]
pub struct GenerationResponse {
    /// Model the provider actually routed to.
    pub model: String,
    /// `None` when the provider sent no choice or a `null` content.
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Usage,
}

impl GenerationResponse {
    /// A response carrying `text`, for fakes and tests.
    pub fn text_only(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            content: Some(text.into()),
            finish_reason: Some("stop".to_string()),
            usage: Usage::default(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Anything that can answer a [`GenerationRequest`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Client for LiteLLM-compatible APIs.
pub struct LiteLlmClient {
    api_base: String,
    api_key: Option<String>,
    http_client: Client,
}

impl LiteLlmClient {
    /// A trailing slash on `api_base` is ignored. Without `api_key` requests
    /// are sent unauthenticated.
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            http_client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    // Some providers send `null` content for refusals.
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl From<CompletionBody> for GenerationResponse {
    fn from(body: CompletionBody) -> Self {
        let (content, finish_reason) = body
            .choices
            .into_iter()
            .next()
            .map(|choice| (choice.message.content, choice.finish_reason))
            .unwrap_or_default();
        Self {
            model: body.model,
            content,
            finish_reason,
            usage: body.usage.unwrap_or_default(),
        }
    }
}

/// Map a non-success status and its body to an error. The provider's own
/// message is preferred over the raw body.
fn status_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.to_string());
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited(message)
    } else {
        LlmError::ApiError {
            code: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl LlmProvider for LiteLlmClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let mut http_request = self
            .http_client
            .post(self.completions_url())
            .header("X-Title", "skill-eval")
            .json(&request);
        if let Some(ref api_key) = self.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let http_response = http_request
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();
        if !status.is_success() {
            let body = http_response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: CompletionBody = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;
        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_skips_unset_options() {
        let request = GenerationRequest::new("gpt-4o", vec![Message::user("test")]).with_temperature(0.0);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
        assert!(json.get("max_tokens").is_none());

        let capped = serde_json::to_value(request.with_max_tokens(4000)).unwrap();
        assert_eq!(capped["max_tokens"], 4000);
    }

    #[test]
    fn test_completion_body_takes_first_choice() {
        let body: CompletionBody = serde_json::from_str(
            r#"{"id":"x","model":"openai/gpt-4o","choices":[
                {"index":0,"message":{"role":"assistant","content":"await run();"},"finish_reason":"stop"},
                {"index":1,"message":{"role":"assistant","content":"other"},"finish_reason":"stop"}
            ],"usage":{"prompt_tokens":10,"completion_tokens":4,"total_tokens":14}}"#,
        )
        .unwrap();
        let response = GenerationResponse::from(body);

        assert_eq!(response.model, "openai/gpt-4o");
        assert_eq!(response.text(), Some("await run();"));
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.total_tokens, 14);
    }

    #[test]
    fn test_completion_body_tolerates_null_content_and_no_usage() {
        let body: CompletionBody = serde_json::from_str(
            r#"{"model":"m","choices":[{"message":{"role":"assistant","content":null}}]}"#,
        )
        .unwrap();
        let response = GenerationResponse::from(body);

        assert_eq!(response.text(), None);
        assert_eq!(response.usage.total_tokens, 0);

        let empty: CompletionBody = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(GenerationResponse::from(empty).text(), None);
    }

    #[test]
    fn test_status_error_mapping() {
        let limited = status_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"slow down"}}"#,
        );
        assert!(matches!(limited, LlmError::RateLimited(ref m) if m == "slow down"));

        let unauthorized = status_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"No auth credentials found","code":401}}"#,
        );
        assert!(matches!(
            unauthorized,
            LlmError::ApiError { code: 401, ref message } if message == "No auth credentials found"
        ));

        let gateway = status_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(
            gateway,
            LlmError::ApiError { code: 502, ref message } if message == "<html>bad gateway</html>"
        ));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = LiteLlmClient::new("http://localhost:4000/", None);
        assert_eq!(client.completions_url(), "http://localhost:4000/chat/completions");
    }

    #[tokio::test]
    async fn test_generate_connection_error() {
        let client = LiteLlmClient::new("http://localhost:65535", None);
        let request = GenerationRequest::new("gpt-4o", vec![Message::user("test")]);

        let err = client.generate(request).await.unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(_)));
    }
}
