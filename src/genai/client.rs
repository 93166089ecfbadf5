//! Core `GenerativeClient` trait and the Gemini `generateContent` client.
//!
//! [`GeminiClient`] performs exactly one HTTP attempt per call. All
//! connection details come from [`GenerativeConfig`]; the API key is sent as
//! the `key` query parameter.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::GenerativeConfig;
use crate::genai::wire::{GenerateContentRequest, GenerateContentResponse, Message};

// ---------------------------------------------------------------------------
// GenerativeError
// ---------------------------------------------------------------------------

/// Failures of a single generative call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerativeError {
    /// No API key is configured; no request was sent.
    #[error("API key is missing. Set {} or add it to settings.toml.", crate::config::API_KEY_ENV)]
    ConfigurationMissing,

    /// The caller supplied no message with text.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// Transport or connection failure.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-success HTTP status.
    #[error("API request failed with status {status}.")]
    RequestFailed { status: u16 },

    /// The service refused the prompt.
    #[error("Request was blocked: {reason}")]
    ContentBlocked { reason: String },

    /// The response did not contain the expected text field.
    #[error("The AI returned an empty or invalid response.")]
    MalformedResponse,
}

impl From<reqwest::Error> for GenerativeError {
    fn from(e: reqwest::Error) -> Self {
        GenerativeError::Network(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// GenerativeClient trait
// ---------------------------------------------------------------------------

/// One request/response exchange with a generative-language service.
///
/// * `messages`   – ordered, role-tagged history; at least one must carry text.
/// * `shape_hint` – optional response schema; when present the service is
///   asked for `application/json` output and the caller parses the text.
///
/// Returns the primary text field verbatim.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn send(
        &self,
        messages: &[Message],
        shape_hint: Option<&serde_json::Value>,
    ) -> Result<String, GenerativeError>;
}

// ---------------------------------------------------------------------------
// Response interpretation
// ---------------------------------------------------------------------------

/// Map an HTTP status and body onto the client contract.
///
/// Order of checks: status, primary text, block reason, anything else is
/// malformed.
pub fn interpret_response(status: u16, body: &str) -> Result<String, GenerativeError> {
    if !(200..300).contains(&status) {
        log::error!("generative API error response (status {status}): {body}");
        return Err(GenerativeError::RequestFailed { status });
    }

    let parsed: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
        log::error!("generative API returned unparseable body: {e}");
        GenerativeError::MalformedResponse
    })?;

    if let Some(text) = parsed.primary_text() {
        return Ok(text.to_string());
    }

    if let Some(reason) = parsed.block_reason() {
        return Err(GenerativeError::ContentBlocked {
            reason: reason.to_string(),
        });
    }

    log::error!("unexpected generative API response structure: {body}");
    Err(GenerativeError::MalformedResponse)
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Calls `POST {base_url}/{api_version}/models/{model}:generateContent`.
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// Build a client from config, resolving the API key from the
    /// environment first.
    pub fn from_config(config: &GenerativeConfig) -> Self {
        Self::with_api_key(config, config.resolve_api_key())
    }

    /// Build a client with an explicit (possibly absent) key.
    pub fn with_api_key(config: &GenerativeConfig, api_key: Option<String>) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: config.endpoint(),
            api_key,
        }
    }

    /// `true` when a key is available and calls will reach the network.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn send(
        &self,
        messages: &[Message],
        shape_hint: Option<&serde_json::Value>,
    ) -> Result<String, GenerativeError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(GenerativeError::ConfigurationMissing)?;

        if !messages.iter().any(Message::has_text) {
            return Err(GenerativeError::EmptyPrompt);
        }

        let body = GenerateContentRequest::new(messages, shape_hint);
        log::debug!(
            "generative: POST {} ({} message(s), schema={})",
            self.endpoint,
            messages.len(),
            shape_hint.is_some()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        interpret_response(status, &text)
    }
}

// ---------------------------------------------------------------------------
// MockGenerativeClient  (test-only)
// ---------------------------------------------------------------------------

/// Test double that replays scripted responses in order and records every
/// request it receives.
#[cfg(test)]
pub struct MockGenerativeClient {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, GenerativeError>>>,
    calls: std::sync::Mutex<Vec<(Vec<Message>, Option<serde_json::Value>)>>,
}

#[cfg(test)]
impl MockGenerativeClient {
    pub fn new(responses: Vec<Result<String, GenerativeError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// A mock whose first call returns `text`.
    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    pub fn err(error: GenerativeError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Messages and schema hint of the `n`-th call.
    pub fn call(&self, n: usize) -> (Vec<Message>, Option<serde_json::Value>) {
        self.calls.lock().unwrap()[n].clone()
    }
}

#[cfg(test)]
#[async_trait]
impl GenerativeClient for MockGenerativeClient {
    async fn send(
        &self,
        messages: &[Message],
        shape_hint: Option<&serde_json::Value>,
    ) -> Result<String, GenerativeError> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), shape_hint.cloned()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerativeError::MalformedResponse))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_short_circuits() {
        // Port 9 (discard) would fail to connect; the key check must come first.
        let mut config = GenerativeConfig::default();
        config.base_url = "http://127.0.0.1:9".into();
        let client = GeminiClient::with_api_key(&config, None);

        assert!(!client.is_configured());
        let err = client.send(&[Message::user("hi")], None).await.unwrap_err();
        assert_eq!(err, GenerativeError::ConfigurationMissing);
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_network() {
        let mut config = GenerativeConfig::default();
        config.base_url = "http://127.0.0.1:9".into();
        let client = GeminiClient::with_api_key(&config, Some("key".into()));

        let err = client.send(&[], None).await.unwrap_err();
        assert_eq!(err, GenerativeError::EmptyPrompt);

        let err = client.send(&[Message::user("")], None).await.unwrap_err();
        assert_eq!(err, GenerativeError::EmptyPrompt);
    }

    #[test]
    fn success_returns_text_verbatim() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"  Correct! Nice.\n"}]}}]}"#;
        assert_eq!(interpret_response(200, body).unwrap(), "  Correct! Nice.\n");
    }

    #[test]
    fn non_success_status_is_request_failed() {
        let err = interpret_response(429, r#"{"error":{"code":429}}"#).unwrap_err();
        assert_eq!(err, GenerativeError::RequestFailed { status: 429 });
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn blocked_prompt_is_content_blocked() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert_eq!(
            interpret_response(200, body).unwrap_err(),
            GenerativeError::ContentBlocked {
                reason: "SAFETY".into()
            }
        );
    }

    #[test]
    fn text_wins_over_block_reason() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}],"promptFeedback":{"blockReason":"OTHER"}}"#;
        assert_eq!(interpret_response(200, body).unwrap(), "ok");
    }

    #[test]
    fn missing_text_is_malformed() {
        assert_eq!(
            interpret_response(200, r#"{"candidates":[]}"#).unwrap_err(),
            GenerativeError::MalformedResponse
        );
        assert_eq!(
            interpret_response(200, "not json").unwrap_err(),
            GenerativeError::MalformedResponse
        );
    }

    #[test]
    fn client_is_object_safe() {
        let client: Box<dyn GenerativeClient> = Box::new(GeminiClient::with_api_key(
            &GenerativeConfig::default(),
            None,
        ));
        drop(client);
    }
}
