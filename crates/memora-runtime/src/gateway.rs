//! [`GenerativeTextGateway`] – prompt in, text out.
//!
//! [`OllamaGateway`] talks to a locally-running
//! [Ollama](https://ollama.com) server (`http://localhost:11434`) through its
//! `/api/generate` endpoint with streaming disabled.  One call is one
//! request/response; there is no retry.  Callers decide what to do with a
//! failure.
//!
//! # Example
//!
//! ```rust,no_run
//! use memora_runtime::gateway::{GenerativeTextGateway, OllamaGateway};
//!
//! # async fn demo() -> Result<(), memora_runtime::gateway::GenerationError> {
//! let gateway = OllamaGateway::new("http://localhost:11434", "openchat");
//! // Requires a running Ollama instance.
//! let reply = gateway.generate("Say good morning.").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use memora_types::MemoraError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from a generation call.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The HTTP request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response from the model server could not be parsed.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
    /// The model returned only whitespace.
    #[error("Model returned an empty response")]
    EmptyResponse,
}

impl From<GenerationError> for MemoraError {
    fn from(e: GenerationError) -> Self {
        MemoraError::Generation(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway trait
// ─────────────────────────────────────────────────────────────────────────────

/// A single text-generation call.
#[async_trait]
pub trait GenerativeTextGateway: Send + Sync {
    /// Generate a reply to `prompt`.  The returned text is trimmed and never
    /// empty.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// OllamaGateway
// ─────────────────────────────────────────────────────────────────────────────

/// An async client for Ollama's `/api/generate` endpoint.
///
/// Construct once and reuse for every session.
pub struct OllamaGateway {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaGateway {
    /// Create a new gateway pointing at `base_url` (e.g. `"http://localhost:11434"`)
    /// and using `model` (e.g. `"openchat"`).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerativeTextGateway for OllamaGateway {
    /// # Errors
    ///
    /// Returns [`GenerationError::Http`] if the request fails or the server
    /// answers with a non-success status, [`GenerationError::BadResponse`]
    /// if the body has no `response` field, and
    /// [`GenerationError::EmptyResponse`] if the text is blank.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "sending generation request");

        let response: GenerateResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text = response
            .response
            .ok_or_else(|| GenerationError::BadResponse("missing `response` field".into()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn request_serializes_wire_contract() {
        let body = GenerateRequest {
            model: "openchat",
            prompt: "hello",
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "model": "openchat", "prompt": "hello", "stream": false })
        );
    }

    #[tokio::test]
    async fn generate_returns_trimmed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_json(serde_json::json!({
                "model": "openchat",
                "prompt": "Say hi",
                "stream": false
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "response": "\n  Hi there!  \n" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gateway = OllamaGateway::new(server.uri(), "openchat");
        assert_eq!(gateway.generate("Say hi").await.unwrap(), "Hi there!");
    }

    #[tokio::test]
    async fn blank_response_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "response": "   " })),
            )
            .mount(&server)
            .await;

        let gateway = OllamaGateway::new(server.uri(), "openchat");
        let err = gateway.generate("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn missing_response_field_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "error": "no model" })),
            )
            .mount(&server)
            .await;

        let gateway = OllamaGateway::new(server.uri(), "openchat");
        let err = gateway.generate("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::BadResponse(_)));
    }

    #[tokio::test]
    async fn server_error_status_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gateway = OllamaGateway::new(server.uri(), "openchat");
        let err = gateway.generate("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Http(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        let gateway = OllamaGateway::new("http://127.0.0.1:9", "openchat");
        let err = gateway.generate("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Http(_)));
        let global: MemoraError = err.into();
        assert!(matches!(global, MemoraError::Generation(_)));
    }
}
