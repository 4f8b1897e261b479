//! `vigil-analyzer` – the Ollama-backed [`Analyzer`] implementation.
//!
//! [`OllamaAnalyzer`] sends one request per analysis call to the
//! `/api/generate` endpoint of an [Ollama](https://ollama.com) server
//! (`http://localhost:11434` by default).  Text observations are appended
//! to the prompt; image observations travel base64-encoded in the request's
//! `images` field so multimodal models such as `llava` can see them.
//!
//! # Failure policy
//!
//! `analyze` never fails past its boundary.  HTTP, status, and decode
//! errors are logged at warn and encoded into the returned string, so the
//! orchestrator always has text to fan out to the actions.  Running an
//! action on an error line is preferred over silently dropping a cycle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use vigil_plugins::Analyzer;
use vigil_types::{CollectedData, VigilError};

/// Errors that can arise while talking to the Ollama backend.  Internal
/// only: [`OllamaAnalyzer::analyze`] folds them into result text.
#[derive(Error, Debug)]
pub enum OllamaError {
    /// The HTTP request to the backend failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response from the backend could not be interpreted.
    #[error("unexpected response format: {0}")]
    BadResponse(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// OllamaAnalyzer
// ─────────────────────────────────────────────────────────────────────────────

/// Async client for Ollama's `/api/generate` endpoint.
///
/// Construct once at startup and share behind `Arc<dyn Analyzer>`; it is
/// stateless apart from the pooled HTTP client and safe for concurrent use
/// by every watcher loop.
pub struct OllamaAnalyzer {
    host: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaAnalyzer {
    /// Create an analyzer pointing at `host` (e.g. `"http://localhost:11434"`)
    /// using `model` (e.g. `"llava"`).
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            host: host.trim_end_matches('/').to_string(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Combine `data` and `prompt` into one request body.
    ///
    /// Text payloads are appended to the prompt on a new line (the model
    /// sees both); image payloads are attached via `images` and the prompt
    /// is sent as-is.
    fn build_request<'a>(&'a self, data: &'a CollectedData, prompt: &str) -> GenerateRequest<'a> {
        let (prompt, images) = match data {
            CollectedData::Text(text) => (format!("{prompt}\n{text}"), Vec::new()),
            CollectedData::Image(b64) => (prompt.to_string(), vec![b64.as_str()]),
        };
        GenerateRequest {
            model: &self.model,
            prompt,
            images,
            stream: false,
        }
    }

    /// Perform the backend round trip, returning the raw model text.
    async fn request(&self, data: &CollectedData, prompt: &str) -> Result<String, OllamaError> {
        let url = format!("{}/api/generate", self.host);
        let body = self.build_request(data, prompt);

        let response: GenerateResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .response
            .ok_or_else(|| OllamaError::BadResponse("missing 'response' field".into()))
    }
}

#[async_trait]
impl Analyzer for OllamaAnalyzer {
    async fn analyze(&self, data: &CollectedData, prompt: &str) -> String {
        debug!(model = %self.model, kind = data.kind(), "sending request to Ollama");
        match self.request(data, prompt).await {
            Ok(text) => {
                debug!(chars = text.len(), "response received from Ollama");
                text
            }
            Err(e) => {
                // Transport faults leave this crate in their taxonomy
                // form; the returned text is that error's rendering.
                let err = VigilError::Analysis(e.to_string());
                warn!(error = %err, "Ollama request failed; returning error text");
                err.to_string()
            }
        }
    }
}
