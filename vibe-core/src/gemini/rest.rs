//! REST `generateContent` client.

use tracing::debug;

use crate::error::{Result, VibeError};
use crate::gemini::wire::{GenerateContentRequest, GenerateContentResponse};
use crate::gemini::GeminiConfig;

/// Request/response client for the text surface of the API.
///
/// Cheap to clone; the underlying HTTP client pools connections.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Run one `generateContent` call against `model` and return the first
    /// candidate's text (possibly empty — the model may return nothing
    /// usable, and callers decide how to fall back).
    ///
    /// # Errors
    /// `VibeError::Api` on a non-success HTTP status,
    /// `VibeError::MalformedResponse` when the body is not valid JSON.
    pub async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.rest_endpoint, model, self.config.api_key
        );

        debug!(model, "generateContent request");

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| VibeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VibeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| VibeError::MalformedResponse(e.to_string()))?;

        Ok(body.text())
    }
}
