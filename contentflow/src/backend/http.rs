//! HTTP generation backend built on `reqwest`.

use super::{ByteStream, GenerationBackend, GenerationRequest};
use crate::config::BackendConfig;
use crate::errors::PipelineError;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, instrument};

/// Calls the stage endpoints of a content service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpGenerationBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the timeout is out of range or the
    /// HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, PipelineError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout()? {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Creates a backend around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: BackendConfig) -> Self {
        Self { client, config }
    }

    async fn post(&self, request: &GenerationRequest) -> Result<reqwest::Response, PipelineError> {
        let url = self.config.endpoint_url(request.stage);
        debug!(%url, stage = %request.stage, "POST generation request");
        let response = self.client.post(&url).json(&request.body()).send().await?;
        Ok(response)
    }
}

fn server_error(status: reqwest::StatusCode) -> PipelineError {
    PipelineError::Transport(format!("Server error: {}", status.as_u16()))
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    #[instrument(skip(self, request), fields(stage = %request.stage))]
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, PipelineError> {
        let response = self.post(request).await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed = serde_json::from_str::<Value>(&text);
        if !status.is_success() {
            // An error body still carries the backend's own message.
            return match parsed {
                Ok(body) if body.get("error").is_some() => Ok(body),
                _ => Err(server_error(status)),
            };
        }
        parsed.map_err(|err| PipelineError::Transport(format!("Invalid response body: {err}")))
    }

    #[instrument(skip(self, request), fields(stage = %request.stage))]
    async fn open_stream(&self, request: &GenerationRequest) -> Result<ByteStream, PipelineError> {
        let response = self.post(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(server_error(status));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(PipelineError::from))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_timeout() {
        let backend = HttpGenerationBackend::new(BackendConfig::default().with_timeout(5.0));
        assert!(backend.is_ok());
    }

    #[test]
    fn test_rejects_negative_timeout() {
        let result = HttpGenerationBackend::new(BackendConfig::default().with_timeout(-1.0));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_server_error_message() {
        let err = server_error(reqwest::StatusCode::BAD_GATEWAY);
        assert_eq!(err.user_message(), "Server error: 502");
    }
}
