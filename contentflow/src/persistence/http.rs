//! HTTP persistence gateway built on `reqwest`.

use super::{ContentUpdate, PersistenceGateway, PipelineProgressUpdate};
use crate::config::PersistenceConfig;
use crate::errors::PersistenceError;
use async_trait::async_trait;
use serde::Serialize;

/// Posts save requests to the content store's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpPersistenceGateway {
    client: reqwest::Client,
    config: PersistenceConfig,
}

impl HttpPersistenceGateway {
    /// Creates a gateway with a default client.
    #[must_use]
    pub fn new(config: PersistenceConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Creates a gateway around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: PersistenceConfig) -> Self {
        Self { client, config }
    }

    async fn post<T: Serialize + Sync>(&self, url: &str, body: &T) -> Result<(), PersistenceError> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| format!("status {}", status.as_u16()));
        Err(PersistenceError::Rejected(message))
    }
}

#[async_trait]
impl PersistenceGateway for HttpPersistenceGateway {
    async fn save_pipeline_progress(
        &self,
        update: PipelineProgressUpdate,
    ) -> Result<(), PersistenceError> {
        self.post(&self.config.pipeline_update_url(), &update).await
    }

    async fn save_content_progress(&self, update: ContentUpdate) -> Result<(), PersistenceError> {
        self.post(&self.config.content_save_url(), &update).await
    }
}
