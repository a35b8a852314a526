//! Recording persistence gateway.

use crate::errors::PersistenceError;
use crate::persistence::{ContentUpdate, PersistenceGateway, PipelineProgressUpdate};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Gateway that records every save in memory.
///
/// With [`RecordingGateway::failing`] every save is recorded and then
/// rejected.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    pipeline: Mutex<Vec<PipelineProgressUpdate>>,
    content: Mutex<Vec<ContentUpdate>>,
    failure: Option<String>,
}

impl RecordingGateway {
    /// Creates a gateway that accepts every save.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway that rejects every save with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Returns the recorded pipeline progress saves.
    #[must_use]
    pub fn pipeline_saves(&self) -> Vec<PipelineProgressUpdate> {
        self.pipeline.lock().clone()
    }

    /// Returns the recorded content saves.
    #[must_use]
    pub fn content_saves(&self) -> Vec<ContentUpdate> {
        self.content.lock().clone()
    }

    fn outcome(&self) -> Result<(), PersistenceError> {
        match self.failure {
            Some(ref message) => Err(PersistenceError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn save_pipeline_progress(
        &self,
        update: PipelineProgressUpdate,
    ) -> Result<(), PersistenceError> {
        self.pipeline.lock().push(update);
        self.outcome()
    }

    async fn save_content_progress(&self, update: ContentUpdate) -> Result<(), PersistenceError> {
        self.content.lock().push(update);
        self.outcome()
    }
}
