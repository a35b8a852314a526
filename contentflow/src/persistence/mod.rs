//! Persistence gateway: saving accepted artifacts to the external store.
//!
//! Saves are fire-and-forget from the pipeline's point of view. The
//! [`PersistenceDispatcher`] runs them as detached tasks after the
//! in-memory commit; a failed save is logged and reported, never rolled
//! back into the pipeline state.

mod dispatcher;
#[cfg(feature = "http")]
mod http;
mod records;
mod sections;

pub use dispatcher::PersistenceDispatcher;
#[cfg(feature = "http")]
pub use http::HttpPersistenceGateway;
pub use records::{
    content_update, pipeline_update, plan_approval_content_update, plan_approval_update,
};
pub use sections::{split_into_sections, SECTION_COUNT};

use crate::errors::PersistenceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Audit-log entry attached to a pipeline-record save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// What happened, e.g. `plan_generated`.
    pub action: String,
    /// Model that produced the artifact, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Extra fields, flattened into the entry.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl AuditEntry {
    /// Creates an entry for an action.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            model: None,
            details: Map::new(),
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Adds a detail field.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// A save of the pipeline progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineProgressUpdate {
    /// Pipeline record ID.
    pub pipeline_id: String,
    /// Stage number on the record.
    pub stage: u32,
    /// Stage-specific record fields.
    pub data: Map<String, Value>,
    /// Audit-log entry.
    pub ai_log: AuditEntry,
}

/// A save of the content record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpdate {
    /// Content record ID.
    #[serde(rename = "insightId")]
    pub content_id: String,
    /// Field updates.
    pub updates: Map<String, Value>,
    /// Lifecycle label, e.g. `writing`.
    pub pipeline_stage: String,
}

/// The external store.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Saves the pipeline progress record.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the save fails.
    async fn save_pipeline_progress(
        &self,
        update: PipelineProgressUpdate,
    ) -> Result<(), PersistenceError>;

    /// Saves the content record.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the save fails.
    async fn save_content_progress(&self, update: ContentUpdate) -> Result<(), PersistenceError>;
}
