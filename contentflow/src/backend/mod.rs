//! Generation backend contract.
//!
//! A backend is the remote service that actually produces stage output.
//! Request/response stages call [`GenerationBackend::generate`]; streaming
//! stages call [`GenerationBackend::open_stream`] and feed the returned
//! bytes through the frame demultiplexer.

mod extract;
#[cfg(feature = "http")]
mod http;

pub use extract::extract_artifact;
#[cfg(feature = "http")]
pub use http::HttpGenerationBackend;

use crate::core::StageKind;
use crate::errors::PipelineError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

/// A stream of raw response body chunks.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, PipelineError>>;

/// Stage-specific request inputs (topic, article, plan, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageInputs {
    values: Map<String, Value>,
}

impl StageInputs {
    /// Creates empty inputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an input.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets an input.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Gets an input.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns true if there are no inputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for StageInputs {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// One backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// The stage being run.
    pub stage: StageKind,
    /// Stage inputs.
    pub inputs: StageInputs,
    /// Pipeline record ID, if any.
    pub pipeline_id: Option<String>,
    /// Content record ID, if any.
    pub content_id: Option<String>,
}

impl GenerationRequest {
    /// Creates a request with no record IDs.
    #[must_use]
    pub fn new(stage: StageKind, inputs: StageInputs) -> Self {
        Self {
            stage,
            inputs,
            pipeline_id: None,
            content_id: None,
        }
    }

    /// Sets the record IDs.
    #[must_use]
    pub fn with_ids(mut self, pipeline_id: Option<String>, content_id: Option<String>) -> Self {
        self.pipeline_id = pipeline_id;
        self.content_id = content_id;
        self
    }

    /// JSON request body: the inputs plus `pipelineId`/`insightId`.
    ///
    /// Explicit inputs win over the record IDs.
    #[must_use]
    pub fn body(&self) -> Value {
        let mut body = self.inputs.values.clone();
        if let Some(ref id) = self.pipeline_id {
            body.entry("pipelineId").or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(ref id) = self.content_id {
            body.entry("insightId").or_insert_with(|| Value::String(id.clone()));
        }
        Value::Object(body)
    }
}

/// A remote generation service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Performs a request/response generation and returns the decoded body.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Transport` on network or HTTP failures.
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, PipelineError>;

    /// Opens a streaming generation and returns the raw body chunks.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Transport` if the stream cannot be opened.
    async fn open_stream(&self, request: &GenerationRequest) -> Result<ByteStream, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_injects_ids() {
        let request = GenerationRequest::new(
            StageKind::Humanize,
            StageInputs::new().with("article", "Draft"),
        )
        .with_ids(Some("pipe-1".to_string()), Some("ins-9".to_string()));

        assert_eq!(
            request.body(),
            json!({"article": "Draft", "pipelineId": "pipe-1", "insightId": "ins-9"})
        );
    }

    #[test]
    fn test_explicit_inputs_win() {
        let request = GenerationRequest::new(
            StageKind::Plan,
            StageInputs::new().with("pipelineId", "explicit"),
        )
        .with_ids(Some("from-state".to_string()), None);

        assert_eq!(request.body(), json!({"pipelineId": "explicit"}));
    }

    #[test]
    fn test_inputs_from_map() {
        let map = json!({"topic": "Remote work"}).as_object().cloned().unwrap();
        let inputs = StageInputs::from(map);
        assert_eq!(inputs.get("topic"), Some(&json!("Remote work")));
        assert!(!inputs.is_empty());
    }
}
