//! Stage artifact type: the durable output of a stage run.

use super::StageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The content payload of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArtifactContent {
    /// Plain or markdown text (articles).
    Text(String),
    /// A structured document (plans).
    Document(serde_json::Value),
}

impl ArtifactContent {
    /// Returns the text if this is a text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Document(_) => None,
        }
    }

    /// Returns the document if this is a structured payload.
    #[must_use]
    pub fn as_document(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Document(doc) => Some(doc),
            Self::Text(_) => None,
        }
    }

    /// Converts the payload to the JSON value sent to the store.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::Value::String(text.clone()),
            Self::Document(doc) => doc.clone(),
        }
    }
}

/// An artifact produced by a successful stage run.
///
/// Artifacts are immutable once created: a new attempt produces a new
/// artifact rather than mutating an old one. The builder methods consume
/// `self` and are only meant for construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageArtifact {
    id: Uuid,
    stage: StageKind,
    content: ArtifactContent,
    #[serde(default)]
    metrics: BTreeMap<String, serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl StageArtifact {
    /// Creates a new artifact stamped with the current time.
    #[must_use]
    pub fn new(stage: StageKind, content: ArtifactContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage,
            content,
            metrics: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Creates a text artifact.
    #[must_use]
    pub fn text(stage: StageKind, text: impl Into<String>) -> Self {
        Self::new(stage, ArtifactContent::Text(text.into()))
    }

    /// Creates a structured-document artifact.
    #[must_use]
    pub fn document(stage: StageKind, doc: serde_json::Value) -> Self {
        Self::new(stage, ArtifactContent::Document(doc))
    }

    /// Adds a metric.
    #[must_use]
    pub fn with_metric(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    /// Returns the artifact ID.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the stage that produced the artifact.
    #[must_use]
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Returns the content payload.
    #[must_use]
    pub fn content(&self) -> &ArtifactContent {
        &self.content
    }

    /// Returns all metrics.
    #[must_use]
    pub fn metrics(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metrics
    }

    /// Returns a single metric.
    #[must_use]
    pub fn metric(&self, key: &str) -> Option<&serde_json::Value> {
        self.metrics.get(key)
    }

    /// Returns a metric as an unsigned integer.
    #[must_use]
    pub fn metric_u64(&self, key: &str) -> Option<u64> {
        self.metrics.get(key).and_then(serde_json::Value::as_u64)
    }

    /// Returns a metric as a float.
    #[must_use]
    pub fn metric_f64(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Returns when the artifact was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// SHA-256 digest of the content payload, hex encoded.
    #[must_use]
    pub fn content_digest(&self) -> String {
        let mut hasher = Sha256::new();
        match &self.content {
            ArtifactContent::Text(text) => hasher.update(text.as_bytes()),
            ArtifactContent::Document(doc) => hasher.update(doc.to_string().as_bytes()),
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_artifact_creation() {
        let artifact = StageArtifact::text(StageKind::Write, "Hello world");

        assert_eq!(artifact.stage(), StageKind::Write);
        assert_eq!(artifact.content().as_text(), Some("Hello world"));
        assert!(artifact.content().as_document().is_none());
        assert!(artifact.metrics().is_empty());
    }

    #[test]
    fn test_artifact_with_metrics() {
        let artifact = StageArtifact::text(StageKind::Humanize, "text")
            .with_metric("human_score", json!(91.5))
            .with_metric("word_count", json!(1800));

        assert_eq!(artifact.metric_f64("human_score"), Some(91.5));
        assert_eq!(artifact.metric_u64("word_count"), Some(1800));
        assert!(artifact.metric("missing").is_none());
    }

    #[test]
    fn test_new_attempts_get_new_ids() {
        let first = StageArtifact::text(StageKind::Write, "same");
        let second = StageArtifact::text(StageKind::Write, "same");

        assert_ne!(first.id(), second.id());
        assert_eq!(first.content_digest(), second.content_digest());
    }

    #[test]
    fn test_document_digest_differs_from_text() {
        let doc = StageArtifact::document(StageKind::Plan, json!({"title": "x"}));
        let text = StageArtifact::text(StageKind::Plan, "x");
        assert_ne!(doc.content_digest(), text.content_digest());
        assert_eq!(doc.content_digest().len(), 64);
    }

    #[test]
    fn test_content_serialization_shape() {
        let content = ArtifactContent::Text("body".to_string());
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json, json!({"type": "text", "value": "body"}));
    }
}
