//! Error types for the contentflow pipeline.
//!
//! Stage-level failures are terminal for the attempt that produced them and
//! never leak into another stage's state. Persistence failures have their own
//! type because they are logged, never surfaced as attempt failures.

use crate::core::StageKind;
use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network failure or a non-success HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered but reported a failure.
    #[error("{stage} failed: {message}")]
    Backend {
        /// The stage whose backend failed.
        stage: StageKind,
        /// Message reported by the backend.
        message: String,
    },

    /// A success response did not carry the artifact payload.
    #[error("{stage} response is missing `{field}`")]
    MalformedResult {
        /// The stage whose response was malformed.
        stage: StageKind,
        /// The missing response field.
        field: String,
    },

    /// A generation attempt is already running for the stage.
    #[error("A {0} generation is already running")]
    AttemptInProgress(StageKind),

    /// A redo was requested but the stage has no accepted artifact.
    #[error("Cannot redo {0}: no accepted artifact exists")]
    NothingToRedo(StageKind),

    /// A version comparison is already open for the stage.
    #[error("A version comparison is already pending for {0}")]
    ComparisonPending(StageKind),

    /// `resolve` was called without an open comparison.
    #[error("No version comparison is pending for {0}")]
    NoPendingComparison(StageKind),

    /// The plan cannot be approved because none is accepted.
    #[error("No accepted plan to approve")]
    NoPlanToApprove,

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Creates a backend failure.
    #[must_use]
    pub fn backend(stage: StageKind, message: impl Into<String>) -> Self {
        Self::Backend {
            stage,
            message: message.into(),
        }
    }

    /// Creates a malformed result error.
    #[must_use]
    pub fn malformed(stage: StageKind, field: impl Into<String>) -> Self {
        Self::MalformedResult {
            stage,
            field: field.into(),
        }
    }

    /// Returns the single human-readable message shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend { message, .. } => message.clone(),
            Self::Transport(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true if the error rejected a request before any backend call.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::AttemptInProgress(_)
                | Self::NothingToRedo(_)
                | Self::ComparisonPending(_)
                | Self::NoPendingComparison(_)
                | Self::NoPlanToApprove
        )
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Errors from the persistence gateway.
///
/// These are only ever logged; the in-memory commit has already happened.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    /// The save request could not be delivered.
    #[error("Persistence transport error: {0}")]
    Transport(String),

    /// The store answered but refused the save.
    #[error("Persistence rejected: {0}")]
    Rejected(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for PersistenceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_user_message_is_bare() {
        let err = PipelineError::backend(StageKind::Humanize, "Humanization failed");
        assert_eq!(err.user_message(), "Humanization failed");
        assert_eq!(err.to_string(), "humanize failed: Humanization failed");
    }

    #[test]
    fn test_transport_user_message() {
        let err = PipelineError::Transport("Server error: 502".to_string());
        assert_eq!(err.user_message(), "Server error: 502");
    }

    #[test]
    fn test_rejections() {
        assert!(PipelineError::AttemptInProgress(StageKind::Plan).is_rejection());
        assert!(PipelineError::NothingToRedo(StageKind::Write).is_rejection());
        assert!(!PipelineError::Transport("down".to_string()).is_rejection());
        assert!(!PipelineError::malformed(StageKind::Plan, "plan").is_rejection());
    }

    #[test]
    fn test_malformed_message() {
        let err = PipelineError::malformed(StageKind::SeoOptimize, "optimizedArticle");
        assert!(err.to_string().contains("seo-optimize"));
        assert!(err.to_string().contains("optimizedArticle"));
    }

    #[test]
    fn test_from_serde_error() {
        let err: PipelineError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, PipelineError::Serialization(_)));
    }
}
