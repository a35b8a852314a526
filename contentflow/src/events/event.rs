//! Typed pipeline events.

use crate::core::StageKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which store record a persistence event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveTarget {
    /// The pipeline progress record.
    Pipeline,
    /// The content record.
    Content,
}

/// An observable pipeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// An attempt entered `running`.
    StageStarted {
        /// Stage kind.
        stage: StageKind,
        /// Attempt ID.
        attempt_id: Uuid,
        /// Whether the attempt is a redo.
        redo: bool,
    },
    /// Progress changed.
    StageProgress {
        /// Stage kind.
        stage: StageKind,
        /// Attempt ID.
        attempt_id: Uuid,
        /// Percent.
        percent: u8,
        /// Label.
        label: String,
    },
    /// An attempt produced a result.
    StageSucceeded {
        /// Stage kind.
        stage: StageKind,
        /// Attempt ID.
        attempt_id: Uuid,
        /// The produced artifact.
        artifact_id: Uuid,
        /// Elapsed stopwatch seconds.
        elapsed_secs: u64,
    },
    /// An attempt failed.
    StageFailed {
        /// Stage kind.
        stage: StageKind,
        /// Attempt ID.
        attempt_id: Uuid,
        /// User-facing message.
        message: String,
    },
    /// An artifact became the accepted artifact for its stage.
    StageCommitted {
        /// Stage kind.
        stage: StageKind,
        /// The committed artifact.
        artifact_id: Uuid,
        /// SHA-256 of the artifact content.
        digest: String,
    },
    /// A redo opened a version comparison.
    VersionProposed {
        /// Stage kind.
        stage: StageKind,
        /// The accepted artifact.
        original_id: Uuid,
        /// The redo result.
        candidate_id: Uuid,
    },
    /// A version comparison was resolved.
    VersionResolved {
        /// Stage kind.
        stage: StageKind,
        /// True if the candidate replaced the original.
        replaced: bool,
        /// The artifact left in the slot.
        winner_id: Uuid,
    },
    /// A store save succeeded.
    PersistenceSaved {
        /// Stage kind.
        stage: StageKind,
        /// The record saved.
        target: SaveTarget,
    },
    /// A store save failed.
    PersistenceFailed {
        /// Stage kind.
        stage: StageKind,
        /// The record that failed to save.
        target: SaveTarget,
        /// Failure description.
        error: String,
    },
}

impl PipelineEvent {
    /// Dotted event type name, e.g. `stage.started`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageStarted { .. } => "stage.started",
            Self::StageProgress { .. } => "stage.progress",
            Self::StageSucceeded { .. } => "stage.succeeded",
            Self::StageFailed { .. } => "stage.failed",
            Self::StageCommitted { .. } => "stage.committed",
            Self::VersionProposed { .. } => "version.proposed",
            Self::VersionResolved { .. } => "version.resolved",
            Self::PersistenceSaved { .. } => "persistence.saved",
            Self::PersistenceFailed { .. } => "persistence.failed",
        }
    }

    /// The stage the event concerns.
    #[must_use]
    pub fn stage(&self) -> StageKind {
        match self {
            Self::StageStarted { stage, .. }
            | Self::StageProgress { stage, .. }
            | Self::StageSucceeded { stage, .. }
            | Self::StageFailed { stage, .. }
            | Self::StageCommitted { stage, .. }
            | Self::VersionProposed { stage, .. }
            | Self::VersionResolved { stage, .. }
            | Self::PersistenceSaved { stage, .. }
            | Self::PersistenceFailed { stage, .. } => *stage,
        }
    }

    /// The event as JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
