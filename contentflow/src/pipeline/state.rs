//! Accepted pipeline state shared by all stages.

use crate::core::{StageArtifact, StageKind};
use crate::errors::PipelineError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifiers of the external records a pipeline saves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineIds {
    /// Pipeline progress record.
    pub pipeline_id: Option<String>,
    /// Content record.
    pub content_id: Option<String>,
}

impl PipelineIds {
    /// Creates a set of IDs.
    #[must_use]
    pub fn new(pipeline_id: Option<String>, content_id: Option<String>) -> Self {
        Self {
            pipeline_id,
            content_id,
        }
    }
}

/// The accepted artifact of each stage plus record identifiers.
///
/// Only stage controllers and version arbiters write artifact slots, and
/// only the owning stage's slot.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    ids: PipelineIds,
    artifacts: HashMap<StageKind, StageArtifact>,
    plan_approved: bool,
}

/// State handle shared between the stages of one pipeline.
pub type SharedPipelineState = Arc<RwLock<PipelineState>>;

impl PipelineState {
    /// Creates an empty state.
    #[must_use]
    pub fn new(ids: PipelineIds) -> Self {
        Self {
            ids,
            ..Self::default()
        }
    }

    /// Seeds an accepted artifact, e.g. when resuming a saved pipeline.
    #[must_use]
    pub fn with_artifact(mut self, artifact: StageArtifact) -> Self {
        self.artifacts.insert(artifact.stage(), artifact);
        self
    }

    /// Wraps the state for sharing.
    #[must_use]
    pub fn shared(self) -> SharedPipelineState {
        Arc::new(RwLock::new(self))
    }

    /// Returns the record IDs.
    #[must_use]
    pub fn ids(&self) -> &PipelineIds {
        &self.ids
    }

    /// Returns the accepted artifact of a stage.
    #[must_use]
    pub fn artifact(&self, stage: StageKind) -> Option<&StageArtifact> {
        self.artifacts.get(&stage)
    }

    /// Returns true if the stage has an accepted artifact.
    #[must_use]
    pub fn has_artifact(&self, stage: StageKind) -> bool {
        self.artifacts.contains_key(&stage)
    }

    /// Returns true if the accepted plan has been approved.
    #[must_use]
    pub fn plan_approved(&self) -> bool {
        self.plan_approved
    }

    /// Approves the accepted plan and returns it.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NoPlanToApprove` if no plan is accepted.
    pub fn approve_plan(&mut self) -> Result<StageArtifact, PipelineError> {
        let plan = self
            .artifacts
            .get(&StageKind::Plan)
            .cloned()
            .ok_or(PipelineError::NoPlanToApprove)?;
        self.plan_approved = true;
        Ok(plan)
    }

    /// Makes `artifact` the accepted artifact of its stage.
    ///
    /// A new plan resets approval. A plan carrying a content record ID
    /// fills in a missing one.
    pub(crate) fn commit(&mut self, artifact: StageArtifact) -> Option<StageArtifact> {
        if artifact.stage() == StageKind::Plan {
            self.plan_approved = false;
            if self.ids.content_id.is_none() {
                self.ids.content_id = artifact
                    .metric("insight_id")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string);
            }
        }
        self.artifacts.insert(artifact.stage(), artifact)
    }
}
