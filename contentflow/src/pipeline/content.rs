//! The four-stage content pipeline.

use super::arbiter::{Resolution, VersionChoice};
use super::controller::{RunOutcome, StageController};
use super::state::{PipelineState, SharedPipelineState};
use crate::backend::StageInputs;
use crate::core::{StageArtifact, StageKind};
use crate::errors::PipelineError;
use crate::persistence::PersistenceDispatcher;
use std::sync::Arc;
use tracing::info;

/// One controller per stage over a shared pipeline state.
///
/// Build with [`super::ContentPipelineBuilder`].
#[derive(Debug)]
pub struct ContentPipeline {
    pub(super) state: SharedPipelineState,
    pub(super) persistence: Arc<PersistenceDispatcher>,
    pub(super) plan: StageController,
    pub(super) write: StageController,
    pub(super) humanize: StageController,
    pub(super) seo: StageController,
}

impl ContentPipeline {
    /// Returns the controller of a stage.
    #[must_use]
    pub fn controller(&self, stage: StageKind) -> &StageController {
        match stage {
            StageKind::Plan => &self.plan,
            StageKind::Write => &self.write,
            StageKind::Humanize => &self.humanize,
            StageKind::SeoOptimize => &self.seo,
        }
    }

    /// Returns the shared pipeline state.
    #[must_use]
    pub fn state(&self) -> &SharedPipelineState {
        &self.state
    }

    /// Returns a copy of a stage's accepted artifact.
    #[must_use]
    pub fn artifact(&self, stage: StageKind) -> Option<StageArtifact> {
        self.state.read().artifact(stage).cloned()
    }

    /// Runs an attempt of a stage.
    ///
    /// # Errors
    ///
    /// See [`StageController::run`].
    pub async fn run(
        &self,
        stage: StageKind,
        inputs: StageInputs,
        is_redo: bool,
    ) -> Result<RunOutcome, PipelineError> {
        self.controller(stage).run(inputs, is_redo).await
    }

    /// Resolves a stage's pending version comparison.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NoPendingComparison` if nothing is pending.
    pub fn resolve(&self, stage: StageKind, choice: VersionChoice) -> Result<Resolution, PipelineError> {
        self.controller(stage).resolve(choice)
    }

    /// Approves the accepted plan and saves the approval.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NoPlanToApprove` if no plan is accepted.
    pub fn approve_plan(&self) -> Result<StageArtifact, PipelineError> {
        let (plan, ids) = {
            let mut state = self.state.write();
            let plan = state.approve_plan()?;
            (plan, state.ids().clone())
        };
        info!(artifact_id = %plan.id(), "Plan approved");
        self.persistence.persist_plan_approval(&ids, &plan);
        Ok(plan)
    }

    /// Waits for outstanding saves.
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    pub(super) fn from_parts(
        state: PipelineState,
        persistence: Arc<PersistenceDispatcher>,
        make: impl Fn(StageKind, SharedPipelineState) -> StageController,
    ) -> Self {
        let state = state.shared();
        Self {
            plan: make(StageKind::Plan, state.clone()),
            write: make(StageKind::Write, state.clone()),
            humanize: make(StageKind::Humanize, state.clone()),
            seo: make(StageKind::SeoOptimize, state.clone()),
            state,
            persistence,
        }
    }
}
