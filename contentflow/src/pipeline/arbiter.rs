//! Version comparison for redone stages.

use super::state::SharedPipelineState;
use crate::core::{StageArtifact, StageKind};
use crate::errors::PipelineError;
use crate::events::{EventSink, PipelineEvent};
use crate::persistence::PersistenceDispatcher;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// The user's decision on a version comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionChoice {
    /// Keep the accepted artifact; discard the candidate.
    KeepOriginal,
    /// Replace the accepted artifact with the candidate.
    UseCandidate,
}

/// The accepted artifact and a redo candidate, awaiting a choice.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionComparison {
    original: StageArtifact,
    candidate: StageArtifact,
}

impl VersionComparison {
    /// The accepted artifact at the time of the redo.
    #[must_use]
    pub fn original(&self) -> &StageArtifact {
        &self.original
    }

    /// The redo result.
    #[must_use]
    pub fn candidate(&self) -> &StageArtifact {
        &self.candidate
    }
}

/// Outcome of resolving a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The original stayed; the candidate was discarded.
    Kept(StageArtifact),
    /// The candidate replaced the original.
    Replaced(StageArtifact),
}

impl Resolution {
    /// The artifact now accepted for the stage.
    #[must_use]
    pub fn accepted(&self) -> &StageArtifact {
        match self {
            Self::Kept(artifact) | Self::Replaced(artifact) => artifact,
        }
    }
}

/// Holds at most one pending comparison for a stage.
pub struct VersionArbiter {
    stage: StageKind,
    pending: Mutex<Option<VersionComparison>>,
    state: SharedPipelineState,
    persistence: Arc<PersistenceDispatcher>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for VersionArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionArbiter")
            .field("stage", &self.stage)
            .field("pending", &self.has_pending())
            .finish_non_exhaustive()
    }
}

impl VersionArbiter {
    pub(crate) fn new(
        stage: StageKind,
        state: SharedPipelineState,
        persistence: Arc<PersistenceDispatcher>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            stage,
            pending: Mutex::new(None),
            state,
            persistence,
            events,
        }
    }

    pub(crate) fn set_events(&mut self, events: Arc<dyn EventSink>) {
        self.events = events;
    }

    /// Returns true if a comparison awaits a choice.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Returns a copy of the pending comparison.
    #[must_use]
    pub fn pending(&self) -> Option<VersionComparison> {
        self.pending.lock().clone()
    }

    /// Opens a comparison between the accepted artifact and a candidate.
    ///
    /// Called by the stage controller when a redo succeeds. The pipeline
    /// state is not touched.
    pub(crate) fn propose(
        &self,
        original: StageArtifact,
        candidate: StageArtifact,
    ) -> Result<VersionComparison, PipelineError> {
        let mut pending = self.pending.lock();
        if pending.is_some() {
            return Err(PipelineError::ComparisonPending(self.stage));
        }

        self.events.try_emit(&PipelineEvent::VersionProposed {
            stage: self.stage,
            original_id: original.id(),
            candidate_id: candidate.id(),
        });
        info!(stage = %self.stage, candidate = %candidate.id(), "Version comparison opened");

        let comparison = VersionComparison {
            original,
            candidate,
        };
        *pending = Some(comparison.clone());
        Ok(comparison)
    }

    /// Resolves the pending comparison.
    ///
    /// `KeepOriginal` leaves the pipeline state untouched and saves
    /// nothing. `UseCandidate` commits the candidate and saves it to the
    /// pipeline record.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NoPendingComparison` if nothing is pending.
    pub fn resolve(&self, choice: VersionChoice) -> Result<Resolution, PipelineError> {
        let comparison = self
            .pending
            .lock()
            .take()
            .ok_or(PipelineError::NoPendingComparison(self.stage))?;

        let resolution = match choice {
            VersionChoice::KeepOriginal => Resolution::Kept(comparison.original),
            VersionChoice::UseCandidate => {
                let candidate = comparison.candidate;
                let ids = {
                    let mut state = self.state.write();
                    state.commit(candidate.clone());
                    state.ids().clone()
                };
                self.events.try_emit(&PipelineEvent::StageCommitted {
                    stage: self.stage,
                    artifact_id: candidate.id(),
                    digest: candidate.content_digest(),
                });
                self.persistence.persist_resolution(&ids, &candidate);
                Resolution::Replaced(candidate)
            }
        };

        let replaced = matches!(resolution, Resolution::Replaced(_));
        self.events.try_emit(&PipelineEvent::VersionResolved {
            stage: self.stage,
            replaced,
            winner_id: resolution.accepted().id(),
        });
        info!(stage = %self.stage, replaced, "Version comparison resolved");

        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::pipeline::{PipelineIds, PipelineState};
    use crate::testing::RecordingGateway;
    use pretty_assertions::assert_eq;

    struct Fixture {
        arbiter: VersionArbiter,
        state: SharedPipelineState,
        gateway: Arc<RecordingGateway>,
        persistence: Arc<PersistenceDispatcher>,
        events: Arc<CollectingEventSink>,
    }

    fn fixture(original: &StageArtifact) -> Fixture {
        let state = PipelineState::new(PipelineIds::new(
            Some("pipe-1".to_string()),
            Some("ins-1".to_string()),
        ))
        .with_artifact(original.clone())
        .shared();
        let gateway = Arc::new(RecordingGateway::new());
        let persistence = Arc::new(PersistenceDispatcher::new(gateway.clone()));
        let events = Arc::new(CollectingEventSink::new());
        let arbiter = VersionArbiter::new(
            original.stage(),
            state.clone(),
            persistence.clone(),
            events.clone(),
        );
        Fixture {
            arbiter,
            state,
            gateway,
            persistence,
            events,
        }
    }

    #[tokio::test]
    async fn test_keep_original_leaves_state_identical() {
        let original = StageArtifact::text(StageKind::Humanize, "v1");
        let f = fixture(&original);

        f.arbiter
            .propose(original.clone(), StageArtifact::text(StageKind::Humanize, "v2"))
            .unwrap();
        let resolution = f.arbiter.resolve(VersionChoice::KeepOriginal).unwrap();
        f.persistence.flush().await;

        assert_eq!(resolution, Resolution::Kept(original.clone()));
        assert_eq!(f.state.read().artifact(StageKind::Humanize), Some(&original));
        assert!(f.gateway.pipeline_saves().is_empty());
        assert!(!f.arbiter.has_pending());
    }

    #[tokio::test]
    async fn test_use_candidate_commits_and_saves() {
        let original = StageArtifact::text(StageKind::Humanize, "v1");
        let candidate = StageArtifact::text(StageKind::Humanize, "v2");
        let f = fixture(&original);

        f.arbiter.propose(original, candidate.clone()).unwrap();
        let resolution = f.arbiter.resolve(VersionChoice::UseCandidate).unwrap();
        f.persistence.flush().await;

        assert_eq!(resolution.accepted(), &candidate);
        assert_eq!(f.state.read().artifact(StageKind::Humanize), Some(&candidate));
        assert_eq!(f.gateway.pipeline_saves().len(), 1);
        assert!(f.gateway.content_saves().is_empty());
        assert_eq!(
            f.events.event_types(),
            vec!["version.proposed", "stage.committed", "version.resolved"]
        );
    }

    #[test]
    fn test_second_proposal_rejected() {
        let original = StageArtifact::text(StageKind::Write, "v1");
        let f = fixture(&original);

        f.arbiter
            .propose(original.clone(), StageArtifact::text(StageKind::Write, "v2"))
            .unwrap();
        let err = f
            .arbiter
            .propose(original, StageArtifact::text(StageKind::Write, "v3"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ComparisonPending(StageKind::Write)));
        assert_eq!(
            f.arbiter.pending().unwrap().candidate().content().as_text(),
            Some("v2")
        );
    }

    #[test]
    fn test_resolve_without_pending() {
        let original = StageArtifact::text(StageKind::SeoOptimize, "v1");
        let f = fixture(&original);
        let err = f.arbiter.resolve(VersionChoice::KeepOriginal).unwrap_err();
        assert!(matches!(err, PipelineError::NoPendingComparison(StageKind::SeoOptimize)));
    }
}
