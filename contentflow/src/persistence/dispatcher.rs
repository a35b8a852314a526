//! Detached dispatch of store saves.

use super::records::{
    content_update, pipeline_update, plan_approval_content_update, plan_approval_update,
};
use super::{ContentUpdate, PersistenceGateway, PipelineProgressUpdate};
use crate::core::{StageArtifact, StageKind};
use crate::errors::PersistenceError;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent, SaveTarget};
use crate::pipeline::PipelineIds;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs store saves as independent background tasks.
///
/// Each commit issues up to two saves (pipeline record and content record)
/// that neither wait for nor depend on each other. Their outcome never
/// reaches the pipeline state; it is logged and reported to the event sink.
pub struct PersistenceDispatcher {
    gateway: Arc<dyn PersistenceGateway>,
    events: Arc<dyn EventSink>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for PersistenceDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceDispatcher")
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl PersistenceDispatcher {
    /// Creates a dispatcher for a gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            gateway,
            events: Arc::new(NoOpEventSink),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Sets the event sink for save outcomes.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Saves a freshly committed artifact.
    ///
    /// Each save is skipped when its record ID is unknown.
    pub fn persist_commit(&self, ids: &PipelineIds, artifact: &StageArtifact) {
        let stage = artifact.stage();
        if let Some(ref pipeline_id) = ids.pipeline_id {
            self.dispatch_pipeline(stage, pipeline_update(pipeline_id, artifact));
        }
        if let Some(ref content_id) = ids.content_id {
            if let Some(update) = content_update(content_id, artifact) {
                self.dispatch_content(stage, update);
            }
        }
    }

    /// Saves a redo candidate the user chose over the accepted artifact.
    ///
    /// Only the pipeline record is updated.
    pub fn persist_resolution(&self, ids: &PipelineIds, artifact: &StageArtifact) {
        if let Some(ref pipeline_id) = ids.pipeline_id {
            self.dispatch_pipeline(artifact.stage(), pipeline_update(pipeline_id, artifact));
        }
    }

    /// Saves the approval of the accepted plan.
    pub fn persist_plan_approval(&self, ids: &PipelineIds, plan: &StageArtifact) {
        if let Some(ref pipeline_id) = ids.pipeline_id {
            self.dispatch_pipeline(StageKind::Plan, plan_approval_update(pipeline_id, plan));
        }
        if let Some(ref content_id) = ids.content_id {
            self.dispatch_content(StageKind::Plan, plan_approval_content_update(content_id));
        }
    }

    /// Waits for every save dispatched so far.
    pub async fn flush(&self) {
        loop {
            let handles = std::mem::take(&mut *self.pending.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(err) = handle.await {
                    warn!(error = %err, "Persistence task did not complete");
                }
            }
        }
    }

    /// Number of saves that have not finished yet.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().iter().filter(|h| !h.is_finished()).count()
    }

    fn dispatch_pipeline(&self, stage: StageKind, update: PipelineProgressUpdate) {
        let gateway = self.gateway.clone();
        self.spawn(stage, SaveTarget::Pipeline, async move {
            gateway.save_pipeline_progress(update).await
        });
    }

    fn dispatch_content(&self, stage: StageKind, update: ContentUpdate) {
        let gateway = self.gateway.clone();
        self.spawn(stage, SaveTarget::Content, async move {
            gateway.save_content_progress(update).await
        });
    }

    fn spawn<F>(&self, stage: StageKind, target: SaveTarget, save: F)
    where
        F: Future<Output = Result<(), PersistenceError>> + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%stage, ?target, "No tokio runtime available; save dropped");
            self.events.try_emit(&PipelineEvent::PersistenceFailed {
                stage,
                target,
                error: "no async runtime".to_string(),
            });
            return;
        };

        let events = self.events.clone();
        let handle = runtime.spawn(async move {
            match save.await {
                Ok(()) => {
                    debug!(%stage, ?target, "Saved");
                    events.try_emit(&PipelineEvent::PersistenceSaved { stage, target });
                }
                Err(err) => {
                    warn!(%stage, ?target, error = %err, "Save failed");
                    events.try_emit(&PipelineEvent::PersistenceFailed {
                        stage,
                        target,
                        error: err.to_string(),
                    });
                }
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::json;

    mock! {
        Gateway {}

        #[async_trait]
        impl PersistenceGateway for Gateway {
            async fn save_pipeline_progress(
                &self,
                update: PipelineProgressUpdate,
            ) -> Result<(), PersistenceError>;
            async fn save_content_progress(
                &self,
                update: ContentUpdate,
            ) -> Result<(), PersistenceError>;
        }
    }

    fn ids() -> PipelineIds {
        PipelineIds::new(Some("pipe-1".to_string()), Some("ins-1".to_string()))
    }

    #[tokio::test]
    async fn test_commit_issues_both_saves() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_save_pipeline_progress()
            .withf(|u| u.pipeline_id == "pipe-1" && u.stage == 5)
            .times(1)
            .returning(|_| Ok(()));
        gateway
            .expect_save_content_progress()
            .withf(|u| u.content_id == "ins-1" && u.pipeline_stage == "humanizing")
            .times(1)
            .returning(|_| Ok(()));

        let events = Arc::new(CollectingEventSink::new());
        let dispatcher = PersistenceDispatcher::new(Arc::new(gateway)).with_events(events.clone());

        let artifact =
            StageArtifact::text(StageKind::Humanize, "Human").with_metric("human_score", json!(92));
        dispatcher.persist_commit(&ids(), &artifact);
        dispatcher.flush().await;

        assert_eq!(events.events_of_type("persistence.saved").len(), 2);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_save_pipeline_progress()
            .returning(|_| Err(PersistenceError::Rejected("locked".to_string())));
        gateway.expect_save_content_progress().returning(|_| Ok(()));

        let events = Arc::new(CollectingEventSink::new());
        let dispatcher = PersistenceDispatcher::new(Arc::new(gateway)).with_events(events.clone());

        dispatcher.persist_commit(&ids(), &StageArtifact::text(StageKind::Write, "Body"));
        dispatcher.flush().await;

        let failed = events.events_of_type("persistence.failed");
        assert_eq!(failed.len(), 1);
        assert!(matches!(
            &failed[0],
            PipelineEvent::PersistenceFailed { target: SaveTarget::Pipeline, error, .. }
                if error.contains("locked")
        ));
        assert_eq!(events.events_of_type("persistence.saved").len(), 1);
    }

    #[tokio::test]
    async fn test_missing_ids_skip_saves() {
        let mut gateway = MockGateway::new();
        gateway.expect_save_pipeline_progress().never();
        gateway.expect_save_content_progress().never();

        let dispatcher = PersistenceDispatcher::new(Arc::new(gateway));
        dispatcher.persist_commit(
            &PipelineIds::default(),
            &StageArtifact::text(StageKind::Write, "Body"),
        );
        dispatcher.flush().await;
    }

    #[tokio::test]
    async fn test_plan_commit_has_no_content_save() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_save_pipeline_progress()
            .withf(|u| u.ai_log.action == "plan_generated")
            .times(1)
            .returning(|_| Ok(()));
        gateway.expect_save_content_progress().never();

        let dispatcher = PersistenceDispatcher::new(Arc::new(gateway));
        dispatcher.persist_commit(&ids(), &StageArtifact::document(StageKind::Plan, json!({})));
        dispatcher.flush().await;
    }

    #[tokio::test]
    async fn test_resolution_saves_pipeline_record_only() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_save_pipeline_progress()
            .withf(|u| u.pipeline_id == "pipe-1" && u.data["humanizedArticle"] == json!("v2"))
            .times(1)
            .returning(|_| Ok(()));
        gateway.expect_save_content_progress().never();

        let dispatcher = PersistenceDispatcher::new(Arc::new(gateway));
        dispatcher.persist_resolution(&ids(), &StageArtifact::text(StageKind::Humanize, "v2"));
        dispatcher.flush().await;
    }

    #[tokio::test]
    async fn test_plan_approval_saves() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_save_pipeline_progress()
            .withf(|u| u.ai_log.action == "plan_approved" && u.data["planApproved"] == json!(true))
            .times(1)
            .returning(|_| Ok(()));
        gateway
            .expect_save_content_progress()
            .withf(|u| u.pipeline_stage == "plan_approved")
            .times(1)
            .returning(|_| Ok(()));

        let dispatcher = PersistenceDispatcher::new(Arc::new(gateway));
        let plan = StageArtifact::document(StageKind::Plan, json!({"title": "T"}));
        dispatcher.persist_plan_approval(&ids(), &plan);
        dispatcher.flush().await;
    }

    #[test]
    fn test_without_runtime_reports_failure() {
        let gateway = MockGateway::new();
        let events = Arc::new(CollectingEventSink::new());
        let dispatcher = PersistenceDispatcher::new(Arc::new(gateway)).with_events(events.clone());

        dispatcher.persist_commit(&ids(), &StageArtifact::text(StageKind::Write, "Body"));
        assert_eq!(events.events_of_type("persistence.failed").len(), 2);
    }
}
