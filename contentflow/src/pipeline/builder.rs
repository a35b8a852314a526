//! Builder for content pipelines.

use super::content::ContentPipeline;
use super::controller::StageController;
use super::state::{PipelineIds, PipelineState};
use crate::backend::GenerationBackend;
use crate::config::PipelineConfig;
use crate::core::StageArtifact;
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink};
use crate::persistence::{PersistenceDispatcher, PersistenceGateway};
use crate::progress::{Scheduler, TokioScheduler};
use std::sync::Arc;

/// Builder for a [`ContentPipeline`].
pub struct ContentPipelineBuilder {
    backend: Arc<dyn GenerationBackend>,
    gateway: Arc<dyn PersistenceGateway>,
    ids: PipelineIds,
    artifacts: Vec<StageArtifact>,
    config: PipelineConfig,
    scheduler: Arc<dyn Scheduler>,
    events: Arc<dyn EventSink>,
}

impl ContentPipelineBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new(backend: Arc<dyn GenerationBackend>, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            backend,
            gateway,
            ids: PipelineIds::default(),
            artifacts: Vec::new(),
            config: PipelineConfig::default(),
            scheduler: Arc::new(TokioScheduler),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the record IDs.
    #[must_use]
    pub fn with_ids(mut self, ids: PipelineIds) -> Self {
        self.ids = ids;
        self
    }

    /// Seeds an accepted artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: StageArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the tick scheduler.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the configuration is invalid.
    pub fn build(self) -> Result<ContentPipeline, PipelineError> {
        self.config.validate()?;

        let config = Arc::new(self.config);
        let persistence = Arc::new(
            PersistenceDispatcher::new(self.gateway).with_events(self.events.clone()),
        );
        let state = self
            .artifacts
            .into_iter()
            .fold(PipelineState::new(self.ids), PipelineState::with_artifact);

        let backend = self.backend;
        let scheduler = self.scheduler;
        let events = self.events;
        let dispatcher = persistence.clone();

        Ok(ContentPipeline::from_parts(state, persistence, move |stage, shared| {
            StageController::new(stage, backend.clone(), shared, dispatcher.clone())
                .with_config(config.clone())
                .with_scheduler(scheduler.clone())
                .with_events(events.clone())
        }))
    }
}
