//! Stage controller: runs one stage's generation attempts.

use super::arbiter::{Resolution, VersionArbiter, VersionChoice, VersionComparison};
use super::cell::{AttemptCell, AttemptGuard};
use super::state::SharedPipelineState;
use crate::backend::{extract_artifact, GenerationBackend, GenerationRequest, StageInputs};
use crate::config::PipelineConfig;
use crate::core::{AttemptSnapshot, StageArtifact, StageKind, TransportStyle};
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::persistence::PersistenceDispatcher;
use crate::progress::{ElapsedTimer, ProgressReporter, Scheduler, TickHandle, TokioScheduler};
use crate::streaming::{FrameDecoder, FrameKind, StreamFrame};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument};
use uuid::Uuid;

/// Failure message of a stream that ends without a terminal frame.
pub const NO_STREAM_RESULT: &str = "No result received from stream";

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A first-time result, now the accepted artifact.
    Committed(StageArtifact),
    /// A redo result, waiting for the user to pick a version.
    AwaitingChoice(VersionComparison),
}

impl RunOutcome {
    /// The artifact the run produced.
    #[must_use]
    pub fn artifact(&self) -> &StageArtifact {
        match self {
            Self::Committed(artifact) => artifact,
            Self::AwaitingChoice(comparison) => comparison.candidate(),
        }
    }
}

/// Runs generation attempts for one stage.
///
/// At most one attempt runs at a time. A first-time success is committed
/// to the pipeline state and saved; a redo success opens a version
/// comparison instead. Failures leave the accepted artifact untouched.
pub struct StageController {
    stage: StageKind,
    backend: Arc<dyn GenerationBackend>,
    state: SharedPipelineState,
    persistence: Arc<PersistenceDispatcher>,
    scheduler: Arc<dyn Scheduler>,
    events: Arc<dyn EventSink>,
    config: Arc<PipelineConfig>,
    cell: Arc<AttemptCell>,
    arbiter: VersionArbiter,
}

impl std::fmt::Debug for StageController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageController")
            .field("stage", &self.stage)
            .field("attempt", &self.cell.snapshot())
            .field("arbiter", &self.arbiter)
            .finish_non_exhaustive()
    }
}

impl StageController {
    /// Creates a controller with the tokio scheduler, default
    /// configuration and no event sink.
    #[must_use]
    pub fn new(
        stage: StageKind,
        backend: Arc<dyn GenerationBackend>,
        state: SharedPipelineState,
        persistence: Arc<PersistenceDispatcher>,
    ) -> Self {
        let events: Arc<dyn EventSink> = Arc::new(NoOpEventSink);
        Self {
            stage,
            backend,
            arbiter: VersionArbiter::new(stage, state.clone(), persistence.clone(), events.clone()),
            cell: Arc::new(AttemptCell::new(stage, events.clone())),
            state,
            persistence,
            scheduler: Arc::new(TokioScheduler),
            events,
            config: Arc::new(PipelineConfig::default()),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: Arc<PipelineConfig>) -> Self {
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
    ///
    /// Call before subscribing; existing subscriptions are not carried over.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.cell = Arc::new(AttemptCell::new(self.stage, events.clone()));
        self.arbiter.set_events(events.clone());
        self.events = events;
        self
    }

    /// Returns the stage kind.
    #[must_use]
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Returns the current attempt state.
    #[must_use]
    pub fn snapshot(&self) -> AttemptSnapshot {
        self.cell.snapshot()
    }

    /// Subscribes to the latest attempt state.
    ///
    /// A watch receiver only holds the newest snapshot, and a finished
    /// attempt returns to idle before `run` returns, so the succeeded or
    /// failed state is usually overwritten. Use
    /// [`subscribe_transitions`](Self::subscribe_transitions) to observe it.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AttemptSnapshot> {
        self.cell.subscribe()
    }

    /// Subscribes to every attempt state transition, in order.
    ///
    /// Receives the running, progress, succeeded/failed and idle snapshots
    /// of each attempt. A receiver that falls more than 64 snapshots behind
    /// gets `RecvError::Lagged` and resumes at the oldest one still buffered.
    #[must_use]
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<AttemptSnapshot> {
        self.cell.subscribe_transitions()
    }

    /// Returns the version arbiter of this stage.
    #[must_use]
    pub fn arbiter(&self) -> &VersionArbiter {
        &self.arbiter
    }

    /// Returns the pending version comparison, if any.
    #[must_use]
    pub fn pending_comparison(&self) -> Option<VersionComparison> {
        self.arbiter.pending()
    }

    /// Resolves the pending version comparison.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NoPendingComparison` if nothing is pending.
    pub fn resolve(&self, choice: VersionChoice) -> Result<Resolution, PipelineError> {
        self.arbiter.resolve(choice)
    }

    /// Runs one generation attempt.
    ///
    /// With `is_redo` the currently accepted artifact is snapshotted and a
    /// success opens a version comparison rather than replacing it. The
    /// attempt is back to idle when this returns.
    ///
    /// # Errors
    ///
    /// Rejections (no backend call made): `AttemptInProgress`,
    /// `ComparisonPending`, `NothingToRedo`. Attempt failures: `Transport`,
    /// `Backend`, `MalformedResult`.
    #[instrument(skip(self, inputs, is_redo), fields(stage = %self.stage, redo = is_redo))]
    pub async fn run(&self, inputs: StageInputs, is_redo: bool) -> Result<RunOutcome, PipelineError> {
        if self.cell.is_running() {
            return Err(PipelineError::AttemptInProgress(self.stage));
        }
        if self.arbiter.has_pending() {
            return Err(PipelineError::ComparisonPending(self.stage));
        }

        let (snapshot, ids) = {
            let state = self.state.read();
            let snapshot = if is_redo {
                let accepted = state
                    .artifact(self.stage)
                    .cloned()
                    .ok_or(PipelineError::NothingToRedo(self.stage))?;
                Some(accepted)
            } else {
                None
            };
            (snapshot, state.ids().clone())
        };

        let attempt_id = self.begin_attempt(is_redo)?;
        let guard = AttemptGuard::new(self.cell.clone(), attempt_id);
        info!(attempt_id = %attempt_id, "Attempt started");

        let request = GenerationRequest::new(self.stage, inputs).with_ids(ids.pipeline_id, ids.content_id);
        let result = match self.stage.transport() {
            TransportStyle::RequestResponse => self.run_request(attempt_id, &request).await,
            TransportStyle::Streaming => self.run_stream(attempt_id, &request).await,
        };

        let outcome = match result {
            Ok(artifact) => self.conclude_success(attempt_id, artifact, snapshot),
            Err(err) => {
                self.cell.fail(attempt_id, &err.user_message());
                Err(err)
            }
        };

        drop(guard);
        outcome
    }

    fn begin_attempt(&self, is_redo: bool) -> Result<Uuid, PipelineError> {
        let schedule = self.config.schedule_for(self.stage);
        let reporter = match self.stage.transport() {
            TransportStyle::RequestResponse => ProgressReporter::simulated(schedule),
            TransportStyle::Streaming => {
                ProgressReporter::streaming(schedule, self.config.chars_per_word)
            }
        };
        let simulated = reporter.has_pending_steps();

        let id = self
            .cell
            .begin(reporter, is_redo)
            .ok_or(PipelineError::AttemptInProgress(self.stage))?;

        let weak = Arc::downgrade(&self.cell);
        let timer = ElapsedTimer::start(self.scheduler.as_ref(), self.config.elapsed_tick(), move |secs| {
            if let Some(cell) = weak.upgrade() {
                cell.record_elapsed(id, secs);
            }
        });

        let ticker = simulated.then(|| self.start_ticker(id));
        self.cell.install_clocks(id, timer, ticker);
        Ok(id)
    }

    fn start_ticker(&self, id: Uuid) -> TickHandle {
        let weak = Arc::downgrade(&self.cell);
        self.scheduler.every(
            self.config.tick_interval(self.stage),
            Box::new(move || {
                if let Some(cell) = weak.upgrade() {
                    cell.advance_schedule(id);
                }
            }),
        )
    }

    async fn run_request(
        &self,
        id: Uuid,
        request: &GenerationRequest,
    ) -> Result<StageArtifact, PipelineError> {
        let response = self.backend.generate(request).await;
        self.cell.backend_resolved(id, response.is_ok());
        extract_artifact(self.stage, &response?)
    }

    async fn run_stream(
        &self,
        id: Uuid,
        request: &GenerationRequest,
    ) -> Result<StageArtifact, PipelineError> {
        let mut stream = self.backend.open_stream(request).await?;
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = stream.next().await {
            for frame in decoder.push_bytes(&chunk?) {
                match frame.kind {
                    FrameKind::Progress | FrameKind::Token => self.cell.apply_frame(id, &frame),
                    FrameKind::Complete => return self.stream_result(&frame),
                    FrameKind::Error => {
                        let message = frame
                            .error_message()
                            .unwrap_or_else(|| self.stage.default_failure_message());
                        return Err(PipelineError::backend(self.stage, message));
                    }
                }
            }
        }

        Err(PipelineError::backend(self.stage, NO_STREAM_RESULT))
    }

    fn stream_result(&self, frame: &StreamFrame) -> Result<StageArtifact, PipelineError> {
        let success = frame.payload.get("success").and_then(Value::as_bool) == Some(true);
        if !success && frame.error_message().is_none() {
            return Err(PipelineError::backend(self.stage, NO_STREAM_RESULT));
        }
        extract_artifact(self.stage, &frame.payload)
    }

    fn conclude_success(
        &self,
        id: Uuid,
        artifact: StageArtifact,
        snapshot: Option<StageArtifact>,
    ) -> Result<RunOutcome, PipelineError> {
        self.cell.succeed(id, &artifact);

        match snapshot {
            Some(original) => {
                let comparison = self.arbiter.propose(original, artifact)?;
                Ok(RunOutcome::AwaitingChoice(comparison))
            }
            None => {
                self.commit(&artifact);
                Ok(RunOutcome::Committed(artifact))
            }
        }
    }

    fn commit(&self, artifact: &StageArtifact) {
        let ids = {
            let mut state = self.state.write();
            state.commit(artifact.clone());
            state.ids().clone()
        };
        self.events.try_emit(&PipelineEvent::StageCommitted {
            stage: self.stage,
            artifact_id: artifact.id(),
            digest: artifact.content_digest(),
        });
        info!(stage = %self.stage, artifact_id = %artifact.id(), "Artifact committed");
        self.persistence.persist_commit(&ids, artifact);
    }
}
