//! Shared, observable attempt state of one stage.
//!
//! Every mutation (tick, frame, terminal transition) goes through the same
//! mutex and checks the attempt ID, so a tick that fires after the attempt
//! resolved, or for an older attempt, changes nothing.

use crate::core::{AttemptSnapshot, GenerationAttempt, StageArtifact, StageKind};
use crate::events::{EventSink, PipelineEvent};
use crate::progress::{completion_label, ElapsedTimer, ProgressReporter, TickHandle};
use crate::streaming::StreamFrame;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};
use uuid::Uuid;

/// Snapshots buffered per transition subscriber before it lags.
const TRANSITION_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Slot {
    attempt: GenerationAttempt,
    timer: Option<ElapsedTimer>,
    ticker: Option<TickHandle>,
}

impl Slot {
    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    fn stop_clocks(&mut self) -> u64 {
        self.stop_ticker();
        self.timer.take().map_or(0, ElapsedTimer::stop)
    }
}

pub(crate) struct AttemptCell {
    stage: StageKind,
    slot: Mutex<Slot>,
    watch: watch::Sender<AttemptSnapshot>,
    transitions: broadcast::Sender<AttemptSnapshot>,
    events: Arc<dyn EventSink>,
}

impl AttemptCell {
    pub(crate) fn new(stage: StageKind, events: Arc<dyn EventSink>) -> Self {
        let (watch, _) = watch::channel(AttemptSnapshot::idle(stage));
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            stage,
            slot: Mutex::new(Slot::default()),
            watch,
            transitions,
            events,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<AttemptSnapshot> {
        self.watch.subscribe()
    }

    pub(crate) fn subscribe_transitions(&self) -> broadcast::Receiver<AttemptSnapshot> {
        self.transitions.subscribe()
    }

    pub(crate) fn snapshot(&self) -> AttemptSnapshot {
        self.slot.lock().attempt.snapshot(self.stage)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.slot.lock().attempt.is_running()
    }

    fn publish(&self, slot: &Slot) {
        let snapshot = slot.attempt.snapshot(self.stage);
        // No receivers is not an error.
        let _ = self.transitions.send(snapshot.clone());
        self.watch.send_replace(snapshot);
    }

    fn publish_progress(&self, id: Uuid, slot: &Slot) {
        self.publish(slot);
        if let Some(progress) = slot.attempt.progress() {
            debug!(stage = %self.stage, percent = progress.percent(), label = progress.label(), "Progress");
            self.events.try_emit(&PipelineEvent::StageProgress {
                stage: self.stage,
                attempt_id: id,
                percent: progress.percent(),
                label: progress.label().to_string(),
            });
        }
    }

    /// Starts an attempt; `None` if one is already running.
    pub(crate) fn begin(&self, progress: ProgressReporter, redo: bool) -> Option<Uuid> {
        let mut slot = self.slot.lock();
        let id = slot.attempt.begin(progress)?;
        self.publish(&slot);
        self.events.try_emit(&PipelineEvent::StageStarted {
            stage: self.stage,
            attempt_id: id,
            redo,
        });
        Some(id)
    }

    /// Attaches the clocks of attempt `id`, or stops them if it is over.
    pub(crate) fn install_clocks(&self, id: Uuid, timer: ElapsedTimer, ticker: Option<TickHandle>) {
        let mut slot = self.slot.lock();
        if !slot.attempt.is_current(id) {
            timer.stop();
            if let Some(ticker) = ticker {
                ticker.cancel();
            }
            return;
        }
        slot.timer = Some(timer);
        slot.ticker = ticker;
    }

    pub(crate) fn advance_schedule(&self, id: Uuid) {
        let mut slot = self.slot.lock();
        if slot.attempt.update_progress(id, ProgressReporter::advance_schedule) {
            self.publish_progress(id, &slot);
        }
    }

    pub(crate) fn apply_frame(&self, id: Uuid, frame: &StreamFrame) {
        let mut slot = self.slot.lock();
        if slot.attempt.update_progress(id, |p| p.apply_frame(frame)) {
            self.publish_progress(id, &slot);
        }
    }

    pub(crate) fn record_elapsed(&self, id: Uuid, secs: u64) {
        let mut slot = self.slot.lock();
        if slot.attempt.record_elapsed(id, secs) {
            self.publish(&slot);
        }
    }

    /// Stops simulated ticks once the backend has answered.
    pub(crate) fn backend_resolved(&self, id: Uuid, finalize: bool) {
        let mut slot = self.slot.lock();
        if !slot.attempt.is_current(id) {
            return;
        }
        slot.stop_ticker();
        if finalize && slot.attempt.update_progress(id, ProgressReporter::finalize) {
            self.publish_progress(id, &slot);
        }
    }

    pub(crate) fn succeed(&self, id: Uuid, artifact: &StageArtifact) {
        let mut slot = self.slot.lock();
        if !slot.attempt.is_current(id) {
            return;
        }
        let elapsed_secs = slot.stop_clocks();
        slot.attempt.record_elapsed(id, elapsed_secs);
        slot.attempt.succeed(completion_label(artifact));
        self.publish(&slot);
        self.events.try_emit(&PipelineEvent::StageSucceeded {
            stage: self.stage,
            attempt_id: id,
            artifact_id: artifact.id(),
            elapsed_secs,
        });
    }

    pub(crate) fn fail(&self, id: Uuid, message: &str) {
        let mut slot = self.slot.lock();
        if !slot.attempt.is_current(id) {
            return;
        }
        let elapsed_secs = slot.stop_clocks();
        slot.attempt.record_elapsed(id, elapsed_secs);
        slot.attempt.fail(message);
        self.publish(&slot);
        warn!(stage = %self.stage, attempt_id = %id, error = message, "Attempt failed");
        self.events.try_emit(&PipelineEvent::StageFailed {
            stage: self.stage,
            attempt_id: id,
            message: message.to_string(),
        });
    }

    /// Returns attempt `id` to idle. A still-running attempt is abandoned.
    pub(crate) fn reset(&self, id: Uuid) {
        let mut slot = self.slot.lock();
        if slot.attempt.id() != Some(id) {
            return;
        }
        slot.stop_clocks();
        if slot.attempt.is_running() {
            debug!(stage = %self.stage, attempt_id = %id, "Attempt abandoned");
        }
        slot.attempt.reset();
        self.publish(&slot);
    }
}

/// Resets an attempt when dropped, including when `run` is cancelled.
pub(crate) struct AttemptGuard {
    cell: Arc<AttemptCell>,
    id: Uuid,
}

impl AttemptGuard {
    pub(crate) fn new(cell: Arc<AttemptCell>, id: Uuid) -> Self {
        Self { cell, id }
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.cell.reset(self.id);
    }
}
