//! Generation attempt lifecycle.
//!
//! An attempt moves `idle -> running -> succeeded | failed -> idle`. All
//! transitions are plain methods returning whether they applied, so the
//! state machine can be tested without any I/O.

use super::StageKind;
use crate::progress::ProgressReporter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// No attempt in progress.
    #[default]
    Idle,
    /// Waiting on the backend.
    Running,
    /// Finished with a result.
    Succeeded,
    /// Finished with an error.
    Failed,
}

impl AttemptStatus {
    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One invocation of a stage's backend.
#[derive(Debug, Clone, Default)]
pub struct GenerationAttempt {
    id: Option<Uuid>,
    status: AttemptStatus,
    progress: Option<ProgressReporter>,
    started_at: Option<DateTime<Utc>>,
    elapsed_secs: u64,
    error: Option<String>,
}

impl GenerationAttempt {
    /// Creates an idle attempt.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// Starts a new attempt with the given reporter.
    ///
    /// Returns `None` if an attempt is already running.
    pub fn begin(&mut self, progress: ProgressReporter) -> Option<Uuid> {
        if self.status == AttemptStatus::Running {
            return None;
        }
        let id = Uuid::new_v4();
        *self = Self {
            id: Some(id),
            status: AttemptStatus::Running,
            progress: Some(progress),
            started_at: Some(Utc::now()),
            elapsed_secs: 0,
            error: None,
        };
        Some(id)
    }

    /// Returns the attempt ID, if one has started.
    #[must_use]
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    /// Returns the status.
    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    /// Returns true while the backend is outstanding.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == AttemptStatus::Running
    }

    /// Returns true if `id` names the attempt that is currently running.
    #[must_use]
    pub fn is_current(&self, id: Uuid) -> bool {
        self.is_running() && self.id == Some(id)
    }

    /// Returns the progress reporter of the current attempt.
    #[must_use]
    pub fn progress(&self) -> Option<&ProgressReporter> {
        self.progress.as_ref()
    }

    /// Returns the error message of a failed attempt.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns when the attempt started.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Runs `update` against the reporter if `id` is still running.
    pub fn update_progress<F>(&mut self, id: Uuid, update: F) -> bool
    where
        F: FnOnce(&mut ProgressReporter) -> bool,
    {
        if !self.is_current(id) {
            return false;
        }
        self.progress.as_mut().is_some_and(update)
    }

    /// Records the elapsed-timer value if `id` is still running.
    pub fn record_elapsed(&mut self, id: Uuid, secs: u64) -> bool {
        if !self.is_current(id) {
            return false;
        }
        self.elapsed_secs = secs;
        true
    }

    /// `running -> succeeded`; percent becomes 100.
    pub fn succeed(&mut self, label: impl Into<String>) -> bool {
        if !self.is_running() {
            return false;
        }
        if let Some(progress) = self.progress.as_mut() {
            progress.complete(label);
        }
        self.status = AttemptStatus::Succeeded;
        true
    }

    /// `running -> failed` with a user-facing message.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.is_running() {
            return false;
        }
        self.error = Some(message.into());
        self.status = AttemptStatus::Failed;
        true
    }

    /// Returns to idle, discarding the attempt.
    pub fn reset(&mut self) {
        *self = Self::idle();
    }

    /// Captures the observable state.
    #[must_use]
    pub fn snapshot(&self, stage: StageKind) -> AttemptSnapshot {
        AttemptSnapshot {
            stage,
            attempt_id: self.id,
            status: self.status,
            percent: self.progress.as_ref().map_or(0, ProgressReporter::percent),
            label: self
                .progress
                .as_ref()
                .map(|p| p.label().to_string())
                .unwrap_or_default(),
            elapsed_secs: self.elapsed_secs,
            error: self.error.clone(),
        }
    }
}

/// Read-only view of an attempt published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSnapshot {
    /// The stage the attempt belongs to.
    pub stage: StageKind,
    /// The attempt ID; `None` while idle.
    pub attempt_id: Option<Uuid>,
    /// Lifecycle status.
    pub status: AttemptStatus,
    /// Progress percent in `[0, 100]`.
    pub percent: u8,
    /// Status label.
    pub label: String,
    /// Elapsed seconds on the stopwatch.
    pub elapsed_secs: u64,
    /// Error message of a failed attempt.
    pub error: Option<String>,
}

impl AttemptSnapshot {
    /// The snapshot of an idle stage.
    #[must_use]
    pub fn idle(stage: StageKind) -> Self {
        GenerationAttempt::idle().snapshot(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressSchedule;

    fn reporter() -> ProgressReporter {
        ProgressReporter::simulated(ProgressSchedule::for_stage(StageKind::Plan, 5, 95))
    }

    #[test]
    fn test_lifecycle_success() {
        let mut attempt = GenerationAttempt::idle();
        assert_eq!(attempt.status(), AttemptStatus::Idle);

        let id = attempt.begin(reporter()).unwrap();
        assert!(attempt.is_current(id));
        assert!(attempt.started_at().is_some());

        assert!(attempt.succeed("Plan ready!"));
        assert_eq!(attempt.status(), AttemptStatus::Succeeded);
        let snapshot = attempt.snapshot(StageKind::Plan);
        assert_eq!(snapshot.percent, 100);
        assert_eq!(snapshot.label, "Plan ready!");

        attempt.reset();
        assert_eq!(attempt.snapshot(StageKind::Plan), AttemptSnapshot::idle(StageKind::Plan));
    }

    #[test]
    fn test_lifecycle_failure() {
        let mut attempt = GenerationAttempt::idle();
        attempt.begin(reporter()).unwrap();

        assert!(attempt.fail("Plan generation failed"));
        assert_eq!(attempt.status(), AttemptStatus::Failed);
        assert_eq!(attempt.error(), Some("Plan generation failed"));
        assert!(!attempt.succeed("late"));
    }

    #[test]
    fn test_begin_rejected_while_running() {
        let mut attempt = GenerationAttempt::idle();
        attempt.begin(reporter()).unwrap();
        assert!(attempt.begin(reporter()).is_none());
    }

    #[test]
    fn test_stale_updates_ignored() {
        let mut attempt = GenerationAttempt::idle();
        let first = attempt.begin(reporter()).unwrap();
        attempt.fail("boom");

        assert!(!attempt.update_progress(first, ProgressReporter::advance_schedule));
        assert!(!attempt.record_elapsed(first, 3));

        attempt.reset();
        let second = attempt.begin(reporter()).unwrap();
        assert!(!attempt.update_progress(first, ProgressReporter::advance_schedule));
        assert!(attempt.update_progress(second, ProgressReporter::advance_schedule));
        assert!(attempt.record_elapsed(second, 1));
        assert_eq!(attempt.snapshot(StageKind::Plan).percent, 15);
        assert_eq!(attempt.snapshot(StageKind::Plan).elapsed_secs, 1);
    }

    #[test]
    fn test_transitions_from_idle_are_noops() {
        let mut attempt = GenerationAttempt::idle();
        assert!(!attempt.succeed("x"));
        assert!(!attempt.fail("x"));
        assert!(AttemptStatus::Failed.is_terminal());
        assert!(!AttemptStatus::Running.is_terminal());
    }
}
