//! Progress reporting for a single attempt.
//!
//! The reporter owns the `(percent, label)` pair of one attempt and turns
//! either a simulated schedule or streaming frames into updates. Percent
//! never decreases within an attempt and stays inside `[0, 100]`; in-flight
//! updates are capped at 99 so exactly 100 is only reached by
//! [`ProgressReporter::complete`].

use super::schedule::ProgressSchedule;
use crate::streaming::{FrameKind, StreamFrame};

/// Highest percent an attempt can show before it succeeds.
pub const IN_FLIGHT_CEILING: u8 = 99;

/// Percent assumed for a token frame without one.
const DEFAULT_TOKEN_PERCENT: f64 = 50.0;

/// Where progress comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMode {
    /// Fixed checkpoints advanced on a timer.
    Simulated,
    /// Derived from stream frames.
    Streaming {
        /// Characters per word used for the word estimate.
        chars_per_word: f64,
    },
}

/// Tracks and reports progress for one attempt.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    schedule: ProgressSchedule,
    mode: ProgressMode,
    percent: u8,
    label: String,
    cursor: usize,
    completed: bool,
}

impl ProgressReporter {
    /// A reporter driven by the schedule's checkpoints.
    #[must_use]
    pub fn simulated(schedule: ProgressSchedule) -> Self {
        Self::with_mode(schedule, ProgressMode::Simulated)
    }

    /// A reporter driven by stream frames.
    #[must_use]
    pub fn streaming(schedule: ProgressSchedule, chars_per_word: f64) -> Self {
        Self::with_mode(schedule, ProgressMode::Streaming { chars_per_word })
    }

    fn with_mode(schedule: ProgressSchedule, mode: ProgressMode) -> Self {
        let mut reporter = Self {
            percent: 0,
            label: String::new(),
            cursor: 0,
            completed: false,
            schedule,
            mode,
        };
        let start = reporter.schedule.start.clone();
        reporter.report(f64::from(start.percent), start.label);
        reporter
    }

    /// Current percent.
    #[must_use]
    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Current label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The progress mode.
    #[must_use]
    pub fn mode(&self) -> &ProgressMode {
        &self.mode
    }

    /// Returns true once [`Self::complete`] has been called.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Returns true if there are simulated checkpoints left.
    #[must_use]
    pub fn has_pending_steps(&self) -> bool {
        self.mode == ProgressMode::Simulated && self.cursor < self.schedule.steps.len()
    }

    /// Applies an in-flight update.
    ///
    /// The percent is clamped to `[0, 99]`. A lower percent than the
    /// current one is ignored entirely; an equal percent only changes the
    /// label. Returns true if anything changed.
    pub fn report(&mut self, percent: f64, label: impl Into<String>) -> bool {
        if self.completed {
            return false;
        }

        let clamped = clamp_percent(percent).min(IN_FLIGHT_CEILING);
        if clamped < self.percent {
            return false;
        }

        let label = label.into();
        if clamped == self.percent && label == self.label {
            return false;
        }

        self.percent = clamped;
        self.label = label;
        true
    }

    /// Advances to the next simulated checkpoint.
    ///
    /// Returns false when the schedule is exhausted or the reporter is
    /// stream driven.
    pub fn advance_schedule(&mut self) -> bool {
        if !self.has_pending_steps() {
            return false;
        }
        let step = self.schedule.steps[self.cursor].clone();
        self.cursor += 1;
        self.report(f64::from(step.percent), step.label)
    }

    /// Jumps to the finalizing checkpoint, if the schedule has one.
    pub fn finalize(&mut self) -> bool {
        self.cursor = self.schedule.steps.len();
        match self.schedule.finalizing.clone() {
            Some(checkpoint) => self.report(f64::from(checkpoint.percent), checkpoint.label),
            None => false,
        }
    }

    /// Applies a `progress` or `token` frame.
    ///
    /// Other frame kinds, and any frame on a simulated reporter, are
    /// ignored.
    pub fn apply_frame(&mut self, frame: &StreamFrame) -> bool {
        let ProgressMode::Streaming { chars_per_word } = self.mode else {
            return false;
        };

        match frame.kind {
            FrameKind::Progress => {
                let percent = frame.percent().unwrap_or(0.0);
                let label = frame
                    .message()
                    .map_or_else(|| self.label.clone(), str::to_string);
                self.report(percent, label)
            }
            FrameKind::Token => {
                let percent = frame.percent().unwrap_or(DEFAULT_TOKEN_PERCENT);
                let words = approximate_words(frame.length().unwrap_or(0), chars_per_word);
                self.report(percent, format!("Writing... ({words} words)"))
            }
            FrameKind::Complete | FrameKind::Error => false,
        }
    }

    /// Marks the attempt successful: percent becomes exactly 100.
    pub fn complete(&mut self, label: impl Into<String>) {
        self.percent = 100;
        self.label = label.into();
        self.completed = true;
    }
}

/// Approximate word count for `chars` characters.
///
/// A display estimate only: `round(chars / chars_per_word)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn approximate_words(chars: u64, chars_per_word: f64) -> u64 {
    if chars_per_word <= 0.0 {
        return 0;
    }
    (chars as f64 / chars_per_word).round() as u64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_percent(percent: f64) -> u8 {
    if percent.is_nan() {
        return 0;
    }
    percent.round().clamp(0.0, 100.0) as u8
}
