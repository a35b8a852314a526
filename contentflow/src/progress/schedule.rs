//! Per-stage progress schedules.

use crate::core::{StageArtifact, StageKind};
use serde::{Deserialize, Serialize};

/// A `(percent, label)` pair shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Completion percentage.
    pub percent: u8,
    /// Status label.
    pub label: String,
}

impl Checkpoint {
    /// Creates a checkpoint.
    #[must_use]
    pub fn new(percent: u8, label: impl Into<String>) -> Self {
        Self {
            percent,
            label: label.into(),
        }
    }
}

/// The progress shape of one stage.
///
/// Simulated stages step through `steps` on a fixed tick and jump to
/// `finalizing` when the backend resolves. Streaming stages only use
/// `start`; their progress comes from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSchedule {
    /// Shown as soon as the attempt starts.
    pub start: Checkpoint,
    /// Checkpoints advanced through one per tick.
    #[serde(default)]
    pub steps: Vec<Checkpoint>,
    /// Shown once the backend has answered.
    #[serde(default)]
    pub finalizing: Option<Checkpoint>,
}

impl ProgressSchedule {
    /// Creates a schedule with only a starting checkpoint.
    #[must_use]
    pub fn new(start: Checkpoint) -> Self {
        Self {
            start,
            steps: Vec::new(),
            finalizing: None,
        }
    }

    /// Sets the tick checkpoints.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<Checkpoint>) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the finalizing checkpoint.
    #[must_use]
    pub fn with_finalizing(mut self, finalizing: Checkpoint) -> Self {
        self.finalizing = Some(finalizing);
        self
    }

    /// The built-in schedule for a stage.
    ///
    /// `initial` is the starting percent and `finalizing` the percent shown
    /// once a request/response backend has answered.
    #[must_use]
    pub fn for_stage(kind: StageKind, initial: u8, finalizing: u8) -> Self {
        match kind {
            StageKind::Plan => Self::new(Checkpoint::new(initial, "Starting plan generation..."))
                .with_steps(vec![
                    Checkpoint::new(15, "Analyzing research data..."),
                    Checkpoint::new(30, "Identifying focus keywords..."),
                    Checkpoint::new(45, "Structuring article..."),
                    Checkpoint::new(60, "Creating H2/H3 outline..."),
                    Checkpoint::new(75, "Planning internal links..."),
                    Checkpoint::new(85, "Generating FAQ section..."),
                ])
                .with_finalizing(Checkpoint::new(finalizing, "Finalizing plan...")),
            StageKind::Write => {
                Self::new(Checkpoint::new(initial, "Starting article writing..."))
            }
            StageKind::Humanize => {
                Self::new(Checkpoint::new(initial, "Starting humanization..."))
                    .with_steps(vec![
                        Checkpoint::new(15, "Analyzing AI patterns..."),
                        Checkpoint::new(30, "Varying sentence structures..."),
                        Checkpoint::new(45, "Adding conversational flow..."),
                        Checkpoint::new(60, "Inserting natural expressions..."),
                        Checkpoint::new(75, "Preserving voice..."),
                        Checkpoint::new(85, "Checking human score..."),
                    ])
                    .with_finalizing(Checkpoint::new(finalizing, "Finalizing..."))
            }
            StageKind::SeoOptimize => {
                Self::new(Checkpoint::new(initial, "Starting SEO optimization..."))
                    .with_steps(vec![
                        Checkpoint::new(15, "Finding existing articles..."),
                        Checkpoint::new(30, "Generating internal links..."),
                        Checkpoint::new(45, "Adding outbound authority links..."),
                        Checkpoint::new(60, "Optimizing keyword placement..."),
                        Checkpoint::new(75, "Checking keyword density..."),
                        Checkpoint::new(85, "Verifying heading structure..."),
                    ])
                    .with_finalizing(Checkpoint::new(finalizing, "Finalizing SEO..."))
            }
        }
    }
}

/// Label shown when an attempt succeeds.
#[must_use]
pub fn completion_label(artifact: &StageArtifact) -> String {
    match artifact.stage() {
        StageKind::Plan => "Plan ready!".to_string(),
        StageKind::Write => "Article complete!".to_string(),
        StageKind::Humanize => match artifact.metric_f64("human_score") {
            Some(score) => format!("Done! Score: {}%", score.round()),
            None => "Done!".to_string(),
        },
        StageKind::SeoOptimize => "SEO optimized!".to_string(),
    }
}
