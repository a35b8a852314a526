//! Pipeline configuration.
//!
//! Every field has a serde default, so a partial JSON document (or `{}`)
//! yields a complete configuration.

use crate::core::StageKind;
use crate::errors::PipelineError;
use crate::progress::ProgressSchedule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Backend endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL prepended to every endpoint path.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional HTTP transport timeout. Off by default.
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    /// Endpoint path per stage.
    #[serde(default = "default_endpoints")]
    pub endpoints: BTreeMap<StageKind, String>,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_endpoints() -> BTreeMap<StageKind, String> {
    BTreeMap::from([
        (
            StageKind::Plan,
            "/api/admin/insights/pipeline/generate-plan".to_string(),
        ),
        (
            StageKind::Write,
            "/api/insights/pipeline/write-article".to_string(),
        ),
        (
            StageKind::Humanize,
            "/api/admin/insights/pipeline/humanize".to_string(),
        ),
        (
            StageKind::SeoOptimize,
            "/api/admin/insights/pipeline/seo-optimize".to_string(),
        ),
    ])
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: None,
            endpoints: default_endpoints(),
        }
    }
}

impl BackendConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the transport timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Gets the timeout as a Duration.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the timeout is negative, not finite
    /// or too large for a `Duration`.
    pub fn timeout(&self) -> Result<Option<Duration>, PipelineError> {
        self.timeout_seconds
            .map(|seconds| {
                Duration::try_from_secs_f64(seconds).map_err(|e| {
                    PipelineError::Config(format!("backend.timeout_seconds {seconds}: {e}"))
                })
            })
            .transpose()
    }

    /// Full URL of a stage's endpoint.
    #[must_use]
    pub fn endpoint_url(&self, stage: StageKind) -> String {
        let path = self
            .endpoints
            .get(&stage)
            .cloned()
            .or_else(|| default_endpoints().remove(&stage))
            .unwrap_or_default();
        join_url(&self.base_url, &path)
    }
}

/// Store endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Base URL of the store.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the pipeline-record save.
    #[serde(default = "default_pipeline_update_path")]
    pub pipeline_update_path: String,
    /// Path of the content-record save.
    #[serde(default = "default_content_save_path")]
    pub content_save_path: String,
}

fn default_pipeline_update_path() -> String {
    "/api/admin/content-pipeline/update".to_string()
}

fn default_content_save_path() -> String {
    "/api/admin/insights/pipeline/save-progress".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            pipeline_update_path: default_pipeline_update_path(),
            content_save_path: default_content_save_path(),
        }
    }
}

impl PersistenceConfig {
    /// Full URL of the pipeline-record save.
    #[must_use]
    pub fn pipeline_update_url(&self) -> String {
        join_url(&self.base_url, &self.pipeline_update_path)
    }

    /// Full URL of the content-record save.
    #[must_use]
    pub fn content_save_url(&self) -> String {
        join_url(&self.base_url, &self.content_save_path)
    }
}

/// Timing of a simulated stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    /// Interval between simulated progress checkpoints.
    pub tick_interval_ms: u64,
}

impl StageTiming {
    /// Creates a timing with the given tick interval.
    #[must_use]
    pub fn new(tick_interval_ms: u64) -> Self {
        Self { tick_interval_ms }
    }

    /// Gets the tick interval as a Duration.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn default_timing() -> BTreeMap<StageKind, StageTiming> {
    BTreeMap::from([
        (StageKind::Plan, StageTiming::new(1000)),
        (StageKind::Humanize, StageTiming::new(1500)),
        (StageKind::SeoOptimize, StageTiming::new(1200)),
    ])
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Generation backend.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Persistence store.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Simulated-progress timing per stage.
    #[serde(default = "default_timing")]
    pub timing: BTreeMap<StageKind, StageTiming>,
    /// Schedule overrides per stage.
    #[serde(default)]
    pub schedules: BTreeMap<StageKind, ProgressSchedule>,
    /// Characters per word for streaming word estimates.
    #[serde(default = "default_chars_per_word")]
    pub chars_per_word: f64,
    /// Percent shown when an attempt starts.
    #[serde(default = "default_initial_percent")]
    pub initial_percent: u8,
    /// Percent shown once a request/response backend has answered.
    #[serde(default = "default_finalizing_percent")]
    pub finalizing_percent: u8,
    /// Elapsed-timer tick.
    #[serde(default = "default_elapsed_tick_ms")]
    pub elapsed_tick_ms: u64,
}

fn default_chars_per_word() -> f64 {
    7.0
}

fn default_initial_percent() -> u8 {
    5
}

fn default_finalizing_percent() -> u8 {
    95
}

fn default_elapsed_tick_ms() -> u64 {
    1000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            persistence: PersistenceConfig::default(),
            timing: default_timing(),
            schedules: BTreeMap::new(),
            chars_per_word: default_chars_per_word(),
            initial_percent: default_initial_percent(),
            finalizing_percent: default_finalizing_percent(),
            elapsed_tick_ms: default_elapsed_tick_ms(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the document is invalid.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` naming the offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.backend.timeout()?;
        if !self.chars_per_word.is_finite() || self.chars_per_word <= 0.0 {
            return Err(PipelineError::Config(
                "chars_per_word must be positive".to_string(),
            ));
        }
        if self.initial_percent > self.finalizing_percent || self.finalizing_percent >= 100 {
            return Err(PipelineError::Config(
                "expected initial_percent <= finalizing_percent < 100".to_string(),
            ));
        }
        if self.elapsed_tick_ms == 0 || self.timing.values().any(|t| t.tick_interval_ms == 0) {
            return Err(PipelineError::Config(
                "tick intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the backend configuration.
    #[must_use]
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the persistence configuration.
    #[must_use]
    pub fn with_persistence(mut self, persistence: PersistenceConfig) -> Self {
        self.persistence = persistence;
        self
    }

    /// Overrides the progress schedule of a stage.
    #[must_use]
    pub fn with_schedule(mut self, stage: StageKind, schedule: ProgressSchedule) -> Self {
        self.schedules.insert(stage, schedule);
        self
    }

    /// Overrides the tick interval of a simulated stage.
    #[must_use]
    pub fn with_tick_interval(mut self, stage: StageKind, interval: Duration) -> Self {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.timing.insert(stage, StageTiming::new(millis));
        self
    }

    /// Sets the characters-per-word estimate.
    #[must_use]
    pub fn with_chars_per_word(mut self, chars_per_word: f64) -> Self {
        self.chars_per_word = chars_per_word;
        self
    }

    /// The progress schedule of a stage.
    #[must_use]
    pub fn schedule_for(&self, stage: StageKind) -> ProgressSchedule {
        self.schedules.get(&stage).cloned().unwrap_or_else(|| {
            ProgressSchedule::for_stage(stage, self.initial_percent, self.finalizing_percent)
        })
    }

    /// The simulated tick interval of a stage.
    #[must_use]
    pub fn tick_interval(&self, stage: StageKind) -> Duration {
        self.timing
            .get(&stage)
            .copied()
            .or_else(|| default_timing().get(&stage).copied())
            .map_or(Duration::from_secs(1), |timing| timing.tick_interval())
    }

    /// The elapsed-timer tick.
    #[must_use]
    pub fn elapsed_tick(&self) -> Duration {
        Duration::from_millis(self.elapsed_tick_ms)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
