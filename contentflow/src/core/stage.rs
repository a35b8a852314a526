//! Stage kinds and their static properties.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a stage's backend delivers its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStyle {
    /// A single call returns the complete result; progress is simulated.
    RequestResponse,
    /// The backend returns a growing event stream.
    Streaming,
}

/// One step of the content pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageKind {
    /// Outline generation.
    #[serde(rename = "plan")]
    Plan,
    /// Long-form article writing (streamed).
    #[serde(rename = "write")]
    Write,
    /// Rewriting to read as human-written.
    #[serde(rename = "humanize")]
    Humanize,
    /// Links, keywords and heading structure.
    #[serde(rename = "seo-optimize")]
    SeoOptimize,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::Write => write!(f, "write"),
            Self::Humanize => write!(f, "humanize"),
            Self::SeoOptimize => write!(f, "seo-optimize"),
        }
    }
}

impl StageKind {
    /// All stages in pipeline order.
    pub const ALL: [Self; 4] = [Self::Plan, Self::Write, Self::Humanize, Self::SeoOptimize];

    /// Returns the transport style of the stage's backend.
    #[must_use]
    pub fn transport(&self) -> TransportStyle {
        match self {
            Self::Write => TransportStyle::Streaming,
            Self::Plan | Self::Humanize | Self::SeoOptimize => TransportStyle::RequestResponse,
        }
    }

    /// Returns true if the stage uses the streaming transport.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.transport() == TransportStyle::Streaming
    }

    /// Stage number recorded on the persisted pipeline record.
    ///
    /// Writing and humanizing share a record slot.
    #[must_use]
    pub fn pipeline_stage_number(&self) -> u32 {
        match self {
            Self::Plan => 3,
            Self::Write | Self::Humanize => 5,
            Self::SeoOptimize => 7,
        }
    }

    /// Lifecycle label written to the content record, if the stage saves one.
    #[must_use]
    pub fn content_lifecycle_label(&self) -> Option<&'static str> {
        match self {
            Self::Plan => None,
            Self::Write => Some("writing"),
            Self::Humanize => Some("humanizing"),
            Self::SeoOptimize => Some("seo"),
        }
    }

    /// Audit-log action recorded when an artifact of this stage is committed.
    #[must_use]
    pub fn audit_action(&self) -> &'static str {
        match self {
            Self::Plan => "plan_generated",
            Self::Write => "article_written",
            Self::Humanize => "humanized",
            Self::SeoOptimize => "seo_optimized",
        }
    }

    /// Message used when the backend fails without saying why.
    #[must_use]
    pub fn default_failure_message(&self) -> &'static str {
        match self {
            Self::Plan => "Plan generation failed",
            Self::Write => "Writing failed",
            Self::Humanize => "Humanization failed",
            Self::SeoOptimize => "SEO optimization failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Plan.to_string(), "plan");
        assert_eq!(StageKind::Write.to_string(), "write");
        assert_eq!(StageKind::Humanize.to_string(), "humanize");
        assert_eq!(StageKind::SeoOptimize.to_string(), "seo-optimize");
    }

    #[test]
    fn test_only_write_streams() {
        let streaming: Vec<_> = StageKind::ALL.iter().filter(|k| k.is_streaming()).collect();
        assert_eq!(streaming, vec![&StageKind::Write]);
    }

    #[test]
    fn test_stage_kind_serialize() {
        let json = serde_json::to_string(&StageKind::SeoOptimize).unwrap();
        assert_eq!(json, r#""seo-optimize""#);

        let kind: StageKind = serde_json::from_str(r#""write""#).unwrap();
        assert_eq!(kind, StageKind::Write);
    }

    #[test]
    fn test_plan_has_no_content_record() {
        assert!(StageKind::Plan.content_lifecycle_label().is_none());
        assert_eq!(StageKind::SeoOptimize.content_lifecycle_label(), Some("seo"));
    }

    #[test]
    fn test_pipeline_stage_numbers() {
        assert_eq!(StageKind::Plan.pipeline_stage_number(), 3);
        assert_eq!(StageKind::Write.pipeline_stage_number(), 5);
        assert_eq!(StageKind::Humanize.pipeline_stage_number(), 5);
        assert_eq!(StageKind::SeoOptimize.pipeline_stage_number(), 7);
    }
}
