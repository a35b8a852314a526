//! Builders for the store records saved after a commit.

use super::sections::split_into_sections;
use super::{AuditEntry, ContentUpdate, PipelineProgressUpdate};
use crate::core::{StageArtifact, StageKind};
use chrono::Utc;
use serde_json::{json, Map, Value};

fn text_of(artifact: &StageArtifact) -> Value {
    artifact.content().to_json()
}

fn metric(artifact: &StageArtifact, key: &str) -> Value {
    artifact.metric(key).cloned().unwrap_or(Value::Null)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Builds the pipeline-record save for a committed artifact.
#[must_use]
pub fn pipeline_update(pipeline_id: &str, artifact: &StageArtifact) -> PipelineProgressUpdate {
    let stage = artifact.stage();
    let (data, detail) = match stage {
        StageKind::Plan => (
            json!({"articlePlan": text_of(artifact), "planApproved": false}),
            None,
        ),
        StageKind::Write => (
            json!({"rawArticle": text_of(artifact), "wordCount": metric(artifact, "word_count")}),
            Some(("wordCount", metric(artifact, "word_count"))),
        ),
        StageKind::Humanize => (
            json!({
                "humanizedArticle": text_of(artifact),
                "humanScore": metric(artifact, "human_score"),
            }),
            Some(("humanScore", metric(artifact, "human_score"))),
        ),
        StageKind::SeoOptimize => {
            let text = artifact.content().as_text().unwrap_or_default();
            (
                json!({
                    "seoArticle": text,
                    "seoStats": metric(artifact, "seo_stats"),
                    "contentSections": split_into_sections(text),
                }),
                Some(("internalLinks", metric(artifact, "internal_links_count"))),
            )
        }
    };

    let model = artifact
        .metric("model")
        .and_then(Value::as_str)
        .map(str::to_string);
    let mut ai_log = AuditEntry::new(stage.audit_action())
        .with_model(model)
        .with_detail("artifactId", artifact.id().to_string())
        .with_detail("contentSha256", artifact.content_digest());
    if let Some((key, value)) = detail {
        ai_log = ai_log.with_detail(key, value);
    }

    PipelineProgressUpdate {
        pipeline_id: pipeline_id.to_string(),
        stage: stage.pipeline_stage_number(),
        data: object(data),
        ai_log,
    }
}

/// Builds the content-record save for a committed artifact.
///
/// Returns `None` for stages that do not update the content record.
#[must_use]
pub fn content_update(content_id: &str, artifact: &StageArtifact) -> Option<ContentUpdate> {
    let label = artifact.stage().content_lifecycle_label()?;
    let content = text_of(artifact);

    let updates = match artifact.stage() {
        StageKind::Plan => return None,
        StageKind::Write => json!({
            "content": content,
            "generation_metadata": {
                "article_written_at": Utc::now().to_rfc3339(),
                "word_count": metric(artifact, "word_count"),
            },
        }),
        StageKind::Humanize => json!({
            "content": content,
            "humanization_score": metric(artifact, "human_score"),
        }),
        StageKind::SeoOptimize => {
            let [part1, part2, part3] =
                split_into_sections(artifact.content().as_text().unwrap_or_default());
            json!({
                "content": content,
                "content_part1": part1,
                "content_part2": part2,
                "content_part3": part3,
            })
        }
    };

    Some(ContentUpdate {
        content_id: content_id.to_string(),
        updates: object(updates),
        pipeline_stage: label.to_string(),
    })
}

/// Builds the pipeline-record save recording plan approval.
#[must_use]
pub fn plan_approval_update(pipeline_id: &str, plan: &StageArtifact) -> PipelineProgressUpdate {
    PipelineProgressUpdate {
        pipeline_id: pipeline_id.to_string(),
        stage: StageKind::Plan.pipeline_stage_number(),
        data: object(json!({"articlePlan": text_of(plan), "planApproved": true})),
        ai_log: AuditEntry::new("plan_approved")
            .with_detail("artifactId", plan.id().to_string()),
    }
}

/// Builds the content-record save recording plan approval.
#[must_use]
pub fn plan_approval_content_update(content_id: &str) -> ContentUpdate {
    ContentUpdate {
        content_id: content_id.to_string(),
        updates: Map::new(),
        pipeline_stage: "plan_approved".to_string(),
    }
}
