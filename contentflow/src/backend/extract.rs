//! Turning backend responses into stage artifacts.

use crate::core::{StageArtifact, StageKind};
use crate::errors::PipelineError;
use serde_json::{json, Value};

/// Extracts the artifact from a backend response.
///
/// The response must carry `success: true`; otherwise its `error` field
/// (or the stage's default failure message) becomes a backend failure.
///
/// # Errors
///
/// Returns `PipelineError::Backend` for failed responses and
/// `PipelineError::MalformedResult` when the payload field is missing.
pub fn extract_artifact(stage: StageKind, response: &Value) -> Result<StageArtifact, PipelineError> {
    if response.get("success").and_then(Value::as_bool) != Some(true) {
        let message = response
            .get("error")
            .and_then(Value::as_str)
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| stage.default_failure_message());
        return Err(PipelineError::backend(stage, message));
    }

    let artifact = match stage {
        StageKind::Plan => extract_plan(response)?,
        StageKind::Write => extract_article(response)?,
        StageKind::Humanize => extract_humanized(response)?,
        StageKind::SeoOptimize => extract_seo(response)?,
    };

    Ok(match response.get("model").and_then(Value::as_str) {
        Some(model) => artifact.with_metric("model", json!(model)),
        None => artifact,
    })
}

fn required_text<'a>(stage: StageKind, response: &'a Value, field: &str) -> Result<&'a str, PipelineError> {
    response
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| PipelineError::malformed(stage, field))
}

fn array_len(value: Option<&Value>) -> usize {
    value.and_then(Value::as_array).map_or(0, Vec::len)
}

fn extract_plan(response: &Value) -> Result<StageArtifact, PipelineError> {
    let plan = response
        .get("plan")
        .filter(|plan| plan.is_object())
        .ok_or_else(|| PipelineError::malformed(StageKind::Plan, "plan"))?;

    let structure = plan.get("structure").unwrap_or(plan);
    let mut artifact = StageArtifact::document(StageKind::Plan, plan.clone())
        .with_metric("section_count", json!(array_len(structure.get("sections"))))
        .with_metric("faq_count", json!(array_len(structure.get("faq"))));

    if let Some(insight_id) = response.get("insightId").and_then(Value::as_str) {
        artifact = artifact.with_metric("insight_id", json!(insight_id));
    }
    Ok(artifact)
}

fn extract_article(response: &Value) -> Result<StageArtifact, PipelineError> {
    let article = required_text(StageKind::Write, response, "article")?;
    let word_count = response
        .get("wordCount")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| article.split_whitespace().count() as u64);

    let mut artifact = StageArtifact::text(StageKind::Write, article)
        .with_metric("word_count", json!(word_count));
    if let Some(warning) = response.get("wordCountWarning").and_then(Value::as_str) {
        artifact = artifact.with_metric("word_count_warning", json!(warning));
    }
    Ok(artifact)
}

fn extract_humanized(response: &Value) -> Result<StageArtifact, PipelineError> {
    let article = required_text(StageKind::Humanize, response, "humanizedArticle")?;
    let score = response.get("humanScore").cloned().unwrap_or(Value::Null);
    Ok(StageArtifact::text(StageKind::Humanize, article).with_metric("human_score", score))
}

fn extract_seo(response: &Value) -> Result<StageArtifact, PipelineError> {
    let article = required_text(StageKind::SeoOptimize, response, "optimizedArticle")?;
    let stats = response.get("seoStats").cloned().unwrap_or_else(|| json!({}));
    let internal = stats.get("internalLinksCount").cloned().unwrap_or(json!(0));
    let outbound = stats.get("outboundLinksCount").cloned().unwrap_or(json!(0));

    Ok(StageArtifact::text(StageKind::SeoOptimize, article)
        .with_metric("seo_stats", stats)
        .with_metric("internal_links_count", internal)
        .with_metric("outbound_links_count", outbound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_extraction() {
        let response = json!({
            "success": true,
            "insightId": "ins-1",
            "plan": {
                "title": "Remote Work Guide",
                "structure": {
                    "sections": [{"h2": "A"}, {"h2": "B"}, {"h2": "C"}],
                    "faq": [{"question": "Why?"}]
                }
            }
        });

        let artifact = extract_artifact(StageKind::Plan, &response).unwrap();
        assert_eq!(artifact.metric_u64("section_count"), Some(3));
        assert_eq!(artifact.metric_u64("faq_count"), Some(1));
        assert_eq!(artifact.metric("insight_id"), Some(&json!("ins-1")));
        assert_eq!(
            artifact.content().as_document().unwrap()["title"],
            json!("Remote Work Guide")
        );
    }

    #[test]
    fn test_failure_uses_error_field() {
        let response = json!({"success": false, "error": "Rate limited"});
        let err = extract_artifact(StageKind::Humanize, &response).unwrap_err();
        assert_eq!(err.user_message(), "Rate limited");
    }

    #[test]
    fn test_failure_defaults_message() {
        let err = extract_artifact(StageKind::Humanize, &json!({"success": false})).unwrap_err();
        assert_eq!(err.user_message(), "Humanization failed");

        let err = extract_artifact(StageKind::SeoOptimize, &json!({})).unwrap_err();
        assert_eq!(err.user_message(), "SEO optimization failed");
    }

    #[test]
    fn test_missing_payload_is_malformed() {
        let err =
            extract_artifact(StageKind::Humanize, &json!({"success": true, "humanScore": 90}))
                .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MalformedResult { ref field, .. } if field == "humanizedArticle"
        ));
    }

    #[test]
    fn test_article_word_count() {
        let response = json!({
            "success": true,
            "article": "one two three",
            "wordCountWarning": "Article is only 3 words"
        });
        let artifact = extract_artifact(StageKind::Write, &response).unwrap();
        assert_eq!(artifact.metric_u64("word_count"), Some(3));
        assert!(artifact.metric("word_count_warning").is_some());

        let reported = json!({"success": true, "article": "x", "wordCount": 1850});
        let artifact = extract_artifact(StageKind::Write, &reported).unwrap();
        assert_eq!(artifact.metric_u64("word_count"), Some(1850));
    }

    #[test]
    fn test_seo_stats() {
        let response = json!({
            "success": true,
            "optimizedArticle": "## Intro\nbody",
            "seoStats": {"internalLinksCount": 4, "outboundLinksCount": 2}
        });
        let artifact = extract_artifact(StageKind::SeoOptimize, &response).unwrap();
        assert_eq!(artifact.metric_u64("internal_links_count"), Some(4));
        assert_eq!(artifact.metric_u64("outbound_links_count"), Some(2));
    }
}
