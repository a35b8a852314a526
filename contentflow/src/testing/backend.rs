//! Scripted generation backend.

use crate::backend::{ByteStream, GenerationBackend, GenerationRequest};
use crate::core::StageKind;
use crate::errors::PipelineError;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// One scripted answer to a backend call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// A JSON response body.
    Json(Value),
    /// A transport failure.
    Transport(String),
    /// A byte stream delivered chunk by chunk.
    Stream(Vec<Vec<u8>>),
    /// A stream that yields its chunks, then fails.
    BrokenStream(Vec<Vec<u8>>, String),
}

/// Backend that answers from per-stage queues of scripted replies.
///
/// Calls are recorded and take their reply up front, so a cancelled call
/// still consumes it. An optional delay is applied before each reply and
/// between stream chunks, which plays well with tokio's paused clock.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<HashMap<StageKind, VecDeque<ScriptedReply>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    delay: Option<Duration>,
    chunk_delay: Option<Duration>,
}

impl ScriptedBackend {
    /// Creates a backend with no scripted replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for a stage.
    #[must_use]
    pub fn with_reply(self, stage: StageKind, reply: ScriptedReply) -> Self {
        self.push(stage, reply);
        self
    }

    /// Queues a successful JSON response for a stage.
    #[must_use]
    pub fn with_response(self, stage: StageKind, body: Value) -> Self {
        self.with_reply(stage, ScriptedReply::Json(body))
    }

    /// Queues a stream made of the given text chunks.
    #[must_use]
    pub fn with_stream<S: AsRef<str>>(self, stage: StageKind, chunks: &[S]) -> Self {
        let chunks = chunks.iter().map(|c| c.as_ref().as_bytes().to_vec()).collect();
        self.with_reply(stage, ScriptedReply::Stream(chunks))
    }

    /// Waits this long before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Waits this long before every stream chunk.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Queues a reply after construction.
    pub fn push(&self, stage: StageKind, reply: ScriptedReply) {
        self.replies.lock().entry(stage).or_default().push_back(reply);
    }

    /// Returns the recorded requests.
    #[must_use]
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Returns how many calls were made for a stage.
    #[must_use]
    pub fn call_count(&self, stage: StageKind) -> usize {
        self.requests.lock().iter().filter(|r| r.stage == stage).count()
    }

    async fn next_reply(&self, request: &GenerationRequest) -> Result<ScriptedReply, PipelineError> {
        self.requests.lock().push(request.clone());
        let reply = self.replies.lock().get_mut(&request.stage).and_then(VecDeque::pop_front);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        reply.ok_or_else(|| PipelineError::Transport(format!("no scripted reply for {}", request.stage)))
    }

    fn into_stream(&self, chunks: Vec<Vec<u8>>, failure: Option<String>) -> ByteStream {
        let delay = self.chunk_delay;
        let items = chunks
            .into_iter()
            .map(Ok)
            .chain(failure.map(|f| Err(PipelineError::Transport(f))));
        futures::stream::iter(items)
            .then(move |item| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, PipelineError> {
        match self.next_reply(request).await? {
            ScriptedReply::Json(body) => Ok(body),
            ScriptedReply::Transport(message) => Err(PipelineError::Transport(message)),
            ScriptedReply::Stream(_) | ScriptedReply::BrokenStream(..) => Err(
                PipelineError::Transport("stream scripted for a request/response stage".to_string()),
            ),
        }
    }

    async fn open_stream(&self, request: &GenerationRequest) -> Result<ByteStream, PipelineError> {
        match self.next_reply(request).await? {
            ScriptedReply::Stream(chunks) => Ok(self.into_stream(chunks, None)),
            ScriptedReply::BrokenStream(chunks, failure) => {
                Ok(self.into_stream(chunks, Some(failure)))
            }
            ScriptedReply::Transport(message) => Err(PipelineError::Transport(message)),
            ScriptedReply::Json(body) => Err(PipelineError::Transport(format!(
                "Server error: {}",
                body.get("status").and_then(Value::as_u64).unwrap_or(500)
            ))),
        }
    }
}

/// Renders `(event, data)` pairs as an SSE body.
#[must_use]
pub fn sse_body(frames: &[(&str, Value)]) -> String {
    frames
        .iter()
        .map(|(kind, data)| format!("event: {kind}\ndata: {data}\n\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StageInputs;
    use serde_json::json;

    #[tokio::test]
    async fn test_replies_in_order() {
        let backend = ScriptedBackend::new()
            .with_response(StageKind::Plan, json!({"n": 1}))
            .with_response(StageKind::Plan, json!({"n": 2}));
        let request = GenerationRequest::new(StageKind::Plan, StageInputs::new());

        assert_eq!(backend.generate(&request).await.unwrap()["n"], 1);
        assert_eq!(backend.generate(&request).await.unwrap()["n"], 2);
        assert!(backend.generate(&request).await.is_err());
        assert_eq!(backend.call_count(StageKind::Plan), 3);
    }

    #[tokio::test]
    async fn test_stream_chunks() {
        let backend = ScriptedBackend::new().with_stream(StageKind::Write, &["ab", "cd"]);
        let request = GenerationRequest::new(StageKind::Write, StageInputs::new());
        let chunks: Vec<_> = backend.open_stream(&request).await.unwrap().collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].as_ref().unwrap(), b"cd");
    }

    #[test]
    fn test_sse_body() {
        let body = sse_body(&[("complete", json!({"success": true, "article": "a b"}))]);
        assert!(body.starts_with("event: complete\ndata: {"));
        assert!(body.ends_with("\n\n"));
    }
}
