//! Event sink trait and implementations.

use super::event::PipelineEvent;
use async_trait::async_trait;
use tracing::{debug, info, Level};

/// Receives pipeline events.
///
/// Sinks observe the pipeline; they never influence it. Implementations
/// must not block or panic.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: PipelineEvent) {
        self.try_emit(&event);
    }

    /// Emits an event without blocking.
    ///
    /// Called while stage state is locked, so it must return quickly.
    fn try_emit(&self, event: &PipelineEvent);
}

/// Discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: &PipelineEvent) {}
}

/// Logs events through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        let event_type = event.event_type();
        let stage = event.stage();
        let data = event.to_json();
        if self.level == Level::DEBUG {
            debug!(event_type, %stage, event_data = %data, "Event: {}", event_type);
        } else {
            info!(event_type, %stage, event_data = %data, "Event: {}", event_type);
        }
    }
}

/// Records events in memory, for tests and inspection.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Returns the event type names in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(PipelineEvent::event_type).collect()
    }

    /// Returns the percents reported for progress events, in order.
    #[must_use]
    pub fn progress_percents(&self) -> Vec<u8> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StageProgress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageKind;
    use uuid::Uuid;

    fn started() -> PipelineEvent {
        PipelineEvent::StageStarted {
            stage: StageKind::Plan,
            attempt_id: Uuid::new_v4(),
            redo: false,
        }
    }

    fn progress(percent: u8) -> PipelineEvent {
        PipelineEvent::StageProgress {
            stage: StageKind::Plan,
            attempt_id: Uuid::new_v4(),
            percent,
            label: String::new(),
        }
    }

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit(started()).await;
        sink.try_emit(&progress(10));
    }

    #[test]
    fn test_emit_outside_runtime() {
        let sink = CollectingEventSink::new();
        tokio_test::block_on(sink.emit(started()));
        assert_eq!(sink.event_types(), vec!["stage.started"]);
    }

    #[tokio::test]
    async fn test_logging_sink() {
        LoggingEventSink::default().emit(started()).await;
        LoggingEventSink::debug().try_emit(&progress(10));
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(started()).await;
        sink.try_emit(&progress(15));
        sink.try_emit(&progress(30));

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.event_types(),
            vec!["stage.started", "stage.progress", "stage.progress"]
        );
        assert_eq!(sink.progress_percents(), vec![15, 30]);
        assert_eq!(sink.events_of_type("stage.progress").len(), 2);

        sink.clear();
        assert!(sink.is_empty());
    }
}
