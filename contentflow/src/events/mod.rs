//! Event sink system for observability.
//!
//! Every observable state change of a stage (start, progress, terminal
//! status, commit, version comparison, persistence outcome) is reported to
//! an [`EventSink`].

mod event;
mod sink;

pub use event::{PipelineEvent, SaveTarget};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
