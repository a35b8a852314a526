//! # Contentflow
//!
//! Core of a multi-stage content generation pipeline.
//!
//! An article moves through four stages (plan, write, humanize,
//! seo-optimize). Each stage is run by a [`pipeline::StageController`]
//! that calls a generation backend and reports progress while it waits:
//!
//! - **Simulated progress**: request/response stages walk a fixed schedule
//!   of checkpoints on an injectable tick scheduler
//! - **Streamed progress**: the write stage demultiplexes an SSE body into
//!   progress, token, complete and error frames
//! - **Version arbitration**: a redo produces a candidate the user keeps or
//!   discards; the accepted artifact is never overwritten silently
//! - **Fire-and-forget persistence**: committed artifacts are saved in
//!   detached tasks whose failures are only logged
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contentflow::prelude::*;
//!
//! let pipeline = ContentPipelineBuilder::new(backend, gateway)
//!     .with_ids(PipelineIds::new(Some(pipeline_id), Some(insight_id)))
//!     .build()?;
//!
//! let outcome = pipeline
//!     .run(StageKind::Humanize, StageInputs::new().with("article", text), false)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod persistence;
pub mod pipeline;
pub mod progress;
pub mod streaming;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{GenerationBackend, GenerationRequest, StageInputs};
    pub use crate::config::PipelineConfig;
    pub use crate::core::{
        AttemptSnapshot, AttemptStatus, StageArtifact, StageKind, TransportStyle,
    };
    pub use crate::errors::{PersistenceError, PipelineError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
    pub use crate::persistence::PersistenceGateway;
    pub use crate::pipeline::{
        ContentPipeline, ContentPipelineBuilder, PipelineIds, Resolution, RunOutcome,
        StageController, VersionChoice, VersionComparison,
    };
    pub use crate::progress::{Scheduler, TokioScheduler};
    pub use crate::streaming::{FrameDecoder, StreamFrame};

    #[cfg(feature = "http")]
    pub use crate::backend::HttpGenerationBackend;
    #[cfg(feature = "http")]
    pub use crate::persistence::HttpPersistenceGateway;
}
