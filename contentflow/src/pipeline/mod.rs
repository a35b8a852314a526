//! Stage execution and pipeline state.
//!
//! This module provides:
//! - The shared pipeline state and its record IDs
//! - Stage controllers that run generation attempts
//! - Version arbitration for redone stages
//! - The four-stage content pipeline and its builder

mod arbiter;
mod builder;
mod cell;
mod content;
mod controller;
mod state;


pub use arbiter::{Resolution, VersionArbiter, VersionChoice, VersionComparison};
pub use builder::ContentPipelineBuilder;
pub use content::ContentPipeline;
pub use controller::{RunOutcome, StageController, NO_STREAM_RESULT};
pub use state::{PipelineIds, PipelineState, SharedPipelineState};
