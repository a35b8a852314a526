//! Testing utilities for contentflow pipelines.
//!
//! This module provides:
//! - A scripted generation backend
//! - A recording persistence gateway
//! - A manually driven tick scheduler
//! - SSE body helpers

mod backend;
mod gateway;
mod scheduler;

pub use backend::{sse_body, ScriptedBackend, ScriptedReply};
pub use gateway::RecordingGateway;
pub use scheduler::ManualScheduler;
