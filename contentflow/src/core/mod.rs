//! Core domain model types for contentflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage kinds and their static properties
//! - Stage artifacts
//! - The generation attempt state machine

mod artifact;
mod attempt;
mod stage;

pub use artifact::{ArtifactContent, StageArtifact};
pub use attempt::{AttemptSnapshot, AttemptStatus, GenerationAttempt};
pub use stage::{StageKind, TransportStyle};
