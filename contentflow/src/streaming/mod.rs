//! Event-stream framing for streaming stage backends.

mod demux;
mod frame;

pub use demux::{demultiplex, Demultiplexed, FrameDecoder};
pub use frame::{FrameKind, StreamFrame};
