//! Stream frame types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kind of a stream frame.
///
/// The set is closed: frames announcing any other kind are dropped by the
/// demultiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Explicit progress: `percent` and `message`.
    Progress,
    /// A chunk of generated text; `length` is the running character count.
    Token,
    /// Terminal success carrying the final result.
    Complete,
    /// Terminal failure carrying an `error` message.
    Error,
}

impl FrameKind {
    /// Parses the value of an `event:` line.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "progress" => Some(Self::Progress),
            "token" => Some(Self::Token),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns true for `complete` and `error`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress => write!(f, "progress"),
            Self::Token => write!(f, "token"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One complete, parsed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    /// Frame kind.
    pub kind: FrameKind,
    /// Decoded JSON payload.
    pub payload: Value,
}

impl StreamFrame {
    /// Creates a frame.
    #[must_use]
    pub fn new(kind: FrameKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// The `percent` field, if numeric.
    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        self.payload.get("percent").and_then(Value::as_f64)
    }

    /// The `message` field, if a string.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }

    /// The `length` field of a token frame.
    #[must_use]
    pub fn length(&self) -> Option<u64> {
        self.payload.get("length").and_then(Value::as_u64)
    }

    /// The non-empty `error` field of an error frame.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.payload
            .get("error")
            .and_then(Value::as_str)
            .filter(|msg| !msg.is_empty())
    }
}
