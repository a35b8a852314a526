//! Observability utilities.

mod logging;

pub use logging::{init_logging, logging_subscriber, LogFormat, DEFAULT_FILTER};
