//! `tracing` subscriber installation.

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Builds a subscriber writing `format` lines to `writer`.
///
/// Install it globally with [`init_logging`] or scope it with
/// `tracing::subscriber::with_default`.
pub fn logging_subscriber<W>(
    format: LogFormat,
    filter: EnvFilter,
    writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => Box::new(registry.with(tracing_subscriber::fmt::layer().with_writer(writer))),
        LogFormat::Json => Box::new(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(writer),
            ),
        ),
    }
}

/// Installs a global stdout subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns false if a global subscriber was already installed; calling
/// this twice is harmless.
pub fn init_logging(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    logging_subscriber(format, filter, std::io::stdout)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StageInputs;
    use crate::core::StageKind;
    use crate::pipeline::ContentPipelineBuilder;
    use crate::testing::{RecordingGateway, ScriptedBackend};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock())
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn capture(format: LogFormat, filter: &str, emit: impl FnOnce()) -> Vec<String> {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = logging_subscriber(format, EnvFilter::new(filter), move || sink.clone());
        tracing::subscriber::with_default(subscriber, emit);
        captured.lines()
    }

    #[test]
    fn test_json_lines_carry_fields_and_span() {
        let lines = capture(LogFormat::Json, DEFAULT_FILTER, || {
            let span = tracing::info_span!("run", stage = "humanize");
            let _entered = span.enter();
            tracing::info!(percent = 95, "Progress");
        });

        assert_eq!(lines.len(), 1);
        let line: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(line["fields"]["message"], "Progress");
        assert_eq!(line["fields"]["percent"], 95);
        assert_eq!(line["span"]["stage"], "humanize");
    }

    #[test]
    fn test_stage_run_span_records_redo_once() {
        let lines = capture(LogFormat::Json, DEFAULT_FILTER, || {
            tokio_test::block_on(async {
                let backend = ScriptedBackend::new().with_response(
                    StageKind::Humanize,
                    json!({"success": true, "humanizedArticle": "Text", "humanScore": 90}),
                );
                let pipeline =
                    ContentPipelineBuilder::new(Arc::new(backend), Arc::new(RecordingGateway::new()))
                        .build()
                        .unwrap();
                pipeline
                    .run(StageKind::Humanize, StageInputs::new(), false)
                    .await
                    .unwrap();
            });
        });

        let started = lines
            .iter()
            .find(|l| l.contains("Attempt started"))
            .expect("attempt start logged");
        let line: serde_json::Value = serde_json::from_str(started).unwrap();
        assert_eq!(line["span"]["name"], "run");
        assert_eq!(line["span"]["stage"], "humanize");
        assert_eq!(line["span"]["redo"], false);
        assert!(line["span"].get("is_redo").is_none());
    }

    #[test]
    fn test_filter_drops_debug() {
        let lines = capture(LogFormat::Pretty, DEFAULT_FILTER, || {
            tracing::debug!("hidden");
            tracing::warn!("shown");
        });

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("shown"));
    }

    #[test]
    fn test_format_serde() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }
}
