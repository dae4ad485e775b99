//! Structured alert log sink
//!
//! Every message added to the alert store is logged once on the
//! `devwatch::alerts` target, carrying its JSON log line in the `alert`
//! field. [`alert_line_layer`] writes exactly that line, so the sink's
//! `level` follows the message severity (info, warning, error) rather
//! than the tracing level names.

use crate::domain::{Message, Severity};
use std::fmt::{self, Write as _};
use tracing::field::{Field, Visit};
use tracing::{error, info, warn, Event, Metadata, Subscriber};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Tracing target for alert messages
pub const ALERT_TARGET: &str = "devwatch::alerts";

const LINE_FIELD: &str = "alert";

/// Whether an event belongs to the alert sink
pub fn is_alert_event(metadata: &Metadata<'_>) -> bool {
    metadata.target() == ALERT_TARGET
}

/// Log a newly created message on the alert target
pub(crate) fn emit(message: &Message) {
    let line = message.log_line();
    let line = line.as_str();
    match message.severity {
        Severity::Info => info!(
            target: ALERT_TARGET,
            alert = line,
            "{}: {}",
            message.title,
            message.description
        ),
        Severity::Warning => warn!(
            target: ALERT_TARGET,
            alert = line,
            "{}: {}",
            message.title,
            message.description
        ),
        Severity::Alarm => error!(
            target: ALERT_TARGET,
            alert = line,
            "{}: {}",
            message.title,
            message.description
        ),
    }
}

/// Layer writing one JSON line per alert message to `writer`
pub fn alert_line_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .event_format(AlertLineFormat)
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(Targets::new().with_target(ALERT_TARGET, LevelFilter::TRACE))
}

/// Formats an alert event as its pre-rendered JSON line
struct AlertLineFormat;

impl<S, N> FormatEvent<S, N> for AlertLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        match visitor.line {
            Some(line) => writeln!(writer, "{}", line),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct LineVisitor {
    line: Option<String>,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == LINE_FIELD {
            self.line = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, Details};
    use crate::supervisor::AlertStore;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_added_messages_are_logged_with_mapped_level() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(alert_line_layer(capture.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = AlertStore::with_defaults();
        let mut ids = Vec::new();
        for severity in [Severity::Info, Severity::Warning, Severity::Alarm] {
            let msg = store
                .add(
                    severity,
                    Category::DeviceConnection,
                    "camera_1",
                    "Garage",
                    "state changed",
                    Details::new(),
                )
                .await;
            ids.push(msg.id);
        }
        // Other targets never reach the sink
        tracing::warn!("unrelated");

        let lines = capture.lines();
        assert_eq!(lines.len(), 3);
        let levels: Vec<&str> = lines.iter().map(|l| l["level"].as_str().unwrap()).collect();
        assert_eq!(levels, vec!["info", "warning", "error"]);
        for (line, id) in lines.iter().zip(&ids) {
            assert_eq!(line["message_id"], id.as_str());
            assert_eq!(line["source"], "camera_1");
            assert_eq!(line["message"], "Garage: state changed");
        }
    }
}
