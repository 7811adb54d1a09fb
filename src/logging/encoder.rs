//! Record encoders.
//!
//! An [`EncoderLayer`] is one "core": it owns an encoding [`Format`], a sink and
//! a minimum severity. Several of them installed on one registry fan every
//! event out to their sinks, each rendering it its own way.
//!
//! # JSON
//!
//! ```text
//! {"level":"info","time":1700000000123,"msg":"/subdir/asdf","hostname":"web-1","pid":4242,"method":"GET","status":200,"path":"/subdir/asdf"}
//! ```
//!
//! # Console
//!
//! ```text
//! 14:03:27 PM INFO /subdir/asdf {"method":"GET","status":200,"path":"/subdir/asdf"}
//! ```

use std::backtrace::Backtrace;
use std::fmt;
use std::io::Write;

use chrono::{Local, Utc};
use colored::Colorize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber, span};
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use super::BaseFields;
use super::severity::{SEVERITY_FIELD, Severity};

const MESSAGE_FIELD: &str = "message";

/// Keys the JSON encoder writes itself. User fields with these names are
/// written under `fields.<name>` instead.
const RESERVED_KEYS: [&str; 7] = [
    "level",
    "time",
    "caller",
    "msg",
    "hostname",
    "pid",
    "stacktrace",
];

/// Serialization strategy for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One JSON object per line, epoch-millisecond `time`.
    Json,
    /// Space-separated columns with a colorized level, for humans.
    Console,
}

/// Fields recorded on a span, merged into every event inside it.
#[derive(Debug, Default)]
struct SpanFields(Map<String, Value>);

/// Collects an event's or span's fields into a JSON map.
struct FieldVisitor<'a> {
    fields: &'a mut Map<String, Value>,
    message: Option<String>,
    severity: Option<Severity>,
}

impl<'a> FieldVisitor<'a> {
    fn new(fields: &'a mut Map<String, Value>) -> Self {
        Self {
            fields,
            message: None,
            severity: None,
        }
    }

    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            MESSAGE_FIELD => self.message = Some(value.to_string()),
            SEVERITY_FIELD => match value.parse() {
                Ok(severity) => self.severity = Some(severity),
                Err(_) => self.insert(field, Value::from(value)),
            },
            _ => self.insert(field, Value::from(value)),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}

/// A tracing layer that encodes events and writes them to one sink.
pub struct EncoderLayer<W> {
    format: Format,
    writer: W,
    min_severity: Severity,
    base_fields: Option<BaseFields>,
    caller: bool,
}

impl<W> EncoderLayer<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    pub fn new(format: Format, writer: W) -> Self {
        Self {
            format,
            writer,
            min_severity: Severity::Debug,
            base_fields: None,
            caller: false,
        }
    }

    pub fn json(writer: W) -> Self {
        Self::new(Format::Json, writer)
    }

    pub fn console(writer: W) -> Self {
        Self::new(Format::Console, writer)
    }

    /// Records below `severity` are dropped by this layer.
    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Attaches `hostname`/`pid` to every record when `Some`.
    pub fn with_base_fields(mut self, base_fields: Option<BaseFields>) -> Self {
        self.base_fields = base_fields;
        self
    }

    /// Adds a `caller` column (`file:line`) to every record.
    pub fn with_caller(mut self, caller: bool) -> Self {
        self.caller = caller;
        self
    }

    fn render(&self, record: &Record) -> Vec<u8> {
        match self.format {
            Format::Json => self.render_json(record),
            Format::Console => self.render_console(record),
        }
    }

    fn render_json(&self, record: &Record) -> Vec<u8> {
        let mut object = Map::new();
        object.insert("level".into(), Value::from(record.severity.as_str()));
        object.insert("time".into(), Value::from(Utc::now().timestamp_millis()));
        if let Some(caller) = &record.caller {
            object.insert("caller".into(), Value::from(caller.as_str()));
        }
        object.insert("msg".into(), Value::from(record.message.as_str()));
        self.merge_base_fields(&mut object);
        merge_fields(&mut object, &record.fields, &RESERVED_KEYS);
        if let Some(stacktrace) = &record.stacktrace {
            object.insert("stacktrace".into(), Value::from(stacktrace.as_str()));
        }

        let mut line = serde_json::to_vec(&Value::Object(object)).unwrap_or_default();
        line.push(b'\n');
        line
    }

    fn render_console(&self, record: &Record) -> Vec<u8> {
        let mut columns = vec![
            Local::now().format("%H:%M:%S %p").to_string(),
            colorize(record.severity),
        ];
        if let Some(caller) = &record.caller {
            columns.push(caller.clone());
        }
        columns.push(record.message.clone());

        let mut fields = Map::new();
        self.merge_base_fields(&mut fields);
        merge_fields(&mut fields, &record.fields, &[]);
        if !fields.is_empty() {
            columns.push(Value::Object(fields).to_string());
        }

        let mut line = columns.join(" ");
        if let Some(stacktrace) = &record.stacktrace {
            line.push('\n');
            line.push_str(stacktrace);
        }
        line.push('\n');
        line.into_bytes()
    }

    fn merge_base_fields(&self, object: &mut Map<String, Value>) {
        if let Some(base) = &self.base_fields {
            object.insert("hostname".into(), Value::from(base.hostname.as_str()));
            object.insert("pid".into(), Value::from(base.pid));
        }
    }
}

/// One event, decoded and ready to encode.
struct Record {
    severity: Severity,
    message: String,
    caller: Option<String>,
    fields: Map<String, Value>,
    stacktrace: Option<String>,
}

/// Copies user fields into `object` without overwriting keys already written
/// or listed in `reserved`.
fn merge_fields(object: &mut Map<String, Value>, fields: &Map<String, Value>, reserved: &[&str]) {
    for (key, value) in fields {
        if object.contains_key(key) || reserved.contains(&key.as_str()) {
            object.insert(format!("fields.{key}"), value.clone());
        } else {
            object.insert(key.clone(), value.clone());
        }
    }
}

fn colorize(severity: Severity) -> String {
    let name = severity.as_str().to_ascii_uppercase();
    match severity {
        Severity::Debug => name.magenta(),
        Severity::Info => name.blue(),
        Severity::Warning => name.yellow(),
        Severity::Error | Severity::Fatal | Severity::Panic => name.red(),
    }
    .to_string()
}

impl<S, W> Layer<S> for EncoderLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        // Sibling encoder layers see the same span; the first one records it.
        if extensions.get_mut::<SpanFields>().is_some() {
            return;
        }

        let mut fields = Map::new();
        attrs.record(&mut FieldVisitor::new(&mut fields));
        extensions.insert(SpanFields(fields));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
            values.record(&mut FieldVisitor::new(fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut fields = Map::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(SpanFields(span_fields)) = span.extensions().get::<SpanFields>() {
                    fields.extend(span_fields.clone());
                }
            }
        }

        let mut visitor = FieldVisitor::new(&mut fields);
        event.record(&mut visitor);
        let message = visitor.message.take().unwrap_or_default();
        let level = Severity::from_level(metadata.level());
        // Only lifts ERROR events; never lowers a record.
        let severity = match visitor.severity.take() {
            Some(severity) if level == Severity::Error && severity > level => severity,
            _ => level,
        };

        if severity < self.min_severity {
            return;
        }

        let caller = if self.caller {
            metadata
                .file()
                .map(|file| format!("{}:{}", file, metadata.line().unwrap_or(0)))
        } else {
            None
        };

        let stacktrace = severity
            .captures_stacktrace()
            .then(|| Backtrace::force_capture().to_string());

        let record = Record {
            severity,
            message,
            caller,
            fields,
            stacktrace,
        };

        let line = self.render(&record);
        let mut writer = self.writer.make_writer_for(metadata);
        if let Err(e) = writer.write_all(&line).and_then(|_| writer.flush()) {
            eprintln!("failed to write log record: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use serial_test::serial;
    use tracing_subscriber::layer::SubscriberExt;

    fn with_layer<W>(layer: EncoderLayer<W>, f: impl FnOnce())
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn test_json_record_layout() {
        let sink = MemorySink::new();
        with_layer(EncoderLayer::json(sink.clone()), || {
            tracing::info!(method = "GET", status = 200u16, "/subdir/asdf");
        });

        let records = sink.json_records().unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record["level"], "info");
        assert_eq!(record["msg"], "/subdir/asdf");
        assert_eq!(record["method"], "GET");
        assert_eq!(record["status"], 200);
        assert!(record["time"].is_i64());
        assert!(record.get("caller").is_none());
        assert!(record.get("hostname").is_none());
        assert!(record.get("stacktrace").is_none());
    }

    #[test]
    fn test_json_key_order() {
        let sink = MemorySink::new();
        with_layer(EncoderLayer::json(sink.clone()), || {
            tracing::warn!(path = "/x", "hello");
        });

        let line = &sink.lines()[0];
        let level = line.find("\"level\"").unwrap();
        let time = line.find("\"time\"").unwrap();
        let msg = line.find("\"msg\"").unwrap();
        let path = line.find("\"path\"").unwrap();
        assert!(level < time && time < msg && msg < path);
        assert!(line.contains("\"level\":\"warn\""));
    }

    #[test]
    fn test_base_fields_attached() {
        let sink = MemorySink::new();
        let base = BaseFields {
            hostname: "web-1".to_string(),
            pid: 4242,
        };
        with_layer(
            EncoderLayer::json(sink.clone()).with_base_fields(Some(base)),
            || tracing::info!("started"),
        );

        let record = &sink.json_records().unwrap()[0];
        assert_eq!(record["hostname"], "web-1");
        assert_eq!(record["pid"], 4242);
    }

    #[test]
    fn test_caller_and_stacktrace() {
        let sink = MemorySink::new();
        with_layer(EncoderLayer::json(sink.clone()).with_caller(true), || {
            tracing::error!(error = "boom", "request failed");
        });

        let record = &sink.json_records().unwrap()[0];
        assert_eq!(record["level"], "error");
        let caller = record["caller"].as_str().unwrap();
        assert!(caller.contains("encoder.rs:"));
        assert!(record["stacktrace"].is_string());
    }

    #[test]
    fn test_min_severity_filters() {
        let sink = MemorySink::new();
        with_layer(
            EncoderLayer::json(sink.clone()).with_min_severity(Severity::Warning),
            || {
                tracing::debug!("dropped");
                tracing::info!("dropped");
                tracing::warn!("kept");
            },
        );

        let records = sink.json_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["msg"], "kept");
    }

    #[test]
    fn test_severity_field_overrides_level() {
        let sink = MemorySink::new();
        with_layer(
            EncoderLayer::json(sink.clone()).with_min_severity(Severity::Fatal),
            || {
                tracing::error!("plain error is below fatal");
                tracing::error!(__severity = "fatal", "shutting down");
            },
        );

        let records = sink.json_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "fatal");
        assert_eq!(records[0]["msg"], "shutting down");
        assert!(records[0].get("__severity").is_none());
    }

    #[test]
    fn test_plain_severity_field_is_ordinary() {
        let sink = MemorySink::new();
        with_layer(
            EncoderLayer::json(sink.clone()).with_min_severity(Severity::Warning),
            || {
                tracing::error!(severity = "info", alert = "disk", "disk almost full");
                tracing::warn!(__severity = "debug", "not lowered");
                tracing::info!(__severity = "fatal", "not lifted");
            },
        );

        let records = sink.json_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["level"], "error");
        assert_eq!(records[0]["severity"], "info");
        assert_eq!(records[0]["alert"], "disk");
        assert!(records[0]["stacktrace"].is_string());
        assert_eq!(records[1]["level"], "warn");
        assert_eq!(records[1]["msg"], "not lowered");
    }

    #[test]
    fn test_user_fields_cannot_overwrite_record_keys() {
        let sink = MemorySink::new();
        let base = BaseFields {
            hostname: "web-1".to_string(),
            pid: 4242,
        };
        with_layer(
            EncoderLayer::json(sink.clone()).with_base_fields(Some(base)),
            || tracing::info!(time = "yesterday", level = "custom", pid = 1u32, "x"),
        );

        let record = &sink.json_records().unwrap()[0];
        assert!(record["time"].is_i64());
        assert_eq!(record["level"], "info");
        assert_eq!(record["msg"], "x");
        assert_eq!(record["pid"], 4242);
        assert_eq!(record["fields.time"], "yesterday");
        assert_eq!(record["fields.level"], "custom");
        assert_eq!(record["fields.pid"], 1);
    }

    #[test]
    fn test_span_fields_are_merged() {
        let sink = MemorySink::new();
        with_layer(EncoderLayer::json(sink.clone()), || {
            let span = tracing::info_span!("request", reqId = "abc-123");
            span.in_scope(|| tracing::info!("inside"));
            tracing::info!("outside");
        });

        let records = sink.json_records().unwrap();
        assert_eq!(records[0]["reqId"], "abc-123");
        assert!(records[1].get("reqId").is_none());
    }

    #[test]
    #[serial]
    fn test_console_line() {
        colored::control::set_override(false);
        let sink = MemorySink::new();
        with_layer(EncoderLayer::console(sink.clone()), || {
            tracing::info!(status = 201u16, "/items");
        });

        let line = &sink.lines()[0];
        let columns: Vec<&str> = line.splitn(4, ' ').collect();
        // "HH:MM:SS", "AM|PM", "INFO", rest
        assert_eq!(columns[0].len(), 8);
        assert!(columns[1] == "AM" || columns[1] == "PM");
        assert_eq!(columns[2], "INFO");
        assert_eq!(columns[3], "/items {\"status\":201}");
        assert!(serde_json::from_str::<Value>(line).is_err());
    }

    #[test]
    #[serial]
    fn test_console_level_is_colorized() {
        colored::control::set_override(true);
        let sink = MemorySink::new();
        with_layer(EncoderLayer::console(sink.clone()), || {
            tracing::info!("/items");
            tracing::error!("/fail");
        });
        colored::control::unset_override();

        let lines = sink.lines();
        assert!(lines[0].contains("\u{1b}[34mINFO\u{1b}[0m /items"));
        assert!(lines[1].contains("\u{1b}[31mERROR\u{1b}[0m /fail"));
    }
}
