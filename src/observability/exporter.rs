//! JSON-lines span export to a local file.
//!
//! Each finished span becomes one flat JSON object on its own line, which keeps
//! the file greppable and easy to load into `jq`. When the file grows past
//! [`MAX_FILE_BYTES`] it is moved to `<name>.1` (replacing any older backup)
//! and a fresh file is started.

use futures_util::future::BoxFuture;
use opentelemetry::trace::{SpanId, Status, TraceError};
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::trace::TracerProvider;
use serde_json::{json, Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Size at which the trace file is rotated.
pub const MAX_FILE_BYTES: u64 = 8 * 1024 * 1024;

/// Append-only line writer with single-backup rotation.
#[derive(Debug)]
pub(crate) struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    file: Mutex<Option<File>>,
}

impl RotatingFile {
    pub(crate) const fn new(path: PathBuf, max_bytes: u64) -> Self {
        Self {
            path,
            max_bytes,
            file: Mutex::new(None),
        }
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".1");
        PathBuf::from(name)
    }

    pub(crate) fn write_line(&self, line: &str) -> io::Result<()> {
        let mut slot = self.file.lock().unwrap_or_else(PoisonError::into_inner);

        let size = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if size > 0 && size + line.len() as u64 > self.max_bytes {
            *slot = None;
            fs::rename(&self.path, self.backup_path())?;
        }

        if slot.is_none() {
            *slot = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        }

        let Some(file) = slot.as_mut() else {
            return Err(io::Error::other("trace file unavailable"));
        };
        writeln!(file, "{line}")?;
        file.flush()
    }
}

/// Exports spans as JSON lines through a [`RotatingFile`].
#[derive(Debug)]
pub(crate) struct JsonLinesExporter {
    file: RotatingFile,
    service: String,
    stopped: bool,
}

impl JsonLinesExporter {
    pub(crate) fn new(path: PathBuf, service: impl Into<String>) -> Self {
        Self {
            file: RotatingFile::new(path, MAX_FILE_BYTES),
            service: service.into(),
            stopped: false,
        }
    }

    fn record(&self, span: &SpanData) -> Value {
        let attributes: Map<String, Value> = span
            .attributes
            .iter()
            .map(|kv| (kv.key.to_string(), attribute_json(&kv.value)))
            .collect();

        let events: Vec<Value> = span
            .events
            .iter()
            .map(|event| {
                let fields: Map<String, Value> = event
                    .attributes
                    .iter()
                    .map(|kv| (kv.key.to_string(), attribute_json(&kv.value)))
                    .collect();
                json!({ "name": event.name, "atUnixNano": unix_nanos(event.timestamp), "fields": fields })
            })
            .collect();

        let parent = (span.parent_span_id != SpanId::INVALID).then(|| format!("{:016x}", span.parent_span_id));
        let duration = span.end_time.duration_since(span.start_time).unwrap_or(Duration::ZERO);

        json!({
            "service": self.service,
            "name": span.name,
            "traceId": format!("{:032x}", span.span_context.trace_id()),
            "spanId": format!("{:016x}", span.span_context.span_id()),
            "parentSpanId": parent,
            "startUnixNano": unix_nanos(span.start_time),
            "durationMicros": u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
            "attributes": attributes,
            "events": events,
            "error": match &span.status {
                Status::Error { description } => Some(description.to_string()),
                Status::Ok | Status::Unset => None,
            },
        })
    }
}

impl SpanExporter for JsonLinesExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        if self.stopped {
            return Box::pin(std::future::ready(Err(TraceError::from("exporter is shut down"))));
        }

        let result = batch
            .iter()
            .try_for_each(|span| self.file.write_line(&self.record(span).to_string()))
            .map_err(|err| TraceError::from(err.to_string()));
        Box::pin(std::future::ready(result))
    }

    fn shutdown(&mut self) {
        self.stopped = true;
    }
}

/// Builds a provider that writes every finished span to `path`.
pub(crate) fn file_tracer_provider(path: &Path, service: &str) -> TracerProvider {
    let resource = Resource::new(vec![opentelemetry::KeyValue::new("service.name", service.to_string())]);
    TracerProvider::builder()
        .with_config(opentelemetry_sdk::trace::Config::default().with_resource(resource))
        .with_simple_exporter(JsonLinesExporter::new(path.to_path_buf(), service))
        .build()
}

fn attribute_json(value: &opentelemetry::Value) -> Value {
    use opentelemetry::Value as Otel;

    match value {
        Otel::Bool(b) => json!(b),
        Otel::I64(i) => json!(i),
        Otel::F64(f) => json!(f),
        Otel::String(s) => json!(s.to_string()),
        Otel::Array(_) => json!(value.to_string()),
    }
}

fn unix_nanos(at: SystemTime) -> String {
    at.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_nanos().to_string()
}
