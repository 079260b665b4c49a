//! Subscriber setup.

use super::exporter::file_tracer_provider;
use crate::domain::error::Result;
use crate::Config;
use opentelemetry::trace::TracerProvider as _;
use std::path::Path;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Service name recorded on exported spans.
pub const SERVICE_NAME: &str = "feedsync";

/// Resolves the filter directive: `RUST_LOG`, then `config.trace_level`,
/// then `"info"`.
fn filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.trace_level.as_deref().unwrap_or("info"))
    })
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Installs the global tracing subscriber.
///
/// With `config.trace_file` set, spans are exported as JSON lines to that file
/// through an OpenTelemetry layer; otherwise events are formatted to stderr.
/// Calling it again after a subscriber is installed is a no-op.
///
/// # Errors
///
/// Returns [`SyncError::Io`](crate::SyncError::Io) if the trace file's
/// directory cannot be created.
///
/// # Example
///
/// ```rust
/// use feedsync::observability::init_tracing;
/// use feedsync::Config;
///
/// let config = Config {
///     trace_level: Some("debug".to_string()),
///     ..Config::default()
/// };
/// init_tracing(&config)?;
/// tracing::debug!("tracing is now active");
/// # Ok::<(), feedsync::SyncError>(())
/// ```
pub fn init_tracing(config: &Config) -> Result<()> {
    let registry = tracing_subscriber::registry().with(filter(config));

    let installed = match &config.trace_file {
        Some(path) => {
            ensure_parent_dir(path)?;
            let provider = file_tracer_provider(path, SERVICE_NAME);
            let tracer = provider.tracer(SERVICE_NAME);
            // Keeps the provider alive for the lifetime of the process.
            opentelemetry::global::set_tracer_provider(provider);
            registry.with(OpenTelemetryLayer::new(tracer)).try_init()
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
