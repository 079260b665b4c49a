//! Tracing setup with optional file-based span export.
//!
//! ```text
//! tracing macros → EnvFilter ─┬─ fmt layer → stderr                 (no trace_file)
//!                             └─ OpenTelemetry layer → JSON lines   (trace_file set)
//! ```
//!
//! The filter directive comes from, in order:
//! 1. `RUST_LOG`
//! 2. [`Config::trace_level`](crate::Config::trace_level)
//! 3. `"info"`
//!
//! Library code only emits `tracing` events and spans; installing a
//! subscriber is left to the host application through [`init_tracing`].

mod exporter;
mod init;

pub use exporter::MAX_FILE_BYTES;
pub use init::{init_tracing, SERVICE_NAME};
