//! Telemetry and structured logging components for AgentForge.
//!
//! Handles log redaction, console plus rolling NDJSON file output, and
//! forwarding agent loop events into the tracing pipeline.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{TracingEventSink, EVENT_TARGET};
pub use logger::init_logger;
pub use redact::{redact_sensitive_data, redact_value};
