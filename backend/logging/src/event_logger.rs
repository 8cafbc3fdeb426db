//! Agent Event Logger
//!
//! Writes agent loop events into the tracing pipeline under a dedicated
//! target, so the NDJSON file layer captures them next to ordinary logs.

use agentforge_core::{AgentEvent, EventKind, EventSink};
use tracing::{info, warn};

use crate::redact::redact_value;

/// Tracing target used for every forwarded event.
pub const EVENT_TARGET: &str = "agent_events";

/// An [`EventSink`] that logs each event with its payload redacted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn emit(&self, event: AgentEvent) {
        let payload = redact_value(&event.payload).to_string();
        match event.kind {
            EventKind::Error => warn!(
                target: EVENT_TARGET,
                session_id = %event.session_id,
                run_id = %event.run_id,
                step = event.step,
                kind = %event.kind,
                payload = %payload,
                "Agent run error"
            ),
            _ => info!(
                target: EVENT_TARGET,
                session_id = %event.session_id,
                run_id = %event.run_id,
                step = event.step,
                kind = %event.kind,
                payload = %payload,
                "Agent trace event"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_emit_without_subscriber() {
        let sink = TracingEventSink::new();
        for kind in [EventKind::RunStarted, EventKind::Error, EventKind::RunEnded] {
            sink.emit(AgentEvent::new(
                "s1",
                Uuid::new_v4(),
                1,
                kind,
                serde_json::json!({"token": "Bearer secret-token"}),
            ));
        }
    }
}
