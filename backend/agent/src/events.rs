//! In-process event sinks.

use std::sync::Arc;

use agentforge_core::{AgentEvent, EventSink};
use tokio::sync::broadcast;
use tracing::trace;

/// Publishes events on a tokio broadcast channel. Sending with no
/// subscribers is not an error; the event is dropped.
#[derive(Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<AgentEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: AgentEvent) {
        if self.tx.send(event).is_err() {
            trace!("No event subscribers; dropping event");
        }
    }
}

/// Forwards every event to each inner sink.
#[derive(Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, event: AgentEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: AgentEvent) {}
}
