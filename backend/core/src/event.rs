use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event emitted by the agent loop for external subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    pub session_id: String,
    pub run_id: Uuid,
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

/// Categories of events emitted during a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A run was started
    RunStarted,
    /// A loop iteration began
    StepStart,
    /// Raw text returned by the model
    ModelOutput,
    /// A tool invocation is about to start
    ToolStart,
    /// A tool invocation finished (successfully or not)
    ToolEnd,
    /// The run produced its final answer
    FinalAnswer,
    /// A tool produced a file artifact
    FileCreated,
    /// Free-form timeline entry
    Timeline,
    /// The run hit a fatal error
    Error,
    /// The run was finalized
    RunEnded,
}

impl AgentEvent {
    pub fn new(
        session_id: impl Into<String>,
        run_id: Uuid,
        step: usize,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            run_id,
            step,
            timestamp: Utc::now(),
            kind,
            payload,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let run_id = Uuid::new_v4();
        let event = AgentEvent::new(
            "session-1",
            run_id,
            3,
            EventKind::ToolStart,
            serde_json::json!({"tool": "web_search"}),
        );
        assert_eq!(event.run_id, run_id);
        assert_eq!(event.session_id, "session-1");
        assert_eq!(event.step, 3);
        assert_eq!(event.kind, EventKind::ToolStart);
    }

    #[test]
    fn test_event_serialization() {
        let event = AgentEvent::new(
            "s",
            Uuid::new_v4(),
            1,
            EventKind::FileCreated,
            serde_json::json!({"fileName": "a.pdf"}),
        );
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.kind, EventKind::FileCreated);
        assert_eq!(deserialized.payload["fileName"], "a.pdf");
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(EventKind::FinalAnswer.to_string(), "final_answer");
        assert_eq!(EventKind::RunEnded.to_string(), "run_ended");
    }
}
