use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lifecycle state of an agent run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    InProgress,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::InProgress)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(RunStatus::InProgress),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

/// One execution of the agent loop for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: Uuid,
    pub session_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            status: RunStatus::InProgress,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move the run to a terminal status. A run that already left
    /// `InProgress` keeps its first terminal status.
    pub fn finish(&mut self, status: RunStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
    }

    /// Stamp the end time; only the first call has an effect.
    pub fn stamp_end(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }
}

/// Severity of a step record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Append-only log entry for one loop iteration or chain step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    /// Run id or chain id that owns this record.
    pub owner_id: String,
    pub step: usize,
    pub message: String,
    pub level: LogLevel,
    pub payload: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(
        owner_id: impl Into<String>,
        step: usize,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            step,
            message: message.into(),
            level,
            payload: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// A single tool directive extracted from a model response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }

    /// `name:args` with object keys sorted at every depth, so two logically
    /// identical calls always produce the same signature.
    pub fn signature(&self) -> String {
        format!(
            "{}:{}",
            self.name,
            canonical_json(&Value::Object(self.arguments.clone()))
        )
    }
}

/// Serialize a JSON value with object keys sorted recursively.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        Value::String(k.clone()),
                        canonical_json(&map[k.as_str()])
                    )
                })
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", body)
        }
        Value::Array(items) => {
            let body = items
                .iter()
                .map(canonical_json)
                .collect::<Vec<_>>()
                .join(",");
            format!("[{}]", body)
        }
        other => other.to_string(),
    }
}

/// A file descriptor found inside a tool result, before it is attached to a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_name: String,
    pub file_path: String,
    pub download_url: Option<String>,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// A file-like output produced by a tool during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: Uuid,
    pub run_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub download_url: Option<String>,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn from_descriptor(run_id: Uuid, descriptor: FileDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            file_name: descriptor.file_name,
            file_path: descriptor.file_path,
            download_url: descriptor.download_url,
            mime_type: descriptor.mime_type,
            size_bytes: descriptor.size_bytes,
            created_at: Utc::now(),
        }
    }
}

/// Who produced a history turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    Tool,
    System,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::Tool => "tool",
            TurnRole::System => "system",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TurnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            "tool" => Ok(TurnRole::Tool),
            "system" => Ok(TurnRole::System),
            other => Err(format!("unknown turn role '{}'", other)),
        }
    }
}

/// One entry of a session's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Value) -> ToolCall {
        match args {
            Value::Object(map) => ToolCall::new(name, map),
            _ => panic!("test args must be an object"),
        }
    }

    #[test]
    fn test_signature_ignores_key_order() {
        let a = call("web_search", json!({"query": "rust", "opts": {"b": 1, "a": [1, {"y": 2, "x": 1}]}}));
        let b = call("web_search", json!({"opts": {"a": [1, {"x": 1, "y": 2}], "b": 1}, "query": "rust"}));
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_distinguishes_values_and_names() {
        let a = call("web_search", json!({"query": "rust"}));
        let b = call("web_search", json!({"query": "go"}));
        let c = call("browse", json!({"query": "rust"}));
        assert_ne!(a.signature(), b.signature());
        assert_ne!(a.signature(), c.signature());
        assert_eq!(a.signature(), r#"web_search:{"query":"rust"}"#);
    }

    #[test]
    fn test_run_finish_is_sticky() {
        let mut run = Run::new("session-1");
        assert_eq!(run.status, RunStatus::InProgress);
        run.finish(RunStatus::Completed);
        run.finish(RunStatus::Failed);
        assert_eq!(run.status, RunStatus::Completed);

        run.stamp_end();
        let first = run.ended_at;
        run.stamp_end();
        assert_eq!(run.ended_at, first);
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [RunStatus::InProgress, RunStatus::Completed, RunStatus::Failed] {
            assert_eq!(status.to_string().parse::<RunStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_artifact_from_descriptor() {
        let run_id = Uuid::new_v4();
        let artifact = Artifact::from_descriptor(
            run_id,
            FileDescriptor {
                file_name: "report.pdf".into(),
                file_path: "/tmp/report.pdf".into(),
                download_url: None,
                mime_type: "application/pdf".into(),
                size_bytes: 42,
            },
        );
        assert_eq!(artifact.run_id, run_id);
        assert_eq!(artifact.file_name, "report.pdf");
        assert_eq!(artifact.size_bytes, 42);
    }
}
