//! Declarative tool chains: a graph of tool steps executed without per-step
//! model involvement.
//!
//! The same types are used for chain definitions loaded from JSON/YAML and
//! for the live state the scheduler mutates, so every runtime field has a
//! serde default.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status of a whole chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    #[default]
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ChainStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChainStatus::Completed | ChainStatus::Failed | ChainStatus::Cancelled
        )
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChainStatus::Created => "created",
            ChainStatus::Running => "running",
            ChainStatus::Completed => "completed",
            ChainStatus::Failed => "failed",
            ChainStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Status of a single step. Transitions only move forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    fn rank(self) -> u8 {
        match self {
            StepStatus::Pending => 0,
            StepStatus::Ready => 1,
            StepStatus::Running => 2,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    /// Pending, Ready and Running steps keep a chain open.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(self, next: StepStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Ready => "ready",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One tool invocation inside a chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolChainStep {
    pub id: String,
    pub tool_name: String,
    #[serde(default = "empty_object")]
    pub arguments: Value,
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_variable: Option<String>,
    #[serde(default)]
    pub status: StepStatus,
    /// Arguments after `$var` substitution, as actually passed to the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl ToolChainStep {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
            depends_on: BTreeSet::new(),
            output_variable: None,
            status: StepStatus::Pending,
            resolved_arguments: None,
            result: None,
            error: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, variable: impl Into<String>) -> Self {
        self.output_variable = Some(variable.into());
        self
    }

    /// Whether the step is still as declared: Pending with no runtime state.
    pub fn is_fresh(&self) -> bool {
        self.status == StepStatus::Pending
            && self.resolved_arguments.is_none()
            && self.result.is_none()
            && self.error.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
    }

    /// Apply a forward transition. Returns `false` (and leaves the step
    /// untouched) when `next` would move the step backwards or out of a
    /// terminal state.
    pub fn transition(&mut self, next: StepStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        match next {
            StepStatus::Running => self.start_time = Some(Utc::now()),
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped => {
                self.end_time = Some(Utc::now())
            }
            StepStatus::Pending | StepStatus::Ready => {}
        }
        self.status = next;
        true
    }
}

/// A declared graph of tool steps plus the variables they publish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolChain {
    #[serde(default = "new_chain_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: ChainStatus,
    #[serde(default)]
    pub steps: Vec<ToolChainStep>,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub execution_log: Vec<String>,
}

fn new_chain_id() -> String {
    Uuid::new_v4().to_string()
}

impl ToolChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_chain_id(),
            name: name.into(),
            status: ChainStatus::Created,
            steps: Vec::new(),
            variables: BTreeMap::new(),
            execution_log: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: ToolChainStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn step(&self, id: &str) -> Option<&ToolChainStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut ToolChainStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn has_open_steps(&self) -> bool {
        self.steps.iter().any(|s| s.status.is_open())
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// Append a timestamped line to the execution log.
    pub fn log(&mut self, line: impl AsRef<str>) {
        self.execution_log
            .push(format!("[{}] {}", Utc::now().to_rfc3339(), line.as_ref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_step_has_no_runtime_state() {
        let mut step = ToolChainStep::new("s1", "echo", json!({}));
        assert!(step.is_fresh());
        step.result = Some(json!("cached"));
        assert!(!step.is_fresh());

        let mut ready = ToolChainStep::new("s2", "echo", json!({}));
        ready.transition(StepStatus::Ready);
        assert!(!ready.is_fresh());
    }

    #[test]
    fn test_step_transitions_are_monotonic() {
        let mut step = ToolChainStep::new("s1", "echo", json!({}));
        assert!(step.transition(StepStatus::Ready));
        assert!(!step.transition(StepStatus::Pending));
        assert!(step.transition(StepStatus::Running));
        assert!(step.start_time.is_some());
        assert!(step.transition(StepStatus::Completed));
        assert!(step.end_time.is_some());
        assert!(!step.transition(StepStatus::Failed));
        assert_eq!(step.status, StepStatus::Completed);
    }

    #[test]
    fn test_pending_can_be_skipped() {
        let mut step = ToolChainStep::new("s1", "echo", json!({}));
        assert!(step.transition(StepStatus::Skipped));
        assert!(!step.transition(StepStatus::Ready));
    }

    #[test]
    fn test_chain_definition_defaults() {
        let chain: ToolChain = serde_json::from_value(json!({
            "name": "research",
            "steps": [
                {"id": "s1", "toolName": "web_search", "arguments": {"q": "rust"}, "outputVariable": "r1"},
                {"id": "s2", "toolName": "summarize", "dependsOn": ["s1"], "arguments": {"text": "$r1"}}
            ]
        }))
        .unwrap();

        assert!(!chain.id.is_empty());
        assert_eq!(chain.status, ChainStatus::Created);
        assert_eq!(chain.steps.len(), 2);
        assert!(chain.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(chain.steps[0].output_variable.as_deref(), Some("r1"));
        assert!(chain.steps[1].depends_on.contains("s1"));
        assert!(chain.has_open_steps());
    }

    #[test]
    fn test_builder_and_lookup() {
        let chain = ToolChain::new("demo")
            .with_step(ToolChainStep::new("a", "echo", json!({})).output("x"))
            .with_step(ToolChainStep::new("b", "echo", json!({})).depends_on(["a"]))
            .with_variable("seed", json!(1));

        assert_eq!(chain.step("b").unwrap().depends_on.len(), 1);
        assert!(chain.step("zzz").is_none());
        assert_eq!(chain.count(StepStatus::Pending), 2);
        assert_eq!(chain.variables["seed"], json!(1));
    }
}
