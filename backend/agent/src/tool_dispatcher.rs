//! Dispatcher for agent tool calls.
//!
//! Routes the model's requested tool invocation to the registry. Nothing a
//! tool does here can abort the outer loop: unknown names and tool errors
//! are logged and reported as an outcome.

use std::sync::Arc;

use agentforge_core::{CancellationToken, ToolCall, ToolRegistry};
use serde_json::Value;
use tracing::{error, info, warn};

/// What happened when a call was dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Completed(Value),
    UnknownTool,
    Failed(String),
}

impl DispatchOutcome {
    /// The usable result; unknown tools and failures count as empty.
    pub fn into_result(self) -> Option<Value> {
        match self {
            DispatchOutcome::Completed(value) => Some(value),
            DispatchOutcome::UnknownTool | DispatchOutcome::Failed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Completed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Completed(_) => "completed",
            DispatchOutcome::UnknownTool => "unknown_tool",
            DispatchOutcome::Failed(_) => "failed",
        }
    }
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatch a single tool call to the corresponding handler.
    pub async fn execute(&self, call: &ToolCall, cancel: CancellationToken) -> DispatchOutcome {
        info!(tool = %call.name, "Executing tool");

        let Some(tool) = self.registry.get(&call.name) else {
            error!(tool = %call.name, "Tool not found in registry");
            return DispatchOutcome::UnknownTool;
        };

        match tool.invoke(call.arguments_value(), cancel).await {
            Ok(value) => {
                info!(tool = %call.name, "Tool completed");
                DispatchOutcome::Completed(value)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool failed");
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}
