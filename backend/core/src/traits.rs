use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::event::AgentEvent;
use crate::types::{Artifact, HistoryTurn, Run, StepRecord, TurnRole};

/// A capability that the agent loop or a tool chain can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of the tool (e.g., "web_search").
    fn name(&self) -> &str;

    /// Description for prompts and listings.
    fn description(&self) -> &str {
        ""
    }

    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> Value {
        serde_json::json!({ "type": "object" })
    }

    /// Execute the tool. The token is advisory: tools are not preempted,
    /// long-running ones may poll it.
    async fn invoke(&self, args: Value, cancel: CancellationToken) -> Result<Value>;
}

/// A tool call proposed in a structured field of a model response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedCall {
    pub name: String,
    /// Usually an object; some backends send the arguments as a JSON string.
    pub arguments: Value,
}

/// Input to a model completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub history: Vec<HistoryTurn>,
}

/// Output of a model completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    #[serde(default)]
    pub proposed_calls: Vec<ProposedCall>,
}

impl CompletionResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            proposed_calls: Vec::new(),
        }
    }
}

/// The language-model backend driving the agent loop.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<CompletionResponse>;
}

/// Conversation history for a session. Implementations serialize their own writes.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Ordered turns for the session, oldest first.
    async fn load(&self, session_id: &str) -> Result<Vec<HistoryTurn>>;

    async fn append(&self, session_id: &str, role: TurnRole, content: &str) -> Result<()>;

    async fn append_user(&self, session_id: &str, content: &str) -> Result<()> {
        self.append(session_id, TurnRole::User, content).await
    }

    async fn append_assistant(&self, session_id: &str, content: &str) -> Result<()> {
        self.append(session_id, TurnRole::Assistant, content).await
    }

    async fn append_tool_result(&self, session_id: &str, content: &str) -> Result<()> {
        self.append(session_id, TurnRole::Tool, content).await
    }

    async fn append_system(&self, session_id: &str, content: &str) -> Result<()> {
        self.append(session_id, TurnRole::System, content).await
    }
}

/// Fire-and-forget delivery of loop events to external subscribers.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Persistence for runs, their step log, and the artifacts they produce.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &Run) -> Result<()>;

    async fn update_run(&self, run: &Run) -> Result<()>;

    async fn append_step(&self, record: &StepRecord) -> Result<()>;

    async fn create_artifact(&self, artifact: &Artifact) -> Result<()>;
}
