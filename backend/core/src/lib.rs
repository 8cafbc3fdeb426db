//! Core types and collaborator contracts shared by the AgentForge agent loop
//! and tool-chain scheduler.

pub mod chain;
pub mod error;
pub mod event;
pub mod tools;
pub mod traits;
pub mod types;

pub use chain::{ChainStatus, StepStatus, ToolChain, ToolChainStep};
pub use error::ForgeError;
pub use event::{AgentEvent, EventKind};
pub use tools::ToolRegistry;
pub use traits::{
    CompletionRequest, CompletionResponse, EventSink, HistoryStore, ModelBackend, ProposedCall,
    RunStore, Tool,
};
pub use types::{
    Artifact, FileDescriptor, HistoryTurn, LogLevel, Run, RunStatus, StepRecord, ToolCall,
    TurnRole,
};

/// Re-exported so tool implementations and callers agree on one token type.
pub use tokio_util::sync::CancellationToken;
