//! AgentForge Agent Runner
//!
//! The per-session control loop: ask the model, run the chosen tool, feed the
//! result back, and stop on a final answer, a detected stall, or the step cap.

pub mod agent_loop;
pub mod completion_guard;
pub mod events;
pub mod memory;
pub mod settings;
pub mod system_prompt;
pub mod tool_dispatcher;

pub use agent_loop::{AgentRunner, RunOutcome, RunReport};
pub use completion_guard::CompletionGuard;
pub use events::{BroadcastEventSink, FanoutEventSink, NullEventSink};
pub use memory::{MemoryHistoryStore, MemoryRunStore};
pub use settings::AgentSettings;
pub use system_prompt::PromptBuilder;
pub use tool_dispatcher::{DispatchOutcome, ToolDispatcher};
