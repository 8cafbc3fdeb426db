//! Tunables for the agent loop.

use std::collections::HashSet;

pub use agentforge_tools::loop_detection::DEFAULT_WINDOW as DEFAULT_SIGNATURE_WINDOW;

/// Default iteration ceiling for one run.
pub const DEFAULT_MAX_STEPS: usize = 20;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. \
Use a tool when you need information or need to produce a file; otherwise answer directly.";

/// Side-effecting tools whose successful result must not be repeated.
pub const DEFAULT_CREATION_TOOLS: &[&str] = &[
    "create_document",
    "create_pdf",
    "create_excel",
    "create_presentation",
    "create_calendar_event",
    "generate_file",
    "file_write",
];

/// Substrings (matched case-insensitively on compact JSON) that mark a result as successful.
pub const DEFAULT_SUCCESS_MARKERS: &[&str] = &[
    "\"success\":true",
    "\"status\":\"success\"",
    "successfully",
    "created",
];

/// Behaviour of one [`AgentRunner`](crate::AgentRunner).
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_steps: usize,
    pub signature_window: usize,
    pub system_prompt: String,
    pub creation_tools: HashSet<String>,
    pub success_markers: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            signature_window: DEFAULT_SIGNATURE_WINDOW,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            creation_tools: DEFAULT_CREATION_TOOLS.iter().map(|s| s.to_string()).collect(),
            success_markers: DEFAULT_SUCCESS_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AgentSettings {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_creation_tool(mut self, name: impl Into<String>) -> Self {
        self.creation_tools.insert(name.into());
        self
    }
}
