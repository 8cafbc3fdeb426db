pub mod artifacts;
pub mod file;
pub mod loop_detection;
pub mod parser;

pub use artifacts::{extract_files, extract_files_from_str, infer_mime_type, FileDescriptors};
pub use file::{FileReadTool, FileWriteTool};
pub use loop_detection::{LoopDetector, Stall};
pub use parser::parse_tool_call;

use std::sync::Arc;

use agentforge_core::ToolRegistry;

/// Registry pre-populated with the built-in file tools.
pub fn builtin_registry() -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(FileReadTool))
        .with(Arc::new(FileWriteTool))
}
