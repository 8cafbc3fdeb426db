use thiserror::Error;

/// Top-level error type for the AgentForge runtime.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("model backend error: {0}")]
    Model(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid tool chain: {0}")]
    InvalidChain(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ForgeError::UnknownTool("ocr".into()).to_string(),
            "unknown tool: ocr"
        );
        assert_eq!(
            ForgeError::ToolFailed {
                tool: "web_search".into(),
                message: "timeout".into()
            }
            .to_string(),
            "tool 'web_search' failed: timeout"
        );
    }
}
