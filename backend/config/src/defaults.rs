//! Config defaults: applies sensible default values to parsed config.

use agentforge_agent::settings::{
    DEFAULT_CREATION_TOOLS, DEFAULT_MAX_STEPS, DEFAULT_SIGNATURE_WINDOW, DEFAULT_SUCCESS_MARKERS,
    DEFAULT_SYSTEM_PROMPT,
};

use crate::schema::{AgentConfig, AgentForgeConfig, LoggingConfig, StorageConfig};

/// Default SQLite database file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "agentforge.db";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: AgentForgeConfig) -> AgentForgeConfig {
    let config = apply_agent_defaults(config);
    let config = apply_storage_defaults(config);
    apply_logging_defaults(config)
}

/// Fill in loop limits, prompt and the creation-tool guard lists.
fn apply_agent_defaults(mut config: AgentForgeConfig) -> AgentForgeConfig {
    let agent = config.agent.get_or_insert_with(AgentConfig::default);
    if agent.max_steps.is_none() {
        agent.max_steps = Some(DEFAULT_MAX_STEPS);
    }
    if agent.signature_window.is_none() {
        agent.signature_window = Some(DEFAULT_SIGNATURE_WINDOW);
    }
    if agent.system_prompt.is_none() {
        agent.system_prompt = Some(DEFAULT_SYSTEM_PROMPT.to_string());
    }
    if agent.creation_tools.is_none() {
        agent.creation_tools = Some(DEFAULT_CREATION_TOOLS.iter().map(|s| s.to_string()).collect());
    }
    if agent.success_markers.is_none() {
        agent.success_markers = Some(DEFAULT_SUCCESS_MARKERS.iter().map(|s| s.to_string()).collect());
    }
    config
}

fn apply_storage_defaults(mut config: AgentForgeConfig) -> AgentForgeConfig {
    let storage = config.storage.get_or_insert_with(StorageConfig::default);
    if storage.db_path.is_none() {
        storage.db_path = Some(DEFAULT_DB_PATH.to_string());
    }
    config
}

fn apply_logging_defaults(mut config: AgentForgeConfig) -> AgentForgeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    if logging.dir.is_none() {
        logging.dir = Some(DEFAULT_LOG_DIR.to_string());
    }
    config
}
