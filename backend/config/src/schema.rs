//! AgentForge runtime configuration schema.
//!
//! Every field is optional in the file; `defaults::apply_all_defaults` fills
//! the gaps and the accessors below read the effective values.

use serde::{Deserialize, Serialize};

use agentforge_agent::AgentSettings;

use crate::defaults::{DEFAULT_DB_PATH, DEFAULT_LOG_DIR, DEFAULT_LOG_LEVEL};

/// Root configuration (`config.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentForgeConfig {
    /// Agent loop tunables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,

    /// Run / history persistence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Tool chain scheduler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
    /// Number of recent call signatures kept for stall detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_window: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Side-effecting tools that get a completion note after success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_markers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Upper bound on steps in flight per wave; absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
}

impl AgentForgeConfig {
    /// Agent loop settings, with built-in defaults for anything unset.
    pub fn agent_settings(&self) -> AgentSettings {
        let mut settings = AgentSettings::default();
        let Some(agent) = &self.agent else {
            return settings;
        };
        if let Some(max_steps) = agent.max_steps {
            settings.max_steps = max_steps;
        }
        if let Some(window) = agent.signature_window {
            settings.signature_window = window;
        }
        if let Some(prompt) = &agent.system_prompt {
            settings.system_prompt = prompt.clone();
        }
        if let Some(tools) = &agent.creation_tools {
            settings.creation_tools = tools.iter().cloned().collect();
        }
        if let Some(markers) = &agent.success_markers {
            settings.success_markers = markers.clone();
        }
        settings
    }

    pub fn db_path(&self) -> &str {
        self.storage
            .as_ref()
            .and_then(|s| s.db_path.as_deref())
            .unwrap_or(DEFAULT_DB_PATH)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.dir.as_deref())
            .unwrap_or(DEFAULT_LOG_DIR)
    }

    pub fn max_parallel(&self) -> Option<usize> {
        self.scheduler.as_ref().and_then(|s| s.max_parallel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let cfg: AgentForgeConfig = serde_yaml::from_str(
            r#"
agent:
  maxSteps: 8
  signatureWindow: 12
  creationTools: [make_slides]
storage:
  dbPath: /var/lib/agentforge/runs.db
scheduler:
  maxParallel: 4
"#,
        )
        .unwrap();

        let settings = cfg.agent_settings();
        assert_eq!(settings.max_steps, 8);
        assert_eq!(settings.signature_window, 12);
        assert!(settings.creation_tools.contains("make_slides"));
        assert!(!settings.creation_tools.contains("create_pdf"));
        assert_eq!(cfg.db_path(), "/var/lib/agentforge/runs.db");
        assert_eq!(cfg.max_parallel(), Some(4));
        assert_eq!(cfg.log_level(), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn empty_config_uses_builtin_settings() {
        let settings = AgentForgeConfig::default().agent_settings();
        assert_eq!(settings.max_steps, 20);
        assert_eq!(settings.signature_window, 15);
        assert!(settings.creation_tools.contains("create_pdf"));
    }
}
