//! Config validation: schema checks with user-friendly error messages.

use thiserror::Error;

use crate::schema::AgentForgeConfig;

/// Smallest window that can hold the A,B,A,B,A,B alternation pattern.
pub const MIN_SIGNATURE_WINDOW: usize = 6;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &AgentForgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_agent(config, &mut report);
    validate_storage(config, &mut report);
    validate_logging(config, &mut report);
    validate_scheduler(config, &mut report);
    report
}

fn validate_agent(config: &AgentForgeConfig, report: &mut ValidationReport) {
    let Some(agent) = &config.agent else { return };
    if agent.max_steps == Some(0) {
        report.error("agent.maxSteps", "maxSteps must be >= 1");
    }
    if let Some(window) = agent.signature_window {
        if window < MIN_SIGNATURE_WINDOW {
            report.error(
                "agent.signatureWindow",
                format!("signatureWindow must be >= {MIN_SIGNATURE_WINDOW} to detect alternation"),
            );
        }
    }
    if let Some(markers) = &agent.success_markers {
        if markers.iter().any(|m| m.trim().is_empty()) {
            report.error("agent.successMarkers", "Success markers cannot be empty strings");
        }
        if markers.is_empty() {
            report.warn(
                "agent.successMarkers",
                "No success markers; creation tools will never get a completion note",
            );
        }
    }
}

fn validate_storage(config: &AgentForgeConfig, report: &mut ValidationReport) {
    let Some(storage) = &config.storage else { return };
    if let Some(path) = &storage.db_path {
        if path.trim().is_empty() {
            report.error("storage.dbPath", "dbPath cannot be empty");
        }
    }
}

fn validate_logging(config: &AgentForgeConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            report.warn(
                "logging.level",
                format!("Unknown log level '{level}'. Use one of: {}", LOG_LEVELS.join(", ")),
            );
        }
    }
}

fn validate_scheduler(config: &AgentForgeConfig, report: &mut ValidationReport) {
    let Some(scheduler) = &config.scheduler else { return };
    if scheduler.max_parallel == Some(0) {
        report.warn("scheduler.maxParallel", "maxParallel 0 is treated as unbounded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AgentConfig, LoggingConfig, StorageConfig};

    #[test]
    fn empty_config_is_valid() {
        let report = validate(&AgentForgeConfig::default());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn zero_steps_and_small_window_are_errors() {
        let cfg = AgentForgeConfig {
            agent: Some(AgentConfig {
                max_steps: Some(0),
                signature_window: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["agent.maxSteps", "agent.signatureWindow"]);
    }

    #[test]
    fn empty_db_path_is_error() {
        let cfg = AgentForgeConfig {
            storage: Some(StorageConfig {
                db_path: Some("  ".into()),
            }),
            ..Default::default()
        };
        assert!(!validate(&cfg).is_valid());
    }

    #[test]
    fn unknown_log_level_is_warning() {
        let cfg = AgentForgeConfig {
            logging: Some(LoggingConfig {
                level: Some("verbose".into()),
                dir: None,
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "logging.level");
    }
}
