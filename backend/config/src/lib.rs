//! `agentforge-config` — AgentForge runtime configuration management.
//!
//! Provides:
//! - Typed config schema (agent loop, storage, logging, scheduler)
//! - YAML loading from the config directory
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Schema validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config};
pub use schema::AgentForgeConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::collections::HashMap;
use std::path::Path;

use agentforge_core::ForgeError;
use anyhow::{Context, Result};
use serde_json::Value;

/// Load, apply env substitution, apply defaults and validate a config file.
///
/// This is the main entry point for loading a config at runtime. Warnings
/// are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<AgentForgeConfig> {
    let raw = load_config(path).await?;
    prepare(raw, &std::env::vars().collect())
}

/// The processing half of [`load_and_prepare`], over an already-read tree.
pub fn prepare(raw: Value, env: &HashMap<String, String>) -> Result<AgentForgeConfig> {
    let value = resolve_env_vars_with(&raw, env).context("Failed to resolve env vars in config")?;

    let config: AgentForgeConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        let summary = report
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ForgeError::Config(summary).into());
    }

    Ok(config)
}
