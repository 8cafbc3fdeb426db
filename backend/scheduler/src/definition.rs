//! Chain definition files and static checks.
//!
//! A definition is a `ToolChain` document in JSON or YAML; runtime fields
//! (status, results, timestamps) are optional and default to a fresh chain.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use agentforge_core::{ToolChain, ToolRegistry};

use crate::variables::referenced_variables;

/// Serialization of a chain definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFormat {
    Json,
    Yaml,
}

impl ChainFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(ChainFormat::Json),
            Some("yaml") | Some("yml") => Ok(ChainFormat::Yaml),
            _ => bail!(
                "Unsupported chain definition extension: {} (expected .json, .yaml or .yml)",
                path.display()
            ),
        }
    }
}

/// Parse a chain definition from text.
pub fn parse_chain(raw: &str, format: ChainFormat) -> Result<ToolChain> {
    let chain = match format {
        ChainFormat::Json => {
            serde_json::from_str(raw).context("Failed to parse chain definition JSON")?
        }
        ChainFormat::Yaml => {
            serde_yaml::from_str(raw).context("Failed to parse chain definition YAML")?
        }
    };
    Ok(chain)
}

/// Load a chain definition from disk, choosing the parser by extension.
pub async fn load_chain(path: &Path) -> Result<ToolChain> {
    let format = ChainFormat::from_path(path)?;
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read chain definition: {}", path.display()))?;
    let chain = parse_chain(&raw, format)
        .with_context(|| format!("Invalid chain definition at: {}", path.display()))?;
    info!(path = %path.display(), chain = %chain.name, steps = chain.steps.len(), "Loaded chain definition");
    Ok(chain)
}

/// One finding of [`validate_chain`].
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{path}: {message}")]
pub struct ChainIssue {
    pub path: String,
    pub message: String,
}

/// Errors make a chain unrunnable; warnings describe steps that will be
/// skipped or fail at run time.
#[derive(Debug, Default)]
pub struct ChainReport {
    pub errors: Vec<ChainIssue>,
    pub warnings: Vec<ChainIssue>,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ChainIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ChainIssue {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Check a chain before running it. When `registry` is given, tool names are
/// checked against it as well.
pub fn validate_chain(chain: &ToolChain, registry: Option<&ToolRegistry>) -> ChainReport {
    let mut report = ChainReport::default();

    if chain.name.trim().is_empty() {
        report.warn("name", "Chain has no name");
    }

    let mut seen = HashSet::new();
    for step in &chain.steps {
        if step.id.trim().is_empty() {
            report.error("steps", "Step id cannot be empty");
        } else if !seen.insert(step.id.as_str()) {
            report.error(format!("steps.{}", step.id), "Duplicate step id");
        }
    }

    let ids: HashSet<&str> = chain.steps.iter().map(|s| s.id.as_str()).collect();
    for step in &chain.steps {
        let path = format!("steps.{}", step.id);
        if !step.is_fresh() {
            report.error(
                &path,
                format!(
                    "Step is preset to {} or carries results; definitions must leave runtime fields unset",
                    step.status
                ),
            );
        }
        if step.depends_on.contains(&step.id) {
            report.warn(&path, "Step depends on itself and will be skipped");
        }
        for dep in &step.depends_on {
            if dep != &step.id && !ids.contains(dep.as_str()) {
                report.warn(
                    format!("{path}.dependsOn"),
                    format!("Unknown step '{dep}'; step will be skipped"),
                );
            }
        }
        if let Some(registry) = registry {
            if !registry.contains(&step.tool_name) {
                report.warn(
                    format!("{path}.toolName"),
                    format!("Tool '{}' is not registered; step will fail", step.tool_name),
                );
            }
        }
    }

    for id in blocked_by_cycle(chain) {
        report.warn(
            format!("steps.{id}"),
            "Step is part of or downstream of a dependency cycle and will be skipped",
        );
    }

    let published: BTreeSet<&str> = chain
        .steps
        .iter()
        .filter_map(|s| s.output_variable.as_deref())
        .chain(chain.variables.keys().map(String::as_str))
        .collect();
    for step in &chain.steps {
        for name in referenced_variables(&step.arguments) {
            if !published.contains(name.as_str()) {
                report.warn(
                    format!("steps.{}.arguments", step.id),
                    format!("Variable '${name}' is never published; it will be passed literally"),
                );
            }
        }
    }

    debug!(
        chain = %chain.name,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "Validated chain"
    );
    report
}

/// Steps that can never become ready because of a cycle, in declaration order.
/// Dependencies on unknown ids are ignored here; they are reported separately.
fn blocked_by_cycle(chain: &ToolChain) -> Vec<&str> {
    let ids: HashSet<&str> = chain.steps.iter().map(|s| s.id.as_str()).collect();
    let mut remaining: HashMap<&str, usize> = chain
        .steps
        .iter()
        .map(|s| {
            let known = s.depends_on.iter().filter(|d| ids.contains(d.as_str())).count();
            (s.id.as_str(), known)
        })
        .collect();

    let mut queue: Vec<&str> = remaining
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut resolved: HashSet<&str> = HashSet::new();

    while let Some(id) = queue.pop() {
        if !resolved.insert(id) {
            continue;
        }
        for step in &chain.steps {
            if step.depends_on.contains(id) {
                if let Some(n) = remaining.get_mut(step.id.as_str()) {
                    *n = n.saturating_sub(1);
                    if *n == 0 {
                        queue.push(step.id.as_str());
                    }
                }
            }
        }
    }

    let mut reported = HashSet::new();
    chain
        .steps
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| !resolved.contains(id) && reported.insert(*id))
        .collect()
}
