//! CLI Chain Subcommands
//!
//! Validate and execute tool chain definition files against the built-in tools.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::{info, warn};

use agentforge_config::AgentForgeConfig;
use agentforge_core::{
    CancellationToken, ChainStatus, LogLevel, RunStore, StepRecord, StepStatus, ToolChain,
};
use agentforge_scheduler::{load_chain, validate_chain, ChainReport, ToolChainScheduler};
use agentforge_supervisor::SqliteStore;
use agentforge_tools::builtin_registry;

use crate::terminal_output::{note_error, note_success, note_warn};

#[derive(Subcommand)]
pub enum ChainCommands {
    /// Execute a chain definition (.json, .yaml or .yml)
    Run {
        file: PathBuf,
        /// SQLite database for the chain's step log (defaults to storage.dbPath)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Check a chain definition without running it
    Validate { file: PathBuf },
}

pub async fn run(cmd: ChainCommands, config: &AgentForgeConfig) -> Result<ExitCode> {
    match cmd {
        ChainCommands::Run { file, db } => {
            let db = db.unwrap_or_else(|| PathBuf::from(config.db_path()));
            run_chain(&file, &db, config).await
        }
        ChainCommands::Validate { file } => validate_file(&file).await,
    }
}

async fn validate_file(file: &Path) -> Result<ExitCode> {
    let chain = load_chain(file).await?;
    let registry = builtin_registry();
    let report = validate_chain(&chain, Some(&registry));
    print_report(&report);
    if report.is_valid() {
        note_success(&format!(
            "Chain '{}' is valid ({} steps)",
            chain.name,
            chain.steps.len()
        ));
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn run_chain(file: &Path, db: &Path, config: &AgentForgeConfig) -> Result<ExitCode> {
    let chain = load_chain(file).await?;
    let registry = Arc::new(builtin_registry());

    let report = validate_chain(&chain, Some(&registry));
    print_report(&report);
    if !report.is_valid() {
        note_error("Chain definition has errors; not running it");
        return Ok(ExitCode::FAILURE);
    }

    let store = SqliteStore::open(db)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling chain after the current wave");
            on_signal.cancel();
        }
    });

    let scheduler = ToolChainScheduler::new(registry).with_max_parallel(config.max_parallel());
    let finished = scheduler.execute(chain, cancel).await?;

    persist_steps(&store, &finished).await;
    info!(chain_id = %finished.id, status = %finished.status, db = %db.display(), "Chain step log stored");

    println!(
        "{}",
        serde_json::to_string_pretty(&finished).context("Failed to serialize finished chain")?
    );

    match finished.status {
        ChainStatus::Completed => {
            note_success(&format!("Chain '{}' completed", finished.name));
            Ok(ExitCode::SUCCESS)
        }
        ChainStatus::Failed => {
            note_error(&format!("Chain '{}' failed", finished.name));
            Ok(ExitCode::FAILURE)
        }
        other => {
            note_warn(&format!("Chain '{}' ended {other}", finished.name));
            Ok(ExitCode::from(2))
        }
    }
}

/// One step record per chain step, owned by the chain id.
async fn persist_steps(store: &SqliteStore, chain: &ToolChain) {
    for (index, step) in chain.steps.iter().enumerate() {
        let level = match step.status {
            StepStatus::Completed => LogLevel::Info,
            StepStatus::Failed => LogLevel::Error,
            _ => LogLevel::Warn,
        };
        let mut message = format!("{} ({}) {}", step.id, step.tool_name, step.status);
        if let Some(error) = &step.error {
            message.push_str(&format!(": {error}"));
        }
        let record = StepRecord::new(chain.id.clone(), index + 1, level, message).with_payload(
            serde_json::json!({
                "arguments": step.resolved_arguments,
                "result": step.result,
            }),
        );
        if let Err(e) = store.append_step(&record).await {
            warn!(chain_id = %chain.id, step = %step.id, error = %e, "Failed to store step record");
        }
    }
}

fn print_report(report: &ChainReport) {
    for warning in &report.warnings {
        note_warn(&warning.to_string());
    }
    for error in &report.errors {
        note_error(&error.to_string());
    }
}
