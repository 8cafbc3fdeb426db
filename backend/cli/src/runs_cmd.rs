//! CLI Runs Subcommands
//!
//! Read-only views over the SQLite run store.

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use uuid::Uuid;

use agentforge_supervisor::SqliteStore;

use crate::terminal_output::{note_warn, Table};

#[derive(Subcommand)]
pub enum RunCommands {
    /// List the most recent runs
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show a run (or chain) with its step log and artifacts
    Show { id: String },
}

pub fn run(cmd: RunCommands, db: &Path) -> Result<()> {
    let store = SqliteStore::open(db)?;
    match cmd {
        RunCommands::List { limit } => {
            let runs = store.recent_runs(limit)?;
            if runs.is_empty() {
                note_warn("No runs recorded yet");
                return Ok(());
            }
            let mut table = Table::new(["RUN", "SESSION", "STATUS", "STARTED", "ENDED"]);
            for run in runs {
                table.row(vec![
                    run.id.to_string(),
                    run.session_id,
                    run.status.to_string(),
                    run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    run.ended_at
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            print!("{}", table.render());
        }
        RunCommands::Show { id } => show(&store, &id)?,
    }
    Ok(())
}

fn show(store: &SqliteStore, id: &str) -> Result<()> {
    let run_id = Uuid::parse_str(id).ok();
    if let Some(run) = run_id.map(|u| store.get_run(&u)).transpose()?.flatten() {
        println!("Run      {}", run.id);
        println!("Session  {}", run.session_id);
        println!("Status   {}", run.status);
        println!("Started  {}", run.started_at.to_rfc3339());
        if let Some(ended) = run.ended_at {
            println!("Ended    {}", ended.to_rfc3339());
        }
        println!();
    }

    let records = store.step_records(id)?;
    if records.is_empty() {
        note_warn(&format!("No step records for {id}"));
    } else {
        let mut table = Table::new(["STEP", "LEVEL", "TIME", "MESSAGE"]);
        for record in records {
            table.row(vec![
                record.step.to_string(),
                record.level.to_string(),
                record.created_at.format("%H:%M:%S%.3f").to_string(),
                record.message,
            ]);
        }
        print!("{}", table.render());
    }

    if let Some(run_id) = run_id {
        let artifacts = store.artifacts(&run_id)?;
        if !artifacts.is_empty() {
            println!();
            let mut table = Table::new(["FILE", "MIME", "SIZE", "PATH"]);
            for artifact in artifacts {
                table.row(vec![
                    artifact.file_name,
                    artifact.mime_type,
                    artifact.size_bytes.to_string(),
                    artifact.download_url.unwrap_or(artifact.file_path),
                ]);
            }
            print!("{}", table.render());
        }
    }
    Ok(())
}
