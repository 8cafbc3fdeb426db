use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use agentforge_core::{
    Artifact, ForgeError, HistoryStore, HistoryTurn, LogLevel, Run, RunStatus, RunStore,
    StepRecord, TurnRole,
};

/// SQLite-backed store for runs, their step log, artifacts and session history.
///
/// Writes are serialized through a single connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!(path = %path.display(), "Run store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ForgeError::Storage("SQLite connection lock poisoned".into()).into())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_runs_session_id ON runs(session_id);
            CREATE TABLE IF NOT EXISTS step_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL,
                step INTEGER NOT NULL,
                level TEXT NOT NULL,
                message TEXT NOT NULL,
                payload TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_step_records_owner ON step_records(owner_id);
            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                download_url TEXT,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_artifacts_run_id ON artifacts(run_id);
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_session_id ON history(session_id);",
        )?;
        Ok(())
    }

    /// Fetch one run by id.
    pub fn get_run(&self, id: &Uuid) -> Result<Option<Run>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, session_id, status, started_at, ended_at FROM runs WHERE id = ?1",
                params![id.to_string()],
                run_columns,
            )
            .optional()?;
        Ok(row.and_then(into_run))
    }

    /// Most recently started runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<Run>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, status, started_at, ended_at
             FROM runs ORDER BY started_at DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map(params![limit as i64], run_columns)?
            .filter_map(|r| r.ok())
            .filter_map(into_run)
            .collect();
        Ok(runs)
    }

    /// Step log of a run or chain, in insertion order.
    pub fn step_records(&self, owner_id: &str) -> Result<Vec<StepRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT owner_id, step, level, message, payload, created_at
             FROM step_records WHERE owner_id = ?1 ORDER BY id ASC",
        )?;
        let records = stmt
            .query_map(params![owner_id], |row| {
                let owner_id: String = row.get(0)?;
                let step: i64 = row.get(1)?;
                let level: String = row.get(2)?;
                let message: String = row.get(3)?;
                let payload: Option<String> = row.get(4)?;
                let created_at: String = row.get(5)?;
                Ok((owner_id, step, level, message, payload, created_at))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(owner_id, step, level, message, payload, created_at)| {
                Some(StepRecord {
                    owner_id,
                    step: usize::try_from(step).ok()?,
                    level: level.parse::<LogLevel>().ok()?,
                    message,
                    payload: match payload {
                        Some(raw) => Some(serde_json::from_str(&raw).ok()?),
                        None => None,
                    },
                    created_at: parse_time(&created_at)?,
                })
            })
            .collect();
        Ok(records)
    }

    /// Artifacts captured by a run, in insertion order.
    pub fn artifacts(&self, run_id: &Uuid) -> Result<Vec<Artifact>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, run_id, file_name, file_path, download_url, mime_type, size_bytes, created_at
             FROM artifacts WHERE run_id = ?1 ORDER BY rowid ASC",
        )?;
        let artifacts = stmt
            .query_map(params![run_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .filter_map(
                |(id, run_id, file_name, file_path, download_url, mime_type, size, created_at)| {
                    Some(Artifact {
                        id: Uuid::parse_str(&id).ok()?,
                        run_id: Uuid::parse_str(&run_id).ok()?,
                        file_name,
                        file_path,
                        download_url,
                        mime_type,
                        size_bytes: u64::try_from(size).ok()?,
                        created_at: parse_time(&created_at)?,
                    })
                },
            )
            .collect();
        Ok(artifacts)
    }
}

type RunColumns = (String, String, String, String, Option<String>);

fn run_columns(row: &Row<'_>) -> rusqlite::Result<RunColumns> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_run((id, session_id, status, started_at, ended_at): RunColumns) -> Option<Run> {
    Some(Run {
        id: Uuid::parse_str(&id).ok()?,
        session_id,
        status: status.parse::<RunStatus>().ok()?,
        started_at: parse_time(&started_at)?,
        ended_at: match ended_at {
            Some(raw) => Some(parse_time(&raw)?),
            None => None,
        },
    })
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn create_run(&self, run: &Run) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO runs (id, session_id, status, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run.id.to_string(),
                run.session_id,
                run.status.to_string(),
                run.started_at.to_rfc3339(),
                run.ended_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        debug!(run_id = %run.id, "Run inserted");
        Ok(())
    }

    async fn update_run(&self, run: &Run) -> Result<()> {
        let changed = self.conn()?.execute(
            "UPDATE runs SET status = ?2, ended_at = ?3 WHERE id = ?1",
            params![
                run.id.to_string(),
                run.status.to_string(),
                run.ended_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        if changed == 0 {
            return Err(ForgeError::Storage(format!("run {} does not exist", run.id)).into());
        }
        Ok(())
    }

    async fn append_step(&self, record: &StepRecord) -> Result<()> {
        let payload = record
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn()?.execute(
            "INSERT INTO step_records (owner_id, step, level, message, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.owner_id,
                record.step as i64,
                record.level.to_string(),
                record.message,
                payload,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn create_artifact(&self, artifact: &Artifact) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO artifacts
                (id, run_id, file_name, file_path, download_url, mime_type, size_bytes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                artifact.id.to_string(),
                artifact.run_id.to_string(),
                artifact.file_name,
                artifact.file_path,
                artifact.download_url,
                artifact.mime_type,
                i64::try_from(artifact.size_bytes).unwrap_or(i64::MAX),
                artifact.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn load(&self, session_id: &str) -> Result<Vec<HistoryTurn>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT role, content, timestamp FROM history
             WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let turns = stmt
            .query_map(params![session_id], |row| {
                let role: String = row.get(0)?;
                let content: String = row.get(1)?;
                let timestamp: String = row.get(2)?;
                Ok((role, content, timestamp))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(role, content, timestamp)| {
                Some(HistoryTurn {
                    role: role.parse::<TurnRole>().ok()?,
                    content,
                    timestamp: parse_time(&timestamp)?,
                })
            })
            .collect();
        Ok(turns)
    }

    async fn append(&self, session_id: &str, role: TurnRole, content: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO history (session_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, role.to_string(), content, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
