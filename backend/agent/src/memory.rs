//! In-memory history and run stores for embedding and tests.

use std::collections::HashMap;

use agentforge_core::{Artifact, HistoryStore, HistoryTurn, Run, RunStore, StepRecord, TurnRole};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryHistoryStore {
    sessions: RwLock<HashMap<String, Vec<HistoryTurn>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self, session_id: &str) -> Result<Vec<HistoryTurn>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, session_id: &str, role: TurnRole, content: &str) -> Result<()> {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(HistoryTurn::new(role, content));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<Uuid, Run>>,
    steps: RwLock<Vec<StepRecord>>,
    artifacts: RwLock<Vec<Artifact>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_run(&self, id: &Uuid) -> Option<Run> {
        self.runs.read().await.get(id).cloned()
    }

    pub async fn step_records(&self, owner_id: &str) -> Vec<StepRecord> {
        self.steps
            .read()
            .await
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub async fn artifacts(&self, run_id: &Uuid) -> Vec<Artifact> {
        self.artifacts
            .read()
            .await
            .iter()
            .filter(|a| a.run_id == *run_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create_run(&self, run: &Run) -> Result<()> {
        self.runs.write().await.insert(run.id, run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &Run) -> Result<()> {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&run.id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => anyhow::bail!("run {} does not exist", run.id),
        }
    }

    async fn append_step(&self, record: &StepRecord) -> Result<()> {
        self.steps.write().await.push(record.clone());
        Ok(())
    }

    async fn create_artifact(&self, artifact: &Artifact) -> Result<()> {
        self.artifacts.write().await.push(artifact.clone());
        Ok(())
    }
}
