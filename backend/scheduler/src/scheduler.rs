use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use agentforge_core::{
    CancellationToken, ChainStatus, ForgeError, StepStatus, ToolChain, ToolRegistry,
};

use crate::variables::resolve_arguments;

/// Error recorded on steps skipped because their dependencies can never complete.
pub const DEPENDENCY_NOT_MET: &str = "dependency not met";

/// Error recorded on steps skipped because the chain was cancelled.
pub const CANCELLED_REASON: &str = "chain cancelled";

/// A step that has been resolved and is about to be invoked.
struct Job {
    id: String,
    tool_name: String,
    arguments: Value,
}

/// Executes tool chains in dependency-ordered waves.
///
/// Every wave runs all currently ready steps concurrently and waits for all
/// of them before readiness is recomputed.
pub struct ToolChainScheduler {
    registry: Arc<ToolRegistry>,
    max_parallel: Option<usize>,
}

impl ToolChainScheduler {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            max_parallel: None,
        }
    }

    /// Cap how many steps of one wave are in flight at once. `None` or `0`
    /// leaves waves unbounded.
    ///
    /// Cancellation is only checked between waves: once a wave has started,
    /// all of its chunks run even if the token is cancelled midway.
    pub fn with_max_parallel(mut self, max_parallel: Option<usize>) -> Self {
        self.max_parallel = max_parallel.filter(|n| *n > 0);
        self
    }

    /// Run `chain` until no step is open and return it in its terminal state.
    ///
    /// Step failures are recorded on the step and never returned as errors;
    /// only a chain that cannot be started is rejected.
    #[instrument(skip(self, chain, cancel), fields(chain_id = %chain.id, chain = %chain.name))]
    pub async fn execute(
        &self,
        mut chain: ToolChain,
        cancel: CancellationToken,
    ) -> Result<ToolChain, ForgeError> {
        if chain.status != ChainStatus::Created {
            return Err(ForgeError::InvalidChain(format!(
                "chain '{}' is {} and cannot be executed again",
                chain.name, chain.status
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = chain.steps.iter().find(|s| !seen.insert(s.id.as_str())) {
            return Err(ForgeError::InvalidChain(format!(
                "duplicate step id '{}'",
                dup.id
            )));
        }
        if let Some(stale) = chain.steps.iter().find(|s| !s.is_fresh()) {
            return Err(ForgeError::InvalidChain(format!(
                "step '{}' is {} or carries results; chain definitions must start with pending steps",
                stale.id, stale.status
            )));
        }

        chain.status = ChainStatus::Running;
        chain.log(format!("chain started with {} steps", chain.steps.len()));
        info!(steps = chain.steps.len(), "Tool chain started");

        let mut wave = 0usize;
        while chain.has_open_steps() {
            if cancel.is_cancelled() {
                warn!(wave, "Tool chain cancelled");
                let skipped = skip_pending(&mut chain, CANCELLED_REASON);
                chain.log(format!("chain cancelled, {skipped} steps skipped"));
                chain.status = ChainStatus::Cancelled;
                break;
            }

            let ready = ready_steps(&chain);
            if ready.is_empty() {
                let skipped = skip_pending(&mut chain, DEPENDENCY_NOT_MET);
                warn!(skipped, "No runnable steps left; skipping the rest");
                chain.log(format!("{skipped} steps skipped: {DEPENDENCY_NOT_MET}"));
                break;
            }

            wave += 1;
            debug!(wave, steps = ?ready, "Starting wave");
            chain.log(format!("wave {wave}: {}", ready.join(", ")));

            let mut jobs = Vec::with_capacity(ready.len());
            for id in &ready {
                let Some(step) = chain.steps.iter_mut().find(|s| &s.id == id) else {
                    continue;
                };
                step.transition(StepStatus::Ready);
                let arguments = resolve_arguments(&step.arguments, &chain.variables);
                step.resolved_arguments = Some(arguments.clone());
                jobs.push(Job {
                    id: step.id.clone(),
                    tool_name: step.tool_name.clone(),
                    arguments,
                });
            }

            let width = self.max_parallel.unwrap_or(jobs.len()).max(1);
            for batch in jobs.chunks(width) {
                for job in batch {
                    if let Some(step) = chain.step_mut(&job.id) {
                        step.transition(StepStatus::Running);
                    }
                }

                let outcomes = join_all(batch.iter().map(|job| self.invoke(job, cancel.clone()))).await;

                for (job, outcome) in batch.iter().zip(outcomes) {
                    self.settle(&mut chain, job, outcome);
                }
            }
        }

        if chain.status == ChainStatus::Running {
            chain.status = if chain.count(StepStatus::Failed) > 0 {
                ChainStatus::Failed
            } else {
                ChainStatus::Completed
            };
        }

        info!(
            status = %chain.status,
            completed = chain.count(StepStatus::Completed),
            failed = chain.count(StepStatus::Failed),
            skipped = chain.count(StepStatus::Skipped),
            waves = wave,
            "Tool chain finished"
        );
        chain.log(format!("chain {}", chain.status));
        Ok(chain)
    }

    async fn invoke(&self, job: &Job, cancel: CancellationToken) -> Result<Value, ForgeError> {
        let Some(tool) = self.registry.get(&job.tool_name) else {
            error!(step = %job.id, tool = %job.tool_name, "Tool not found in registry");
            return Err(ForgeError::UnknownTool(job.tool_name.clone()));
        };
        debug!(step = %job.id, tool = %job.tool_name, "Executing step");
        tool.invoke(job.arguments.clone(), cancel)
            .await
            .map_err(|e| ForgeError::ToolFailed {
                tool: job.tool_name.clone(),
                message: e.to_string(),
            })
    }

    fn settle(&self, chain: &mut ToolChain, job: &Job, outcome: Result<Value, ForgeError>) {
        match outcome {
            Ok(result) => {
                let published = chain.step_mut(&job.id).and_then(|step| {
                    step.result = Some(result.clone());
                    step.transition(StepStatus::Completed);
                    step.output_variable.clone()
                });
                if let Some(name) = published {
                    chain.variables.insert(name.clone(), result);
                    chain.log(format!("step {} completed, published ${name}", job.id));
                } else {
                    chain.log(format!("step {} completed", job.id));
                }
                info!(step = %job.id, tool = %job.tool_name, "Step completed");
            }
            Err(err) => {
                let message = err.to_string();
                warn!(step = %job.id, tool = %job.tool_name, error = %message, "Step failed");
                if let Some(step) = chain.step_mut(&job.id) {
                    step.error = Some(message.clone());
                    step.transition(StepStatus::Failed);
                }
                chain.log(format!("step {} failed: {message}", job.id));
            }
        }
    }
}

/// Pending steps whose dependencies have all completed, in declaration order.
/// A dependency on an id that is not in the chain is never satisfied.
fn ready_steps(chain: &ToolChain) -> Vec<String> {
    chain
        .steps
        .iter()
        .filter(|step| step.status == StepStatus::Pending)
        .filter(|step| {
            step.depends_on.iter().all(|dep| {
                chain
                    .step(dep)
                    .is_some_and(|d| d.status == StepStatus::Completed)
            })
        })
        .map(|step| step.id.clone())
        .collect()
}

fn skip_pending(chain: &mut ToolChain, reason: &str) -> usize {
    let mut skipped = 0;
    for step in chain.steps.iter_mut() {
        if step.status == StepStatus::Pending && step.transition(StepStatus::Skipped) {
            step.error = Some(reason.to_string());
            skipped += 1;
        }
    }
    skipped
}
