//! Core agent execution loop.
//!
//! One run is strictly sequential: a model call, at most one tool call, then
//! artifact capture, before the next iteration starts. The run always ends
//! in `Completed` or `Failed`, and finalization happens exactly once.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use agentforge_core::{
    AgentEvent, Artifact, CancellationToken, CompletionRequest, EventKind, EventSink, ForgeError,
    HistoryStore, LogLevel, ModelBackend, Run, RunStatus, RunStore, StepRecord, ToolRegistry,
};
use agentforge_tools::{extract_files, parse_tool_call, LoopDetector, Stall};

use crate::completion_guard::CompletionGuard;
use crate::settings::AgentSettings;
use crate::system_prompt::PromptBuilder;
use crate::tool_dispatcher::{DispatchOutcome, ToolDispatcher};

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The model answered without proposing a tool call.
    Answered,
    /// A repetition pattern forced the run to stop.
    Stalled(Stall),
    /// The step ceiling was reached.
    StepLimit,
    /// Cancellation was observed at the top of an iteration.
    Cancelled,
    /// An error escaped the loop.
    Fatal(String),
}

/// The finished run plus what the caller usually wants to show.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: Run,
    pub outcome: RunOutcome,
    pub final_answer: Option<String>,
    pub steps: usize,
    pub artifacts: Vec<Artifact>,
}

/// Where the loop body stopped, before finalization.
enum LoopExit {
    Answered(String),
    Stalled(Stall, String),
    StepLimit(String),
    Cancelled,
}

/// Per-run mutable state. Owned by exactly one `run` call.
struct RunState {
    run: Run,
    detector: LoopDetector,
    artifacts: Vec<Artifact>,
    steps: usize,
}

/// The agent runner. Shareable across sessions; all per-run state lives in `run`.
pub struct AgentRunner {
    model: Arc<dyn ModelBackend>,
    dispatcher: ToolDispatcher,
    history: Arc<dyn HistoryStore>,
    runs: Arc<dyn RunStore>,
    events: Arc<dyn EventSink>,
    guard: CompletionGuard,
    system_prompt: String,
    settings: AgentSettings,
}

impl AgentRunner {
    pub fn new(
        model: Arc<dyn ModelBackend>,
        tools: Arc<ToolRegistry>,
        history: Arc<dyn HistoryStore>,
        runs: Arc<dyn RunStore>,
        events: Arc<dyn EventSink>,
        settings: AgentSettings,
    ) -> Self {
        let system_prompt = PromptBuilder::build(&settings.system_prompt, &tools);
        Self {
            model,
            dispatcher: ToolDispatcher::new(tools),
            history,
            runs,
            events,
            guard: CompletionGuard::new(&settings),
            system_prompt,
            settings,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run the agent loop for one user turn until it answers, stalls, hits the
    /// step limit, is cancelled, or fails. Never returns an error: every
    /// outcome is reflected in the returned run.
    #[instrument(skip(self, user_prompt, cancel))]
    pub async fn run(
        &self,
        session_id: &str,
        user_prompt: &str,
        cancel: CancellationToken,
    ) -> RunReport {
        let mut state = RunState {
            run: Run::new(session_id),
            detector: LoopDetector::new(self.settings.signature_window),
            artifacts: Vec::new(),
            steps: 0,
        };
        info!(run_id = %state.run.id, "Starting agent run");

        if let Err(e) = self.runs.create_run(&state.run).await {
            error!(run_id = %state.run.id, error = %e, "Failed to persist new run");
        }
        self.emit(&state, EventKind::RunStarted, json!({ "prompt": user_prompt }));

        let result = self.drive(&mut state, user_prompt, &cancel).await;

        let (outcome, final_answer) = match result {
            Ok(LoopExit::Answered(answer)) => (RunOutcome::Answered, Some(answer)),
            Ok(LoopExit::Stalled(stall, message)) => (RunOutcome::Stalled(stall), Some(message)),
            Ok(LoopExit::StepLimit(message)) => (RunOutcome::StepLimit, Some(message)),
            Ok(LoopExit::Cancelled) => {
                info!(run_id = %state.run.id, "Run cancelled");
                self.emit(&state, EventKind::Timeline, json!({ "message": "run cancelled" }));
                self.record(&state, LogLevel::Warn, "Run cancelled", None).await;
                state.run.finish(RunStatus::Failed);
                (RunOutcome::Cancelled, None)
            }
            Err(e) => {
                error!(run_id = %state.run.id, error = %e, "Agent run failed");
                state.run.finish(RunStatus::Failed);
                self.emit(&state, EventKind::Error, json!({ "error": e.to_string() }));
                self.record(&state, LogLevel::Error, format!("Run failed: {e}"), None)
                    .await;
                (RunOutcome::Fatal(e.to_string()), None)
            }
        };

        self.finalize(&mut state).await;

        RunReport {
            run: state.run,
            outcome,
            final_answer,
            steps: state.steps,
            artifacts: state.artifacts,
        }
    }

    async fn drive(
        &self,
        state: &mut RunState,
        user_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<LoopExit> {
        let session_id = state.run.session_id.clone();
        self.history.append_user(&session_id, user_prompt).await?;

        while state.steps < self.settings.max_steps {
            if cancel.is_cancelled() {
                return Ok(LoopExit::Cancelled);
            }

            state.steps += 1;
            debug!(run_id = %state.run.id, step = state.steps, "Agent loop step");
            self.emit(state, EventKind::StepStart, json!({}));
            self.record(state, LogLevel::Debug, "Step started", None).await;

            let request = CompletionRequest {
                system_prompt: self.system_prompt.clone(),
                user_prompt: user_prompt.to_string(),
                history: self.history.load(&session_id).await?,
            };
            let response = self
                .model
                .complete(&request, cancel.clone())
                .await
                .map_err(|e| ForgeError::Model(e.to_string()))?;
            self.emit(state, EventKind::ModelOutput, json!({ "text": response.text }));

            let Some(call) = parse_tool_call(&response) else {
                self.conclude(state, LogLevel::Info, &response.text).await?;
                return Ok(LoopExit::Answered(response.text));
            };

            if let Some(stall) = state.detector.record(call.signature()) {
                warn!(
                    run_id = %state.run.id,
                    tool = %call.name,
                    reason = stall.reason(),
                    "Agent is stuck; stopping run"
                );
                let message = stall.message();
                self.emit(
                    state,
                    EventKind::Timeline,
                    json!({ "warning": "stuck", "tool": call.name, "reason": stall.reason() }),
                );
                self.conclude(state, LogLevel::Warn, &message).await?;
                return Ok(LoopExit::Stalled(stall, message));
            }

            self.history
                .append_assistant(&session_id, &response.text)
                .await?;

            let arguments = call.arguments_value();
            self.emit(
                state,
                EventKind::ToolStart,
                json!({ "tool": call.name, "arguments": arguments }),
            );
            self.record(
                state,
                LogLevel::Info,
                format!("Executing tool {}", call.name),
                Some(arguments),
            )
            .await;

            let outcome = self.dispatcher.execute(&call, cancel.clone()).await;
            let label = outcome.label();
            let error_message = match &outcome {
                DispatchOutcome::Failed(msg) => Some(msg.clone()),
                _ => None,
            };
            let result = outcome.into_result();

            self.emit(
                state,
                EventKind::ToolEnd,
                json!({ "tool": call.name, "outcome": label, "result": result, "error": error_message }),
            );
            let level = if result.is_some() { LogLevel::Info } else { LogLevel::Error };
            self.record(
                state,
                level,
                format!("Tool {} {}", call.name, label),
                error_message.as_ref().map(|e| json!({ "error": e })),
            )
            .await;

            let tool_turn = match &result {
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => format!("Tool {} produced no result.", call.name),
            };
            self.history
                .append_tool_result(&session_id, &tool_turn)
                .await?;

            if let Some(value) = &result {
                self.capture_artifacts(state, value).await?;

                if let Some(note) = self.guard.check(&call.name, value) {
                    info!(run_id = %state.run.id, tool = %call.name, "Creation tool succeeded; nudging model");
                    self.history.append_system(&session_id, &note).await?;
                    self.emit(state, EventKind::Timeline, json!({ "message": note }));
                }
            }
        }

        warn!(
            run_id = %state.run.id,
            max_steps = self.settings.max_steps,
            "Max steps reached, stopping loop"
        );
        let message = format!(
            "⚠️ I reached the limit of {} steps without finishing. Here is where I stopped; \
             please narrow the request or continue in a new message.",
            self.settings.max_steps
        );
        self.emit(
            state,
            EventKind::Timeline,
            json!({ "warning": "step_limit", "max_steps": self.settings.max_steps }),
        );
        self.conclude(state, LogLevel::Warn, &message).await?;
        Ok(LoopExit::StepLimit(message))
    }

    /// Emit and persist the final answer and mark the run completed.
    async fn conclude(&self, state: &mut RunState, level: LogLevel, answer: &str) -> Result<()> {
        self.emit(state, EventKind::FinalAnswer, json!({ "text": answer }));
        self.history
            .append_assistant(&state.run.session_id, answer)
            .await?;
        self.record(state, level, "Final answer produced", Some(json!({ "text": answer })))
            .await;
        state.run.finish(RunStatus::Completed);
        Ok(())
    }

    async fn capture_artifacts(&self, state: &mut RunState, result: &Value) -> Result<()> {
        for descriptor in extract_files(result) {
            let artifact = Artifact::from_descriptor(state.run.id, descriptor);
            self.runs.create_artifact(&artifact).await?;
            info!(
                run_id = %state.run.id,
                file = %artifact.file_name,
                mime = %artifact.mime_type,
                "Artifact captured"
            );
            self.emit(
                state,
                EventKind::FileCreated,
                serde_json::to_value(&artifact).unwrap_or(Value::Null),
            );
            state.artifacts.push(artifact);
        }
        Ok(())
    }

    /// Runs exactly once per run, whatever the outcome.
    async fn finalize(&self, state: &mut RunState) {
        // Nothing but a completed answer may leave the run in progress.
        state.run.finish(RunStatus::Failed);
        state.run.stamp_end();

        if let Err(e) = self.runs.update_run(&state.run).await {
            error!(run_id = %state.run.id, error = %e, "Failed to persist final run status");
        }
        info!(
            run_id = %state.run.id,
            status = %state.run.status,
            steps = state.steps,
            "Agent run ended"
        );
        self.emit(
            state,
            EventKind::RunEnded,
            json!({ "status": state.run.status, "steps": state.steps }),
        );
    }

    fn emit(&self, state: &RunState, kind: EventKind, payload: Value) {
        self.events.emit(AgentEvent::new(
            state.run.session_id.clone(),
            state.run.id,
            state.steps,
            kind,
            payload,
        ));
    }

    /// Step records are an observability log; a failed write is logged, not fatal.
    async fn record(
        &self,
        state: &RunState,
        level: LogLevel,
        message: impl Into<String>,
        payload: Option<Value>,
    ) {
        let mut record = StepRecord::new(state.run.id.to_string(), state.steps, level, message);
        record.payload = payload;
        if let Err(e) = self.runs.append_step(&record).await {
            warn!(run_id = %state.run.id, error = %e, "Failed to append step record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use agentforge_core::{CompletionResponse, ProposedCall, Tool, TurnRole};
    use async_trait::async_trait;

    use crate::memory::{MemoryHistoryStore, MemoryRunStore};

    /// Replays canned responses; the last one repeats forever.
    struct ScriptedModel {
        script: Mutex<VecDeque<CompletionResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(script: Vec<CompletionResponse>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedModel {
        async fn complete(
            &self,
            _request: &CompletionRequest,
            _cancel: CancellationToken,
        ) -> Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                Ok(script.pop_front().unwrap())
            } else {
                Ok(script.front().cloned().unwrap_or_default())
            }
        }
    }

    /// Proposes a different search query on every call.
    struct UniqueCallsModel {
        counter: AtomicUsize,
    }

    #[async_trait]
    impl ModelBackend for UniqueCallsModel {
        async fn complete(
            &self,
            _request: &CompletionRequest,
            _cancel: CancellationToken,
        ) -> Result<CompletionResponse> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse::text(format!(
                r#"{{"tool":"echo","args":{{"q":"query {n}"}}}}"#
            )))
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ModelBackend for FailingModel {
        async fn complete(
            &self,
            _request: &CompletionRequest,
            _cancel: CancellationToken,
        ) -> Result<CompletionResponse> {
            anyhow::bail!("backend unavailable")
        }
    }

    struct CountingTool {
        name: &'static str,
        invocations: AtomicUsize,
        result: Option<Value>,
    }

    impl CountingTool {
        fn ok(name: &'static str, result: Value) -> Arc<Self> {
            Arc::new(Self { name, invocations: AtomicUsize::new(0), result: Some(result) })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, invocations: AtomicUsize::new(0), result: None })
        }

        fn count(&self) -> usize {
            self.invocations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            self.name
        }

        async fn invoke(&self, args: Value, _cancel: CancellationToken) -> Result<Value> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Some(Value::Null) => Ok(args),
                Some(value) => Ok(value.clone()),
                None => anyhow::bail!("{} always fails", self.name),
            }
        }
    }

    /// Trips the run's cancellation token while its own call is in flight.
    struct CancellingTool {
        cancel: CancellationToken,
        invocations: AtomicUsize,
    }

    #[async_trait]
    impl Tool for CancellingTool {
        fn name(&self) -> &str {
            "slow_export"
        }

        async fn invoke(&self, _args: Value, _cancel: CancellationToken) -> Result<Value> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            self.cancel.cancel();
            tokio::task::yield_now().await;
            Ok(serde_json::json!({ "rows": 42 }))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AgentEvent>>,
    }

    impl RecordingSink {
        fn kinds(&self) -> Vec<EventKind> {
            self.events.lock().unwrap().iter().map(|e| e.kind).collect()
        }

        fn count(&self, kind: EventKind) -> usize {
            self.kinds().into_iter().filter(|k| *k == kind).count()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: AgentEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    struct Harness {
        runner: AgentRunner,
        history: Arc<MemoryHistoryStore>,
        runs: Arc<MemoryRunStore>,
        sink: Arc<RecordingSink>,
    }

    fn harness(model: Arc<dyn ModelBackend>, tools: Vec<Arc<dyn Tool>>) -> Harness {
        harness_with(model, tools, AgentSettings::default())
    }

    fn harness_with(
        model: Arc<dyn ModelBackend>,
        tools: Vec<Arc<dyn Tool>>,
        settings: AgentSettings,
    ) -> Harness {
        let registry = tools
            .into_iter()
            .fold(ToolRegistry::new(), |registry, tool| registry.with(tool));
        let history = Arc::new(MemoryHistoryStore::new());
        let runs = Arc::new(MemoryRunStore::new());
        let sink = Arc::new(RecordingSink::default());
        let runner = AgentRunner::new(
            model,
            Arc::new(registry),
            history.clone(),
            runs.clone(),
            sink.clone(),
            settings,
        );
        Harness { runner, history, runs, sink }
    }

    fn directive(tool: &str, args: Value) -> CompletionResponse {
        CompletionResponse::text(serde_json::json!({ "tool": tool, "args": args }).to_string())
    }

    #[tokio::test]
    async fn test_plain_answer_finishes_first_iteration() {
        let model = Arc::new(ScriptedModel::new(vec![CompletionResponse::text("Paris.")]));
        let h = harness(model.clone(), vec![]);

        let report = h.runner.run("s1", "Capital of France?", CancellationToken::new()).await;

        assert_eq!(report.outcome, RunOutcome::Answered);
        assert_eq!(report.final_answer.as_deref(), Some("Paris."));
        assert_eq!(report.steps, 1);
        assert_eq!(report.run.status, RunStatus::Completed);
        assert!(report.run.ended_at.is_some());
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.sink.count(EventKind::FinalAnswer), 1);
        assert_eq!(h.sink.count(EventKind::RunEnded), 1);
        assert_eq!(h.sink.kinds().last(), Some(&EventKind::RunEnded));

        let turns = h.history.load("s1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].content, "Paris.");

        let stored = h.runs.get_run(&report.run.id).await.unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_identical_failing_calls_stall_before_third_invocation() {
        let tool = CountingTool::failing("web_search");
        let model = Arc::new(ScriptedModel::new(vec![directive(
            "web_search",
            serde_json::json!({ "query": "weather" }),
        )]));
        let h = harness(model, vec![tool.clone()]);

        let report = h.runner.run("s1", "weather?", CancellationToken::new()).await;

        assert!(matches!(report.outcome, RunOutcome::Stalled(Stall::ExactRepeat { .. })));
        assert_eq!(report.run.status, RunStatus::Completed);
        assert_eq!(report.steps, 3);
        assert_eq!(tool.count(), 2);
        let answer = report.final_answer.unwrap();
        assert!(answer.contains("web_search"));
        assert_eq!(h.sink.count(EventKind::FinalAnswer), 1);
    }

    #[tokio::test]
    async fn test_alternating_calls_stop_on_sixth() {
        let search = CountingTool::ok("search", serde_json::json!("no results"));
        let browse = CountingTool::ok("browse", serde_json::json!("empty page"));
        let a = directive("search", serde_json::json!({ "q": "x" }));
        let b = directive("browse", serde_json::json!({ "url": "http://x" }));
        let script = vec![a.clone(), b.clone(), a.clone(), b.clone(), a, b.clone(), b];
        let model = Arc::new(ScriptedModel::new(script));
        let h = harness(model, vec![search.clone(), browse.clone()]);

        let report = h.runner.run("s1", "find x", CancellationToken::new()).await;

        assert!(matches!(report.outcome, RunOutcome::Stalled(Stall::Alternation { .. })));
        assert_eq!(report.steps, 6);
        assert_eq!(search.count(), 3);
        assert_eq!(browse.count(), 2);
    }

    #[tokio::test]
    async fn test_unique_calls_hit_step_limit() {
        let tool = CountingTool::ok("echo", Value::Null);
        let model = Arc::new(UniqueCallsModel { counter: AtomicUsize::new(0) });
        let h = harness(model, vec![tool.clone()]);

        let report = h.runner.run("s1", "loop", CancellationToken::new()).await;

        assert_eq!(report.outcome, RunOutcome::StepLimit);
        assert_eq!(report.run.status, RunStatus::Completed);
        assert_eq!(report.steps, 20);
        assert_eq!(tool.count(), 20);
        assert!(report.final_answer.unwrap().contains("20 steps"));
    }

    #[tokio::test]
    async fn test_creation_tool_success_injects_system_note() {
        let tool = CountingTool::ok(
            "create_pdf",
            serde_json::json!({ "success": true, "fileName": "r.pdf", "filePath": "/out/r.pdf" }),
        );
        let model = Arc::new(ScriptedModel::new(vec![
            directive("create_pdf", serde_json::json!({ "title": "Report" })),
            CompletionResponse::text("Your PDF is ready."),
        ]));
        let h = harness(model, vec![tool]);

        let report = h.runner.run("s1", "make a pdf", CancellationToken::new()).await;

        assert_eq!(report.outcome, RunOutcome::Answered);
        let turns = h.history.load("s1").await.unwrap();
        let notes: Vec<_> = turns.iter().filter(|t| t.role == TurnRole::System).collect();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].content.contains("create_pdf"));
        assert!(notes[0].content.contains("Do not call"));
    }

    #[tokio::test]
    async fn test_artifacts_are_persisted_with_run_id() {
        let tool = CountingTool::ok(
            "export",
            serde_json::json!({
                "files": [
                    { "fileName": "a.csv", "filePath": "/out/a.csv", "sizeBytes": 10 },
                    { "fileName": "b.png", "filePath": "/out/b.png" }
                ]
            }),
        );
        let model = Arc::new(ScriptedModel::new(vec![
            directive("export", serde_json::json!({})),
            CompletionResponse::text("done"),
        ]));
        let h = harness(model, vec![tool]);

        let report = h.runner.run("s1", "export", CancellationToken::new()).await;

        assert_eq!(report.artifacts.len(), 2);
        let stored = h.runs.artifacts(&report.run.id).await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].mime_type, "text/csv");
        assert_eq!(stored[1].mime_type, "image/png");
        assert_eq!(h.sink.count(EventKind::FileCreated), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_abort_run() {
        let model = Arc::new(ScriptedModel::new(vec![
            directive("ocr", serde_json::json!({ "image": "x.png" })),
            CompletionResponse::text("I could not read it."),
        ]));
        let h = harness(model, vec![]);

        let report = h.runner.run("s1", "read image", CancellationToken::new()).await;

        assert_eq!(report.outcome, RunOutcome::Answered);
        let turns = h.history.load("s1").await.unwrap();
        assert!(turns
            .iter()
            .any(|t| t.role == TurnRole::Tool && t.content.contains("produced no result")));
    }

    #[tokio::test]
    async fn test_structured_call_is_dispatched() {
        let tool = CountingTool::ok("echo", Value::Null);
        let model = Arc::new(ScriptedModel::new(vec![
            CompletionResponse {
                text: String::new(),
                proposed_calls: vec![ProposedCall {
                    name: "echo".into(),
                    arguments: serde_json::json!({ "q": "hi" }),
                }],
            },
            CompletionResponse::text("ok"),
        ]));
        let h = harness(model, vec![tool.clone()]);

        let report = h.runner.run("s1", "echo", CancellationToken::new()).await;

        assert_eq!(report.outcome, RunOutcome::Answered);
        assert_eq!(tool.count(), 1);
    }

    #[tokio::test]
    async fn test_model_error_fails_run_and_still_finalizes() {
        let h = harness(Arc::new(FailingModel), vec![]);

        let report = h.runner.run("s1", "hello", CancellationToken::new()).await;

        assert!(matches!(
            report.outcome,
            RunOutcome::Fatal(ref msg) if msg == "model backend error: backend unavailable"
        ));
        assert_eq!(report.run.status, RunStatus::Failed);
        assert!(report.run.ended_at.is_some());
        assert_eq!(h.sink.count(EventKind::Error), 1);
        assert_eq!(h.sink.count(EventKind::RunEnded), 1);
        assert_eq!(h.sink.count(EventKind::FinalAnswer), 0);
        let stored = h.runs.get_run(&report.run.id).await.unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let model = Arc::new(ScriptedModel::new(vec![CompletionResponse::text("never")]));
        let h = harness(model.clone(), vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = h.runner.run("s1", "hello", cancel).await;

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.steps, 0);
        assert_eq!(report.run.status, RunStatus::Failed);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.sink.count(EventKind::RunEnded), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_tool_call_lets_it_finish() {
        let cancel = CancellationToken::new();
        let tool = Arc::new(CancellingTool {
            cancel: cancel.clone(),
            invocations: AtomicUsize::new(0),
        });
        let model = Arc::new(ScriptedModel::new(vec![
            directive("slow_export", serde_json::json!({ "table": "orders" })),
            CompletionResponse::text("never reached"),
        ]));
        let h = harness(model.clone(), vec![tool.clone()]);

        let report = h.runner.run("s1", "export orders", cancel).await;

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.steps, 1);
        assert_eq!(tool.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.run.status, RunStatus::Failed);
        assert!(report.run.ended_at.is_some());
        assert_eq!(h.sink.count(EventKind::ToolEnd), 1);
        assert_eq!(h.sink.count(EventKind::FinalAnswer), 0);
        assert_eq!(h.sink.count(EventKind::RunEnded), 1);

        let turns = h.history.load("s1").await.unwrap();
        assert!(turns
            .iter()
            .any(|t| t.role == TurnRole::Tool && t.content.contains("42")));
    }

    #[tokio::test]
    async fn test_step_records_are_written() {
        let model = Arc::new(ScriptedModel::new(vec![CompletionResponse::text("hi")]));
        let h = harness_with(model, vec![], AgentSettings::default().with_max_steps(3));

        let report = h.runner.run("s1", "hello", CancellationToken::new()).await;

        let records = h.runs.step_records(&report.run.id.to_string()).await;
        assert!(records.iter().any(|r| r.message == "Final answer produced"));
        assert!(records.iter().all(|r| r.step == 1));
    }
}
