/// Graph execution engine with suspend/resume
///
/// A run is lazy: every `Run::next()` executes exactly one step, merges its
/// delta into the session state, and asks the graph where to go next. When a
/// step interrupts, the engine checkpoints the full state together with the
/// suspended step and halts. `resume` restores that checkpoint and re-enters
/// the same step with the external value.

use crate::error::WorkflowError;
use crate::runtime::executor::StepHandler;
use crate::workflow::{
    graph::CompiledGraph,
    storage::CheckpointStore,
    types::{
        Checkpoint, CheckpointSummary, InterruptPayload, Next, SessionState, StateUpdate, StepId,
        StepOutcome,
    },
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Drives sessions through a compiled graph
pub struct WorkflowEngine {
    graph: Arc<CompiledGraph>,
    steps: Arc<dyn StepHandler>,
    store: Arc<dyn CheckpointStore>,
    /// Checkpoints older than this are treated as gone; `None` keeps them forever
    checkpoint_ttl: Option<chrono::Duration>,
}

/// One observable tick of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    /// A step finished and its delta was merged
    Step { step: StepId, update: StateUpdate },
    /// A step suspended the session
    Interrupted { step: StepId, payload: InterruptPayload },
}

/// How a drained run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed { state: SessionState },
    Suspended { state: SessionState, payload: InterruptPayload },
}

enum Phase {
    Ready { step: StepId, resume: Option<String> },
    Suspended(InterruptPayload),
    Completed,
    Failed,
}

/// Lazy sequence of events for one `run` or `resume` call
pub struct Run {
    thread_id: String,
    state: SessionState,
    phase: Phase,
    graph: Arc<CompiledGraph>,
    steps: Arc<dyn StepHandler>,
    store: Arc<dyn CheckpointStore>,
}

impl WorkflowEngine {
    pub fn new(
        graph: Arc<CompiledGraph>,
        steps: Arc<dyn StepHandler>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            graph,
            steps,
            store,
            checkpoint_ttl: None,
        }
    }

    pub fn with_checkpoint_ttl(mut self, ttl: Option<chrono::Duration>) -> Self {
        self.checkpoint_ttl = ttl;
        self
    }

    pub fn checkpoint_ttl(&self) -> Option<chrono::Duration> {
        self.checkpoint_ttl
    }

    /// Start a new session at the graph's entry step
    ///
    /// A fresh thread id is generated when none is given. Nothing executes
    /// until the returned run is polled.
    pub fn run(&self, question: &str, thread_id: Option<String>) -> Result<Run, WorkflowError> {
        if question.trim().is_empty() {
            return Err(WorkflowError::InvalidRequest(
                "question must not be empty".to_string(),
            ));
        }

        let thread_id = thread_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        tracing::info!("🚀 Starting session {} at step '{}'", thread_id, self.graph.entry());

        Ok(self.start(
            thread_id,
            SessionState::new(question),
            self.graph.entry(),
            None,
        ))
    }

    /// Continue a suspended session with the external `value`
    ///
    /// Fails with `UnknownSession` before touching anything when the thread
    /// has no live checkpoint. Expired checkpoints are deleted on the way.
    pub async fn resume(&self, thread_id: &str, value: &str) -> Result<Run, WorkflowError> {
        let checkpoint = self.load_live(thread_id).await?;
        if !self.graph.contains(checkpoint.suspended_at) {
            return Err(WorkflowError::MalformedState(format!(
                "checkpoint for '{}' is suspended at unknown step '{}'",
                thread_id, checkpoint.suspended_at
            )));
        }

        tracing::info!(
            "▶️ Resuming session {} at step '{}'",
            thread_id,
            checkpoint.suspended_at
        );

        Ok(self.start(
            checkpoint.thread_id,
            checkpoint.state,
            checkpoint.suspended_at,
            Some(value.to_string()),
        ))
    }

    /// Current checkpoint of a suspended session
    pub async fn inspect(&self, thread_id: &str) -> Result<Checkpoint, WorkflowError> {
        self.load_live(thread_id).await
    }

    /// Drop a suspended session
    pub async fn discard(&self, thread_id: &str) -> Result<(), WorkflowError> {
        if self.store.delete(thread_id).await? {
            tracing::info!("🗑️ Discarded session {}", thread_id);
            Ok(())
        } else {
            Err(WorkflowError::UnknownSession(thread_id.to_string()))
        }
    }

    /// Suspended sessions, most recent first
    pub async fn pending(&self) -> Result<Vec<CheckpointSummary>, WorkflowError> {
        let now = Utc::now();
        let ttl = self.checkpoint_ttl;
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|summary| ttl.map_or(true, |ttl| summary.saved_at + ttl >= now))
            .collect())
    }

    /// Remove every checkpoint that outlived the TTL
    pub async fn purge_expired(&self) -> Result<usize, WorkflowError> {
        match self.checkpoint_ttl {
            Some(ttl) => Ok(self.store.purge_older_than(Utc::now() - ttl).await?),
            None => Ok(0),
        }
    }

    async fn load_live(&self, thread_id: &str) -> Result<Checkpoint, WorkflowError> {
        let checkpoint = self
            .store
            .load(thread_id)
            .await?
            .ok_or_else(|| WorkflowError::UnknownSession(thread_id.to_string()))?;

        if checkpoint.is_expired(self.checkpoint_ttl, Utc::now()) {
            tracing::info!("⌛ Checkpoint for session {} expired", thread_id);
            self.store.delete(thread_id).await?;
            return Err(WorkflowError::UnknownSession(thread_id.to_string()));
        }

        Ok(checkpoint)
    }

    fn start(
        &self,
        thread_id: String,
        state: SessionState,
        step: StepId,
        resume: Option<String>,
    ) -> Run {
        Run {
            thread_id,
            state,
            phase: Phase::Ready { step, resume },
            graph: self.graph.clone(),
            steps: self.steps.clone(),
            store: self.store.clone(),
        }
    }
}

impl Run {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// State as of the last merged delta
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Execute the next step
    ///
    /// Returns `None` once the run completed, suspended, or failed. An error
    /// leaves every earlier merge in place.
    pub async fn next(&mut self) -> Option<Result<RunEvent, WorkflowError>> {
        let (step, resume) = match std::mem::replace(&mut self.phase, Phase::Failed) {
            Phase::Ready { step, resume } => (step, resume),
            finished => {
                self.phase = finished;
                return None;
            }
        };

        Some(self.tick(step, resume).await)
    }

    async fn tick(
        &mut self,
        step: StepId,
        resume: Option<String>,
    ) -> Result<RunEvent, WorkflowError> {
        let step_start = std::time::Instant::now();
        tracing::debug!("⚡ Executing step '{}' for session {}", step, self.thread_id);

        let outcome = self
            .steps
            .execute(step, &self.state, resume.as_deref())
            .await
            .map_err(|err| {
                tracing::debug!("❌ Step '{}' failed: {}", step, err);
                err
            })?;

        match outcome {
            StepOutcome::Interrupt(payload) => {
                let checkpoint =
                    Checkpoint::new(&self.thread_id, self.state.clone(), step, payload.clone());
                self.store.save(&checkpoint).await?;
                tracing::info!("⏸️ Session {} suspended at '{}'", self.thread_id, step);

                self.phase = Phase::Suspended(payload.clone());
                Ok(RunEvent::Interrupted { step, payload })
            }
            StepOutcome::Update(update) => {
                self.state.apply(update.clone());
                let next = self.graph.next_after(step, &self.state)?;
                tracing::debug!(
                    "✅ Step '{}' completed in {:.2}ms → '{}'",
                    step,
                    step_start.elapsed().as_secs_f64() * 1000.0,
                    next
                );

                match next {
                    Next::Step(next_step) => {
                        self.phase = Phase::Ready {
                            step: next_step,
                            resume: None,
                        };
                    }
                    Next::End => {
                        self.store.delete(&self.thread_id).await?;
                        tracing::info!("🏁 Session {} completed", self.thread_id);
                        self.phase = Phase::Completed;
                    }
                }
                Ok(RunEvent::Step { step, update })
            }
        }
    }

    /// Drive the run to its end
    pub async fn finish(mut self) -> Result<RunOutcome, WorkflowError> {
        while let Some(event) = self.next().await {
            event?;
        }
        self.into_outcome()
    }

    /// Outcome of a run that has no more events
    pub fn into_outcome(self) -> Result<RunOutcome, WorkflowError> {
        match self.phase {
            Phase::Completed => Ok(RunOutcome::Completed { state: self.state }),
            Phase::Suspended(payload) => Ok(RunOutcome::Suspended {
                state: self.state,
                payload,
            }),
            Phase::Ready { step, .. } => Err(WorkflowError::MalformedState(format!(
                "run for '{}' still has step '{}' pending",
                self.thread_id, step
            ))),
            Phase::Failed => Err(WorkflowError::MalformedState(format!(
                "run for '{}' ended with a failed step",
                self.thread_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::llm::LlmError;
    use crate::runtime::executor::{sql_review_graph, StepExecutor};
    use crate::test_support::{ScriptedModel, StaticDatabase};
    use crate::workflow::storage::MemoryCheckpointStore;
    use crate::workflow::types::Feedback;

    struct Harness {
        engine: WorkflowEngine,
        model: Arc<ScriptedModel>,
        store: Arc<MemoryCheckpointStore>,
    }

    fn harness(replies: &[&str]) -> Harness {
        let model = Arc::new(ScriptedModel::new(replies));
        let store = Arc::new(MemoryCheckpointStore::new());
        let executor = StepExecutor::new(model.clone(), Arc::new(StaticDatabase::demo()));
        let engine = WorkflowEngine::new(
            Arc::new(sql_review_graph().unwrap()),
            Arc::new(executor),
            store.clone(),
        );
        Harness { engine, model, store }
    }

    async fn collect(run: &mut Run) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = run.next().await {
            events.push(event.unwrap());
        }
        events
    }

    fn visited(events: &[RunEvent]) -> Vec<StepId> {
        events
            .iter()
            .map(|event| match event {
                RunEvent::Step { step, .. } | RunEvent::Interrupted { step, .. } => *step,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fact_check_stops_after_classify() {
        let h = harness(&["Fact_Check"]);
        let mut run = h.engine.run("Is Kumar an employee?", None).unwrap();

        let events = collect(&mut run).await;
        assert_eq!(visited(&events), vec![StepId::Classify]);
        assert_eq!(run.state().question_type.as_deref(), Some("Fact_Check"));
        assert!(run.state().tables_list.is_none());
        assert!(run.state().selected_tables.is_none());
        assert_eq!(h.model.calls(), 1);
        assert!(matches!(run.into_outcome().unwrap(), RunOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn test_tables_listed_before_selection() {
        let h = harness(&["Simulation", "Employee", "SELECT 1"]);
        let mut run = h.engine.run("get all employees from India", None).unwrap();

        let events = collect(&mut run).await;
        assert_eq!(
            &visited(&events)[..3],
            &[StepId::Classify, StepId::ListTables, StepId::SelectTables]
        );
        let select_prompt = &h.model.prompts()[1];
        assert!(select_prompt.contains("Album, Employee, Invoice"));
    }

    #[tokio::test]
    async fn test_no_selected_table_ends_without_schema() {
        let h = harness(&["Simulation", "NONE_IDENTIFIED"]);
        let outcome = h
            .engine
            .run("how many planets are there?", Some("t-none".to_string()))
            .unwrap()
            .finish()
            .await
            .unwrap();

        match outcome {
            RunOutcome::Completed { state } => {
                assert_eq!(state.selected_tables, Some(Vec::new()));
                assert!(state.generated_query.is_none());
                assert_eq!(state.messages.len(), 1);
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert!(h.store.load("t-none").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_review_always_suspends_after_generation() {
        let h = harness(&["Simulation", "Employee", "SELECT LastName FROM Employee"]);
        let mut run = h
            .engine
            .run("get all employees from India", Some("t1".to_string()))
            .unwrap();

        let events = collect(&mut run).await;
        assert_eq!(
            visited(&events),
            vec![
                StepId::Classify,
                StepId::ListTables,
                StepId::SelectTables,
                StepId::GetSchema,
                StepId::GenerateQuery,
                StepId::HumanReview,
            ]
        );
        match events.last().unwrap() {
            RunEvent::Interrupted { payload, .. } => {
                assert_eq!(payload.generated_query, "SELECT LastName FROM Employee")
            }
            other => panic!("expected interrupt, got {:?}", other),
        }
        assert!(run.next().await.is_none());

        let checkpoint = h.store.load("t1").await.unwrap().unwrap();
        assert_eq!(checkpoint.suspended_at, StepId::HumanReview);
        assert_eq!(checkpoint.state, *run.state());
    }

    #[tokio::test]
    async fn test_regenerate_loops_until_continue() {
        let h = harness(&["Simulation", "Employee", "SELECT 1"]);
        h.engine
            .run("get all employees from India", Some("t1".to_string()))
            .unwrap()
            .finish()
            .await
            .unwrap();

        for attempt in 2..=4 {
            let reply = format!("SELECT {}", attempt);
            h.model.push(&reply);
            let mut run = h.engine.resume("t1", "REGENERATE").await.unwrap();
            let events = collect(&mut run).await;

            assert_eq!(
                visited(&events),
                vec![StepId::HumanReview, StepId::GenerateQuery, StepId::HumanReview]
            );
            assert_eq!(run.state().attempts, attempt);
            assert_eq!(run.state().generated_query.as_deref(), Some(reply.as_str()));
            assert_eq!(run.state().user_feedback, Some(Feedback::Regenerate));
        }

        let calls_before = h.model.calls();
        let outcome = h.engine.resume("t1", "CONTINUE").await.unwrap().finish().await.unwrap();
        match outcome {
            RunOutcome::Completed { state } => {
                assert_eq!(state.generated_query.as_deref(), Some("SELECT 4"));
                assert_eq!(state.user_feedback, Some(Feedback::Continue));
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(h.model.calls(), calls_before);
        assert!(h.store.load("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_any_other_feedback_terminates() {
        for value in ["ADDITIONAL_INPUT", "looks good to me", ""] {
            let h = harness(&["Simulation", "Employee", "SELECT 1"]);
            h.engine
                .run("q", Some("t1".to_string()))
                .unwrap()
                .finish()
                .await
                .unwrap();

            let mut run = h.engine.resume("t1", value).await.unwrap();
            let events = collect(&mut run).await;
            assert_eq!(visited(&events), vec![StepId::HumanReview]);
            assert!(matches!(run.into_outcome().unwrap(), RunOutcome::Completed { .. }));
            assert!(h.store.load("t1").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_lowercase_regenerate_is_not_a_loop() {
        for value in ["regenerate", " REGENERATE ", "Regenerate"] {
            let h = harness(&["Simulation", "Employee", "SELECT 1", "SELECT 2"]);
            h.engine
                .run("q", Some("t1".to_string()))
                .unwrap()
                .finish()
                .await
                .unwrap();
            let calls_before = h.model.calls();

            let outcome = h.engine.resume("t1", value).await.unwrap().finish().await.unwrap();
            match outcome {
                RunOutcome::Completed { state } => {
                    assert_eq!(state.generated_query.as_deref(), Some("SELECT 1"));
                    assert_eq!(state.user_feedback, Some(Feedback::Other(value.to_string())));
                    assert_eq!(state.attempts, 1);
                }
                other => panic!("expected completion for {:?}, got {:?}", value, other),
            }
            assert_eq!(h.model.calls(), calls_before);
            assert!(h.store.load("t1").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_message_log_never_shrinks() {
        let h = harness(&["Simulation", "Employee", "SELECT 1", "SELECT 2"]);
        let mut run = h.engine.run("q", Some("t1".to_string())).unwrap();

        let mut last_len = 0;
        while let Some(event) = run.next().await {
            event.unwrap();
            assert!(run.state().messages.len() >= last_len);
            last_len = run.state().messages.len();
        }

        let mut run = h.engine.resume("t1", "REGENERATE").await.unwrap();
        while let Some(event) = run.next().await {
            event.unwrap();
            assert!(run.state().messages.len() >= last_len);
            last_len = run.state().messages.len();
        }
        assert_eq!(last_len, 4);
    }

    #[tokio::test]
    async fn test_resume_unknown_thread_has_no_side_effects() {
        let h = harness(&[]);
        let err = h.engine.resume("nope", "CONTINUE").await.err().unwrap();

        assert!(matches!(err, WorkflowError::UnknownSession(ref id) if id == "nope"));
        assert_eq!(h.model.calls(), 0);
        assert!(h.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_step_error_propagates_without_rollback() {
        // Script runs out at select_tables
        let h = harness(&["Simulation"]);
        let mut run = h.engine.run("q", Some("t1".to_string())).unwrap();

        assert!(run.next().await.unwrap().is_ok());
        assert!(run.next().await.unwrap().is_ok());
        let err = run.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Collaborator(CollaboratorError::Model(LlmError::Connection(_)))
        ));
        assert!(run.next().await.is_none());

        assert_eq!(run.state().question_type.as_deref(), Some("Simulation"));
        assert!(run.state().tables_list.is_some());
        assert!(run.into_outcome().is_err());
        assert!(h.store.load("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let h = harness(&[]);
        assert!(matches!(
            h.engine.run("   ", None).err().unwrap(),
            WorkflowError::InvalidRequest(_)
        ));
    }

    #[tokio::test]
    async fn test_generated_thread_ids_are_distinct() {
        let h = harness(&[]);
        let a = h.engine.run("q", None).unwrap();
        let b = h.engine.run("q", None).unwrap();
        assert_ne!(a.thread_id(), b.thread_id());
    }

    #[tokio::test]
    async fn test_expired_checkpoint_is_unknown_and_deleted() {
        let h = harness(&["Simulation", "Employee", "SELECT 1"]);
        let engine = h
            .engine
            .with_checkpoint_ttl(Some(chrono::Duration::seconds(60)));
        engine
            .run("q", Some("old".to_string()))
            .unwrap()
            .finish()
            .await
            .unwrap();

        let mut checkpoint = h.store.load("old").await.unwrap().unwrap();
        checkpoint.saved_at = checkpoint.saved_at - chrono::Duration::seconds(120);
        h.store.save(&checkpoint).await.unwrap();

        assert!(engine.pending().await.unwrap().is_empty());
        let err = engine.resume("old", "CONTINUE").await.err().unwrap();
        assert!(matches!(err, WorkflowError::UnknownSession(_)));
        assert!(h.store.load("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_respects_ttl() {
        let h = harness(&[
            "Simulation",
            "Employee",
            "SELECT 1",
            "Simulation",
            "Employee",
            "SELECT 2",
        ]);
        for thread_id in ["stale", "fresh"] {
            h.engine
                .run("q", Some(thread_id.to_string()))
                .unwrap()
                .finish()
                .await
                .unwrap();
        }
        let mut stale = h.store.load("stale").await.unwrap().unwrap();
        stale.saved_at = stale.saved_at - chrono::Duration::hours(2);
        h.store.save(&stale).await.unwrap();

        assert_eq!(h.engine.purge_expired().await.unwrap(), 0);

        let engine = h
            .engine
            .with_checkpoint_ttl(Some(chrono::Duration::hours(1)));
        assert_eq!(engine.purge_expired().await.unwrap(), 1);
        let pending = engine.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].thread_id, "fresh");
    }

    #[tokio::test]
    async fn test_inspect_and_discard() {
        let h = harness(&["Simulation", "Employee", "SELECT 1"]);
        h.engine
            .run("q", Some("t1".to_string()))
            .unwrap()
            .finish()
            .await
            .unwrap();

        let checkpoint = h.engine.inspect("t1").await.unwrap();
        assert_eq!(checkpoint.payload.generated_query, "SELECT 1");

        h.engine.discard("t1").await.unwrap();
        assert!(matches!(
            h.engine.discard("t1").await.unwrap_err(),
            WorkflowError::UnknownSession(_)
        ));
        assert!(matches!(
            h.engine.inspect("t1").await.unwrap_err(),
            WorkflowError::UnknownSession(_)
        ));
    }
}
