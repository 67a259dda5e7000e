/// Step handlers for the SQL review workflow
///
/// This module contains the execution logic for each step and the routers
/// that pick the next step:
/// - classify → (end | list_tables)
/// - list_tables → select_tables → (end | get_schema)
/// - get_schema → generate_query → human_review → (generate_query | end)
///
/// Steps read the session state they are given and return a delta; only
/// human_review suspends.

use crate::{
    database::SqlDatabase,
    error::{GraphError, WorkflowError},
    llm::{CompletionOptions, LlmProvider, Message, MessageRole},
    workflow::{
        graph::{CompiledGraph, GraphBuilder},
        prompts,
        types::{Feedback, InterruptPayload, Next, SessionState, StateUpdate, StepId, StepOutcome},
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Executes a named step against the current state
///
/// `resume` carries the external value when a suspended step is re-entered.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(
        &self,
        step: StepId,
        state: &SessionState,
        resume: Option<&str>,
    ) -> Result<StepOutcome, WorkflowError>;
}

/// Step executor backed by the model and database collaborators
pub struct StepExecutor {
    model: Arc<dyn LlmProvider>,
    database: Arc<dyn SqlDatabase>,
    options: CompletionOptions,
}

impl StepExecutor {
    pub fn new(model: Arc<dyn LlmProvider>, database: Arc<dyn SqlDatabase>) -> Self {
        Self {
            model,
            database,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_completion_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Single-turn completion, returning the reply text
    async fn ask(&self, prompt: String) -> Result<String, WorkflowError> {
        let response = self
            .model
            .complete(&[Message::user(prompt)], &self.options)
            .await?;
        Ok(response.content().to_string())
    }

    async fn classify(&self, state: &SessionState) -> Result<StepOutcome, WorkflowError> {
        let reply = self.ask(prompts::classify(state.question())).await?;
        tracing::debug!("🏷️ Question classified as: {}", reply.trim());

        Ok(StepOutcome::Update(StateUpdate {
            question_type: Some(reply.trim().to_string()),
            messages: vec![Message::assistant(reply)],
            ..Default::default()
        }))
    }

    async fn list_tables(&self) -> Result<StepOutcome, WorkflowError> {
        let tables = self.database.list_table_names().await?;
        tracing::info!("📋 List of tables: {}", tables.join(", "));

        Ok(StepOutcome::Update(StateUpdate {
            tables_list: Some(tables),
            ..Default::default()
        }))
    }

    async fn select_tables(&self, state: &SessionState) -> Result<StepOutcome, WorkflowError> {
        let tables = state
            .tables_list
            .as_ref()
            .ok_or_else(|| WorkflowError::missing_field(StepId::SelectTables, "tables_list"))?;

        let reply = self
            .ask(prompts::select_tables(state.question(), tables))
            .await?;
        let selected = parse_table_selection(&reply, tables);
        tracing::info!("🎯 Selected tables: {:?}", selected);

        Ok(StepOutcome::Update(StateUpdate {
            selected_tables: Some(selected),
            ..Default::default()
        }))
    }

    async fn get_schema(&self, state: &SessionState) -> Result<StepOutcome, WorkflowError> {
        let tables = state
            .selected_tables
            .as_ref()
            .ok_or_else(|| WorkflowError::missing_field(StepId::GetSchema, "selected_tables"))?;

        let mut descriptions = Vec::with_capacity(tables.len());
        for table in tables {
            descriptions.push(self.database.get_schema(table).await?);
        }

        Ok(StepOutcome::Update(StateUpdate {
            messages: vec![Message::tool(descriptions.join("\n\n"))],
            ..Default::default()
        }))
    }

    async fn generate_query(&self, state: &SessionState) -> Result<StepOutcome, WorkflowError> {
        // Latest schema entry, not simply the last message: after a
        // regenerate the last entry is the previous draft.
        let schema = state
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Tool)
            .ok_or_else(|| WorkflowError::missing_field(StepId::GenerateQuery, "schema message"))?;

        let rejected = state.generated_query.as_deref();
        let reply = self
            .ask(prompts::generate_query(state.question(), &schema.content, rejected))
            .await?;
        let query = extract_sql(&reply);
        tracing::info!("🧾 Generated query (attempt {}): {}", state.attempts + 1, query);

        Ok(StepOutcome::Update(StateUpdate {
            generated_query: Some(query),
            messages: vec![Message::assistant(reply)],
            attempts: Some(state.attempts + 1),
            ..Default::default()
        }))
    }

    fn human_review(
        &self,
        state: &SessionState,
        resume: Option<&str>,
    ) -> Result<StepOutcome, WorkflowError> {
        if let Some(value) = resume {
            let feedback = Feedback::from(value);
            tracing::info!("🙋 Reviewer feedback: {}", feedback);
            return Ok(StepOutcome::Update(StateUpdate {
                user_feedback: Some(feedback),
                ..Default::default()
            }));
        }

        let query = state
            .generated_query
            .as_ref()
            .ok_or_else(|| WorkflowError::missing_field(StepId::HumanReview, "generated_query"))?;

        Ok(StepOutcome::Interrupt(InterruptPayload {
            task: prompts::REVIEW_TASK.to_string(),
            generated_query: query.clone(),
        }))
    }
}

#[async_trait]
impl StepHandler for StepExecutor {
    async fn execute(
        &self,
        step: StepId,
        state: &SessionState,
        resume: Option<&str>,
    ) -> Result<StepOutcome, WorkflowError> {
        match step {
            StepId::Classify => self.classify(state).await,
            StepId::ListTables => self.list_tables().await,
            StepId::SelectTables => self.select_tables(state).await,
            StepId::GetSchema => self.get_schema(state).await,
            StepId::GenerateQuery => self.generate_query(state).await,
            StepId::HumanReview => self.human_review(state, resume),
        }
    }
}

/// Fact checks stop right after classification
pub fn route_after_classify(state: &SessionState) -> Next {
    match &state.question_type {
        Some(label) if label.contains(prompts::FACT_CHECK) => Next::End,
        _ => Next::Step(StepId::ListTables),
    }
}

/// No relevant table means nothing to query
pub fn route_after_table_selection(state: &SessionState) -> Next {
    match &state.selected_tables {
        Some(tables) if !tables.is_empty() => Next::Step(StepId::GetSchema),
        _ => Next::End,
    }
}

/// Only REGENERATE loops back; every other answer accepts the draft
pub fn route_after_human_review(state: &SessionState) -> Next {
    match state.user_feedback {
        Some(Feedback::Regenerate) => Next::Step(StepId::GenerateQuery),
        _ => Next::End,
    }
}

/// The SQL review graph
pub fn sql_review_graph() -> Result<CompiledGraph, GraphError> {
    let mut builder = GraphBuilder::new();
    for step in StepId::ALL {
        builder = builder.add_step(step);
    }

    builder
        .set_entry(StepId::Classify)
        .add_conditional_edge(
            StepId::Classify,
            route_after_classify,
            &[Next::End, Next::Step(StepId::ListTables)],
        )
        .add_edge(StepId::ListTables, Next::Step(StepId::SelectTables))
        .add_conditional_edge(
            StepId::SelectTables,
            route_after_table_selection,
            &[Next::End, Next::Step(StepId::GetSchema)],
        )
        .add_edge(StepId::GetSchema, Next::Step(StepId::GenerateQuery))
        .add_edge(StepId::GenerateQuery, Next::Step(StepId::HumanReview))
        .add_conditional_edge(
            StepId::HumanReview,
            route_after_human_review,
            &[Next::End, Next::Step(StepId::GenerateQuery)],
        )
        .compile()
}

/// Map the model's table choice onto known table names
///
/// Accepts comma or newline separated names, tolerates quoting and case
/// differences, drops names that are not in `known`. An empty result is the
/// "none selected" sentinel.
pub fn parse_table_selection(reply: &str, known: &[String]) -> Vec<String> {
    if reply.contains(prompts::NONE_IDENTIFIED) || reply.contains("NONE_SELECTED") {
        return Vec::new();
    }

    let mut selected: Vec<String> = Vec::new();
    for candidate in reply.split(|c: char| c == ',' || c == '\n') {
        let candidate = candidate
            .trim()
            .trim_start_matches(|c: char| c == '-' || c == '*' || c.is_whitespace())
            .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | '[' | ']' | '.'));
        if let Some(table) = known.iter().find(|t| t.eq_ignore_ascii_case(candidate)) {
            if !selected.contains(table) {
                selected.push(table.clone());
            }
        }
    }
    selected
}

/// Strip markdown code fences and surrounding prose markers from a SQL reply
pub fn extract_sql(reply: &str) -> String {
    let trimmed = reply.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed.to_string();
    };

    let after_fence = &trimmed[start + 3..];
    let body = after_fence.split("```").next().unwrap_or(after_fence);
    let body = match body.split_once('\n') {
        // Info string ("sql", "sqlite", ...) sits on the fence line
        Some((info, rest)) if !info.trim().contains(' ') => rest,
        Some(_) => body,
        None => strip_info_word(body),
    };
    body.trim().to_string()
}

/// Single-line fences carry the language tag in front of the query
fn strip_info_word(body: &str) -> &str {
    let body = body.trim_start();
    match body.split_once(char::is_whitespace) {
        Some((word, rest)) if is_sql_tag(word) => rest,
        _ => body,
    }
}

fn is_sql_tag(word: &str) -> bool {
    word.eq_ignore_ascii_case("sql") || word.eq_ignore_ascii_case("sqlite")
}
