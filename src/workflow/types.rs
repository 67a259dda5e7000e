/// Core workflow type definitions
///
/// Defines the session state shared by all steps, the partial-state deltas the
/// steps return, and the checkpoint that makes a suspended session resumable.
/// All of these serialize to JSON for the HTTP layer and the SQLite store.

use crate::llm::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a step in the SQL review graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    /// Label the question (Fact_Check, Simulation, Other)
    Classify,
    /// Enumerate the database tables
    ListTables,
    /// Let the model pick relevant tables
    SelectTables,
    /// Fetch the selected tables' schemas into the message log
    GetSchema,
    /// Draft the SQL query
    GenerateQuery,
    /// Suspend for a human decision on the draft
    HumanReview,
}

impl StepId {
    pub const ALL: [StepId; 6] = [
        StepId::Classify,
        StepId::ListTables,
        StepId::SelectTables,
        StepId::GetSchema,
        StepId::GenerateQuery,
        StepId::HumanReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Classify => "classify",
            StepId::ListTables => "list_tables",
            StepId::SelectTables => "select_tables",
            StepId::GetSchema => "get_schema",
            StepId::GenerateQuery => "generate_query",
            StepId::HumanReview => "human_review",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where control goes after a step: another step or the terminal sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Next {
    Step(StepId),
    End,
}

impl fmt::Display for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Step(step) => step.fmt(f),
            Next::End => f.write_str("end"),
        }
    }
}

/// Human decision on a drafted query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Feedback {
    /// Draft another query
    Regenerate,
    /// Accept the draft
    Continue,
    /// The reviewer wants to add information (currently handled as accept)
    AdditionalInput,
    /// Anything else, kept verbatim
    Other(String),
}

impl Feedback {
    pub fn as_str(&self) -> &str {
        match self {
            Feedback::Regenerate => "REGENERATE",
            Feedback::Continue => "CONTINUE",
            Feedback::AdditionalInput => "ADDITIONAL_INPUT",
            Feedback::Other(raw) => raw,
        }
    }
}

/// Only the exact menu literals are recognized; anything else is kept verbatim
impl From<&str> for Feedback {
    fn from(raw: &str) -> Self {
        match raw {
            "REGENERATE" => Feedback::Regenerate,
            "CONTINUE" => Feedback::Continue,
            "ADDITIONAL_INPUT" => Feedback::AdditionalInput,
            _ => Feedback::Other(raw.to_string()),
        }
    }
}

impl From<String> for Feedback {
    fn from(raw: String) -> Self {
        Feedback::from(raw.as_str())
    }
}

impl From<Feedback> for String {
    fn from(feedback: Feedback) -> Self {
        feedback.as_str().to_string()
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state of one session
///
/// `question` is fixed at construction: no [`StateUpdate`] can carry it, so
/// steps cannot rewrite it. `messages` only grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    question: String,
    pub question_type: Option<String>,
    pub tables_list: Option<Vec<String>>,
    /// Empty list means the model identified no relevant table
    pub selected_tables: Option<Vec<String>>,
    pub generated_query: Option<String>,
    pub messages: Vec<Message>,
    pub user_feedback: Option<Feedback>,
    /// Number of drafts produced by generate_query in this session
    pub attempts: u32,
}

impl SessionState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            question_type: None,
            tables_list: None,
            selected_tables: None,
            generated_query: None,
            messages: Vec::new(),
            user_feedback: None,
            attempts: 0,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    /// Shallow merge of a step delta: set fields overwrite, messages append
    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            question_type,
            tables_list,
            selected_tables,
            generated_query,
            messages,
            user_feedback,
            attempts,
        } = update;

        if let Some(question_type) = question_type {
            self.question_type = Some(question_type);
        }
        if let Some(tables_list) = tables_list {
            self.tables_list = Some(tables_list);
        }
        if let Some(selected_tables) = selected_tables {
            self.selected_tables = Some(selected_tables);
        }
        if let Some(generated_query) = generated_query {
            self.generated_query = Some(generated_query);
        }
        if let Some(user_feedback) = user_feedback {
            self.user_feedback = Some(user_feedback);
        }
        if let Some(attempts) = attempts {
            self.attempts = attempts;
        }
        self.messages.extend(messages);
    }
}

/// Partial state returned by a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_tables: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_query: Option<String>,
    /// Appended to the message log
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

/// What a suspended run shows the reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptPayload {
    /// Instructions and the menu of accepted feedback values
    pub task: String,
    pub generated_query: String,
}

/// Result of executing one step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Merge this delta and route onwards
    Update(StateUpdate),
    /// Halt the run until resumed with an external value
    Interrupt(InterruptPayload),
}

/// Persisted snapshot of a suspended session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: SessionState,
    /// Step to re-enter on resume
    pub suspended_at: StepId,
    pub payload: InterruptPayload,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        state: SessionState,
        suspended_at: StepId,
        payload: InterruptPayload,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            state,
            suspended_at,
            payload,
            saved_at: Utc::now(),
        }
    }

    /// Whether this checkpoint has outlived `ttl` at instant `now`
    pub fn is_expired(&self, ttl: Option<chrono::Duration>, now: DateTime<Utc>) -> bool {
        ttl.map_or(false, |ttl| self.saved_at + ttl < now)
    }

    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            thread_id: self.thread_id.clone(),
            question: self.state.question().to_string(),
            suspended_at: self.suspended_at,
            saved_at: self.saved_at,
        }
    }
}

/// Listing entry for a suspended session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub thread_id: String,
    pub question: String,
    pub suspended_at: StepId,
    pub saved_at: DateTime<Utc>,
}
