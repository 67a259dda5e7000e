/// Error taxonomy for the workflow engine
///
/// Every failure surfaces to the caller of `run`/`resume` unchanged: the engine
/// neither retries nor rolls back.

use crate::database::DatabaseError;
use crate::llm::LlmError;
use crate::workflow::types::StepId;
use thiserror::Error;

/// A model or database call failed
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("database call failed: {0}")]
    Database(#[from] DatabaseError),
}

/// Checkpoint persistence failed
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("checkpoint storage failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("checkpoint encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Errors returned by the workflow engine
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("no suspended session for thread '{0}'")]
    UnknownSession(String),

    /// A step or router found the state in a shape the graph wiring should
    /// have made impossible.
    #[error("malformed state: {0}")]
    MalformedState(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Shorthand for a step that found a required field unset
    pub fn missing_field(step: StepId, field: &str) -> Self {
        Self::MalformedState(format!("step '{}' requires '{}' to be set", step, field))
    }
}

impl From<LlmError> for WorkflowError {
    fn from(err: LlmError) -> Self {
        Self::Collaborator(CollaboratorError::Model(err))
    }
}

impl From<DatabaseError> for WorkflowError {
    fn from(err: DatabaseError) -> Self {
        Self::Collaborator(CollaboratorError::Database(err))
    }
}

/// Wiring errors detected while compiling a workflow graph
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph has no entry step")]
    MissingEntry,

    #[error("step '{0}' is registered twice")]
    DuplicateStep(StepId),

    #[error("edge references unregistered step '{0}'")]
    UnknownStep(StepId),

    #[error("step '{0}' has no outgoing edge")]
    MissingEdge(StepId),

    #[error("step '{0}' already has an outgoing edge")]
    DuplicateEdge(StepId),

    #[error("step '{0}' is unreachable from the entry step")]
    Unreachable(StepId),

    #[error("no path from the entry step reaches the end")]
    NoTermination,
}
