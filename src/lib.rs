/// sqlpilot: human-reviewed natural-language to SQL assistant
///
/// This library provides a small graph workflow engine that turns a question
/// into a SQL draft through a fixed chain of model and database steps, then
/// suspends for human review and resumes from a checkpoint.

// Core configuration and setup
pub mod config;

// Error taxonomy shared by the engine and its collaborators
pub mod error;

// Language model collaborator (OpenAI-compatible chat completions)
pub mod llm;

// Database collaborator (read-only SQLite)
pub mod database;

// Workflow management layer - state, graph definition, checkpoints, prompts
pub mod workflow;

// Runtime execution engine - steps, routers, suspend/resume, sweeper
pub mod runtime;

// HTTP API layer - session endpoints
pub mod api;

// Server setup and initialization
pub mod server;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for external consumers
pub use error::WorkflowError;
pub use runtime::{Run, RunEvent, RunOutcome, WorkflowEngine};
pub use server::start_server;
pub use workflow::{Feedback, SessionState, StepId};
