/// Runtime Execution Engine
///
/// This module runs sessions through the compiled SQL review graph.
/// It handles:
/// - Step dispatch against the model and database collaborators
/// - Lazy, one-step-per-tick runs with merge-then-route semantics
/// - Suspension checkpoints and resume
/// - Background expiry of abandoned checkpoints

// Graph executor with suspend/resume
pub mod engine;

// Step handlers, routers and graph wiring
pub mod executor;

// Cron sweeper for expired checkpoints
pub mod scheduler;

// Re-export main types
pub use engine::{Run, RunEvent, RunOutcome, WorkflowEngine};
pub use executor::{sql_review_graph, StepExecutor, StepHandler};
pub use scheduler::CheckpointSweeper;
