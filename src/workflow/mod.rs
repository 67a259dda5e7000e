/// Workflow Management Layer
///
/// This module holds everything that describes a workflow rather than runs it:
/// - Type definitions (session state, step ids, deltas, checkpoints)
/// - Graph definition and petgraph-backed validation
/// - Checkpoint persistence (in memory or SQLite)
/// - Prompt templates used by the steps

// Core workflow type definitions
pub mod types;

// Graph builder and compiled graph
pub mod graph;

// Checkpoint stores for suspended sessions
pub mod storage;

// Prompt templates
pub mod prompts;

// Re-export commonly used types
pub use graph::{CompiledGraph, GraphBuilder, Router};
pub use storage::{CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};
pub use types::{
    Checkpoint, CheckpointSummary, Feedback, InterruptPayload, Next, SessionState, StateUpdate,
    StepId, StepOutcome,
};
