/// HTTP API Layer
///
/// This module provides the REST endpoints that drive sessions:
/// - Starting a session from a question
/// - Resuming a suspended session with reviewer feedback
/// - Inspecting and discarding pending checkpoints

// Session endpoints
pub mod sessions;

// Re-export router builder
pub use sessions::{create_session_routes, SessionAppState};
