/// Language model collaborator
///
/// Steps talk to the model through the `LlmProvider` trait only; the
/// OpenAI-compatible HTTP provider is the production implementation

mod openai;
mod provider;
mod types;

pub use openai::OpenAiProvider;
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{CompletionResponse, Message, MessageRole};
