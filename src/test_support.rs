/// In-process collaborators for unit tests

use crate::database::{DatabaseError, SqlDatabase};
use crate::llm::{CompletionOptions, CompletionResponse, LlmError, LlmProvider, Message};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Model that answers from a fixed script and records every prompt
///
/// Once the script runs out each call fails with a connection error.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(reply.to_string());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);

        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => Ok(CompletionResponse {
                message: Message::assistant(reply),
            }),
            None => Err(LlmError::Connection("script exhausted".to_string())),
        }
    }
}

/// Fixed catalog of tables with one-line schemas
pub struct StaticDatabase {
    tables: Vec<String>,
}

impl StaticDatabase {
    pub fn demo() -> Self {
        Self {
            tables: vec!["Album".to_string(), "Employee".to_string(), "Invoice".to_string()],
        }
    }
}

#[async_trait]
impl SqlDatabase for StaticDatabase {
    async fn list_table_names(&self) -> Result<Vec<String>, DatabaseError> {
        Ok(self.tables.clone())
    }

    async fn get_schema(&self, table: &str) -> Result<String, DatabaseError> {
        if self.tables.iter().any(|t| t == table) {
            Ok(format!("CREATE TABLE {} (Id INTEGER PRIMARY KEY, Name TEXT)", table))
        } else {
            Err(DatabaseError::UnknownTable(table.to_string()))
        }
    }
}
