/// Database collaborator
///
/// The workflow only ever reads table names and table descriptions; it never
/// executes the SQL it drafts.

// Read-only SQLite implementation backed by sqlx
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

pub use sqlite::SqliteDatabase;

/// Errors raised by a database collaborator
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

/// Read-only view of the database the assistant writes queries for
#[async_trait]
pub trait SqlDatabase: Send + Sync {
    /// Names of the user tables, in a stable order
    async fn list_table_names(&self) -> Result<Vec<String>, DatabaseError>;

    /// Human/model readable description of one table's structure
    async fn get_schema(&self, table: &str) -> Result<String, DatabaseError>;
}
