/// Checkpoint persistence for suspended sessions
///
/// A checkpoint holds the full session state plus the step to re-enter on
/// resume. At most one checkpoint exists per thread id; saving overwrites.

use crate::error::StoreError;
use crate::workflow::types::{Checkpoint, CheckpointSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage backend for session checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Store a checkpoint, replacing any previous one for the same thread id
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Returns whether a checkpoint existed
    async fn delete(&self, thread_id: &str) -> Result<bool, StoreError>;

    /// All pending checkpoints, most recent first
    async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError>;

    /// Drop checkpoints saved before `cutoff`, returning how many were removed
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Process-local checkpoint store (lost on restart)
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.checkpoints.read().await.get(thread_id).cloned())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, StoreError> {
        Ok(self.checkpoints.write().await.remove(thread_id).is_some())
    }

    async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError> {
        let mut summaries: Vec<CheckpointSummary> = self
            .checkpoints
            .read()
            .await
            .values()
            .map(Checkpoint::summary)
            .collect();
        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(summaries)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut checkpoints = self.checkpoints.write().await;
        let before = checkpoints.len();
        checkpoints.retain(|_, checkpoint| checkpoint.saved_at >= cutoff);
        Ok(before - checkpoints.len())
    }
}

/// SQLite-backed checkpoint store
///
/// Checkpoints are stored as JSON with the thread id and save time pulled out
/// into indexed columns.
#[derive(Debug, Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the checkpoints table. Safe to call multiple times.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT PRIMARY KEY,
                suspended_at TEXT NOT NULL,
                checkpoint JSON NOT NULL,
                saved_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_checkpoints_saved_at
            ON checkpoints(saved_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let checkpoint_json = serde_json::to_string(checkpoint)?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, suspended_at, checkpoint, saved_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(thread_id) DO UPDATE SET
                suspended_at = excluded.suspended_at,
                checkpoint = excluded.checkpoint,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(&checkpoint.thread_id)
        .bind(checkpoint.suspended_at.as_str())
        .bind(&checkpoint_json)
        .bind(checkpoint.saved_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query("SELECT checkpoint FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let checkpoint_json: String = row.get("checkpoint");
                Ok(Some(serde_json::from_str(&checkpoint_json)?))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError> {
        let rows = sqlx::query("SELECT checkpoint FROM checkpoints ORDER BY saved_at DESC")
            .fetch_all(&self.pool)
            .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let checkpoint_json: String = row.get("checkpoint");
            let checkpoint: Checkpoint = serde_json::from_str(&checkpoint_json)?;
            summaries.push(checkpoint.summary());
        }

        Ok(summaries)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE saved_at < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{InterruptPayload, SessionState, StepId};
    use sqlx::sqlite::SqlitePoolOptions;

    fn checkpoint(thread_id: &str, age_secs: i64) -> Checkpoint {
        let mut state = SessionState::new("get all employees from India");
        state.generated_query = Some("SELECT LastName FROM Employee LIMIT 3".to_string());
        let mut checkpoint = Checkpoint::new(
            thread_id,
            state,
            StepId::HumanReview,
            InterruptPayload {
                task: "review".to_string(),
                generated_query: "SELECT LastName FROM Employee LIMIT 3".to_string(),
            },
        );
        checkpoint.saved_at = checkpoint.saved_at - chrono::Duration::seconds(age_secs);
        checkpoint
    }

    async fn sqlite_store() -> SqliteCheckpointStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteCheckpointStore::new(pool);
        store.init_schema().await.unwrap();
        store.init_schema().await.unwrap();
        store
    }

    async fn exercise_store(store: &dyn CheckpointStore) {
        assert!(store.load("t1").await.unwrap().is_none());

        let first = checkpoint("t1", 0);
        store.save(&first).await.unwrap();
        assert_eq!(store.load("t1").await.unwrap(), Some(first.clone()));

        let mut second = checkpoint("t1", 0);
        second.state.attempts = 2;
        store.save(&second).await.unwrap();
        let loaded = store.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded.state.attempts, 2);
        assert_eq!(store.list().await.unwrap().len(), 1);

        store.save(&checkpoint("stale", 600)).await.unwrap();
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].thread_id, "t1");

        let purged = store
            .purge_older_than(Utc::now() - chrono::Duration::seconds(300))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.load("stale").await.unwrap().is_none());

        assert!(store.delete("t1").await.unwrap());
        assert!(!store.delete("t1").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise_store(&MemoryCheckpointStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        exercise_store(&sqlite_store().await).await;
    }
}
