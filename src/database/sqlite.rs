/// SQLite database collaborator
///
/// Opens the target database read-only and describes tables the way a schema
/// lookup tool would: the CREATE TABLE statement followed by a few sample rows.

use crate::database::{DatabaseError, SqlDatabase};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow},
    Column, Row,
};
use std::path::Path;

/// Read-only SQLite database with a cached connection pool
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
    /// Rows included in each table description
    sample_rows: usize,
}

impl SqliteDatabase {
    /// Wrap an existing pool
    pub fn new(pool: SqlitePool, sample_rows: usize) -> Self {
        Self { pool, sample_rows }
    }

    /// Open a database file read-only
    ///
    /// The file must already exist; the assistant never creates or mutates it.
    pub async fn open(path: impl AsRef<Path>, sample_rows: usize) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        tracing::info!("🗄️ Opening database read-only: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);
        let pool = SqlitePool::connect_with(options).await?;

        Ok(Self::new(pool, sample_rows))
    }

    /// Resolve a caller-supplied name against the real table list.
    /// Only names coming back from here are ever interpolated into SQL.
    async fn resolve_table(&self, table: &str) -> Result<String, DatabaseError> {
        self.list_table_names()
            .await?
            .into_iter()
            .find(|name| name.eq_ignore_ascii_case(table.trim()))
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))
    }

    async fn sample_rows_block(&self, table: &str) -> Result<String, DatabaseError> {
        let query = format!(
            "SELECT * FROM \"{}\" LIMIT {}",
            table.replace('"', "\"\""),
            self.sample_rows
        );
        tracing::debug!("📝 Sample query: {}", query);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut lines = Vec::with_capacity(rows.len() + 1);
        if let Some(first) = rows.first() {
            let header: Vec<&str> = first.columns().iter().map(|c| c.name()).collect();
            lines.push(header.join("\t"));
        }
        for row in &rows {
            let cells: Vec<String> = (0..row.columns().len())
                .map(|i| cell_to_string(row, i))
                .collect();
            lines.push(cells.join("\t"));
        }

        Ok(format!(
            "/*\n{} rows from {} table:\n{}\n*/",
            rows.len(),
            table,
            lines.join("\n")
        ))
    }
}

/// Render one cell as text, whatever its storage class
fn cell_to_string(row: &SqliteRow, index: usize) -> String {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map_or_else(|| "NULL".to_string(), |v| v.to_string());
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.unwrap_or_else(|| "NULL".to_string());
    }
    "<blob>".to_string()
}

#[async_trait]
impl SqlDatabase for SqliteDatabase {
    async fn list_table_names(&self) -> Result<Vec<String>, DatabaseError> {
        let rows = sqlx::query(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }

    async fn get_schema(&self, table: &str) -> Result<String, DatabaseError> {
        let table = self.resolve_table(table).await?;

        let create_sql: String =
            sqlx::query("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(&table)
                .fetch_one(&self.pool)
                .await?
                .get("sql");

        if self.sample_rows == 0 {
            return Ok(create_sql);
        }

        let samples = self.sample_rows_block(&table).await?;
        Ok(format!("{}\n\n{}", create_sql.trim(), samples))
    }
}
