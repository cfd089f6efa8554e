//! SQLite-backed employee sheet.
//!
//! Rows keep the canonical draft as JSON; each dialect converts on the way in
//! and out. Ids come from `AUTOINCREMENT`, so a deleted id is never handed out
//! again.

use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::errors::AppError;
use crate::models::{EmployeeDraft, EmployeeId, EmployeeRecord};

/// Open (creating if needed) the sheet database and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Row storage for the stub sheet.
#[derive(Clone)]
pub struct SheetStore {
    pool: SqlitePool,
}

impl SheetStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All rows in insertion order.
    pub async fn list(&self) -> Result<Vec<EmployeeRecord>, AppError> {
        let rows = sqlx::query("SELECT id, payload FROM employees ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn get(&self, id: EmployeeId) -> Result<Option<EmployeeRecord>, AppError> {
        let row = sqlx::query("SELECT id, payload FROM employees WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Append a row and return it with its new id.
    pub async fn insert(&self, draft: &EmployeeDraft) -> Result<EmployeeRecord, AppError> {
        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(draft)?;

        let result = sqlx::query(
            "INSERT INTO employees (payload, created_at, updated_at) VALUES (?, ?, ?)",
        )
        .bind(&payload)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = EmployeeId(result.last_insert_rowid());
        tracing::debug!("Inserted sheet row {}", id);
        Ok(EmployeeRecord::from_draft(id, draft.clone()))
    }

    /// Overwrite a whole row. Last write wins.
    pub async fn replace(
        &self,
        id: EmployeeId,
        draft: &EmployeeDraft,
    ) -> Result<EmployeeRecord, AppError> {
        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(draft)?;

        let result = sqlx::query("UPDATE employees SET payload = ?, updated_at = ? WHERE id = ?")
            .bind(&payload)
            .bind(&now)
            .bind(id.get())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Employee {} not found", id)));
        }

        tracing::debug!("Replaced sheet row {}", id);
        Ok(EmployeeRecord::from_draft(id, draft.clone()))
    }

    pub async fn delete(&self, id: EmployeeId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Employee {} not found", id)));
        }

        tracing::debug!("Deleted sheet row {}", id);
        Ok(())
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<EmployeeRecord, AppError> {
    let id: i64 = row.get("id");
    let payload: String = row.get("payload");
    let draft: EmployeeDraft = serde_json::from_str(&payload)
        .map_err(|e| AppError::Internal(format!("Corrupt sheet row {}: {}", id, e)))?;
    Ok(EmployeeRecord::from_draft(EmployeeId(id), draft))
}
