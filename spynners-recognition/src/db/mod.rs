//! Database access for the recognition service
//!
//! Only the recognition history lives locally; the track catalog is owned by
//! the platform and reached over HTTP.

pub mod history;

pub use history::{HistorySink, SqliteHistoryStore};

use spynners_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the parent directory and the database file when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create service tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recognition_history (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            result TEXT NOT NULL,
            recognized_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_recognition_history_user
            ON recognition_history (user_id, recognized_at)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (recognition_history)");

    Ok(())
}
