//! Recognition history persistence
//!
//! Append-only: records are inserted once and never updated.

use crate::models::{MatchResult, RecognitionHistoryRecord};
use async_trait::async_trait;
use chrono::SecondsFormat;
use spynners_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Destination for recognition history records
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: &RecognitionHistoryRecord) -> Result<()>;
}

/// SQLite-backed history store
///
/// Timestamps are stored as fixed-width RFC 3339 UTC so text order is time order.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records of one user, newest first
    pub async fn list_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<RecognitionHistoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, result, recognized_at
            FROM recognition_history
            WHERE user_id = ?
            ORDER BY recognized_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let id = Uuid::parse_str(&id)
                    .map_err(|e| Error::Internal(format!("Failed to parse history id: {}", e)))?;

                let result: String = row.get("result");
                let result: MatchResult = serde_json::from_str(&result)
                    .map_err(|e| Error::Internal(format!("Failed to deserialize result: {}", e)))?;

                let recognized_at: String = row.get("recognized_at");
                let timestamp = chrono::DateTime::parse_from_rfc3339(&recognized_at)
                    .map_err(|e| Error::Internal(format!("Failed to parse recognized_at: {}", e)))?
                    .with_timezone(&chrono::Utc);

                Ok(RecognitionHistoryRecord {
                    id,
                    user_id: row.get("user_id"),
                    result,
                    timestamp,
                })
            })
            .collect()
    }
}

#[async_trait]
impl HistorySink for SqliteHistoryStore {
    async fn record(&self, entry: &RecognitionHistoryRecord) -> Result<()> {
        let result = serde_json::to_string(&entry.result)
            .map_err(|e| Error::Internal(format!("Failed to serialize result: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO recognition_history (id, user_id, result, recognized_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.user_id)
        .bind(result)
        .bind(entry.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
