use chrono::{SecondsFormat, Utc};
use sqlx::Row;

use procurely_core::domain::comparison::{Comparison, ComparisonId};

use super::{decode_payload, encode_payload, ComparisonRepository, RepositoryError};
use crate::DbPool;

/// Stores each comparison as a JSON payload, with status, route and creation time
/// lifted into columns for filtering.
pub struct SqlComparisonRepository {
    pool: DbPool,
}

impl SqlComparisonRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_comparison(row: &sqlx::sqlite::SqliteRow) -> Result<Comparison, RepositoryError> {
    let payload: String =
        row.try_get("payload").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    decode_payload(&payload)
}

#[async_trait::async_trait]
impl ComparisonRepository for SqlComparisonRepository {
    async fn get(&self, id: &ComparisonId) -> Result<Option<Comparison>, RepositoryError> {
        let row = sqlx::query("SELECT payload FROM comparison WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_comparison(r)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, comparison: Comparison) -> Result<(), RepositoryError> {
        let payload = encode_payload(&comparison)?;
        let created_at = comparison.created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            "INSERT INTO comparison (id, boq_id, status, approval_route, best_vendor, payload,
                                     created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 approval_route = excluded.approval_route,
                 best_vendor = excluded.best_vendor,
                 payload = excluded.payload,
                 updated_at = excluded.updated_at",
        )
        .bind(&comparison.id.0)
        .bind(&comparison.boq_id.0)
        .bind(comparison.status.as_str())
        .bind(comparison.approval_route.as_str())
        .bind(&comparison.best_vendor)
        .bind(payload)
        .bind(created_at)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Comparison>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query("SELECT payload FROM comparison ORDER BY created_at ASC, id ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_comparison).collect::<Result<Vec<_>, _>>()
    }
}
