use chrono::SecondsFormat;
use sqlx::Row;

use procurely_core::domain::approval::ApprovalRecord;
use procurely_core::domain::comparison::ComparisonId;

use super::{decode_payload, encode_payload, ApprovalRepository, RepositoryError};
use crate::DbPool;

pub struct SqlApprovalRepository {
    pool: DbPool,
}

impl SqlApprovalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalRecord, RepositoryError> {
    let payload: String =
        row.try_get("payload").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    decode_payload(&payload)
}

#[async_trait::async_trait]
impl ApprovalRepository for SqlApprovalRepository {
    async fn put(&self, record: ApprovalRecord) -> Result<(), RepositoryError> {
        let payload = encode_payload(&record)?;

        sqlx::query(
            "INSERT INTO approval_record (id, comparison_id, decision, payload, decided_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 decision = excluded.decision,
                 payload = excluded.payload,
                 decided_at = excluded.decided_at",
        )
        .bind(&record.id.0)
        .bind(&record.comparison_id.0)
        .bind(record.decision.as_str())
        .bind(payload)
        .bind(record.decided_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_comparison(
        &self,
        comparison_id: &ComparisonId,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT payload FROM approval_record
             WHERE comparison_id = ?
             ORDER BY decided_at ASC, id ASC",
        )
        .bind(&comparison_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use procurely_core::domain::approval::{
        ApprovalDecision, ApprovalId, ApprovalRecord, PurchaseOrder,
    };
    use procurely_core::domain::boq::BoqId;
    use procurely_core::domain::comparison::{
        ApprovalRoute, Comparison, ComparisonId, ComparisonStatus, PolicyEvaluation, NO_VENDOR,
    };

    use super::SqlApprovalRepository;
    use crate::repositories::{
        ApprovalRepository, ComparisonRepository, RepositoryError, SqlComparisonRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    /// Insert a parent comparison so that FK constraints are satisfied.
    async fn insert_comparison(pool: &sqlx::SqlitePool, id: &str) {
        let repo = SqlComparisonRepository::new(pool.clone());
        repo.put(Comparison {
            id: ComparisonId(id.to_string()),
            boq_id: BoqId("boq-1".to_string()),
            currency: "USD".to_string(),
            boq_total: Decimal::from(5_000),
            vendor_scores: Vec::new(),
            best_vendor: NO_VENDOR.to_string(),
            cost_savings: Decimal::from(5_000),
            policy_evaluation: PolicyEvaluation::passed(),
            approval_route: ApprovalRoute::Manager,
            status: ComparisonStatus::PendingApproval,
            warnings: Vec::new(),
            created_at: Utc::now(),
            decided_at: None,
        })
        .await
        .expect("insert parent comparison");
    }

    fn sample_record(id: &str, comparison_id: &str) -> ApprovalRecord {
        let now = Utc::now();
        ApprovalRecord {
            id: ApprovalId(id.to_string()),
            comparison_id: ComparisonId(comparison_id.to_string()),
            decision: ApprovalDecision::Approved,
            approver_role: Some("manager".to_string()),
            approver_email: Some("buyer@example.com".to_string()),
            comment: Some("within budget".to_string()),
            next_step: "Purchase order PO-1001 created".to_string(),
            purchase_order: Some(PurchaseOrder {
                po_number: "PO-1001".to_string(),
                comparison_id: ComparisonId(comparison_id.to_string()),
                vendor_name: "Best Supply Co.".to_string(),
                amount: Decimal::new(3_243_850, 2),
                currency: "USD".to_string(),
                issued_at: now,
            }),
            decided_at: now,
        }
    }

    #[tokio::test]
    async fn put_and_list_for_comparison() {
        let pool = setup().await;
        insert_comparison(&pool, "comp-100").await;
        insert_comparison(&pool, "comp-200").await;

        let repo = SqlApprovalRepository::new(pool);
        let first = sample_record("approval-1", "comp-100");
        repo.put(first.clone()).await.expect("save 1");
        repo.put(sample_record("approval-2", "comp-200")).await.expect("save 2");

        let records = repo
            .list_for_comparison(&ComparisonId("comp-100".to_string()))
            .await
            .expect("list");
        assert_eq!(records, vec![first]);
    }

    #[tokio::test]
    async fn record_for_unknown_comparison_is_rejected_by_foreign_key() {
        let pool = setup().await;
        let repo = SqlApprovalRepository::new(pool);

        let error = repo
            .put(sample_record("approval-1", "comp-missing"))
            .await
            .expect_err("fk violation");
        assert!(matches!(error, RepositoryError::Database(_)));
    }
}
