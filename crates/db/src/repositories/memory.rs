use std::collections::HashMap;

use tokio::sync::RwLock;

use procurely_core::domain::approval::ApprovalRecord;
use procurely_core::domain::comparison::{Comparison, ComparisonId};

use super::{ApprovalRepository, ComparisonRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryComparisonRepository {
    comparisons: RwLock<HashMap<String, Comparison>>,
}

#[async_trait::async_trait]
impl ComparisonRepository for InMemoryComparisonRepository {
    async fn get(&self, id: &ComparisonId) -> Result<Option<Comparison>, RepositoryError> {
        let comparisons = self.comparisons.read().await;
        Ok(comparisons.get(&id.0).cloned())
    }

    async fn put(&self, comparison: Comparison) -> Result<(), RepositoryError> {
        let mut comparisons = self.comparisons.write().await;
        comparisons.insert(comparison.id.0.clone(), comparison);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Comparison>, RepositoryError> {
        let comparisons = self.comparisons.read().await;
        let mut listed: Vec<Comparison> = comparisons.values().cloned().collect();
        listed.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(listed)
    }
}

#[derive(Default)]
pub struct InMemoryApprovalRepository {
    records: RwLock<Vec<ApprovalRecord>>,
}

#[async_trait::async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn put(&self, record: ApprovalRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    async fn list_for_comparison(
        &self,
        comparison_id: &ComparisonId,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|record| &record.comparison_id == comparison_id).cloned().collect())
    }
}
