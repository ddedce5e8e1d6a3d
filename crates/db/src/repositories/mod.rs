use async_trait::async_trait;
use thiserror::Error;

use procurely_core::domain::approval::ApprovalRecord;
use procurely_core::domain::comparison::{Comparison, ComparisonId};

pub mod approval;
pub mod comparison;
pub mod memory;

pub use approval::SqlApprovalRepository;
pub use comparison::SqlComparisonRepository;
pub use memory::{InMemoryApprovalRepository, InMemoryComparisonRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
}

/// Keyed storage for comparison results. `put` replaces any stored value with the same id.
#[async_trait]
pub trait ComparisonRepository: Send + Sync {
    async fn get(&self, id: &ComparisonId) -> Result<Option<Comparison>, RepositoryError>;
    async fn put(&self, comparison: Comparison) -> Result<(), RepositoryError>;
    /// Oldest first.
    async fn list(&self) -> Result<Vec<Comparison>, RepositoryError>;
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn put(&self, record: ApprovalRecord) -> Result<(), RepositoryError>;
    async fn list_for_comparison(
        &self,
        comparison_id: &ComparisonId,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError>;
}

pub(crate) fn encode_payload<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|error| RepositoryError::Encode(error.to_string()))
}

pub(crate) fn decode_payload<T: serde::de::DeserializeOwned>(
    payload: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(payload).map_err(|error| RepositoryError::Decode(error.to_string()))
}
