use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::comparison::{ComparisonId, ComparisonStatus};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

impl ApprovalId {
    pub fn generate() -> Self {
        Self(format!("approval-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl ApprovalDecision {
    pub fn resulting_status(self) -> ComparisonStatus {
        match self {
            Self::Approved => ComparisonStatus::Approved,
            Self::Rejected => ComparisonStatus::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSubmission {
    pub comparison_id: ComparisonId,
    pub decision: ApprovalDecision,
    #[serde(default)]
    pub approver_role: Option<String>,
    #[serde(default)]
    pub approver_email: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub po_number: String,
    pub comparison_id: ComparisonId,
    pub vendor_name: String,
    pub amount: Decimal,
    pub currency: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    pub id: ApprovalId,
    pub comparison_id: ComparisonId,
    pub decision: ApprovalDecision,
    pub approver_role: Option<String>,
    pub approver_email: Option<String>,
    pub comment: Option<String>,
    pub next_step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_order: Option<PurchaseOrder>,
    pub decided_at: DateTime<Utc>,
}
