use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::approval::ApprovalDecision;
use crate::domain::boq::BoqId;
use crate::domain::quote::VendorId;
use crate::errors::DomainError;

/// Reported as the best vendor when no quotes were submitted.
pub const NO_VENDOR: &str = "N/A";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComparisonId(pub String);

impl ComparisonId {
    pub fn generate() -> Self {
        Self(format!("comp-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonStatus {
    PendingApproval,
    Approved,
    Rejected,
}

impl ComparisonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Recommended,
    Acceptable,
    FlagReview,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recommended => "RECOMMENDED",
            Self::Acceptable => "ACCEPTABLE",
            Self::FlagReview => "FLAG_REVIEW",
        }
    }
}

/// Minimum authority required to approve a purchase, ordered from least to most senior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalRoute {
    AutoApprove,
    Manager,
    Director,
    Executive,
}

impl ApprovalRoute {
    /// One tier up; `Executive` is already the ceiling.
    pub fn escalated(self) -> Self {
        match self {
            Self::AutoApprove => Self::Manager,
            Self::Manager => Self::Director,
            Self::Director | Self::Executive => Self::Executive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoApprove => "AUTO_APPROVE",
            Self::Manager => "MANAGER",
            Self::Director => "DIRECTOR",
            Self::Executive => "EXECUTIVE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorScore {
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub total_cost: Decimal,
    /// Percent deviation of `total_cost` from the BOQ total.
    pub variance: Decimal,
    pub compliance_score: Decimal,
    pub delivery_days: u32,
    /// Unbounded: may exceed 100 or drop below zero.
    pub composite_score: Decimal,
    pub recommendation: Recommendation,
    pub matched_items: usize,
    pub unmatched_items: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEvaluation {
    pub policy_checks_passed: bool,
    pub violations: Vec<String>,
    pub reasons: Vec<String>,
}

impl PolicyEvaluation {
    pub fn passed() -> Self {
        Self { policy_checks_passed: true, violations: Vec::new(), reasons: Vec::new() }
    }

    pub fn record_violation(&mut self, rule_id: impl Into<String>, reason: impl Into<String>) {
        self.violations.push(rule_id.into());
        self.reasons.push(reason.into());
        self.policy_checks_passed = false;
    }
}

/// Non-fatal conditions surfaced alongside an otherwise valid comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonWarning {
    NoQuotesReceived,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub id: ComparisonId,
    pub boq_id: BoqId,
    pub currency: String,
    pub boq_total: Decimal,
    /// Rank order, descending by composite score.
    #[serde(rename = "quotes")]
    pub vendor_scores: Vec<VendorScore>,
    pub best_vendor: String,
    pub cost_savings: Decimal,
    pub policy_evaluation: PolicyEvaluation,
    pub approval_route: ApprovalRoute,
    pub status: ComparisonStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ComparisonWarning>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl Comparison {
    pub fn winner(&self) -> Option<&VendorScore> {
        self.vendor_scores.first()
    }

    pub fn winning_cost(&self) -> Decimal {
        self.winner().map(|score| score.total_cost).unwrap_or(Decimal::ZERO)
    }

    pub fn can_transition_to(&self, next: ComparisonStatus) -> bool {
        matches!(
            (self.status, next),
            (ComparisonStatus::PendingApproval, ComparisonStatus::Approved)
                | (ComparisonStatus::PendingApproval, ComparisonStatus::Rejected)
        )
    }

    pub fn record_decision(
        &mut self,
        decision: ApprovalDecision,
        decided_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let next = decision.resulting_status();
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidComparisonTransition { from: self.status, to: next });
        }

        self.status = next;
        self.decided_at = Some(decided_at);
        Ok(())
    }
}
