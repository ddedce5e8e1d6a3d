use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::comparison::{ApprovalRoute, Comparison, ComparisonStatus};

/// Aggregate throughput figures over a set of stored comparisons.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    pub total_processed: usize,
    pub auto_approved_count: usize,
    pub escalated_count: usize,
    /// Share of comparisons routed to `AUTO_APPROVE`, in percent.
    pub stp_rate: Decimal,
    pub pending_count: usize,
    pub approved_count: usize,
    pub rejected_count: usize,
    pub total_cost_savings: Decimal,
    /// Mean winning-vendor variance; comparisons without bids are excluded.
    pub avg_cost_variance: Decimal,
}

impl KpiSnapshot {
    pub fn from_comparisons(comparisons: &[Comparison]) -> Self {
        let mut snapshot = Self { total_processed: comparisons.len(), ..Self::default() };
        let mut variance_sum = Decimal::ZERO;
        let mut variance_samples = 0u32;

        for comparison in comparisons {
            if comparison.approval_route == ApprovalRoute::AutoApprove {
                snapshot.auto_approved_count += 1;
            } else {
                snapshot.escalated_count += 1;
            }

            match comparison.status {
                ComparisonStatus::PendingApproval => snapshot.pending_count += 1,
                ComparisonStatus::Approved => snapshot.approved_count += 1,
                ComparisonStatus::Rejected => snapshot.rejected_count += 1,
            }

            // saturating: stored totals are unbounded
            snapshot.total_cost_savings =
                snapshot.total_cost_savings.saturating_add(comparison.cost_savings);
            if let Some(winner) = comparison.winner() {
                variance_sum = variance_sum.saturating_add(winner.variance);
                variance_samples += 1;
            }
        }

        if snapshot.total_processed > 0 {
            snapshot.stp_rate = (Decimal::from(snapshot.auto_approved_count as u64)
                * Decimal::ONE_HUNDRED
                / Decimal::from(snapshot.total_processed as u64))
            .round_dp(2);
        }
        if variance_samples > 0 {
            snapshot.avg_cost_variance = (variance_sum / Decimal::from(variance_samples)).round_dp(2);
        }

        snapshot
    }
}
