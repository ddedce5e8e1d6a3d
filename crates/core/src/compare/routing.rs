use rust_decimal::Decimal;

use crate::domain::comparison::ApprovalRoute;
use crate::errors::ComparisonError;

pub trait ApprovalRouter: Send + Sync {
    fn route(&self, winning_cost: Decimal, policy_violated: bool) -> ApprovalRoute;
}

/// Routes on three ascending cost boundaries: below the first is auto-approved,
/// below the second needs a manager, below the third a director, anything else an
/// executive. A policy violation raises the result by one tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TieredApprovalRouter {
    thresholds: [Decimal; 3],
}

impl TieredApprovalRouter {
    pub fn new(thresholds: &[Decimal]) -> Result<Self, ComparisonError> {
        let thresholds: [Decimal; 3] = thresholds.try_into().map_err(|_| {
            ComparisonError::Configuration(format!(
                "approval routing needs exactly 3 tier thresholds, got {}",
                thresholds.len()
            ))
        })?;

        if thresholds[0] <= Decimal::ZERO {
            return Err(ComparisonError::Configuration(
                "approval tier thresholds must be positive".to_string(),
            ));
        }
        if thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ComparisonError::Configuration(
                "approval tier thresholds must be strictly ascending".to_string(),
            ));
        }

        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &[Decimal; 3] {
        &self.thresholds
    }

    fn cost_route(&self, winning_cost: Decimal) -> ApprovalRoute {
        let [auto_limit, manager_limit, director_limit] = self.thresholds;
        if winning_cost < auto_limit {
            ApprovalRoute::AutoApprove
        } else if winning_cost < manager_limit {
            ApprovalRoute::Manager
        } else if winning_cost < director_limit {
            ApprovalRoute::Director
        } else {
            ApprovalRoute::Executive
        }
    }
}

impl Default for TieredApprovalRouter {
    fn default() -> Self {
        Self { thresholds: [Decimal::from(10_000), Decimal::from(50_000), Decimal::from(250_000)] }
    }
}

impl ApprovalRouter for TieredApprovalRouter {
    fn route(&self, winning_cost: Decimal, policy_violated: bool) -> ApprovalRoute {
        let route = self.cost_route(winning_cost);
        if policy_violated {
            route.escalated()
        } else {
            route
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ApprovalRouter, TieredApprovalRouter};
    use crate::domain::comparison::ApprovalRoute;
    use crate::errors::ComparisonError;

    #[test]
    fn routes_by_cost_tier_without_violations() {
        let router = TieredApprovalRouter::default();

        assert_eq!(router.route(Decimal::from(9_999), false), ApprovalRoute::AutoApprove);
        assert_eq!(router.route(Decimal::from(10_000), false), ApprovalRoute::Manager);
        assert_eq!(router.route(Decimal::from(49_999), false), ApprovalRoute::Manager);
        assert_eq!(router.route(Decimal::from(50_000), false), ApprovalRoute::Director);
        assert_eq!(router.route(Decimal::from(250_000), false), ApprovalRoute::Executive);
    }

    #[test]
    fn violation_never_routes_to_auto_approve() {
        let router = TieredApprovalRouter::default();

        for cost in [0, 1, 5_000, 9_999, 10_000, 60_000, 1_000_000] {
            let route = router.route(Decimal::from(cost), true);
            assert_ne!(route, ApprovalRoute::AutoApprove, "cost {cost}");
            assert!(route >= router.route(Decimal::from(cost), false));
        }
    }

    #[test]
    fn cost_ceiling_breach_escalates_one_tier_above_cost_route() {
        let router = TieredApprovalRouter::default();
        let cost = Decimal::from(120_000);

        assert_eq!(router.route(cost, false), ApprovalRoute::Director);
        assert_eq!(router.route(cost, true), ApprovalRoute::Executive);
    }

    #[test]
    fn rejects_malformed_thresholds() {
        let too_few = TieredApprovalRouter::new(&[Decimal::from(10)]);
        assert!(matches!(too_few, Err(ComparisonError::Configuration(_))));

        let descending = TieredApprovalRouter::new(&[
            Decimal::from(50_000),
            Decimal::from(10_000),
            Decimal::from(250_000),
        ]);
        assert!(matches!(descending, Err(ComparisonError::Configuration(_))));

        let custom = TieredApprovalRouter::new(&[
            Decimal::from(1_000),
            Decimal::from(5_000),
            Decimal::from(20_000),
        ])
        .expect("valid thresholds");
        assert_eq!(custom.route(Decimal::from(4_000), false), ApprovalRoute::Manager);
    }
}
