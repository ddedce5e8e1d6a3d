use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::comparison::PolicyEvaluation;
use crate::errors::ComparisonError;

pub const COST_CEILING_EXCEEDED: &str = "COST_CEILING_EXCEEDED";
pub const INSUFFICIENT_QUOTES: &str = "INSUFFICIENT_QUOTES";
pub const VARIANCE_LIMIT_EXCEEDED: &str = "VARIANCE_LIMIT_EXCEEDED";
pub const UNMATCHED_ITEMS_EXCEEDED: &str = "UNMATCHED_ITEMS_EXCEEDED";

/// Aggregate facts about a comparison, taken from the winning vendor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolicyFacts {
    pub winning_cost: Decimal,
    pub quote_count: usize,
    pub unmatched_count: usize,
    pub variance_pct: Decimal,
}

/// Rule thresholds as supplied by configuration. A missing entry is reported when
/// the evaluator runs, not when the value is loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyThresholds {
    pub cost_ceiling: Option<Decimal>,
    pub min_quotes: Option<usize>,
    pub max_variance_pct: Option<Decimal>,
    pub max_unmatched: Option<usize>,
}

impl PolicyThresholds {
    pub fn standard() -> Self {
        Self {
            cost_ceiling: Some(Decimal::from(100_000)),
            min_quotes: Some(3),
            max_variance_pct: Some(Decimal::from(10)),
            max_unmatched: Some(0),
        }
    }
}

pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(&self, facts: &PolicyFacts) -> Result<PolicyEvaluation, ComparisonError>;
}

#[derive(Clone, Debug)]
pub struct ThresholdPolicyEvaluator {
    thresholds: PolicyThresholds,
}

impl ThresholdPolicyEvaluator {
    pub fn new(thresholds: PolicyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PolicyThresholds {
        &self.thresholds
    }
}

impl Default for ThresholdPolicyEvaluator {
    fn default() -> Self {
        Self::new(PolicyThresholds::standard())
    }
}

impl PolicyEvaluator for ThresholdPolicyEvaluator {
    fn evaluate(&self, facts: &PolicyFacts) -> Result<PolicyEvaluation, ComparisonError> {
        evaluate_policy(&self.thresholds, facts)
    }
}

/// Checks every rule in a fixed order; all failures are reported together.
pub fn evaluate_policy(
    thresholds: &PolicyThresholds,
    facts: &PolicyFacts,
) -> Result<PolicyEvaluation, ComparisonError> {
    let cost_ceiling = required(thresholds.cost_ceiling, "cost_ceiling")?;
    let min_quotes = required(thresholds.min_quotes, "min_quotes")?;
    let max_variance_pct = required(thresholds.max_variance_pct, "max_variance_pct")?;
    let max_unmatched = required(thresholds.max_unmatched, "max_unmatched")?;

    let mut evaluation = PolicyEvaluation::passed();

    if facts.winning_cost > cost_ceiling {
        evaluation.record_violation(
            COST_CEILING_EXCEEDED,
            format!("Winning cost {} exceeds ceiling {}", facts.winning_cost, cost_ceiling),
        );
    }

    if facts.quote_count < min_quotes {
        evaluation.record_violation(
            INSUFFICIENT_QUOTES,
            format!("Received {} quotes; at least {} required", facts.quote_count, min_quotes),
        );
    }

    if facts.variance_pct.abs() > max_variance_pct {
        evaluation.record_violation(
            VARIANCE_LIMIT_EXCEEDED,
            format!(
                "Cost variance {}% exceeds limit {}%",
                facts.variance_pct.round_dp(2),
                max_variance_pct
            ),
        );
    }

    if facts.unmatched_count > max_unmatched {
        evaluation.record_violation(
            UNMATCHED_ITEMS_EXCEEDED,
            format!("{} unmatched items; at most {} allowed", facts.unmatched_count, max_unmatched),
        );
    }

    Ok(evaluation)
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, ComparisonError> {
    value.ok_or_else(|| ComparisonError::Configuration(format!("policy threshold `{name}` is required")))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        evaluate_policy, PolicyEvaluator, PolicyFacts, PolicyThresholds, ThresholdPolicyEvaluator,
        COST_CEILING_EXCEEDED, INSUFFICIENT_QUOTES, UNMATCHED_ITEMS_EXCEEDED,
        VARIANCE_LIMIT_EXCEEDED,
    };
    use crate::errors::ComparisonError;

    fn clean_facts() -> PolicyFacts {
        PolicyFacts {
            winning_cost: Decimal::from(32_000),
            quote_count: 3,
            unmatched_count: 0,
            variance_pct: Decimal::new(-78, 2),
        }
    }

    #[test]
    fn clean_facts_pass_every_rule() {
        let evaluation =
            ThresholdPolicyEvaluator::default().evaluate(&clean_facts()).expect("evaluation");

        assert!(evaluation.policy_checks_passed);
        assert!(evaluation.violations.is_empty());
        assert!(evaluation.reasons.is_empty());
    }

    #[test]
    fn reports_every_failing_rule_in_fixed_order() {
        let facts = PolicyFacts {
            winning_cost: Decimal::from(150_000),
            quote_count: 1,
            unmatched_count: 2,
            variance_pct: Decimal::from(25),
        };

        let evaluation = ThresholdPolicyEvaluator::default().evaluate(&facts).expect("evaluation");

        assert!(!evaluation.policy_checks_passed);
        assert_eq!(
            evaluation.violations,
            vec![
                COST_CEILING_EXCEEDED.to_string(),
                INSUFFICIENT_QUOTES.to_string(),
                VARIANCE_LIMIT_EXCEEDED.to_string(),
                UNMATCHED_ITEMS_EXCEEDED.to_string(),
            ]
        );
        assert_eq!(evaluation.reasons.len(), 4);
    }

    #[test]
    fn negative_variance_is_judged_by_magnitude() {
        let facts = PolicyFacts { variance_pct: Decimal::from(-12), ..clean_facts() };

        let evaluation = ThresholdPolicyEvaluator::default().evaluate(&facts).expect("evaluation");

        assert_eq!(evaluation.violations, vec![VARIANCE_LIMIT_EXCEEDED.to_string()]);
    }

    #[test]
    fn thresholds_are_inclusive_limits() {
        let facts = PolicyFacts {
            winning_cost: Decimal::from(100_000),
            quote_count: 3,
            unmatched_count: 0,
            variance_pct: Decimal::from(10),
        };

        let evaluation = ThresholdPolicyEvaluator::default().evaluate(&facts).expect("evaluation");

        assert!(evaluation.policy_checks_passed);
    }

    #[test]
    fn adding_a_violation_never_restores_a_pass() {
        let facts = PolicyFacts { quote_count: 2, ..clean_facts() };
        let mut evaluation =
            ThresholdPolicyEvaluator::default().evaluate(&facts).expect("evaluation");
        assert!(!evaluation.policy_checks_passed);

        evaluation.record_violation(COST_CEILING_EXCEEDED, "manual");
        assert!(!evaluation.policy_checks_passed);
        assert_eq!(evaluation.violations.len(), 2);
    }

    #[test]
    fn missing_threshold_is_a_configuration_error() {
        let thresholds = PolicyThresholds { max_unmatched: None, ..PolicyThresholds::standard() };

        let error = evaluate_policy(&thresholds, &clean_facts()).expect_err("must fail");

        assert_eq!(
            error,
            ComparisonError::Configuration("policy threshold `max_unmatched` is required".to_string())
        );
    }
}
