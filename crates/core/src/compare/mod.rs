pub mod matching;
pub mod policy;
pub mod routing;
pub mod scoring;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::config::PolicyConfig;
use crate::domain::boq::Boq;
use crate::domain::comparison::{
    Comparison, ComparisonId, ComparisonStatus, ComparisonWarning, VendorScore, NO_VENDOR,
};
use crate::domain::quote::Quote;
use crate::errors::ComparisonError;

use self::{
    matching::{ItemMatcher, SkuItemMatcher},
    policy::{PolicyEvaluator, PolicyFacts, ThresholdPolicyEvaluator},
    routing::{ApprovalRouter, TieredApprovalRouter},
    scoring::{variance_pct, VendorScorer, WeightedVendorScorer},
};

pub trait ComparisonRuntime: Send + Sync {
    fn compare_at(
        &self,
        boq: &Boq,
        quotes: &[Quote],
        id: ComparisonId,
        created_at: DateTime<Utc>,
    ) -> Result<Comparison, ComparisonError>;

    fn compare(&self, boq: &Boq, quotes: &[Quote]) -> Result<Comparison, ComparisonError> {
        self.compare_at(boq, quotes, ComparisonId::generate(), Utc::now())
    }
}

/// Composes matching, scoring, policy and routing into one comparison per BOQ.
pub struct ComparisonEngine<M, S, P, R> {
    matcher: M,
    scorer: S,
    policy: P,
    router: R,
}

pub type DefaultComparisonEngine = ComparisonEngine<
    SkuItemMatcher,
    WeightedVendorScorer,
    ThresholdPolicyEvaluator,
    TieredApprovalRouter,
>;

impl<M, S, P, R> ComparisonEngine<M, S, P, R> {
    pub fn new(matcher: M, scorer: S, policy: P, router: R) -> Self {
        Self { matcher, scorer, policy, router }
    }
}

impl DefaultComparisonEngine {
    pub fn from_policy_config(config: &PolicyConfig) -> Result<Self, ComparisonError> {
        Ok(Self::new(
            SkuItemMatcher,
            WeightedVendorScorer::new(config.cutoffs()),
            ThresholdPolicyEvaluator::new(config.thresholds()),
            TieredApprovalRouter::new(&config.tier_thresholds)?,
        ))
    }
}

impl Default for DefaultComparisonEngine {
    fn default() -> Self {
        Self::new(
            SkuItemMatcher,
            WeightedVendorScorer::default(),
            ThresholdPolicyEvaluator::default(),
            TieredApprovalRouter::default(),
        )
    }
}

impl<M, S, P, R> ComparisonRuntime for ComparisonEngine<M, S, P, R>
where
    M: ItemMatcher,
    S: VendorScorer,
    P: PolicyEvaluator,
    R: ApprovalRouter,
{
    fn compare_at(
        &self,
        boq: &Boq,
        quotes: &[Quote],
        id: ComparisonId,
        created_at: DateTime<Utc>,
    ) -> Result<Comparison, ComparisonError> {
        boq.validate()?;
        for (index, quote) in quotes.iter().enumerate() {
            quote.validate(index)?;
        }

        let mut scores: Vec<VendorScore> = quotes
            .iter()
            .map(|quote| {
                let matched = self.matcher.match_items(&boq.items, &quote.items);
                self.scorer.score(boq.total_boq, quote, &matched)
            })
            .collect::<Result<_, _>>()?;
        // stable: equal composites keep submission order
        scores.sort_by(|left, right| right.composite_score.cmp(&left.composite_score));

        let facts = match scores.first() {
            Some(winner) => PolicyFacts {
                winning_cost: winner.total_cost,
                quote_count: quotes.len(),
                unmatched_count: winner.unmatched_items,
                variance_pct: variance_pct(winner.total_cost, boq.total_boq)?,
            },
            None => PolicyFacts {
                winning_cost: Decimal::ZERO,
                quote_count: 0,
                unmatched_count: 0,
                variance_pct: Decimal::ZERO,
            },
        };

        let policy_evaluation = self.policy.evaluate(&facts)?;
        let approval_route =
            self.router.route(facts.winning_cost, !policy_evaluation.policy_checks_passed);

        let (best_vendor, warnings) = match scores.first() {
            Some(winner) => (winner.vendor_name.clone(), Vec::new()),
            None => (NO_VENDOR.to_string(), vec![ComparisonWarning::NoQuotesReceived]),
        };

        Ok(Comparison {
            id,
            boq_id: boq.id.clone(),
            currency: boq.currency.clone(),
            boq_total: boq.total_boq,
            cost_savings: boq.total_boq - facts.winning_cost,
            vendor_scores: scores,
            best_vendor,
            policy_evaluation,
            approval_route,
            status: ComparisonStatus::PendingApproval,
            warnings,
            created_at,
            decided_at: None,
        })
    }
}
