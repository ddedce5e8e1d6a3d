//! Per-vendor scoring: variance against the BOQ baseline, coverage compliance,
//! a linear composite, and the recommendation tier derived from it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::matching::MatchResult;
use crate::domain::comparison::{Recommendation, VendorScore};
use crate::domain::quote::Quote;
use crate::errors::ComparisonError;

pub const FULL_COMPLIANCE: Decimal = Decimal::ONE_HUNDRED;
/// Any mismatch caps compliance here, however many items are affected.
pub const DEGRADED_COMPLIANCE: Decimal = Decimal::from_parts(80, 0, 0, false, 0);
pub const DEFAULT_DELIVERY_DAYS: u32 = 14;

const VARIANCE_WEIGHT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
const COMPLIANCE_WEIGHT: Decimal = Decimal::from_parts(2, 0, 0, false, 1);

/// Recommendation cutoffs. Both bounds are exclusive: a composite exactly equal to
/// `recommended_above` is only `Acceptable`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationCutoffs {
    pub recommended_above: Decimal,
    pub acceptable_above: Decimal,
}

impl Default for RecommendationCutoffs {
    fn default() -> Self {
        Self { recommended_above: Decimal::from(85), acceptable_above: Decimal::from(70) }
    }
}

impl RecommendationCutoffs {
    pub fn classify(&self, composite_score: Decimal) -> Recommendation {
        if composite_score > self.recommended_above {
            Recommendation::Recommended
        } else if composite_score > self.acceptable_above {
            Recommendation::Acceptable
        } else {
            Recommendation::FlagReview
        }
    }
}

pub trait VendorScorer: Send + Sync {
    fn score(
        &self,
        boq_total: Decimal,
        quote: &Quote,
        matched: &MatchResult<'_>,
    ) -> Result<VendorScore, ComparisonError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WeightedVendorScorer {
    cutoffs: RecommendationCutoffs,
}

impl WeightedVendorScorer {
    pub fn new(cutoffs: RecommendationCutoffs) -> Self {
        Self { cutoffs }
    }
}

impl VendorScorer for WeightedVendorScorer {
    fn score(
        &self,
        boq_total: Decimal,
        quote: &Quote,
        matched: &MatchResult<'_>,
    ) -> Result<VendorScore, ComparisonError> {
        let variance = variance_pct(quote.total_cost, boq_total)?;
        let compliance_score = compliance_score(matched);
        let composite_score = composite_score(variance, compliance_score);

        Ok(VendorScore {
            vendor_id: quote.vendor_id.clone(),
            vendor_name: quote.vendor_name.clone(),
            total_cost: quote.total_cost,
            variance,
            compliance_score,
            delivery_days: delivery_days(quote, matched),
            composite_score,
            recommendation: self.cutoffs.classify(composite_score),
            matched_items: matched.matches.len(),
            unmatched_items: matched.unmatched_count(),
        })
    }
}

/// `(total_cost - boq_total) / boq_total * 100`; a zero baseline is rejected.
pub fn variance_pct(total_cost: Decimal, boq_total: Decimal) -> Result<Decimal, ComparisonError> {
    if boq_total.is_zero() {
        return Err(ComparisonError::Validation(
            "boq total is zero; cost variance is undefined".to_string(),
        ));
    }

    (total_cost - boq_total)
        .checked_div(boq_total)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| {
            ComparisonError::Validation(format!(
                "cost variance overflows for total {total_cost} against baseline {boq_total}"
            ))
        })
}

pub fn compliance_score(matched: &MatchResult<'_>) -> Decimal {
    if matched.is_complete() {
        FULL_COMPLIANCE
    } else {
        DEGRADED_COMPLIANCE
    }
}

pub fn composite_score(variance: Decimal, compliance_score: Decimal) -> Decimal {
    Decimal::ONE_HUNDRED - variance.abs() * VARIANCE_WEIGHT + compliance_score * COMPLIANCE_WEIGHT
}

fn delivery_days(quote: &Quote, matched: &MatchResult<'_>) -> u32 {
    matched
        .matches
        .first()
        .and_then(|pair| pair.quote_item.lead_time_days)
        .or_else(|| quote.items.first().and_then(|item| item.lead_time_days))
        .or(quote.lead_time_days)
        .unwrap_or(DEFAULT_DELIVERY_DAYS)
}
