pub mod audit;
pub mod compare;
pub mod config;
pub mod domain;
pub mod errors;
pub mod kpi;

pub use compare::{ComparisonEngine, ComparisonRuntime, DefaultComparisonEngine};
pub use compare::matching::{ItemMatch, ItemMatcher, MatchResult, SkuItemMatcher};
pub use compare::policy::{PolicyEvaluator, PolicyFacts, PolicyThresholds, ThresholdPolicyEvaluator};
pub use compare::routing::{ApprovalRouter, TieredApprovalRouter};
pub use compare::scoring::{RecommendationCutoffs, VendorScorer, WeightedVendorScorer};
pub use domain::approval::{
    ApprovalDecision, ApprovalId, ApprovalRecord, ApprovalSubmission, PurchaseOrder,
};
pub use domain::boq::{Boq, BoqId, BoqItem};
pub use domain::comparison::{
    ApprovalRoute, Comparison, ComparisonId, ComparisonStatus, ComparisonWarning,
    PolicyEvaluation, Recommendation, VendorScore,
};
pub use domain::quote::{Quote, QuoteItem, VendorId};
pub use errors::{ApplicationError, ComparisonError, DomainError, InterfaceError};
pub use kpi::KpiSnapshot;
