use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{info, warn};

use procurely_core::domain::comparison::Comparison;

use super::{ApprovalNotifier, Delivery, IntegrationError};

const COLLABORATOR: &str = "email";
const APPROVAL_TEMPLATE: &str = "approval_request.html";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Serialize)]
struct VendorRow {
    name: String,
    total_cost: String,
    variance: String,
    score: String,
    recommendation: &'static str,
}

#[derive(Serialize)]
struct ViolationRow<'a> {
    rule: &'a str,
    reason: &'a str,
}

/// Renders the HTML approval request. No mail transport is wired in, so a
/// rendered message is logged and reported as skipped.
pub struct EmailNotifier {
    templates: Arc<Tera>,
    recipient: Option<String>,
}

impl EmailNotifier {
    pub fn new(recipient: Option<String>) -> Self {
        Self { templates: init_templates(), recipient }
    }

    pub fn render_approval_request(
        &self,
        comparison: &Comparison,
        to: &str,
    ) -> Result<RenderedEmail, IntegrationError> {
        let vendors: Vec<VendorRow> = comparison
            .vendor_scores
            .iter()
            .map(|score| VendorRow {
                name: score.vendor_name.clone(),
                total_cost: score.total_cost.round_dp(2).to_string(),
                variance: score.variance.round_dp(2).to_string(),
                score: score.composite_score.round_dp(2).to_string(),
                recommendation: score.recommendation.as_str(),
            })
            .collect();
        let policy = &comparison.policy_evaluation;
        let violations: Vec<ViolationRow<'_>> = policy
            .violations
            .iter()
            .zip(policy.reasons.iter())
            .map(|(rule, reason)| ViolationRow { rule, reason })
            .collect();

        let mut context = Context::new();
        context.insert("comparison_id", &comparison.id.0);
        context.insert("boq_id", &comparison.boq_id.0);
        context.insert("approval_route", comparison.approval_route.as_str());
        context.insert("best_vendor", &comparison.best_vendor);
        context.insert("currency", &comparison.currency);
        context.insert("winning_cost", &comparison.winning_cost().round_dp(2).to_string());
        context.insert("boq_total", &comparison.boq_total.round_dp(2).to_string());
        context.insert("cost_savings", &comparison.cost_savings.round_dp(2).to_string());
        context.insert("vendors", &vendors);
        context.insert("violations", &violations);

        let html = self.templates.render(APPROVAL_TEMPLATE, &context).map_err(|error| {
            IntegrationError::Render { collaborator: COLLABORATOR, message: error.to_string() }
        })?;

        Ok(RenderedEmail {
            to: to.to_string(),
            subject: format!(
                "Purchase approval required: {} ({})",
                comparison.id.0,
                comparison.approval_route.as_str()
            ),
            html,
        })
    }
}

fn init_templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    if let Err(error) = tera.add_raw_template(
        APPROVAL_TEMPLATE,
        include_str!("../../../../templates/email/approval_request.html"),
    ) {
        warn!(error = %error, "failed to load email approval template");
    }
    Arc::new(tera)
}

#[async_trait]
impl ApprovalNotifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        COLLABORATOR
    }

    async fn approval_requested(
        &self,
        comparison: &Comparison,
    ) -> Result<Delivery<()>, IntegrationError> {
        let Some(recipient) = self.recipient.as_deref() else {
            return Ok(Delivery::Skipped("approver email is not configured".to_string()));
        };

        let email = self.render_approval_request(comparison, recipient)?;
        info!(
            event_name = "integration.email.rendered",
            comparison_id = %comparison.id.0,
            recipient = %email.to,
            subject = %email.subject,
            bytes = email.html.len(),
            "approval email rendered"
        );

        Ok(Delivery::Skipped(format!("no mail transport configured; email for {recipient} was logged")))
    }
}
