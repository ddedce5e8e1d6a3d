use rust_decimal::Decimal;
use serde::Serialize;

use procurely_core::domain::approval::ApprovalRecord;
use procurely_core::domain::comparison::Comparison;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label), style: None, value: None }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        block_id: String,
        text: TextObject,
    },
    Section {
        block_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
    },
    Actions {
        block_id: String,
        elements: Vec<ButtonElement>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
}

/// A rendered message. Serializes to the incoming-webhook body, with the
/// fallback carried as the top-level `text`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, fields) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, fields });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    fields: Vec<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    /// Adds a two-column field rendered as a bold label over its value.
    pub fn field(&mut self, label: &str, value: impl AsRef<str>) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(format!("*{label}:*\n{}", value.as_ref())));
        self
    }

    fn build(self) -> (Option<TextObject>, Vec<TextObject>) {
        if self.text.is_none() && self.fields.is_empty() {
            return (Some(TextObject::plain("")), self.fields);
        }
        (self.text, self.fields)
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub const APPROVE_ACTION_ID: &str = "approval.approve.v1";
pub const REJECT_ACTION_ID: &str = "approval.reject.v1";

/// Approval request for a freshly created comparison. Both buttons carry the
/// comparison id as their value so the interaction handler can resolve it.
pub fn comparison_approval_message(comparison: &Comparison) -> MessageTemplate {
    let comparison_id = comparison.id.0.as_str();
    let policy = &comparison.policy_evaluation;

    let mut builder = MessageBuilder::new(format!(
        "Purchase approval required for comparison {comparison_id}"
    ))
    .header("comparison.approval.header.v1", "Purchase Approval Request")
    .section("comparison.approval.summary.v1", |section| {
        section
            .field("Comparison ID", comparison_id)
            .field("Best Vendor", &comparison.best_vendor)
            .field("Total Cost", format_money(comparison.winning_cost(), &comparison.currency))
            .field("Cost Savings", format_money(comparison.cost_savings, &comparison.currency))
            .field("Approval Route", comparison.approval_route.as_str())
            .field("Quotes Compared", comparison.vendor_scores.len().to_string());
    });

    if !policy.policy_checks_passed {
        let lines: Vec<String> = policy
            .violations
            .iter()
            .zip(policy.reasons.iter())
            .map(|(rule, reason)| format!("• `{rule}` {reason}"))
            .collect();
        builder = builder.section("comparison.approval.violations.v1", |section| {
            section.mrkdwn(format!(":warning: *Policy violations*\n{}", lines.join("\n")));
        });
    }

    builder
        .actions("comparison.approval.actions.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(APPROVE_ACTION_ID, "Approve")
                        .style(ButtonStyle::Primary)
                        .value(comparison_id),
                )
                .button(
                    ButtonElement::new(REJECT_ACTION_ID, "Reject")
                        .style(ButtonStyle::Danger)
                        .value(comparison_id),
                );
        })
        .build()
}

pub fn approval_decision_message(record: &ApprovalRecord) -> MessageTemplate {
    let comparison_id = record.comparison_id.0.as_str();
    let decision = record.decision.as_str();

    MessageBuilder::new(format!("Comparison {comparison_id} {decision}"))
        .section("comparison.decision.summary.v1", |section| {
            section.mrkdwn(format!("*Comparison* `{comparison_id}` was *{decision}*"));
            if let Some(order) = &record.purchase_order {
                section
                    .field("Purchase Order", &order.po_number)
                    .field("Vendor", &order.vendor_name)
                    .field("Amount", format_money(order.amount, &order.currency));
            }
        })
        .context("comparison.decision.context.v1", |context| {
            context.plain(record.next_step.clone());
            if let Some(approver) = record.approver_email.as_deref() {
                context.plain(format!("Decided by {approver}"));
            }
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("procurement.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("procurement.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

fn format_money(amount: Decimal, currency: &str) -> String {
    format!("{} {currency}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use procurely_core::domain::approval::{
        ApprovalDecision, ApprovalId, ApprovalRecord, PurchaseOrder,
    };
    use procurely_core::domain::boq::BoqId;
    use procurely_core::domain::comparison::{
        ApprovalRoute, Comparison, ComparisonId, ComparisonStatus, PolicyEvaluation,
        Recommendation, VendorScore,
    };
    use procurely_core::domain::quote::VendorId;

    use super::{
        approval_decision_message, comparison_approval_message, error_message, Block,
        ButtonStyle, MessageBuilder, TextObject, APPROVE_ACTION_ID, REJECT_ACTION_ID,
    };

    fn comparison(policy_evaluation: PolicyEvaluation) -> Comparison {
        Comparison {
            id: ComparisonId("comp-7".to_string()),
            boq_id: BoqId("boq-7".to_string()),
            currency: "USD".to_string(),
            boq_total: Decimal::new(3_225_000, 2),
            vendor_scores: vec![VendorScore {
                vendor_id: VendorId("vendor-best".to_string()),
                vendor_name: "Best Supply Co.".to_string(),
                total_cost: Decimal::new(3_200_000, 2),
                variance: Decimal::new(-78, 2),
                compliance_score: Decimal::from(100),
                delivery_days: 10,
                composite_score: Decimal::new(11_990, 2),
                recommendation: Recommendation::Recommended,
                matched_items: 3,
                unmatched_items: 0,
            }],
            best_vendor: "Best Supply Co.".to_string(),
            cost_savings: Decimal::new(25_000, 2),
            policy_evaluation,
            approval_route: ApprovalRoute::Director,
            status: ComparisonStatus::PendingApproval,
            warnings: Vec::new(),
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    fn actions(message: &super::MessageTemplate) -> Vec<super::ButtonElement> {
        message
            .blocks
            .iter()
            .find_map(|block| match block {
                Block::Actions { elements, .. } => Some(elements.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .header("comparison.header.v1", "Title")
            .section("comparison.summary.v1", |section| {
                section.field("Vendor", "Acme");
            })
            .actions("comparison.summary.actions.v1", |actions| {
                actions.button(super::ButtonElement::new("comparison.open.v1", "Open"));
            })
            .build();

        assert_eq!(message.blocks.len(), 3);
        assert!(matches!(
            &message.blocks[1],
            Block::Section { block_id, text: None, fields }
                if block_id == "comparison.summary.v1" && fields.len() == 1
        ));
    }

    #[test]
    fn serializes_to_slack_webhook_shape() {
        let message = comparison_approval_message(&comparison(PolicyEvaluation::passed()));
        let value = serde_json::to_value(&message).expect("serialize");

        assert_eq!(value["text"], "Purchase approval required for comparison comp-7");
        assert_eq!(value["blocks"][0]["type"], "header");
        assert_eq!(value["blocks"][0]["text"]["type"], "plain_text");
        assert_eq!(value["blocks"][1]["fields"][0]["type"], "mrkdwn");
        assert_eq!(value["blocks"][1]["fields"][0]["text"], "*Comparison ID:*\ncomp-7");
        assert!(value["blocks"][1].get("text").is_none());
        assert_eq!(value["blocks"][2]["elements"][0]["type"], "button");
        assert_eq!(value["blocks"][2]["elements"][0]["style"], "primary");
    }

    #[test]
    fn approval_buttons_carry_comparison_id() {
        let message = comparison_approval_message(&comparison(PolicyEvaluation::passed()));
        let buttons = actions(&message);

        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].action_id, APPROVE_ACTION_ID);
        assert_eq!(buttons[0].style, Some(ButtonStyle::Primary));
        assert_eq!(buttons[1].action_id, REJECT_ACTION_ID);
        assert_eq!(buttons[1].style, Some(ButtonStyle::Danger));
        assert!(buttons.iter().all(|button| button.value.as_deref() == Some("comp-7")));
    }

    #[test]
    fn violations_are_listed_only_when_policy_failed() {
        let clean = comparison_approval_message(&comparison(PolicyEvaluation::passed()));
        assert_eq!(clean.blocks.len(), 3);

        let mut failed = PolicyEvaluation::passed();
        failed.record_violation("INSUFFICIENT_QUOTES", "Received 1 quotes; at least 3 required");
        let message = comparison_approval_message(&comparison(failed));

        assert_eq!(message.blocks.len(), 4);
        assert!(matches!(
            &message.blocks[2],
            Block::Section { text: Some(TextObject::Mrkdwn { text }), .. }
                if text.contains("`INSUFFICIENT_QUOTES`")
        ));
    }

    #[test]
    fn decision_message_includes_purchase_order() {
        let record = ApprovalRecord {
            id: ApprovalId("approval-1".to_string()),
            comparison_id: ComparisonId("comp-7".to_string()),
            decision: ApprovalDecision::Approved,
            approver_role: Some("director".to_string()),
            approver_email: Some("director@example.com".to_string()),
            comment: None,
            next_step: "Purchase order PO-100 issued to Best Supply Co.".to_string(),
            purchase_order: Some(PurchaseOrder {
                po_number: "PO-100".to_string(),
                comparison_id: ComparisonId("comp-7".to_string()),
                vendor_name: "Best Supply Co.".to_string(),
                amount: Decimal::new(3_200_000, 2),
                currency: "USD".to_string(),
                issued_at: Utc::now(),
            }),
            decided_at: Utc::now(),
        };

        let message = approval_decision_message(&record);

        assert_eq!(message.fallback_text, "Comparison comp-7 APPROVED");
        assert!(matches!(
            &message.blocks[0],
            Block::Section { fields, .. }
                if fields.contains(&TextObject::mrkdwn("*Purchase Order:*\nPO-100"))
                    && fields.contains(&TextObject::mrkdwn("*Amount:*\n32000.00 USD"))
        ));
        assert!(matches!(
            &message.blocks[1],
            Block::Context { elements, .. } if elements.len() == 2
        ));
    }

    #[test]
    fn error_template_contains_correlation_id() {
        let message = error_message("Cannot process request", "req-123");
        assert!(matches!(
            &message.blocks[1],
            Block::Context { elements, .. }
                if matches!(elements.first(), Some(TextObject::Plain { text }) if text.contains("req-123"))
        ));
    }
}
