use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use procurely_core::domain::approval::ApprovalRecord;
use procurely_core::domain::comparison::Comparison;
use procurely_slack::{approval_decision_message, comparison_approval_message, MessageTemplate};

use super::{ApprovalNotifier, Delivery, IntegrationError};

const COLLABORATOR: &str = "slack";

/// Posts Block Kit messages to a Slack incoming webhook.
#[derive(Clone)]
pub struct SlackWebhookNotifier {
    client: Client,
    webhook_url: Option<SecretString>,
}

impl SlackWebhookNotifier {
    pub fn new(client: Client, webhook_url: Option<SecretString>) -> Self {
        Self { client, webhook_url }
    }

    async fn post(&self, message: &MessageTemplate) -> Result<Delivery<()>, IntegrationError> {
        let Some(webhook_url) = self.webhook_url.as_ref() else {
            return Ok(Delivery::Skipped("slack webhook url is not configured".to_string()));
        };

        let response = self
            .client
            .post(webhook_url.expose_secret())
            .json(message)
            .send()
            .await
            .map_err(|error| IntegrationError::transport(COLLABORATOR, error))?;

        if !response.status().is_success() {
            return Err(IntegrationError::Status {
                collaborator: COLLABORATOR,
                status: response.status().as_u16(),
            });
        }

        Ok(Delivery::Delivered(()))
    }
}

#[async_trait]
impl ApprovalNotifier for SlackWebhookNotifier {
    fn channel(&self) -> &'static str {
        COLLABORATOR
    }

    async fn approval_requested(
        &self,
        comparison: &Comparison,
    ) -> Result<Delivery<()>, IntegrationError> {
        let delivery = self.post(&comparison_approval_message(comparison)).await?;
        if delivery == Delivery::Delivered(()) {
            info!(
                event_name = "integration.slack.approval_requested",
                comparison_id = %comparison.id.0,
                "slack approval request posted"
            );
        }
        Ok(delivery)
    }

    async fn decision_recorded(
        &self,
        record: &ApprovalRecord,
    ) -> Result<Delivery<()>, IntegrationError> {
        self.post(&approval_decision_message(record)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use serde_json::Value;

    use procurely_core::domain::boq::BoqId;
    use procurely_core::domain::comparison::{
        ApprovalRoute, Comparison, ComparisonId, ComparisonStatus, PolicyEvaluation, NO_VENDOR,
    };

    use super::SlackWebhookNotifier;
    use crate::integrations::{stub, ApprovalNotifier, Delivery, IntegrationError};

    fn comparison() -> Comparison {
        Comparison {
            id: ComparisonId("comp-slack".to_string()),
            boq_id: BoqId("boq-1".to_string()),
            currency: "USD".to_string(),
            boq_total: Decimal::from(1_000),
            vendor_scores: Vec::new(),
            best_vendor: NO_VENDOR.to_string(),
            cost_savings: Decimal::from(1_000),
            policy_evaluation: PolicyEvaluation::passed(),
            approval_route: ApprovalRoute::Manager,
            status: ComparisonStatus::PendingApproval,
            warnings: Vec::new(),
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    #[tokio::test]
    async fn missing_webhook_skips_delivery() {
        let notifier = SlackWebhookNotifier::new(reqwest::Client::new(), None);

        let delivery = notifier.approval_requested(&comparison()).await.expect("skip");

        assert!(matches!(delivery, Delivery::Skipped(reason) if reason.contains("webhook")));
    }

    #[tokio::test]
    async fn posts_block_kit_payload_to_webhook() {
        let received = Arc::new(Mutex::new(Vec::<Value>::new()));
        let router = Router::new()
            .route(
                "/hook",
                post(|State(received): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                    received.lock().expect("lock").push(body);
                    StatusCode::OK
                }),
            )
            .with_state(received.clone());
        let base_url = stub::spawn(router).await;
        let notifier = SlackWebhookNotifier::new(
            reqwest::Client::new(),
            Some(SecretString::from(format!("{base_url}/hook"))),
        );

        let delivery = notifier.approval_requested(&comparison()).await.expect("delivered");

        assert_eq!(delivery, Delivery::Delivered(()));
        let bodies = received.lock().expect("lock").clone();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["blocks"][0]["type"], "header");
    }

    #[tokio::test]
    async fn non_success_status_is_a_failure() {
        let router = Router::new().route("/hook", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let base_url = stub::spawn(router).await;
        let notifier = SlackWebhookNotifier::new(
            reqwest::Client::new(),
            Some(SecretString::from(format!("{base_url}/hook"))),
        );

        let error = notifier.approval_requested(&comparison()).await.expect_err("500 fails");

        assert!(matches!(error, IntegrationError::Status { status: 500, .. }));
    }
}
