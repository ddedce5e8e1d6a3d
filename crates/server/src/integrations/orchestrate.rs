use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use procurely_core::config::OrchestrateConfig;
use procurely_core::domain::boq::Boq;
use procurely_core::domain::comparison::Comparison;
use procurely_core::domain::quote::Quote;

use super::{Delivery, DeliveryReference, IntegrationError, WorkflowTrigger};

const COLLABORATOR: &str = "orchestrate";
pub const COMPARE_FLOW: &str = "Compare_Vendor_Quotes";
pub const APPROVAL_FLOW: &str = "Route_for_Approval";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowExecution {
    pub execution_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl DeliveryReference for FlowExecution {
    fn reference(&self) -> Option<String> {
        Some(self.execution_id.clone())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlowRequest<'a> {
    agent_id: &'a str,
    flow_name: &'a str,
    inputs: Value,
}

struct Endpoint {
    base_url: String,
    api_key: SecretString,
    agent_id: String,
}

/// Starts and polls long-running approval workflows on the orchestration service.
pub struct OrchestrateClient {
    client: Client,
    endpoint: Option<Endpoint>,
}

impl OrchestrateClient {
    pub fn new(client: Client, config: &OrchestrateConfig) -> Self {
        let endpoint = match (&config.base_url, &config.api_key) {
            (Some(base_url), Some(api_key)) if config.is_configured() => Some(Endpoint {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.clone(),
                agent_id: config.agent_id.clone().unwrap_or_default(),
            }),
            _ => None,
        };
        Self { client, endpoint }
    }

    async fn execute(
        &self,
        flow_name: &str,
        inputs: Value,
    ) -> Result<Delivery<FlowExecution>, IntegrationError> {
        let Some(endpoint) = self.endpoint.as_ref() else {
            return Ok(Delivery::Skipped("workflow orchestration is not configured".to_string()));
        };

        let request = FlowRequest { agent_id: &endpoint.agent_id, flow_name, inputs };
        let response = self
            .client
            .post(format!("{}/flows/execute", endpoint.base_url))
            .bearer_auth(endpoint.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| IntegrationError::transport(COLLABORATOR, error))?;

        if !response.status().is_success() {
            return Err(IntegrationError::Status {
                collaborator: COLLABORATOR,
                status: response.status().as_u16(),
            });
        }

        let execution: FlowExecution = response
            .json()
            .await
            .map_err(|error| IntegrationError::decode(COLLABORATOR, error))?;
        if execution.execution_id.trim().is_empty() {
            return Err(IntegrationError::decode(COLLABORATOR, "empty executionId"));
        }

        info!(
            event_name = "integration.orchestrate.flow_started",
            flow_name,
            execution_id = %execution.execution_id,
            "workflow execution started"
        );
        Ok(Delivery::Delivered(execution))
    }
}

#[async_trait]
impl WorkflowTrigger for OrchestrateClient {
    async fn comparison_requested(
        &self,
        boq: &Boq,
        quotes: &[Quote],
    ) -> Result<Delivery<FlowExecution>, IntegrationError> {
        let inputs = json!({
            "boqId": boq.id.0,
            "boqItems": boq.items,
            "quotes": quotes,
        });
        self.execute(COMPARE_FLOW, inputs).await
    }

    async fn approval_requested(
        &self,
        comparison: &Comparison,
    ) -> Result<Delivery<FlowExecution>, IntegrationError> {
        let inputs = json!({
            "comparisonId": comparison.id.0,
            "totalCost": comparison.winning_cost(),
            "bestVendor": comparison.best_vendor,
            "violations": comparison.policy_evaluation.violations,
            "approvalRoute": comparison.approval_route,
        });
        self.execute(APPROVAL_FLOW, inputs).await
    }

    async fn execution_status(
        &self,
        execution_id: &str,
    ) -> Result<Delivery<FlowExecution>, IntegrationError> {
        let Some(endpoint) = self.endpoint.as_ref() else {
            return Ok(Delivery::Skipped("workflow orchestration is not configured".to_string()));
        };

        let response = self
            .client
            .get(format!("{}/flows/executions/{execution_id}", endpoint.base_url))
            .bearer_auth(endpoint.api_key.expose_secret())
            .send()
            .await
            .map_err(|error| IntegrationError::transport(COLLABORATOR, error))?;

        if !response.status().is_success() {
            return Err(IntegrationError::Status {
                collaborator: COLLABORATOR,
                status: response.status().as_u16(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| IntegrationError::decode(COLLABORATOR, error))?;
        let status = payload.get("status").and_then(Value::as_str).map(str::to_string);

        Ok(Delivery::Delivered(FlowExecution { execution_id: execution_id.to_string(), status }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use serde_json::{json, Value};

    use procurely_core::config::OrchestrateConfig;
    use procurely_core::domain::boq::{Boq, BoqId, BoqItem};

    use super::{OrchestrateClient, COMPARE_FLOW};
    use crate::integrations::{stub, Delivery, IntegrationError, WorkflowTrigger};

    type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    fn config(base_url: Option<String>) -> OrchestrateConfig {
        OrchestrateConfig {
            base_url,
            api_key: Some(SecretString::from("orchestrate-key".to_string())),
            agent_id: Some("agent-7".to_string()),
            timeout_secs: 5,
        }
    }

    fn boq() -> Boq {
        Boq {
            id: BoqId("boq-9".to_string()),
            currency: "USD".to_string(),
            items: vec![BoqItem {
                line_no: 1,
                sku: "CBL-001".to_string(),
                description: None,
                quantity: Decimal::from(10),
                uom: "m".to_string(),
                estimated_price: Decimal::from(5),
                total_estimate: Decimal::from(50),
            }],
            total_boq: Decimal::from(50),
        }
    }

    async fn recording_stub(execution_id: &'static str) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route(
                "/flows/execute",
                post(move |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    seen.lock().expect("lock").push((auth, body));
                    Json(json!({ "executionId": execution_id, "status": "STARTED" }))
                }),
            )
            .route(
                "/flows/executions/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(json!({ "executionId": id, "status": "WAITING_APPROVAL" }))
                }),
            )
            .with_state(seen.clone());
        (stub::spawn(router).await, seen)
    }

    #[tokio::test]
    async fn unconfigured_client_skips_without_calling_out() {
        let client = OrchestrateClient::new(reqwest::Client::new(), &config(None));

        let delivery = client.comparison_requested(&boq(), &[]).await.expect("skip");

        assert!(matches!(delivery, Delivery::Skipped(_)));
    }

    #[tokio::test]
    async fn comparison_flow_posts_agent_flow_and_inputs_with_bearer_token() {
        let (base_url, seen) = recording_stub("exec-42").await;
        let client = OrchestrateClient::new(reqwest::Client::new(), &config(Some(base_url)));

        let delivery = client.comparison_requested(&boq(), &[]).await.expect("delivered");

        let Delivery::Delivered(execution) = delivery else {
            panic!("expected delivered execution");
        };
        assert_eq!(execution.execution_id, "exec-42");
        let seen = seen.lock().expect("lock").clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("Bearer orchestrate-key"));
        assert_eq!(seen[0].1["agentId"], "agent-7");
        assert_eq!(seen[0].1["flowName"], COMPARE_FLOW);
        assert_eq!(seen[0].1["inputs"]["boqId"], "boq-9");
        assert_eq!(seen[0].1["inputs"]["boqItems"][0]["sku"], "CBL-001");
    }

    #[tokio::test]
    async fn execution_status_reads_remote_state() {
        let (base_url, _) = recording_stub("exec-1").await;
        let client = OrchestrateClient::new(reqwest::Client::new(), &config(Some(base_url)));

        let delivery = client.execution_status("exec-1").await.expect("status");

        assert!(matches!(
            delivery,
            Delivery::Delivered(execution)
                if execution.execution_id == "exec-1"
                    && execution.status.as_deref() == Some("WAITING_APPROVAL")
        ));
    }

    #[tokio::test]
    async fn missing_execution_id_is_a_decode_failure() {
        let router = Router::new().route(
            "/flows/execute",
            post(|| async { (StatusCode::OK, Json(json!({ "status": "STARTED" }))) }),
        );
        let base_url = stub::spawn(router).await;
        let client = OrchestrateClient::new(reqwest::Client::new(), &config(Some(base_url)));

        let error = client.comparison_requested(&boq(), &[]).await.expect_err("no id");

        assert!(matches!(error, IntegrationError::Decode { .. }));
    }
}
