use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;

use procurely_core::config::ErpConfig;
use procurely_core::domain::approval::PurchaseOrder;
use procurely_core::domain::comparison::ComparisonId;
use procurely_core::domain::quote::VendorId;

use super::{Delivery, IntegrationError, PurchaseOrderClient};

const COLLABORATOR: &str = "erp";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderRequest {
    pub comparison_id: ComparisonId,
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseOrderResponse {
    po_number: String,
    #[serde(default)]
    issued_at: Option<DateTime<Utc>>,
}

/// Raises purchase orders in the ERP system for approved comparisons.
pub struct ErpClient {
    client: Client,
    base_url: Option<String>,
    api_key: Option<SecretString>,
}

impl ErpClient {
    pub fn new(client: Client, config: &ErpConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.as_ref().map(|url| url.trim_end_matches('/').to_string()),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl PurchaseOrderClient for ErpClient {
    async fn create_purchase_order(
        &self,
        request: &PurchaseOrderRequest,
    ) -> Result<Delivery<PurchaseOrder>, IntegrationError> {
        let Some(base_url) = self.base_url.as_deref() else {
            return Ok(Delivery::Skipped("erp endpoint is not configured".to_string()));
        };

        let mut call = self.client.post(format!("{base_url}/purchase-orders")).json(request);
        if let Some(api_key) = self.api_key.as_ref() {
            call = call.bearer_auth(api_key.expose_secret());
        }
        let response =
            call.send().await.map_err(|error| IntegrationError::transport(COLLABORATOR, error))?;

        if !response.status().is_success() {
            return Err(IntegrationError::Status {
                collaborator: COLLABORATOR,
                status: response.status().as_u16(),
            });
        }

        let body: PurchaseOrderResponse = response
            .json()
            .await
            .map_err(|error| IntegrationError::decode(COLLABORATOR, error))?;
        if body.po_number.trim().is_empty() {
            return Err(IntegrationError::decode(COLLABORATOR, "empty poNumber"));
        }

        info!(
            event_name = "integration.erp.purchase_order_created",
            comparison_id = %request.comparison_id.0,
            po_number = %body.po_number,
            "purchase order created"
        );

        Ok(Delivery::Delivered(PurchaseOrder {
            po_number: body.po_number,
            comparison_id: request.comparison_id.clone(),
            vendor_name: request.vendor_name.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            issued_at: body.issued_at.unwrap_or_else(Utc::now),
        }))
    }
}
