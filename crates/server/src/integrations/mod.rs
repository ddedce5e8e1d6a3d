//! Outbound collaborators invoked after a comparison is stored or decided.
//!
//! Adapters report one of three results: the call went through, the adapter is
//! not configured and skipped the call, or the call failed. What happens on
//! failure is decided by [`FailurePolicy`] from the configured
//! [`CollaboratorMode`], never inside an adapter.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use procurely_core::audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, INTEGRATION_DEGRADED,
};
use procurely_core::config::CollaboratorMode;
use procurely_core::domain::approval::{ApprovalRecord, PurchaseOrder};
use procurely_core::domain::boq::Boq;
use procurely_core::domain::comparison::{Comparison, ComparisonId};
use procurely_core::domain::quote::Quote;
use procurely_core::errors::ApplicationError;

pub mod email;
pub mod erp;
pub mod orchestrate;
pub mod slack;

pub use email::EmailNotifier;
pub use erp::{ErpClient, PurchaseOrderRequest};
pub use orchestrate::{FlowExecution, OrchestrateClient};
pub use slack::SlackWebhookNotifier;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{collaborator} request failed: {message}")]
    Transport { collaborator: &'static str, message: String },
    #[error("{collaborator} responded with HTTP {status}")]
    Status { collaborator: &'static str, status: u16 },
    #[error("{collaborator} response could not be decoded: {message}")]
    Decode { collaborator: &'static str, message: String },
    #[error("{collaborator} message rendering failed: {message}")]
    Render { collaborator: &'static str, message: String },
}

impl IntegrationError {
    pub(crate) fn transport(collaborator: &'static str, error: reqwest::Error) -> Self {
        Self::Transport { collaborator, message: error.to_string() }
    }

    pub(crate) fn decode(collaborator: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Decode { collaborator, message: error.to_string() }
    }
}

/// Result of an adapter call that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery<T> {
    Delivered(T),
    /// The adapter is not configured for this call. Carries the reason.
    Skipped(String),
}

/// Value an adapter hands back that is worth echoing in a receipt.
pub trait DeliveryReference {
    fn reference(&self) -> Option<String> {
        None
    }
}

impl DeliveryReference for () {}

impl DeliveryReference for PurchaseOrder {
    fn reference(&self) -> Option<String> {
        Some(self.po_number.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Delivered,
    Skipped,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorReceipt {
    pub collaborator: &'static str,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn approval_requested(
        &self,
        comparison: &Comparison,
    ) -> Result<Delivery<()>, IntegrationError>;

    async fn decision_recorded(
        &self,
        _record: &ApprovalRecord,
    ) -> Result<Delivery<()>, IntegrationError> {
        Ok(Delivery::Skipped(format!("{} does not send decision notices", self.channel())))
    }
}

#[async_trait]
pub trait WorkflowTrigger: Send + Sync {
    async fn comparison_requested(
        &self,
        boq: &Boq,
        quotes: &[Quote],
    ) -> Result<Delivery<FlowExecution>, IntegrationError>;

    async fn approval_requested(
        &self,
        comparison: &Comparison,
    ) -> Result<Delivery<FlowExecution>, IntegrationError>;

    async fn execution_status(
        &self,
        execution_id: &str,
    ) -> Result<Delivery<FlowExecution>, IntegrationError>;
}

#[async_trait]
pub trait PurchaseOrderClient: Send + Sync {
    async fn create_purchase_order(
        &self,
        request: &PurchaseOrderRequest,
    ) -> Result<Delivery<PurchaseOrder>, IntegrationError>;
}

/// Stand-in for a collaborator that has no configuration at all.
#[derive(Clone, Copy, Debug)]
pub struct Unconfigured(pub &'static str);

impl Unconfigured {
    fn skipped<T>(&self) -> Result<Delivery<T>, IntegrationError> {
        Ok(Delivery::Skipped(format!("{} is not configured", self.0)))
    }
}

#[async_trait]
impl WorkflowTrigger for Unconfigured {
    async fn comparison_requested(
        &self,
        _boq: &Boq,
        _quotes: &[Quote],
    ) -> Result<Delivery<FlowExecution>, IntegrationError> {
        self.skipped()
    }

    async fn approval_requested(
        &self,
        _comparison: &Comparison,
    ) -> Result<Delivery<FlowExecution>, IntegrationError> {
        self.skipped()
    }

    async fn execution_status(
        &self,
        _execution_id: &str,
    ) -> Result<Delivery<FlowExecution>, IntegrationError> {
        self.skipped()
    }
}

#[async_trait]
impl PurchaseOrderClient for Unconfigured {
    async fn create_purchase_order(
        &self,
        _request: &PurchaseOrderRequest,
    ) -> Result<Delivery<PurchaseOrder>, IntegrationError> {
        self.skipped()
    }
}

/// Applies the configured collaborator mode to adapter results.
#[derive(Clone)]
pub struct FailurePolicy {
    mode: CollaboratorMode,
    audit: Arc<dyn AuditSink>,
}

impl FailurePolicy {
    pub fn new(mode: CollaboratorMode, audit: Arc<dyn AuditSink>) -> Self {
        Self { mode, audit }
    }

    /// Turns an adapter result into a receipt. In strict mode a failure is
    /// returned as [`ApplicationError::Integration`]; in degraded mode it is
    /// logged, audited and reported as a `DEGRADED` receipt.
    pub fn settle<T: DeliveryReference>(
        &self,
        collaborator: &'static str,
        correlation_id: &str,
        comparison_id: Option<&ComparisonId>,
        result: Result<Delivery<T>, IntegrationError>,
    ) -> Result<(CollaboratorReceipt, Option<T>), ApplicationError> {
        match result {
            Err(failure) if self.mode == CollaboratorMode::Strict => {
                self.audit_failure(
                    collaborator,
                    correlation_id,
                    comparison_id,
                    &failure,
                    AuditOutcome::Failed,
                );
                error!(
                    event_name = "integration.failed",
                    correlation_id = %correlation_id,
                    comparison_id = %label(comparison_id),
                    collaborator,
                    error = %failure,
                    "collaborator call failed"
                );
                Err(ApplicationError::Integration(failure.to_string()))
            }
            other => {
                Ok(self.settle_after_commit(collaborator, correlation_id, comparison_id, other))
            }
        }
    }

    /// Settles a call made after state was committed. A failure is always
    /// reported as a `DEGRADED` receipt, whatever the mode.
    pub fn settle_after_commit<T: DeliveryReference>(
        &self,
        collaborator: &'static str,
        correlation_id: &str,
        comparison_id: Option<&ComparisonId>,
        result: Result<Delivery<T>, IntegrationError>,
    ) -> (CollaboratorReceipt, Option<T>) {
        match result {
            Ok(Delivery::Delivered(value)) => {
                let receipt = CollaboratorReceipt {
                    collaborator,
                    status: DeliveryStatus::Delivered,
                    reference: value.reference(),
                    detail: None,
                };
                (receipt, Some(value))
            }
            Ok(Delivery::Skipped(reason)) => {
                info!(
                    event_name = "integration.skipped",
                    correlation_id = %correlation_id,
                    comparison_id = %label(comparison_id),
                    collaborator,
                    reason = %reason,
                    "collaborator call skipped"
                );
                let receipt = CollaboratorReceipt {
                    collaborator,
                    status: DeliveryStatus::Skipped,
                    reference: None,
                    detail: Some(reason),
                };
                (receipt, None)
            }
            Err(failure) => {
                self.audit_failure(
                    collaborator,
                    correlation_id,
                    comparison_id,
                    &failure,
                    AuditOutcome::Degraded,
                );
                warn!(
                    event_name = "integration.degraded",
                    correlation_id = %correlation_id,
                    comparison_id = %label(comparison_id),
                    collaborator,
                    mode = self.mode.as_str(),
                    error = %failure,
                    "collaborator call failed; continuing degraded"
                );
                let receipt = CollaboratorReceipt {
                    collaborator,
                    status: DeliveryStatus::Degraded,
                    reference: None,
                    detail: Some(failure.to_string()),
                };
                (receipt, None)
            }
        }
    }

    fn audit_failure(
        &self,
        collaborator: &'static str,
        correlation_id: &str,
        comparison_id: Option<&ComparisonId>,
        failure: &IntegrationError,
        outcome: AuditOutcome,
    ) {
        self.audit.emit(
            AuditEvent::new(
                comparison_id.cloned(),
                correlation_id,
                INTEGRATION_DEGRADED,
                AuditCategory::Integration,
                collaborator,
                outcome,
            )
            .with_metadata("error", failure.to_string())
            .with_metadata("mode", self.mode.as_str()),
        );
    }
}

fn label(comparison_id: Option<&ComparisonId>) -> &str {
    comparison_id.map(|id| id.0.as_str()).unwrap_or("unknown")
}

#[cfg(test)]
pub(crate) mod stub {
    use axum::Router;

    /// Serves `router` on an ephemeral local port and returns its base URL.
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let address = listener.local_addr().expect("stub address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}")
    }
}
