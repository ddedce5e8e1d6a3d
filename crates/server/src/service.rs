use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use procurely_core::audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, APPROVAL_RECORDED, COMPARISON_CREATED,
};
use procurely_core::config::CollaboratorMode;
use procurely_core::domain::approval::{
    ApprovalDecision, ApprovalId, ApprovalRecord, ApprovalSubmission, PurchaseOrder,
};
use procurely_core::domain::boq::Boq;
use procurely_core::domain::comparison::{Comparison, ComparisonId};
use procurely_core::domain::quote::Quote;
use procurely_core::errors::{ApplicationError, DomainError};
use procurely_core::{ComparisonRuntime, KpiSnapshot};
use procurely_db::{ApprovalRepository, ComparisonRepository, RepositoryError};

use crate::integrations::{
    ApprovalNotifier, CollaboratorReceipt, Delivery, FailurePolicy, FlowExecution,
    PurchaseOrderClient, PurchaseOrderRequest, Unconfigured, WorkflowTrigger,
};

const ACTOR: &str = "procurement-service";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonOutcome {
    #[serde(flatten)]
    pub comparison: Comparison,
    pub collaborators: Vec<CollaboratorReceipt>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    #[serde(flatten)]
    pub record: ApprovalRecord,
    pub collaborators: Vec<CollaboratorReceipt>,
}

/// Runs comparisons, stores them, and fans results out to the configured collaborators.
pub struct ProcurementService {
    engine: Arc<dyn ComparisonRuntime>,
    comparisons: Arc<dyn ComparisonRepository>,
    approvals: Arc<dyn ApprovalRepository>,
    notifiers: Vec<Arc<dyn ApprovalNotifier>>,
    workflow: Arc<dyn WorkflowTrigger>,
    purchase_orders: Arc<dyn PurchaseOrderClient>,
    failures: FailurePolicy,
    audit: Arc<dyn AuditSink>,
    // serializes read-check-write of comparison status
    decisions: Mutex<()>,
}

impl ProcurementService {
    pub fn new(
        engine: Arc<dyn ComparisonRuntime>,
        comparisons: Arc<dyn ComparisonRepository>,
        approvals: Arc<dyn ApprovalRepository>,
        mode: CollaboratorMode,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            engine,
            comparisons,
            approvals,
            notifiers: Vec::new(),
            workflow: Arc::new(Unconfigured("workflow orchestration")),
            purchase_orders: Arc::new(Unconfigured("erp")),
            failures: FailurePolicy::new(mode, audit.clone()),
            audit,
            decisions: Mutex::new(()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ApprovalNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn with_workflow(mut self, workflow: Arc<dyn WorkflowTrigger>) -> Self {
        self.workflow = workflow;
        self
    }

    pub fn with_purchase_orders(mut self, purchase_orders: Arc<dyn PurchaseOrderClient>) -> Self {
        self.purchase_orders = purchase_orders;
        self
    }

    /// Compares `quotes` against `boq`, stores the result, then triggers the
    /// workflow and notification collaborators. The comparison is persisted
    /// before any collaborator runs, so it stays retrievable even when a
    /// strict-mode collaborator failure is returned.
    pub async fn compare(
        &self,
        boq: Boq,
        quotes: Vec<Quote>,
        correlation_id: &str,
    ) -> Result<ComparisonOutcome, ApplicationError> {
        let comparison = self.engine.compare(&boq, &quotes)?;
        self.comparisons.put(comparison.clone()).await.map_err(persistence)?;

        info!(
            event_name = "comparison.created",
            correlation_id = %correlation_id,
            comparison_id = %comparison.id.0,
            boq_id = %comparison.boq_id.0,
            quote_count = quotes.len(),
            best_vendor = %comparison.best_vendor,
            approval_route = comparison.approval_route.as_str(),
            policy_checks_passed = comparison.policy_evaluation.policy_checks_passed,
            "comparison created"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(comparison.id.clone()),
                correlation_id,
                COMPARISON_CREATED,
                AuditCategory::Comparison,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("best_vendor", comparison.best_vendor.clone())
            .with_metadata("approval_route", comparison.approval_route.as_str())
            .with_metadata("violations", comparison.policy_evaluation.violations.join(",")),
        );

        let id = Some(&comparison.id);
        let mut collaborators = Vec::new();

        let (receipt, _) = self.failures.settle(
            "orchestrate.compare",
            correlation_id,
            id,
            self.workflow.comparison_requested(&boq, &quotes).await,
        )?;
        collaborators.push(receipt);

        let (receipt, _) = self.failures.settle(
            "orchestrate.approval",
            correlation_id,
            id,
            self.workflow.approval_requested(&comparison).await,
        )?;
        collaborators.push(receipt);

        for notifier in &self.notifiers {
            let (receipt, _) = self.failures.settle(
                notifier.channel(),
                correlation_id,
                id,
                notifier.approval_requested(&comparison).await,
            )?;
            collaborators.push(receipt);
        }

        Ok(ComparisonOutcome { comparison, collaborators })
    }

    pub async fn comparison(&self, id: &ComparisonId) -> Result<Comparison, ApplicationError> {
        self.comparisons
            .get(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound(format!("comparison `{}`", id.0)))
    }

    /// Records an approval decision. Approving a comparison with a winning
    /// vendor requests a purchase order first; in strict mode an ERP failure
    /// leaves the comparison pending.
    pub async fn submit_approval(
        &self,
        submission: ApprovalSubmission,
        correlation_id: &str,
    ) -> Result<ApprovalOutcome, ApplicationError> {
        let _guard = self.decisions.lock().await;

        let mut comparison = self.comparison(&submission.comparison_id).await?;
        let next = submission.decision.resulting_status();
        if !comparison.can_transition_to(next) {
            return Err(DomainError::InvalidComparisonTransition { from: comparison.status, to: next }
                .into());
        }

        let mut collaborators = Vec::new();
        let mut purchase_order = None;
        let next_step = match (submission.decision, comparison.winner()) {
            (ApprovalDecision::Rejected, _) => "Comparison rejected; no PO created".to_string(),
            (ApprovalDecision::Approved, None) => {
                "Approved with no winning vendor; no PO created".to_string()
            }
            (ApprovalDecision::Approved, Some(winner)) => {
                let request = PurchaseOrderRequest {
                    comparison_id: comparison.id.clone(),
                    vendor_id: winner.vendor_id.clone(),
                    vendor_name: winner.vendor_name.clone(),
                    amount: winner.total_cost,
                    currency: comparison.currency.clone(),
                    approver_email: submission.approver_email.clone(),
                };
                let (receipt, order) = self.failures.settle(
                    "erp",
                    correlation_id,
                    Some(&comparison.id),
                    self.purchase_orders.create_purchase_order(&request).await,
                )?;
                collaborators.push(receipt);
                purchase_order = order;
                next_step_for(purchase_order.as_ref())
            }
        };

        let decided_at = Utc::now();
        comparison.record_decision(submission.decision, decided_at)?;
        self.comparisons.put(comparison.clone()).await.map_err(persistence)?;

        let record = ApprovalRecord {
            id: ApprovalId::generate(),
            comparison_id: comparison.id.clone(),
            decision: submission.decision,
            approver_role: submission.approver_role,
            approver_email: submission.approver_email,
            comment: submission.comment,
            next_step,
            purchase_order,
            decided_at,
        };
        self.approvals.put(record.clone()).await.map_err(persistence)?;

        info!(
            event_name = "approval.recorded",
            correlation_id = %correlation_id,
            comparison_id = %comparison.id.0,
            approval_id = %record.id.0,
            decision = record.decision.as_str(),
            next_step = %record.next_step,
            "approval decision recorded"
        );
        let mut event = AuditEvent::new(
            Some(comparison.id.clone()),
            correlation_id,
            APPROVAL_RECORDED,
            AuditCategory::Approval,
            record.approver_email.clone().unwrap_or_else(|| ACTOR.to_string()),
            match record.decision {
                ApprovalDecision::Approved => AuditOutcome::Success,
                ApprovalDecision::Rejected => AuditOutcome::Rejected,
            },
        )
        .with_metadata("decision", record.decision.as_str());
        if let Some(order) = record.purchase_order.as_ref() {
            event = event.with_metadata("po_number", order.po_number.clone());
        }
        self.audit.emit(event);

        // the decision is committed; notice failures only degrade the receipt
        for notifier in &self.notifiers {
            let (receipt, _) = self.failures.settle_after_commit(
                notifier.channel(),
                correlation_id,
                Some(&comparison.id),
                notifier.decision_recorded(&record).await,
            );
            collaborators.push(receipt);
        }

        Ok(ApprovalOutcome { record, collaborators })
    }

    pub async fn kpis(&self) -> Result<KpiSnapshot, ApplicationError> {
        let comparisons = self.comparisons.list().await.map_err(persistence)?;
        Ok(KpiSnapshot::from_comparisons(&comparisons))
    }

    /// Reads a workflow execution. Unlike the fan-out calls this never
    /// degrades: an unconfigured or failing orchestrator is an error.
    pub async fn workflow_status(
        &self,
        execution_id: &str,
    ) -> Result<FlowExecution, ApplicationError> {
        match self.workflow.execution_status(execution_id).await {
            Ok(Delivery::Delivered(execution)) => Ok(execution),
            Ok(Delivery::Skipped(reason)) => {
                Err(ApplicationError::Integration(reason))
            }
            Err(error) => Err(ApplicationError::Integration(error.to_string())),
        }
    }
}

fn next_step_for(order: Option<&PurchaseOrder>) -> String {
    match order {
        Some(order) => format!("PO Created: {}", order.po_number),
        None => "Approved; purchase order pending, ERP did not issue one".to_string(),
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
