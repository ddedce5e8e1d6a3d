use procurely_core::audit::{AuditEvent, AuditSink};
use tracing::info;

/// Writes audit events to the structured log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let comparison_id = event.comparison_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown");
        info!(
            event_name = "audit.event",
            audit_event_type = %event.event_type,
            audit_event_id = %event.event_id,
            correlation_id = %event.correlation_id,
            comparison_id = %comparison_id,
            category = ?event.category,
            outcome = ?event.outcome,
            actor = %event.actor,
            metadata = ?event.metadata,
            occurred_at = %event.occurred_at.to_rfc3339(),
            "audit event"
        );
    }
}
