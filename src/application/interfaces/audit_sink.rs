use crate::domain::AuditEvent;

/// Fire-and-forget destination for denial and systemic-error events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}
