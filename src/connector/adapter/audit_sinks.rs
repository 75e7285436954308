use std::sync::{Arc, Mutex};

use tracing::{error, warn};

use crate::application::AuditSink;
use crate::domain::{AuditEvent, AuditEventKind};

/// Writes audit events to the structured tracing log.
///
/// Denials go out at `WARN`, evaluation failures and systemic errors at `ERROR`,
/// each with `event`, `subject`, `urn` and `rule_id` fields so a JSON subscriber can
/// index them.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let query_id = event
            .query_id()
            .map(|id| id.to_string())
            .unwrap_or_default();
        let urn = event.urn().unwrap_or("-");
        let rule_id = event.rule_id().unwrap_or("-");
        let detail = event.detail().unwrap_or("");

        match event.kind() {
            AuditEventKind::PolicyDenied => warn!(
                target: "fedcatalog::audit",
                event = event.kind().as_str(),
                query_id = %query_id,
                subject = event.subject_id(),
                urn,
                rule_id,
                "Access denied"
            ),
            AuditEventKind::PolicyEvaluationFailed | AuditEventKind::SystemicError => error!(
                target: "fedcatalog::audit",
                event = event.kind().as_str(),
                query_id = %query_id,
                subject = event.subject_id(),
                urn,
                rule_id,
                detail,
                "Governance failure"
            ),
        }
    }
}

/// Keeps every event in memory for later inspection.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_of(&self, kind: AuditEventKind) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind() == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Forwards each event to every wrapped sink in order.
#[derive(Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fanout_reaches_every_sink() {
        let first = Arc::new(InMemoryAuditSink::new());
        let second = Arc::new(InMemoryAuditSink::new());
        let fanout = FanoutAuditSink::new(vec![first.clone(), second.clone()])
            .with_sink(Arc::new(TracingAuditSink::new()));

        fanout.record(AuditEvent::denied(None, "u1", "urn:a", "acl"));
        fanout.record(AuditEvent::systemic(None, "u1", "store down"));

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(first.events_of(AuditEventKind::SystemicError).len(), 1);
    }

    #[test]
    fn test_in_memory_sink_starts_empty() {
        let sink = InMemoryAuditSink::new();

        assert!(sink.is_empty());
        assert!(sink.events().is_empty());
    }
}
