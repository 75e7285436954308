use crate::domain::{AggregatedResponse, DomainError, LineageEnvelope};

/// Produces the audit envelope attached to a finished response.
pub trait LineageStamper: Send + Sync {
    fn stamp(
        &self,
        response: &AggregatedResponse,
        intent_hash: &str,
    ) -> Result<LineageEnvelope, DomainError>;
}
