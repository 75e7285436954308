use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// The access rule (or ACL) evaluated to deny.
    PolicyDenied,
    /// The evaluator could not decide; the candidate was denied fail-closed.
    PolicyEvaluationFailed,
    /// The query aborted before dispatch.
    SystemicError,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::PolicyDenied => "policy_denied",
            AuditEventKind::PolicyEvaluationFailed => "policy_evaluation_failed",
            AuditEventKind::SystemicError => "systemic_error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    kind: AuditEventKind,
    query_id: Option<Uuid>,
    subject_id: String,
    urn: Option<String>,
    rule_id: Option<String>,
    detail: Option<String>,
    timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn denied(
        query_id: Option<Uuid>,
        subject_id: impl Into<String>,
        urn: impl Into<String>,
        rule_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: AuditEventKind::PolicyDenied,
            query_id,
            subject_id: subject_id.into(),
            urn: Some(urn.into()),
            rule_id: Some(rule_id.into()),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn evaluation_failed(
        query_id: Option<Uuid>,
        subject_id: impl Into<String>,
        urn: impl Into<String>,
        rule_id: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: AuditEventKind::PolicyEvaluationFailed,
            query_id,
            subject_id: subject_id.into(),
            urn: Some(urn.into()),
            rule_id: Some(rule_id.into()),
            detail: Some(detail.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn systemic(
        query_id: Option<Uuid>,
        subject_id: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: AuditEventKind::SystemicError,
            query_id,
            subject_id: subject_id.into(),
            urn: None,
            rule_id: None,
            detail: Some(detail.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> AuditEventKind {
        self.kind
    }

    pub fn query_id(&self) -> Option<Uuid> {
        self.query_id
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn urn(&self) -> Option<&str> {
        self.urn.as_deref()
    }

    pub fn rule_id(&self) -> Option<&str> {
        self.rule_id.as_deref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
