use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{AccessRule, AuthorizationContext, DomainError, PolicyLanguage, SourceDescriptor};

/// Action tag every catalog query is evaluated under.
pub const QUERY_ACTION: &str = "query";

/// Facts handed to a policy evaluator for one (subject, object) pair.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyInput {
    subject: Map<String, Value>,
    object: Map<String, Value>,
    action: String,
}

impl PolicyInput {
    pub fn new(subject: Map<String, Value>, object: Map<String, Value>, action: impl Into<String>) -> Self {
        Self {
            subject,
            object,
            action: action.into(),
        }
    }

    pub fn for_query(context: &AuthorizationContext, descriptor: &SourceDescriptor) -> Self {
        Self::new(
            context.subject_attributes().clone(),
            descriptor.policy_object(),
            QUERY_ACTION,
        )
    }

    pub fn subject(&self) -> &Map<String, Value> {
        &self.subject
    }

    pub fn object(&self) -> &Map<String, Value> {
        &self.object
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

/// Pure decision function: (rule, facts) -> allow/deny.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// `Ok(false)` is an intentional deny; `Err` means no decision could be made.
    async fn evaluate(&self, rule: &AccessRule, input: &PolicyInput) -> Result<bool, DomainError>;

    fn supports(&self, language: PolicyLanguage) -> bool;
}
