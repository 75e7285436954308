use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::{DispatchTarget, DomainError};

/// A query rewritten for one specific source.
#[derive(Debug, Clone, Serialize)]
pub struct TranslatedRequest {
    query_id: Uuid,
    source_urn: String,
    #[serde(skip)]
    endpoint: String,
    intent: String,
}

impl TranslatedRequest {
    pub fn new(query_id: Uuid, target: &DispatchTarget, intent: impl Into<String>) -> Self {
        Self {
            query_id,
            source_urn: target.urn().to_string(),
            endpoint: target.endpoint().to_string(),
            intent: intent.into(),
        }
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn source_urn(&self) -> &str {
        &self.source_urn
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }
}

/// Executes queries against one remote source.
#[async_trait]
pub trait RemoteSourceClient: Send + Sync {
    /// Rewrites the caller's intent for this source. The default passes it through.
    fn translate(&self, query_id: Uuid, intent: &str, target: &DispatchTarget) -> TranslatedRequest {
        TranslatedRequest::new(query_id, target, intent)
    }

    /// Runs the request, giving up by `deadline`.
    async fn query(&self, request: &TranslatedRequest, deadline: Instant) -> Result<Value, DomainError>;
}

/// Hands out the long-lived client for a dispatch target.
pub trait SourceClientProvider: Send + Sync {
    fn client_for(&self, target: &DispatchTarget) -> Result<Arc<dyn RemoteSourceClient>, DomainError>;
}
