use std::sync::Arc;

use crate::application::SemanticRegistry;
use crate::domain::{DomainError, HardFilters, SourceDescriptor};

/// Catalog browsing for operators. Unlike discovery this applies no relevance ranking
/// and no policy evaluation, so it is not exposed to querying subjects.
pub struct ListSourcesUseCase {
    registry: Arc<SemanticRegistry>,
}

impl ListSourcesUseCase {
    pub fn new(registry: Arc<SemanticRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute(&self, filters: &HardFilters) -> Result<Vec<SourceDescriptor>, DomainError> {
        let sources = self.registry.list_sources().await?;
        Ok(sources.into_iter().filter(|s| filters.matches(s)).collect())
    }

    pub async fn get_by_urn(&self, urn: &str) -> Result<SourceDescriptor, DomainError> {
        self.registry
            .get(urn)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Source {} is not registered", urn)))
    }
}
