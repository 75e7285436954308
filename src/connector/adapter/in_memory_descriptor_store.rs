use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::application::DescriptorStore;
use crate::domain::{compare_ranked, DomainError, HardFilters, SourceDescriptor};

/// Process-local descriptor store. Brute-force cosine ranking over every entry.
pub struct InMemoryDescriptorStore {
    descriptors: Arc<RwLock<HashMap<String, SourceDescriptor>>>,
}

impl InMemoryDescriptorStore {
    pub fn new() -> Self {
        Self {
            descriptors: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryDescriptorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DescriptorStore for InMemoryDescriptorStore {
    async fn upsert(&self, descriptor: &SourceDescriptor) -> Result<(), DomainError> {
        if !descriptor.has_embedding() {
            return Err(DomainError::invalid_input(format!(
                "Descriptor {} has no embedding",
                descriptor.urn()
            )));
        }

        let mut store = self.descriptors.write().await;
        let replaced = store
            .insert(descriptor.urn().to_string(), descriptor.clone())
            .is_some();

        debug!(
            "{} descriptor {} in memory",
            if replaced { "Replaced" } else { "Inserted" },
            descriptor.urn()
        );
        Ok(())
    }

    async fn delete(&self, urn: &str) -> Result<bool, DomainError> {
        let mut store = self.descriptors.write().await;
        Ok(store.remove(urn).is_some())
    }

    async fn get(&self, urn: &str) -> Result<Option<SourceDescriptor>, DomainError> {
        let store = self.descriptors.read().await;
        Ok(store.get(urn).cloned())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filters: &HardFilters,
        limit: usize,
    ) -> Result<Vec<(SourceDescriptor, f32)>, DomainError> {
        let store = self.descriptors.read().await;

        let mut scored: Vec<(&SourceDescriptor, f32)> = store
            .values()
            .filter(|descriptor| filters.matches(descriptor))
            .map(|descriptor| {
                let distance = 1.0 - cosine_similarity(query_vector, descriptor.embedding());
                (descriptor, distance)
            })
            .collect();

        scored.sort_by(|a, b| compare_ranked(a.0.urn(), a.1, b.0.urn(), b.1));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(descriptor, distance)| (descriptor.clone(), distance))
            .collect())
    }

    async fn list(&self) -> Result<Vec<SourceDescriptor>, DomainError> {
        let store = self.descriptors.read().await;
        Ok(store.values().cloned().collect())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let store = self.descriptors.read().await;
        Ok(store.len() as u64)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
