use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::application::{DescriptorStore, EmbeddingProvider};
use crate::domain::{CandidateSet, DomainError, HardFilters, SourceDescriptor};

/// Owns source registration and ranked candidate retrieval.
pub struct SemanticRegistry {
    store: Arc<dyn DescriptorStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
}

impl SemanticRegistry {
    pub fn new(
        store: Arc<dyn DescriptorStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            embedding_provider,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedding_provider.config().dimensions()
    }

    /// Validates, embeds `description` and upserts the descriptor keyed by its urn.
    /// Re-registering an urn replaces the entry and its embedding.
    pub async fn register(&self, descriptor: SourceDescriptor) -> Result<String, DomainError> {
        descriptor.validate()?;
        info!(
            "Registering source: {} ({})",
            descriptor.display_name(),
            descriptor.urn()
        );

        let embedding = self.embed(descriptor.description()).await.map_err(|e| {
            error!(
                "Failed to generate embedding for source {}: {}",
                descriptor.urn(),
                e
            );
            e
        })?;
        self.check_dimensions(&embedding)?;

        let urn = descriptor.urn().to_string();
        self.store
            .upsert(&descriptor.with_embedding(embedding))
            .await
            .map_err(|e| {
                error!("Failed to store source {}: {}", urn, e);
                e
            })?;

        info!("Successfully registered source {}", urn);
        Ok(urn)
    }

    /// Registers several descriptors. All are validated before any is embedded, so a
    /// malformed entry leaves the store untouched.
    pub async fn register_batch(
        &self,
        descriptors: Vec<SourceDescriptor>,
    ) -> Result<Vec<String>, DomainError> {
        for descriptor in &descriptors {
            descriptor.validate()?;
        }

        let texts: Vec<String> = descriptors
            .iter()
            .map(|d| d.description().to_string())
            .collect();
        let embeddings = self
            .embedding_provider
            .embed_batch(&texts)
            .await
            .map_err(as_embedding_unavailable)?;
        if embeddings.len() != descriptors.len() {
            return Err(DomainError::embedding_unavailable(format!(
                "Embedding provider returned {} vectors for {} descriptions",
                embeddings.len(),
                descriptors.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimensions(embedding)?;
        }

        let mut urns = Vec::with_capacity(descriptors.len());
        for (descriptor, embedding) in descriptors.into_iter().zip(embeddings) {
            let urn = descriptor.urn().to_string();
            self.store.upsert(&descriptor.with_embedding(embedding)).await?;
            debug!("Registered source {}", urn);
            urns.push(urn);
        }

        info!("Successfully registered {} sources", urns.len());
        Ok(urns)
    }

    /// Removes a source. Unknown urns are a no-op.
    pub async fn deregister(&self, urn: &str) -> Result<(), DomainError> {
        if self.store.delete(urn).await? {
            info!("Deregistered source {}", urn);
        } else {
            debug!("Deregister of unknown source {} ignored", urn);
        }
        Ok(())
    }

    /// Nearest `limit` descriptors to `intent` among those satisfying `filters`.
    pub async fn find_candidates(
        &self,
        intent: &str,
        filters: &HardFilters,
        limit: usize,
    ) -> Result<CandidateSet, DomainError> {
        if limit == 0 {
            return Ok(CandidateSet::empty());
        }

        let start_time = Instant::now();
        let query_vector = self.embed(intent).await?;
        self.check_dimensions(&query_vector)?;

        let ranked: Vec<(SourceDescriptor, f32)> = self
            .store
            .search(&query_vector, filters, limit)
            .await?
            .into_iter()
            .filter(|(descriptor, _)| filters.matches(descriptor))
            .take(limit)
            .collect();

        let candidates = CandidateSet::from_ranked(ranked);
        debug!(
            "Found {} candidates (filters: {}) in {:.3}s",
            candidates.len(),
            filters.summary(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(candidates)
    }

    pub async fn get(&self, urn: &str) -> Result<Option<SourceDescriptor>, DomainError> {
        self.store.get(urn).await
    }

    /// All registered sources ordered by urn.
    pub async fn list_sources(&self) -> Result<Vec<SourceDescriptor>, DomainError> {
        let mut sources = self.store.list().await?;
        sources.sort_by(|a, b| a.urn().cmp(b.urn()));
        Ok(sources)
    }

    pub async fn count(&self) -> Result<u64, DomainError> {
        self.store.count().await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        self.embedding_provider
            .embed(text)
            .await
            .map_err(as_embedding_unavailable)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), DomainError> {
        let expected = self.dimensions();
        if vector.len() != expected {
            return Err(DomainError::validation(format!(
                "Generated embedding dimension {} does not match expected {}",
                vector.len(),
                expected
            )));
        }
        Ok(())
    }
}

fn as_embedding_unavailable(e: DomainError) -> DomainError {
    if e.is_embedding_unavailable() {
        e
    } else {
        DomainError::embedding_unavailable(e.to_string())
    }
}
