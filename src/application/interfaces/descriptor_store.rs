use async_trait::async_trait;

use crate::domain::{DomainError, HardFilters, SourceDescriptor};

/// Durable keyed storage for source descriptors and their embeddings.
///
/// Implementations must tolerate concurrent readers and writers: a search running
/// alongside an upsert sees either the old or the new entry, never a mix.
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    /// Inserts or replaces the entry keyed by `descriptor.urn()`.
    async fn upsert(&self, descriptor: &SourceDescriptor) -> Result<(), DomainError>;

    /// Removes the entry. Returns whether an entry existed.
    async fn delete(&self, urn: &str) -> Result<bool, DomainError>;

    async fn get(&self, urn: &str) -> Result<Option<SourceDescriptor>, DomainError>;

    /// Up to `limit` descriptors satisfying `filters`, nearest first, as
    /// `(descriptor, cosine distance)`. Equal distances are ordered by urn.
    async fn search(
        &self,
        query_vector: &[f32],
        filters: &HardFilters,
        limit: usize,
    ) -> Result<Vec<(SourceDescriptor, f32)>, DomainError>;

    async fn list(&self) -> Result<Vec<SourceDescriptor>, DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;
}
