use async_trait::async_trait;

use crate::domain::{DomainError, EmbeddingConfig};

/// Turns text into fixed-length vectors. Fails with `EmbeddingUnavailable` when the
/// model cannot be reached.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn config(&self) -> &EmbeddingConfig;
}
