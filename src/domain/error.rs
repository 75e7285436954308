use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Policy evaluation error: {0}")]
    PolicyEvaluation(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Source query failed: {0}")]
    SourceQuery(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn embedding_unavailable(msg: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable(msg.into())
    }

    pub fn policy(msg: impl Into<String>) -> Self {
        Self::PolicyEvaluation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn source_query(msg: impl Into<String>) -> Self {
        Self::SourceQuery(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidInput(_))
    }

    pub fn is_embedding_unavailable(&self) -> bool {
        matches!(self, Self::EmbeddingUnavailable(_))
    }

    pub fn is_policy_error(&self) -> bool {
        matches!(self, Self::PolicyEvaluation(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::StorageError(_))
    }

    /// Errors raised before any source is contacted. These abort a query.
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable(_)
                | Self::StorageError(_)
                | Self::IoError(_)
                | Self::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_systemic_classification() {
        assert!(DomainError::storage("disk gone").is_systemic());
        assert!(DomainError::embedding_unavailable("model offline").is_systemic());
        assert!(!DomainError::policy("bad rule").is_systemic());
        assert!(!DomainError::source_query("502").is_systemic());
        assert!(!DomainError::validation("empty urn").is_systemic());
    }

    #[test]
    fn test_display_includes_category() {
        let err = DomainError::validation("urn must not be empty");
        assert_eq!(err.to_string(), "Validation error: urn must not be empty");
    }
}
