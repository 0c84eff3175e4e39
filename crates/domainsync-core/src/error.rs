use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainSyncError {
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Phase execution failed: {0}")]
    PhaseExecution(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Rollback failed: {0}")]
    Rollback(String),

    #[error("Semantic analysis failed: {0}")]
    Analysis(String),

    #[error("Content generation failed: {0}")]
    Generation(String),

    #[error("Atomic write failed: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainSyncError {
    /// Timeout errors drive rollback at every checked boundary, so callers
    /// frequently need to distinguish them from ordinary stage failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DomainSyncError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, DomainSyncError>;
