use crate::{DomainContextDoc, FileOperation, Result, SemanticSummary, UpdateRequest, UpdateResult};
use async_trait::async_trait;
use std::path::Path;

/// Extracts business concepts and rules from source files.
#[async_trait]
pub trait SemanticAnalyzer: Send + Sync {
    async fn analyze_files(&self, files: &[String]) -> Result<Vec<SemanticSummary>>;
}

/// Renders a domain-context document from the semantic records attributed to
/// one domain.
#[async_trait]
pub trait ContextGenerator: Send + Sync {
    async fn generate_context(
        &self,
        domain: &str,
        summaries: &[SemanticSummary],
    ) -> Result<DomainContextDoc>;
}

/// Low-level atomic multi-file write primitive. The batch commits
/// all-or-nothing; a failed commit leaves no partial writes behind.
#[async_trait]
pub trait AtomicFileWriter: Send + Sync {
    async fn commit(&self, operations: &[FileOperation]) -> Result<()>;
    /// Whether a target path already exists, deciding create vs update.
    async fn exists(&self, path: &str) -> bool;
}

/// Pre-image snapshot store keyed by update id. Any subset of domains can be
/// restored independently.
#[async_trait]
pub trait RollbackStore: Send + Sync {
    async fn create_snapshot(
        &self,
        update_id: &str,
        domains: &[String],
        root: &Path,
    ) -> Result<String>;
    async fn execute_rollback(&self, update_id: &str) -> Result<bool>;
    async fn pending_rollbacks(&self) -> Result<Vec<String>>;
    async fn cleanup_completed(&self, older_than_hours: u64) -> Result<()>;
}

/// Seam between the coordinator and the per-domain holistic update pipeline.
/// The coordinator never retains domain state itself; it drives updates and
/// rollbacks through this trait only.
#[async_trait]
pub trait DomainUpdater: Send + Sync {
    async fn execute_update(&self, request: UpdateRequest) -> Result<UpdateResult>;
    async fn rollback_update(&self, update_id: &str) -> Result<bool>;
}
