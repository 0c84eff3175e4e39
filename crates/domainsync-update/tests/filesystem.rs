//! Holistic update runs against a real directory: context documents land on
//! disk under the configured context root, and reruns flip creates to
//! updates.

use async_trait::async_trait;
use domainsync_core::{
    AtomicFileWriter, ContextGenerator, DomainContextDoc, DomainRules, FileOpKind, FileOperation,
    Result, RollbackStore, SemanticAnalyzer, SemanticSummary, TriggerKind, UpdateConfig,
    UpdateRequest,
};
use domainsync_update::HolisticUpdateOrchestrator;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct StubSemantic;

#[async_trait]
impl SemanticAnalyzer for StubSemantic {
    async fn analyze_files(&self, files: &[String]) -> Result<Vec<SemanticSummary>> {
        Ok(files
            .iter()
            .map(|f| SemanticSummary {
                file_path: f.clone(),
                language: "csharp".to_string(),
                business_concepts: vec![],
                business_rules: vec![],
                domain_context: String::new(),
            })
            .collect())
    }
}

struct StubGenerator;

#[async_trait]
impl ContextGenerator for StubGenerator {
    async fn generate_context(
        &self,
        domain: &str,
        summaries: &[SemanticSummary],
    ) -> Result<DomainContextDoc> {
        Ok(DomainContextDoc {
            domain: domain.to_string(),
            overview: format!("{} overview", domain),
            current_implementation: format!("{} files analyzed", summaries.len()),
            business_rules: "rules".to_string(),
            integration_points: "points".to_string(),
            recent_changes: "changes".to_string(),
        })
    }
}

/// Writes each operation to a staging file then renames it into place.
struct DirWriter {
    root: PathBuf,
    committed_kinds: Mutex<Vec<FileOpKind>>,
}

impl DirWriter {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            committed_kinds: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl AtomicFileWriter for DirWriter {
    async fn commit(&self, operations: &[FileOperation]) -> Result<()> {
        for op in operations {
            let target = self.root.join(&op.target_path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let staged = target.with_extension("md.tmp");
            std::fs::write(&staged, &op.content)?;
            std::fs::rename(&staged, &target)?;
            self.committed_kinds.lock().push(op.kind);
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }
}

#[derive(Default)]
struct NullRollback;

#[async_trait]
impl RollbackStore for NullRollback {
    async fn create_snapshot(
        &self,
        update_id: &str,
        _domains: &[String],
        _root: &Path,
    ) -> Result<String> {
        Ok(update_id.to_string())
    }

    async fn execute_rollback(&self, _update_id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn pending_rollbacks(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }

    async fn cleanup_completed(&self, _older_than_hours: u64) -> Result<()> {
        Ok(())
    }
}

fn orchestrator(root: &Path, writer: Arc<DirWriter>) -> HolisticUpdateOrchestrator {
    HolisticUpdateOrchestrator::new(
        UpdateConfig::default(),
        DomainRules::default(),
        Arc::new(StubSemantic),
        Arc::new(StubGenerator),
        writer,
        Arc::new(NullRollback),
        root.to_path_buf(),
    )
}

fn request(files: &[&str]) -> UpdateRequest {
    UpdateRequest {
        changed_files: files.iter().map(|f| f.to_string()).collect(),
        trigger: TriggerKind::Hook,
        timeout_secs: None,
    }
}

#[tokio::test]
async fn context_documents_land_on_disk() {
    let dir = TempDir::new().expect("temp dir");
    let writer = Arc::new(DirWriter::new(dir.path()));
    let orch = orchestrator(dir.path(), writer.clone());

    let result = orch
        .execute_holistic_update(request(&["Analysis/Engine.cs", "Data/Repository.cs"]))
        .await;

    assert!(result.success, "error: {:?}", result.error);
    for domain in ["Data", "Analysis"] {
        let path = dir.path().join(format!("docs/context/{}.md", domain));
        let text = std::fs::read_to_string(&path).expect("context file on disk");
        assert!(text.contains(&format!("# {} Domain Context", domain)));
        assert!(text.contains("## Business Rules"));
    }
    assert!(writer
        .committed_kinds
        .lock()
        .iter()
        .all(|k| *k == FileOpKind::Create));
}

#[tokio::test]
async fn rerun_updates_existing_documents_in_place() {
    let dir = TempDir::new().expect("temp dir");
    let writer = Arc::new(DirWriter::new(dir.path()));
    let orch = orchestrator(dir.path(), writer.clone());

    let first = orch
        .execute_holistic_update(request(&["Analysis/Engine.cs"]))
        .await;
    assert!(first.success);
    let second = orch
        .execute_holistic_update(request(&["Analysis/Engine.cs"]))
        .await;
    assert!(second.success);

    let kinds = writer.committed_kinds.lock();
    assert_eq!(*kinds, vec![FileOpKind::Create, FileOpKind::Update]);
    let path = dir.path().join("docs/context/Analysis.md");
    assert!(path.exists());
    // No staging leftovers next to the target.
    assert!(!dir.path().join("docs/context/Analysis.md.tmp").exists());
}
