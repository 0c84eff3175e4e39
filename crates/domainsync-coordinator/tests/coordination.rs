//! End-to-end coordination runs over the real holistic update pipeline, with
//! in-memory analysis, generation, write and snapshot collaborators.

use async_trait::async_trait;
use domainsync_core::{
    AtomicFileWriter, ContextGenerator, CoordinateRequest, CoordinatorConfig, DomainContextDoc,
    DomainRules, DomainSyncError, FileOperation, Result, RollbackStore, SemanticAnalyzer,
    SemanticSummary, UpdateConfig,
};
use domainsync_coordinator::CrossDomainCoordinator;
use domainsync_impact::ImpactMapper;
use domainsync_update::HolisticUpdateOrchestrator;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("domainsync=debug")
        .with_test_writer()
        .try_init();
}

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
                business_rules: vec!["validated before persistence".to_string()],
                domain_context: String::new(),
            })
            .collect())
    }
}

struct StubGenerator {
    fail_for: Option<String>,
}

#[async_trait]
impl ContextGenerator for StubGenerator {
    async fn generate_context(
        &self,
        domain: &str,
        summaries: &[SemanticSummary],
    ) -> Result<DomainContextDoc> {
        if self.fail_for.as_deref() == Some(domain) {
            return Err(DomainSyncError::Generation(format!(
                "forced failure for {}",
                domain
            )));
        }
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

#[derive(Default)]
struct RecordingWriter {
    committed: Mutex<Vec<FileOperation>>,
}

#[async_trait]
impl AtomicFileWriter for RecordingWriter {
    async fn commit(&self, operations: &[FileOperation]) -> Result<()> {
        self.committed.lock().extend(operations.iter().cloned());
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.committed.lock().iter().any(|op| op.target_path == path)
    }
}

#[derive(Default)]
struct RecordingRollback {
    snapshots: Mutex<Vec<String>>,
    rollbacks: Mutex<Vec<String>>,
}

#[async_trait]
impl RollbackStore for RecordingRollback {
    async fn create_snapshot(
        &self,
        update_id: &str,
        _domains: &[String],
        _root: &Path,
    ) -> Result<String> {
        self.snapshots.lock().push(update_id.to_string());
        Ok(update_id.to_string())
    }

    async fn execute_rollback(&self, update_id: &str) -> Result<bool> {
        self.rollbacks.lock().push(update_id.to_string());
        Ok(true)
    }

    async fn pending_rollbacks(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }

    async fn cleanup_completed(&self, _older_than_hours: u64) -> Result<()> {
        Ok(())
    }
}

struct Harness {
    coordinator: CrossDomainCoordinator,
    writer: Arc<RecordingWriter>,
    rollback: Arc<RecordingRollback>,
}

fn harness(fail_for: Option<&str>) -> Harness {
    init_tracing();
    let writer = Arc::new(RecordingWriter::default());
    let rollback = Arc::new(RecordingRollback::default());
    let orchestrator = HolisticUpdateOrchestrator::new(
        UpdateConfig::default(),
        DomainRules::default(),
        Arc::new(StubSemantic),
        Arc::new(StubGenerator {
            fail_for: fail_for.map(|d| d.to_string()),
        }),
        writer.clone(),
        rollback.clone(),
        PathBuf::from("."),
    );
    let coordinator = CrossDomainCoordinator::new(
        CoordinatorConfig::default(),
        Arc::new(ImpactMapper::default()),
        Arc::new(orchestrator),
    );
    Harness {
        coordinator,
        writer,
        rollback,
    }
}

fn request(files: &[&str]) -> CoordinateRequest {
    CoordinateRequest {
        changed_files: files.iter().map(|f| f.to_string()).collect(),
        timeout_secs: None,
    }
}

#[tokio::test]
async fn full_run_updates_context_documents_in_dependency_order() {
    let h = harness(None);

    let result = h
        .coordinator
        .coordinate_update(request(&["Analysis/Engine.cs", "Data/Repository.cs"]))
        .await;

    assert!(result.success, "logs: {:#?}", result.logs);
    assert_eq!(result.total_phases, 2);
    assert_eq!(result.executed_phases, 2);
    let mut updated = result.updated_domains.clone();
    updated.sort();
    assert_eq!(updated, vec!["Analysis", "Data"]);
    assert!(!result.rollback_required);

    // Data committed before Analysis, one context document each.
    let committed = h.writer.committed.lock();
    let paths: Vec<&str> = committed.iter().map(|op| op.target_path.as_str()).collect();
    assert_eq!(paths, vec!["docs/context/Data.md", "docs/context/Analysis.md"]);
    assert!(committed[0].content.contains("# Data Domain Context"));
    assert!(h.rollback.rollbacks.lock().is_empty());
}

#[tokio::test]
async fn downstream_failure_rolls_back_the_already_updated_domain() {
    let h = harness(Some("Analysis"));

    let result = h
        .coordinator
        .coordinate_update(request(&["Analysis/Engine.cs", "Data/Repository.cs"]))
        .await;

    assert!(!result.success);
    assert_eq!(result.updated_domains, vec!["Data"]);
    assert_eq!(result.failed_domains, vec!["Analysis"]);
    assert!(result.rollback_required);
    assert!(result.rollback_completed);

    // Data's context document was written before Analysis failed, then its
    // snapshot was restored by the coordinator's rollback sweep.
    let committed = h.writer.committed.lock();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].target_path, "docs/context/Data.md");
    assert!(!h.rollback.rollbacks.lock().is_empty());
}

#[tokio::test]
async fn larger_budget_never_fails_earlier_than_a_smaller_one() {
    let generous = harness(None);
    let result = generous
        .coordinator
        .coordinate_update(request(&["Data/Repository.cs"]))
        .await;
    assert!(result.success);

    let starved = harness(None);
    let mut req = request(&["Data/Repository.cs"]);
    req.timeout_secs = Some(0);
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let result = starved.coordinator.coordinate_update(req).await;

    assert!(!result.success);
    assert!(result.rollback_required);
    assert!(starved.writer.committed.lock().is_empty());
}

#[tokio::test]
async fn repeated_runs_leave_no_active_plans_behind() {
    let h = harness(None);
    for _ in 0..3 {
        let result = h
            .coordinator
            .coordinate_update(request(&["Messaging/Bus.cs"]))
            .await;
        assert!(result.success);
    }
    assert_eq!(h.coordinator.active_plan_count(), 0);
}
