//! Holistic update pipeline: regenerates a domain's context documents from
//! its changed files as one bounded, all-or-nothing transaction.

mod plan;

pub use plan::DomainUpdatePlan;

use async_trait::async_trait;
use domainsync_core::{
    generate_id, AtomicFileWriter, ContextGenerator, DomainBoundaryAnalyzer, DomainRules,
    DomainSyncError, DomainUpdater, FileOpKind, FileOperation, Result, RollbackStore,
    SemanticAnalyzer, SemanticSummary, UpdateConfig, UpdateRequest, UpdateResult,
    UpdateStageMetrics,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Executes one domain set's update as a five-stage pipeline, every stage
/// charged against a single wall-clock budget. Collaborators are injected;
/// the orchestrator retains no domain state across calls.
pub struct HolisticUpdateOrchestrator {
    config: UpdateConfig,
    rules: DomainRules,
    analyzer: DomainBoundaryAnalyzer,
    semantic: Arc<dyn SemanticAnalyzer>,
    generator: Arc<dyn ContextGenerator>,
    writer: Arc<dyn AtomicFileWriter>,
    rollback: Arc<dyn RollbackStore>,
    root: PathBuf,
}

struct Budget {
    started: Instant,
    limit_secs: u64,
}

impl Budget {
    fn new(limit_secs: u64) -> Self {
        Self {
            started: Instant::now(),
            limit_secs,
        }
    }

    /// Polled at stage boundaries only; in-flight work is never interrupted.
    fn check(&self, stage: &str) -> Result<()> {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > self.limit_secs as f64 {
            return Err(DomainSyncError::Timeout(format!(
                "{:.1}s elapsed of {}s budget before stage '{}'",
                elapsed, self.limit_secs, stage
            )));
        }
        Ok(())
    }
}

impl HolisticUpdateOrchestrator {
    pub fn new(
        config: UpdateConfig,
        rules: DomainRules,
        semantic: Arc<dyn SemanticAnalyzer>,
        generator: Arc<dyn ContextGenerator>,
        writer: Arc<dyn AtomicFileWriter>,
        rollback: Arc<dyn RollbackStore>,
        root: PathBuf,
    ) -> Self {
        Self {
            config,
            rules,
            analyzer: DomainBoundaryAnalyzer::new(),
            semantic,
            generator,
            writer,
            rollback,
            root,
        }
    }

    /// Run the full pipeline. Always returns a complete result record; a
    /// stage failure triggers exactly one rollback attempt first.
    pub async fn execute_holistic_update(&self, request: UpdateRequest) -> UpdateResult {
        let started = Instant::now();
        let update_id = generate_id("update");
        let mut metrics = UpdateStageMetrics::default();

        match self.run_pipeline(&update_id, &request, &mut metrics).await {
            Ok((domains, files)) => {
                info!(
                    update_id = %update_id,
                    domains = domains.len(),
                    files = files.len(),
                    "holistic update complete"
                );
                UpdateResult {
                    success: true,
                    update_id,
                    execution_time_ms: started.elapsed().as_millis() as u64,
                    affected_domains: domains,
                    updated_files: files,
                    metrics,
                    error: None,
                }
            }
            Err(e) => {
                error!(update_id = %update_id, error = %e, "holistic update failed");
                match self.rollback.execute_rollback(&update_id).await {
                    Ok(restored) => {
                        info!(update_id = %update_id, restored, "rollback attempt finished")
                    }
                    Err(rb) => {
                        warn!(update_id = %update_id, error = %rb, "rollback attempt failed")
                    }
                }
                UpdateResult {
                    success: false,
                    update_id,
                    execution_time_ms: started.elapsed().as_millis() as u64,
                    affected_domains: vec![],
                    updated_files: vec![],
                    metrics,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        update_id: &str,
        request: &UpdateRequest,
        metrics: &mut UpdateStageMetrics,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let budget = Budget::new(request.timeout_secs.unwrap_or(self.config.timeout_secs));

        // Stage 1: semantic analysis over source-like files.
        budget.check("semantic-analysis")?;
        let stage = Instant::now();
        let source_files: Vec<String> = request
            .changed_files
            .iter()
            .filter(|f| self.analyzer.is_source_file(f, &self.config.source_extensions))
            .cloned()
            .collect();
        let summaries: Vec<SemanticSummary> = if source_files.is_empty() {
            Vec::new()
        } else {
            self.semantic.analyze_files(&source_files).await?
        };
        metrics.analysis_ms = stage.elapsed().as_millis() as u64;

        // Stage 2: domain inference and per-domain plans.
        budget.check("impact-refinement")?;
        let stage = Instant::now();
        let plans = plan::build_plans(
            &self.analyzer,
            &self.rules,
            &request.changed_files,
            &summaries,
        );
        metrics.planning_ms = stage.elapsed().as_millis() as u64;
        if plans.is_empty() {
            info!("no domains affected, nothing to update");
            return Ok((vec![], vec![]));
        }
        let domains: Vec<String> = plans.iter().map(|p| p.domain.clone()).collect();

        // Stage 3: pre-image capture before any write.
        budget.check("snapshot")?;
        let stage = Instant::now();
        self.rollback
            .create_snapshot(update_id, &domains, &self.root)
            .await?;
        metrics.snapshot_ms = stage.elapsed().as_millis() as u64;

        // Stage 4: per-domain content generation.
        budget.check("content-generation")?;
        let stage = Instant::now();
        let mut documents = Vec::with_capacity(plans.len());
        for p in &plans {
            let scoped = plan::summaries_for_domain(&self.analyzer, &p.domain, &summaries);
            let doc = self.generator.generate_context(&p.domain, &scoped).await?;
            documents.push(doc);
        }
        metrics.generation_ms = stage.elapsed().as_millis() as u64;

        // Stage 5: one all-or-nothing write batch.
        budget.check("atomic-write")?;
        let stage = Instant::now();
        let mut operations = Vec::with_capacity(documents.len());
        for doc in &documents {
            let target_path = format!("{}/{}.md", self.config.context_root, doc.domain);
            let kind = if self.writer.exists(&target_path).await {
                FileOpKind::Update
            } else {
                FileOpKind::Create
            };
            operations.push(FileOperation {
                kind,
                target_path,
                content: doc.render(),
            });
        }
        self.writer.commit(&operations).await?;
        metrics.write_ms = stage.elapsed().as_millis() as u64;

        let updated_files = operations.into_iter().map(|o| o.target_path).collect();
        Ok((domains, updated_files))
    }

    /// Maintenance passthroughs to the snapshot store.
    pub async fn pending_rollbacks(&self) -> Result<Vec<String>> {
        self.rollback.pending_rollbacks().await
    }

    pub async fn cleanup_snapshots(&self, older_than_hours: u64) -> Result<()> {
        self.rollback.cleanup_completed(older_than_hours).await
    }
}

#[async_trait]
impl DomainUpdater for HolisticUpdateOrchestrator {
    async fn execute_update(&self, request: UpdateRequest) -> Result<UpdateResult> {
        Ok(self.execute_holistic_update(request).await)
    }

    async fn rollback_update(&self, update_id: &str) -> Result<bool> {
        self.rollback.execute_rollback(update_id).await
    }
}
