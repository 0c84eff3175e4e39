use crate::phases;
use crate::resources::ResourceRegistry;
use crate::strategy;
use chrono::Utc;
use dashmap::DashMap;
use domainsync_core::{
    generate_id, CoordinateRequest, CoordinationMetrics, CoordinationPlan, CoordinationResult,
    CoordinationState, CoordinationStrategy, CoordinatorConfig, DomainCoordination,
    DomainSyncError, DomainUpdater, ExecutionPhase, ImpactAnalysis, ResourceKind, Result,
    RiskFactor, RiskTier, TriggerKind, UpdateRequest, UpdateResult,
};
use domainsync_impact::ImpactMapper;
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Coordinates one multi-domain update run: plan, setup, execute, validate,
/// with best-effort rollback on any execution failure or timeout.
///
/// Explicitly constructed and dependency-injected; each run's plan is
/// private to that run and discarded when the run finishes.
pub struct CrossDomainCoordinator {
    config: CoordinatorConfig,
    mapper: Arc<ImpactMapper>,
    updater: Arc<dyn DomainUpdater>,
    resources: ResourceRegistry,
    active_plans: DashMap<String, CoordinationPlan>,
}

struct Run {
    plan: CoordinationPlan,
    logs: Vec<String>,
    metrics: CoordinationMetrics,
    /// Domains in the order they reached a terminal state.
    completion_order: Vec<String>,
    update_ids: BTreeMap<String, String>,
    executed_phases: u32,
    warned: bool,
}

fn log(logs: &mut Vec<String>, msg: impl Into<String>) {
    let msg = msg.into();
    info!("{}", msg);
    logs.push(format!("[{}] {}", Utc::now().format("%H:%M:%S%.3f"), msg));
}

impl CrossDomainCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        mapper: Arc<ImpactMapper>,
        updater: Arc<dyn DomainUpdater>,
    ) -> Self {
        Self {
            config,
            mapper,
            updater,
            resources: ResourceRegistry::default(),
            active_plans: DashMap::new(),
        }
    }

    pub fn with_resources(mut self, resources: ResourceRegistry) -> Self {
        self.resources = resources;
        self
    }

    pub fn active_plan_count(&self) -> usize {
        self.active_plans.len()
    }

    /// Run a full coordination. Always returns a complete result record; no
    /// error escapes to the caller.
    pub async fn coordinate_update(&self, request: CoordinateRequest) -> CoordinationResult {
        let started = Instant::now();
        let budget =
            Duration::from_secs(request.timeout_secs.unwrap_or(self.config.run_timeout_secs));
        let plan_id = generate_id("plan");
        let mut logs = Vec::new();
        log(
            &mut logs,
            format!(
                "coordination {} requested for {} changed files (budget {}s)",
                plan_id,
                request.changed_files.len(),
                budget.as_secs()
            ),
        );

        // ---- Stage 1: plan ----
        if let Err(e) = self.check_deadline(started, budget, "planning") {
            return self.timeout_result(plan_id, logs, started, e);
        }
        let analysis_start = Instant::now();
        let analysis = match self.mapper.predict_change_impact(&request.changed_files) {
            Ok(a) => a,
            Err(e) => {
                log(&mut logs, format!("impact analysis failed: {}", e));
                return failure_result(plan_id, logs, started, CoordinationMetrics::default());
            }
        };
        let metrics = CoordinationMetrics {
            analysis_ms: analysis_start.elapsed().as_millis() as u64,
            ..Default::default()
        };

        if analysis.graph.is_empty() {
            log(&mut logs, "no impacted domains, nothing to coordinate");
            return CoordinationResult {
                success: true,
                plan_id,
                executed_phases: 0,
                total_phases: 0,
                execution_time_ms: started.elapsed().as_millis() as u64,
                updated_domains: vec![],
                failed_domains: vec![],
                rollback_required: false,
                rollback_completed: false,
                logs,
                metrics,
            };
        }

        let coordination_start = Instant::now();
        let (plan, degraded) = self.build_plan(plan_id.clone(), &request, &analysis);
        log(
            &mut logs,
            format!(
                "plan ready: {} domains across {} phases, estimated {:.0}s sequential",
                plan.domains.len(),
                plan.phases.len(),
                plan.total_estimated_secs
            ),
        );
        if degraded {
            // A cycle survived past the mapper's detector; surface it loudly
            // instead of silently degrading.
            warn!(plan_id = %plan.plan_id, "plan contains a degraded final phase");
            log(
                &mut logs,
                "WARNING: unresolvable dependency order, final phase is degraded (suspected circular dependency)",
            );
        }
        self.active_plans.insert(plan_id.clone(), plan.clone());

        let mut run = Run {
            plan,
            logs,
            metrics,
            completion_order: Vec::new(),
            update_ids: BTreeMap::new(),
            executed_phases: 0,
            warned: false,
        };

        // ---- Stage 2: setup ----
        if let Err(e) = self.check_deadline(started, budget, "setup") {
            run.metrics.coordination_ms = coordination_start.elapsed().as_millis() as u64;
            return self.finish_with_rollback(run, started, e).await;
        }
        let setup_outcome = self.setup(&mut run);
        run.metrics.coordination_ms = coordination_start.elapsed().as_millis() as u64;
        if let Err(e) = setup_outcome {
            log(&mut run.logs, format!("setup failed: {}", e));
            // Nothing executed, so nothing to roll back.
            return self.finish(run, started, false, false, false);
        }

        // ---- Stage 3: execute ----
        let execution_start = Instant::now();
        let phases = run.plan.phases.clone();
        let total_phases = phases.len();
        for phase in &phases {
            if let Err(e) = self.check_deadline(started, budget, &phase.name) {
                run.metrics.execution_ms = execution_start.elapsed().as_millis() as u64;
                return self.finish_with_rollback(run, started, e).await;
            }
            self.soft_warn(&mut run, started, budget);
            log(
                &mut run.logs,
                format!(
                    "{}: executing {} domain(s){}",
                    phase.name,
                    phase.domains.len(),
                    if phase.parallel && phase.domains.len() > 1 {
                        " concurrently"
                    } else {
                        " sequentially"
                    }
                ),
            );
            run.executed_phases += 1;
            if let Err(e) = self.execute_phase(phase, &mut run).await {
                run.metrics.execution_ms = execution_start.elapsed().as_millis() as u64;
                return self.finish_with_rollback(run, started, e).await;
            }
            log(&mut run.logs, format!("{} completed", phase.name));
        }
        run.metrics.execution_ms = execution_start.elapsed().as_millis() as u64;
        debug_assert_eq!(run.executed_phases as usize, total_phases);

        // ---- Stage 4: validate ----
        if let Err(e) = self.check_deadline(started, budget, "validation") {
            return self.finish_with_rollback(run, started, e).await;
        }
        let validation_start = Instant::now();
        let validation_errors = self.validate(&run, execution_start.elapsed());
        run.metrics.validation_ms = validation_start.elapsed().as_millis() as u64;
        let success = validation_errors.is_empty();
        for v in &validation_errors {
            log(&mut run.logs, format!("validation: {}", v));
        }
        if success {
            log(&mut run.logs, "coordination completed successfully");
        }
        // SLA and critical-domain checks are reported, never rolled back;
        // execution itself already succeeded here.
        self.finish(run, started, success, false, false)
    }

    fn build_plan(
        &self,
        plan_id: String,
        request: &CoordinateRequest,
        analysis: &ImpactAnalysis,
    ) -> (CoordinationPlan, bool) {
        let graph = &analysis.graph;
        let mut domains: BTreeMap<String, DomainCoordination> = BTreeMap::new();
        for node in &graph.nodes {
            let dependencies = graph.dependencies_of(&node.domain);
            let dependents = graph.dependents_of(&node.domain);
            let strategy: CoordinationStrategy =
                strategy::build_strategy(node, &dependencies, &dependents);
            domains.insert(
                node.domain.clone(),
                DomainCoordination {
                    domain: node.domain.clone(),
                    dependencies,
                    dependents,
                    strategy,
                    state: CoordinationState::Analysis,
                    errors: vec![],
                },
            );
        }

        let (phases, degraded) = phases::build_phases(&analysis.update_sequence, &domains, graph);

        let plan = CoordinationPlan {
            plan_id,
            changed_files: request.changed_files.clone(),
            graph: graph.clone(),
            domains,
            total_estimated_secs: graph.total_estimated_secs,
            risk_assessment: risk_assessment_text(&analysis.risk_factors),
            rollback_strategy: rollback_strategy_text(&phases),
            phases,
            created_at: Utc::now(),
        };
        (plan, degraded)
    }

    fn setup(&self, run: &mut Run) -> Result<()> {
        for coordination in run.plan.domains.values_mut() {
            coordination.state = CoordinationState::Preparation;
        }
        let required: HashSet<ResourceKind> = run
            .plan
            .domains
            .values()
            .flat_map(|c| c.strategy.required_resources.iter().copied())
            .collect();
        self.resources.verify(&required)?;
        log(
            &mut run.logs,
            format!("setup complete, {} distinct resources verified", required.len()),
        );
        Ok(())
    }

    async fn execute_phase(&self, phase: &ExecutionPhase, run: &mut Run) -> Result<()> {
        for domain in &phase.domains {
            if let Some(c) = run.plan.domains.get_mut(domain) {
                c.state = CoordinationState::Execution;
            }
        }

        let jobs: Vec<_> = phase
            .domains
            .iter()
            .map(|domain| {
                let files = run
                    .plan
                    .graph
                    .node(domain)
                    .map(|n| n.changed_files.clone())
                    .unwrap_or_default();
                self.run_domain(domain.clone(), files)
            })
            .collect();

        // Parallel phases settle all members; a sibling failure never
        // cancels in-flight updates.
        let outcomes: Vec<(String, Result<UpdateResult>)> =
            if phase.parallel && phase.domains.len() > 1 {
                join_all(jobs).await
            } else {
                let mut settled = Vec::with_capacity(jobs.len());
                for job in jobs {
                    settled.push(job.await);
                }
                settled
            };

        let mut failures: Vec<String> = Vec::new();
        for (domain, outcome) in outcomes {
            let Some(coordination) = run.plan.domains.get_mut(&domain) else {
                continue;
            };
            match outcome {
                Ok(result) => {
                    run.update_ids.insert(domain.clone(), result.update_id.clone());
                    if result.success {
                        coordination.state = CoordinationState::Completed;
                        log(
                            &mut run.logs,
                            format!(
                                "{}: updated {} file(s) in {}ms",
                                domain,
                                result.updated_files.len(),
                                result.execution_time_ms
                            ),
                        );
                    } else {
                        let msg = result
                            .error
                            .unwrap_or_else(|| "update reported failure".to_string());
                        coordination.state = CoordinationState::Failed;
                        coordination.errors.push(msg.clone());
                        log(&mut run.logs, format!("{}: failed: {}", domain, msg));
                        failures.push(format!("{}: {}", domain, msg));
                    }
                }
                Err(e) => {
                    coordination.state = CoordinationState::Failed;
                    coordination.errors.push(e.to_string());
                    log(&mut run.logs, format!("{}: failed: {}", domain, e));
                    failures.push(format!("{}: {}", domain, e));
                }
            }
            run.completion_order.push(domain);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DomainSyncError::PhaseExecution(format!(
                "{}: {}",
                phase.name,
                failures.join("; ")
            )))
        }
    }

    async fn run_domain(
        &self,
        domain: String,
        changed_files: Vec<String>,
    ) -> (String, Result<UpdateResult>) {
        let request = UpdateRequest {
            changed_files,
            trigger: TriggerKind::Manual,
            timeout_secs: Some(self.config.domain_timeout_secs),
        };
        let outcome = self.updater.execute_update(request).await;
        (domain, outcome)
    }

    /// Best-effort rollback of every domain that reached a terminal state,
    /// last-completed-first. A domain that fails to roll back is recorded
    /// and the loop continues.
    async fn rollback_all(&self, run: &mut Run) -> bool {
        let mut all_ok = true;
        let order: Vec<String> = run.completion_order.iter().rev().cloned().collect();
        for domain in order {
            let terminal = run
                .plan
                .domains
                .get(&domain)
                .map(|c| {
                    matches!(
                        c.state,
                        CoordinationState::Completed | CoordinationState::Failed
                    )
                })
                .unwrap_or(false);
            if !terminal {
                continue;
            }
            match run.update_ids.get(&domain) {
                Some(update_id) => match self.updater.rollback_update(update_id).await {
                    Ok(restored) => {
                        log(
                            &mut run.logs,
                            format!("rollback {}: restored={}", domain, restored),
                        );
                    }
                    Err(e) => {
                        error!(domain = %domain, error = %e, "rollback failed");
                        log(&mut run.logs, format!("rollback {} FAILED: {}", domain, e));
                        all_ok = false;
                    }
                },
                None => {
                    warn!(domain = %domain, "no update id recorded, cannot roll back");
                    log(
                        &mut run.logs,
                        format!("rollback {}: no update id recorded", domain),
                    );
                    all_ok = false;
                }
            }
        }
        all_ok
    }

    fn validate(&self, run: &Run, execution_elapsed: Duration) -> Vec<String> {
        let mut errors = Vec::new();
        for (domain, c) in &run.plan.domains {
            if c.state == CoordinationState::Failed {
                if c.strategy.risk == RiskTier::High {
                    errors.push(format!("high-risk domain {} failed", domain));
                } else {
                    errors.push(format!("domain {} finished in failed state", domain));
                }
            }
        }
        let sla_secs = run.plan.total_estimated_secs * self.config.sla_factor;
        let actual = execution_elapsed.as_secs_f64();
        if actual > sla_secs {
            errors.push(format!(
                "execution took {:.2}s, exceeding {:.0}% of the {:.2}s estimate",
                actual,
                self.config.sla_factor * 100.0,
                run.plan.total_estimated_secs
            ));
        }
        errors
    }

    fn check_deadline(&self, started: Instant, budget: Duration, stage: &str) -> Result<()> {
        let elapsed = started.elapsed();
        if elapsed > budget {
            return Err(DomainSyncError::Timeout(format!(
                "{:.1}s elapsed of {}s budget before {}",
                elapsed.as_secs_f64(),
                budget.as_secs(),
                stage
            )));
        }
        Ok(())
    }

    fn soft_warn(&self, run: &mut Run, started: Instant, budget: Duration) {
        if run.warned {
            return;
        }
        let threshold = budget.as_secs_f64() * self.config.warn_fraction;
        if started.elapsed().as_secs_f64() > threshold {
            warn!(plan_id = %run.plan.plan_id, "coordination has used over {:.0}% of its budget", self.config.warn_fraction * 100.0);
            log(
                &mut run.logs,
                format!(
                    "WARNING: {:.0}% of the run budget consumed",
                    self.config.warn_fraction * 100.0
                ),
            );
            run.warned = true;
        }
    }

    async fn finish_with_rollback(
        &self,
        mut run: Run,
        started: Instant,
        cause: DomainSyncError,
    ) -> CoordinationResult {
        log(
            &mut run.logs,
            format!("entering rollback, cause: {}", cause),
        );
        let rollback_completed = self.rollback_all(&mut run).await;
        log(
            &mut run.logs,
            format!(
                "rollback finished, all domains restored: {}",
                rollback_completed
            ),
        );
        self.finish(run, started, false, true, rollback_completed)
    }

    fn finish(
        &self,
        run: Run,
        started: Instant,
        success: bool,
        rollback_required: bool,
        rollback_completed: bool,
    ) -> CoordinationResult {
        let Run {
            plan,
            logs,
            metrics,
            executed_phases,
            ..
        } = run;
        let updated_domains: Vec<String> = plan
            .domains
            .values()
            .filter(|c| c.state == CoordinationState::Completed)
            .map(|c| c.domain.clone())
            .collect();
        let failed_domains: Vec<String> = plan
            .domains
            .values()
            .filter(|c| c.state == CoordinationState::Failed)
            .map(|c| c.domain.clone())
            .collect();
        let total_phases = plan.phases.len() as u32;
        // Plans live only as long as their run.
        self.active_plans.remove(&plan.plan_id);
        CoordinationResult {
            success,
            plan_id: plan.plan_id,
            executed_phases,
            total_phases,
            execution_time_ms: started.elapsed().as_millis() as u64,
            updated_domains,
            failed_domains,
            rollback_required,
            rollback_completed,
            logs,
            metrics,
        }
    }

    /// Timeout before any plan exists: nothing ran, nothing to roll back,
    /// but the timeout still reports as a rollback-path failure.
    fn timeout_result(
        &self,
        plan_id: String,
        mut logs: Vec<String>,
        started: Instant,
        cause: DomainSyncError,
    ) -> CoordinationResult {
        log(&mut logs, format!("aborted before planning: {}", cause));
        CoordinationResult {
            success: false,
            plan_id,
            executed_phases: 0,
            total_phases: 0,
            execution_time_ms: started.elapsed().as_millis() as u64,
            updated_domains: vec![],
            failed_domains: vec![],
            rollback_required: true,
            rollback_completed: true,
            logs,
            metrics: CoordinationMetrics::default(),
        }
    }
}

fn failure_result(
    plan_id: String,
    logs: Vec<String>,
    started: Instant,
    metrics: CoordinationMetrics,
) -> CoordinationResult {
    CoordinationResult {
        success: false,
        plan_id,
        executed_phases: 0,
        total_phases: 0,
        execution_time_ms: started.elapsed().as_millis() as u64,
        updated_domains: vec![],
        failed_domains: vec![],
        rollback_required: false,
        rollback_completed: false,
        logs,
        metrics,
    }
}

fn risk_assessment_text(risks: &[RiskFactor]) -> String {
    if risks.is_empty() {
        return "No significant risk factors detected".to_string();
    }
    risks
        .iter()
        .map(|r| format!("{} ({:?}): {}", r.kind, r.severity, r.domains.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn rollback_strategy_text(phases: &[ExecutionPhase]) -> String {
    format!(
        "Best-effort per-domain snapshot restore in reverse order across {} phase(s); a failed restore is recorded and does not block the others",
        phases.len()
    )
}
