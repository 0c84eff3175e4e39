use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a change reaches a domain: directly through one of its own files,
/// indirectly through a domain it depends on, or as a deeper cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactKind {
    Direct,
    Indirect,
    Cascade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskKind {
    CircularDependency,
    HighCoupling,
    Performance,
    RollbackComplexity,
    MissingTests,
}

impl fmt::Display for RiskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskKind::CircularDependency => "circular-dependency",
            RiskKind::HighCoupling => "high-coupling",
            RiskKind::Performance => "performance",
            RiskKind::RollbackComplexity => "rollback-complexity",
            RiskKind::MissingTests => "missing-tests",
        };
        write!(f, "{}", s)
    }
}

/// One affected domain in the impact graph. Immutable once the graph is
/// finalized for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainNode {
    pub domain: String,
    pub impact: ImpactKind,
    /// 0.0..=1.0
    pub impact_score: f64,
    pub priority: UpdatePriority,
    pub estimated_secs: f64,
    pub changed_files: Vec<String>,
}

/// Directed propagation edge: a change in `source` impacts `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactEdge {
    pub source: String,
    pub target: String,
    pub impact: ImpactKind,
    pub confidence: f64,
    /// Monotonically non-decreasing along any propagation chain; capped by
    /// the configured maximum so cascade analysis terminates.
    pub depth: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactGraph {
    pub nodes: Vec<DomainNode>,
    pub edges: Vec<ImpactEdge>,
    /// Longest chain by cumulative estimated time, dependency-first.
    pub critical_path: Vec<String>,
    /// Worst-case sequential bound: sum over nodes, not over phases.
    pub total_estimated_secs: f64,
}

impl ImpactGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, domain: &str) -> Option<&DomainNode> {
        self.nodes.iter().find(|n| n.domain == domain)
    }

    /// Domains this domain depends on (sources of edges pointing at it).
    pub fn dependencies_of(&self, domain: &str) -> Vec<String> {
        let mut deps: Vec<String> = self
            .edges
            .iter()
            .filter(|e| e.target == domain)
            .map(|e| e.source.clone())
            .collect();
        deps.sort();
        deps.dedup();
        deps
    }

    /// Domains impacted by a change in this domain.
    pub fn dependents_of(&self, domain: &str) -> Vec<String> {
        let mut deps: Vec<String> = self
            .edges
            .iter()
            .filter(|e| e.source == domain)
            .map(|e| e.target.clone())
            .collect();
        deps.sort();
        deps.dedup();
        deps
    }
}

/// Derived per run, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    pub kind: RiskKind,
    pub severity: RiskSeverity,
    pub domains: Vec<String>,
    pub mitigation: String,
}

/// Output of impact prediction for one changed-file set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub graph: ImpactGraph,
    /// Topological order, dependencies first.
    pub update_sequence: Vec<String>,
    pub risk_factors: Vec<RiskFactor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationState {
    Analysis,
    Preparation,
    Execution,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low = 1,
    Medium = 2,
    High = 3,
}

/// Fixed strategy vocabulary. The name encodes both scheduling mode and the
/// operational posture expected of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    CriticalSequential,
    ParallelLowRisk,
    ParallelMonitored,
    SequentialHighRisk,
    SequentialStandard,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::CriticalSequential => "Critical Sequential",
            StrategyKind::ParallelLowRisk => "Parallel Low-Risk",
            StrategyKind::ParallelMonitored => "Parallel Monitored",
            StrategyKind::SequentialHighRisk => "Sequential High-Risk",
            StrategyKind::SequentialStandard => "Sequential Standard",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    AtomicWrite,
    Rollback,
    SemanticAnalysis,
    CoordinationLock,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::AtomicWrite => "atomic-write",
            ResourceKind::Rollback => "rollback",
            ResourceKind::SemanticAnalysis => "semantic-analysis",
            ResourceKind::CoordinationLock => "coordination-lock",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationStrategy {
    pub name: StrategyKind,
    pub parallelizable: bool,
    pub risk: RiskTier,
    pub required_resources: Vec<ResourceKind>,
}

/// Per-domain coordination record tracked for the lifetime of one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainCoordination {
    pub domain: String,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub strategy: CoordinationStrategy,
    pub state: CoordinationState,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPhase {
    pub number: u32,
    pub name: String,
    pub domains: Vec<String>,
    /// False if any member domain is non-parallelizable.
    pub parallel: bool,
    /// Max over members since parallel members overlap.
    pub estimated_secs: f64,
    /// Union of member dependencies.
    pub dependencies: Vec<String>,
    pub on_critical_path: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationPlan {
    pub plan_id: String,
    pub changed_files: Vec<String>,
    pub graph: ImpactGraph,
    /// BTreeMap keeps narrative output and iteration deterministic.
    pub domains: BTreeMap<String, DomainCoordination>,
    pub phases: Vec<ExecutionPhase>,
    pub total_estimated_secs: f64,
    pub risk_assessment: String,
    pub rollback_strategy: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateRequest {
    pub changed_files: Vec<String>,
    /// Overrides the configured run budget when set.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CoordinationMetrics {
    pub analysis_ms: u64,
    pub coordination_ms: u64,
    pub execution_ms: u64,
    pub validation_ms: u64,
}

/// Complete result record: returned on success and on total failure alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationResult {
    pub success: bool,
    pub plan_id: String,
    pub executed_phases: u32,
    pub total_phases: u32,
    pub execution_time_ms: u64,
    pub updated_domains: Vec<String>,
    pub failed_domains: Vec<String>,
    pub rollback_required: bool,
    pub rollback_completed: bool,
    pub logs: Vec<String>,
    pub metrics: CoordinationMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Manual,
    Hook,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Manual => write!(f, "manual"),
            TriggerKind::Hook => write!(f, "hook"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub changed_files: Vec<String>,
    pub trigger: TriggerKind,
    /// Overrides the configured update budget when set.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UpdateStageMetrics {
    pub analysis_ms: u64,
    pub planning_ms: u64,
    pub snapshot_ms: u64,
    pub generation_ms: u64,
    pub write_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResult {
    pub success: bool,
    pub update_id: String,
    pub execution_time_ms: u64,
    pub affected_domains: Vec<String>,
    pub updated_files: Vec<String>,
    pub metrics: UpdateStageMetrics,
    pub error: Option<String>,
}

/// Per-file record produced by the semantic analysis collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSummary {
    pub file_path: String,
    pub language: String,
    pub business_concepts: Vec<String>,
    pub business_rules: Vec<String>,
    pub domain_context: String,
}

/// Fixed domain-context document structure rendered to each context file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainContextDoc {
    pub domain: String,
    pub overview: String,
    pub current_implementation: String,
    pub business_rules: String,
    pub integration_points: String,
    pub recent_changes: String,
}

impl DomainContextDoc {
    pub fn render(&self) -> String {
        format!(
            "# {} Domain Context\n\n## Overview\n{}\n\n## Current Implementation\n{}\n\n## Business Rules\n{}\n\n## Integration Points\n{}\n\n## Recent Changes\n{}\n",
            self.domain,
            self.overview,
            self.current_implementation,
            self.business_rules,
            self.integration_points,
            self.recent_changes,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOpKind {
    Create,
    Update,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOperation {
    pub kind: FileOpKind,
    pub target_path: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(domain: &str) -> DomainNode {
        DomainNode {
            domain: domain.to_string(),
            impact: ImpactKind::Direct,
            impact_score: 0.5,
            priority: UpdatePriority::Medium,
            estimated_secs: 10.0,
            changed_files: vec![],
        }
    }

    #[test]
    fn graph_dependency_queries() {
        let graph = ImpactGraph {
            nodes: vec![node("Data"), node("Analysis"), node("Services")],
            edges: vec![
                ImpactEdge {
                    source: "Data".into(),
                    target: "Analysis".into(),
                    impact: ImpactKind::Indirect,
                    confidence: 0.8,
                    depth: 1,
                },
                ImpactEdge {
                    source: "Data".into(),
                    target: "Services".into(),
                    impact: ImpactKind::Indirect,
                    confidence: 0.8,
                    depth: 1,
                },
            ],
            critical_path: vec![],
            total_estimated_secs: 30.0,
        };

        assert_eq!(graph.dependencies_of("Analysis"), vec!["Data".to_string()]);
        assert_eq!(
            graph.dependents_of("Data"),
            vec!["Analysis".to_string(), "Services".to_string()]
        );
        assert!(graph.dependencies_of("Data").is_empty());
    }

    #[test]
    fn strategy_names_match_vocabulary() {
        assert_eq!(StrategyKind::CriticalSequential.to_string(), "Critical Sequential");
        assert_eq!(StrategyKind::ParallelLowRisk.to_string(), "Parallel Low-Risk");
        assert_eq!(StrategyKind::SequentialStandard.to_string(), "Sequential Standard");
    }

    #[test]
    fn context_doc_renders_all_sections() {
        let doc = DomainContextDoc {
            domain: "Analysis".into(),
            overview: "o".into(),
            current_implementation: "i".into(),
            business_rules: "r".into(),
            integration_points: "p".into(),
            recent_changes: "c".into(),
        };
        let text = doc.render();
        for heading in [
            "# Analysis Domain Context",
            "## Overview",
            "## Current Implementation",
            "## Business Rules",
            "## Integration Points",
            "## Recent Changes",
        ] {
            assert!(text.contains(heading), "missing {}", heading);
        }
    }
}
