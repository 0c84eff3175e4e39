use domainsync_core::{
    DomainBoundaryAnalyzer, ImpactGraph, MapperConfig, RiskFactor, RiskKind, RiskSeverity,
    UpdatePriority,
};
use std::collections::HashMap;

/// Risk detection runs independently over the finished graph; factors are
/// derived per run and never persisted.
pub(crate) fn detect_risks(
    config: &MapperConfig,
    analyzer: &DomainBoundaryAnalyzer,
    graph: &ImpactGraph,
) -> Vec<RiskFactor> {
    let mut risks = Vec::new();

    if let Some(cycle) = find_cycle(graph) {
        risks.push(RiskFactor {
            kind: RiskKind::CircularDependency,
            severity: RiskSeverity::Critical,
            domains: cycle,
            mitigation: "Break the dependency cycle before coordinated updates can be ordered"
                .to_string(),
        });
    }

    let mut coupled: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| {
            graph.dependencies_of(&n.domain).len() + graph.dependents_of(&n.domain).len()
                > config.coupling_threshold
        })
        .map(|n| n.domain.clone())
        .collect();
    coupled.sort();
    if !coupled.is_empty() {
        risks.push(RiskFactor {
            kind: RiskKind::HighCoupling,
            severity: RiskSeverity::High,
            domains: coupled,
            mitigation: "Review shared interfaces; a change here fans out widely".to_string(),
        });
    }

    let perf: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| analyzer.profile(&n.domain).performance_sensitive && n.impact_score >= 0.7)
        .map(|n| n.domain.clone())
        .collect();
    if !perf.is_empty() {
        risks.push(RiskFactor {
            kind: RiskKind::Performance,
            severity: RiskSeverity::Medium,
            domains: perf,
            mitigation: "Benchmark latency-sensitive paths after the update lands".to_string(),
        });
    }

    let untested: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| !analyzer.profile(&n.domain).has_test_coverage)
        .map(|n| n.domain.clone())
        .collect();
    if !untested.is_empty() {
        let severity = if graph
            .nodes
            .iter()
            .any(|n| untested.contains(&n.domain) && n.priority >= UpdatePriority::High)
        {
            RiskSeverity::High
        } else {
            RiskSeverity::Medium
        };
        risks.push(RiskFactor {
            kind: RiskKind::MissingTests,
            severity,
            domains: untested,
            mitigation: "Add regression coverage before relying on automated updates".to_string(),
        });
    }

    if graph.nodes.len() >= 4 {
        risks.push(RiskFactor {
            kind: RiskKind::RollbackComplexity,
            severity: RiskSeverity::Medium,
            domains: graph.nodes.iter().map(|n| n.domain.clone()).collect(),
            mitigation: "Many domains in one run widen the rollback surface; verify snapshots"
                .to_string(),
        });
    }

    risks
}

/// DFS three-color cycle detection over immediate dependency edges.
fn find_cycle(graph: &ImpactGraph) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }

    let mut deps: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges.iter().filter(|e| e.depth == 1) {
        deps.entry(edge.target.as_str())
            .or_default()
            .push(edge.source.as_str());
    }

    let mut marks: HashMap<&str, Mark> = graph
        .nodes
        .iter()
        .map(|n| (n.domain.as_str(), Mark::White))
        .collect();

    fn visit<'a>(
        node: &'a str,
        deps: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> bool {
        marks.insert(node, Mark::Grey);
        stack.push(node);
        for dep in deps.get(node).into_iter().flatten() {
            match marks.get(dep).copied().unwrap_or(Mark::Black) {
                Mark::Grey => {
                    stack.push(dep);
                    return true;
                }
                Mark::White => {
                    if visit(dep, deps, marks, stack) {
                        return true;
                    }
                }
                Mark::Black => {}
            }
        }
        stack.pop();
        marks.insert(node, Mark::Black);
        false
    }

    let mut order: Vec<&str> = marks.keys().copied().collect();
    order.sort_unstable();
    for node in order {
        if marks.get(node) == Some(&Mark::White) {
            let mut stack = Vec::new();
            if visit(node, &deps, &mut marks, &mut stack) {
                // Trim the stack to just the cycle members.
                let Some(&repeated) = stack.last() else {
                    continue;
                };
                let start = stack.iter().position(|d| *d == repeated).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..stack.len() - 1]
                    .iter()
                    .map(|d| d.to_string())
                    .collect();
                cycle.sort();
                cycle.dedup();
                return Some(cycle);
            }
        }
    }
    None
}
