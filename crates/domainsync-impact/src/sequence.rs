use domainsync_core::ImpactGraph;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Topological sort of the graph's nodes, dependencies first. Ties break by
/// descending impact score, then ascending domain name, so repeated runs over
/// the same graph produce identical sequences.
///
/// If a cycle survives into this stage the unplaceable remainder is appended
/// in name order; the mapper's cycle detector reports the cycle separately.
pub(crate) fn update_sequence(graph: &ImpactGraph) -> Vec<String> {
    let mut indegree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in &graph.nodes {
        indegree.insert(node.domain.as_str(), 0);
    }
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for edge in &graph.edges {
        // Only immediate dependency edges constrain ordering.
        if edge.depth != 1 || !seen.insert((edge.source.as_str(), edge.target.as_str())) {
            continue;
        }
        *indegree.entry(edge.target.as_str()).or_insert(0) += 1;
        dependents
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let score_of: HashMap<&str, f64> = graph
        .nodes
        .iter()
        .map(|n| (n.domain.as_str(), n.impact_score))
        .collect();

    let mut sequence: Vec<String> = Vec::with_capacity(graph.nodes.len());
    let mut placed: HashSet<&str> = HashSet::new();
    while sequence.len() < graph.nodes.len() {
        let mut ready: Vec<&str> = indegree
            .iter()
            .filter(|(d, deg)| **deg == 0 && !placed.contains(**d))
            .map(|(d, _)| *d)
            .collect();
        if ready.is_empty() {
            let mut remainder: Vec<&str> = indegree
                .keys()
                .filter(|d| !placed.contains(**d))
                .copied()
                .collect();
            remainder.sort_unstable();
            warn!(
                remainder = ?remainder,
                "update sequence stalled, appending remainder unordered"
            );
            sequence.extend(remainder.iter().map(|d| d.to_string()));
            break;
        }
        ready.sort_by(|a, b| {
            let sa = score_of.get(a).copied().unwrap_or(0.0);
            let sb = score_of.get(b).copied().unwrap_or(0.0);
            sb.partial_cmp(&sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(b))
        });
        let next = ready[0];
        placed.insert(next);
        sequence.push(next.to_string());
        if let Some(deps) = dependents.get(next) {
            for d in deps {
                if let Some(deg) = indegree.get_mut(d) {
                    *deg = deg.saturating_sub(1);
                }
            }
        }
    }
    sequence
}

/// Longest dependency chain by cumulative estimated time, rendered
/// dependency-first.
pub(crate) fn critical_path(graph: &ImpactGraph, sequence: &[String]) -> Vec<String> {
    let estimate: HashMap<&str, f64> = graph
        .nodes
        .iter()
        .map(|n| (n.domain.as_str(), n.estimated_secs))
        .collect();
    let position: HashMap<&str, usize> = sequence
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i))
        .collect();

    let mut best: HashMap<String, f64> = HashMap::new();
    let mut prev: HashMap<String, String> = HashMap::new();
    for domain in sequence {
        let own = estimate.get(domain.as_str()).copied().unwrap_or(0.0);
        let mut chain = own;
        for dep in graph.dependencies_of(domain) {
            // Dependencies placed after this node belong to a stalled cycle
            // remainder and cannot extend a valid chain.
            if position.get(dep.as_str()) >= position.get(domain.as_str()) {
                continue;
            }
            if let Some(dep_total) = best.get(&dep) {
                if dep_total + own > chain {
                    chain = dep_total + own;
                    prev.insert(domain.clone(), dep.clone());
                }
            }
        }
        best.insert(domain.clone(), chain);
    }

    let Some(mut tail) = best
        .iter()
        .max_by(|(a, va), (b, vb)| {
            va.partial_cmp(vb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.cmp(a))
        })
        .map(|(d, _)| d.clone())
    else {
        return Vec::new();
    };

    let mut path = vec![tail.clone()];
    while let Some(p) = prev.get(&tail) {
        path.push(p.clone());
        tail = p.clone();
    }
    path.reverse();
    path
}
