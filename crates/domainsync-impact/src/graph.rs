use domainsync_core::{
    DomainBoundaryAnalyzer, DomainNode, DomainRules, ImpactEdge, ImpactGraph, ImpactKind,
    MapperConfig, UpdatePriority,
};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Attribute changed files to consolidated domains. Files no pattern claims
/// are skipped; dependents of changed domains are not pulled in here.
pub(crate) fn group_by_domain(
    analyzer: &DomainBoundaryAnalyzer,
    changed_files: &[String],
) -> BTreeMap<String, (Vec<String>, f64)> {
    let mut groups: BTreeMap<String, (Vec<String>, f64)> = BTreeMap::new();
    for file in changed_files {
        let Some(m) = analyzer.resolve(file) else {
            debug!(file = %file, "no domain pattern matched, skipping");
            continue;
        };
        let domain = DomainBoundaryAnalyzer::consolidate(&m.domain);
        let entry = groups.entry(domain).or_insert_with(|| (Vec::new(), 0.0));
        if !entry.0.contains(file) {
            entry.0.push(file.clone());
        }
        entry.1 = entry.1.max(m.confidence);
    }
    groups
}

fn score_for(confidence: f64, file_count: usize) -> f64 {
    (confidence * (0.5 + 0.1 * file_count as f64)).min(1.0)
}

fn priority_for(score: f64) -> UpdatePriority {
    if score < 0.4 {
        UpdatePriority::Low
    } else if score < 0.6 {
        UpdatePriority::Medium
    } else if score < 0.85 {
        UpdatePriority::High
    } else {
        UpdatePriority::Critical
    }
}

pub(crate) fn build_nodes(
    config: &MapperConfig,
    groups: &BTreeMap<String, (Vec<String>, f64)>,
) -> Vec<DomainNode> {
    groups
        .iter()
        .map(|(domain, (files, confidence))| {
            let impact_score = score_for(*confidence, files.len());
            DomainNode {
                domain: domain.clone(),
                impact: ImpactKind::Direct,
                impact_score,
                priority: priority_for(impact_score),
                estimated_secs: config.base_estimate_secs
                    + config.per_file_estimate_secs * files.len() as f64,
                changed_files: files.clone(),
            }
        })
        .collect()
}

fn kind_for_depth(depth: u32) -> ImpactKind {
    match depth {
        0 | 1 => ImpactKind::Direct,
        2 => ImpactKind::Indirect,
        _ => ImpactKind::Cascade,
    }
}

fn confidence_for_depth(depth: u32) -> f64 {
    // Decays with each propagation hop.
    0.9 * 0.8f64.powi(depth.saturating_sub(1) as i32)
}

/// Derive propagation edges from the static dependency table, restricted to
/// the domains actually in play, then extend transitively up to the depth
/// cap. Duplicate edges keep the higher confidence (the shorter chain).
pub(crate) fn build_edges(
    config: &MapperConfig,
    rules: &DomainRules,
    in_play: &HashSet<String>,
) -> Vec<ImpactEdge> {
    // (source, target) -> (depth, confidence), source is the dependency.
    let mut edges: BTreeMap<(String, String), (u32, f64)> = BTreeMap::new();
    let mut direct: Vec<(String, String)> = Vec::new();

    for target in in_play {
        for source in rules.dependencies_of(target) {
            if in_play.contains(source) {
                direct.push((source.clone(), target.clone()));
                edges.insert((source.clone(), target.clone()), (1, confidence_for_depth(1)));
            }
        }
    }

    // Transitive closure bounded by the depth cap. Depth never decreases
    // along a chain; revisiting an edge via a longer chain is discarded
    // because the shorter chain already holds the higher confidence.
    let mut frontier: Vec<(String, String, u32)> = direct
        .iter()
        .map(|(s, t)| (s.clone(), t.clone(), 1))
        .collect();
    while let Some((origin, via, depth)) = frontier.pop() {
        if depth >= config.max_propagation_depth {
            continue;
        }
        for (s, t) in &direct {
            if *s != via || *t == origin {
                continue;
            }
            let next_depth = depth + 1;
            let confidence = confidence_for_depth(next_depth);
            let key = (origin.clone(), t.clone());
            match edges.get(&key) {
                Some((_, existing)) if *existing >= confidence => {}
                _ => {
                    edges.insert(key, (next_depth, confidence));
                    frontier.push((origin.clone(), t.clone(), next_depth));
                }
            }
        }
    }

    edges
        .into_iter()
        .map(|((source, target), (depth, confidence))| ImpactEdge {
            source,
            target,
            impact: kind_for_depth(depth),
            confidence,
            depth,
        })
        .collect()
}

pub(crate) fn finalize_graph(mut nodes: Vec<DomainNode>, edges: Vec<ImpactEdge>) -> ImpactGraph {
    nodes.sort_by(|a, b| a.domain.cmp(&b.domain));
    let total_estimated_secs = nodes.iter().map(|n| n.estimated_secs).sum();
    ImpactGraph {
        nodes,
        edges,
        critical_path: Vec::new(),
        total_estimated_secs,
    }
}
