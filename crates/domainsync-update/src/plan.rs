use domainsync_core::{DomainBoundaryAnalyzer, DomainRules, SemanticSummary};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// One consolidated domain's slice of a holistic update.
#[derive(Debug, Clone)]
pub struct DomainUpdatePlan {
    pub domain: String,
    pub changed_files: Vec<String>,
    /// Static dependencies filtered to the domains actually in play.
    pub dependencies: Vec<String>,
}

/// Build one plan per consolidated domain: path inference with semantic
/// hints, cross-cutting domains always added, subdomains folded into their
/// parents, dependencies restricted to the affected set.
pub(crate) fn build_plans(
    analyzer: &DomainBoundaryAnalyzer,
    rules: &DomainRules,
    changed_files: &[String],
    summaries: &[SemanticSummary],
) -> Vec<DomainUpdatePlan> {
    let mut files_by_domain: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for file in changed_files {
        let concepts: Vec<String> = summaries
            .iter()
            .filter(|s| &s.file_path == file)
            .flat_map(|s| s.business_concepts.iter().cloned())
            .collect();
        if let Some(m) = analyzer.resolve_with_hints(file, &concepts) {
            let domain = DomainBoundaryAnalyzer::consolidate(&m.domain);
            files_by_domain.entry(domain).or_default().insert(file.clone());
        }
        for domain in analyzer.cross_cutting(file) {
            files_by_domain.entry(domain).or_default().insert(file.clone());
        }
    }

    let affected: BTreeSet<String> = files_by_domain.keys().cloned().collect();
    let plans: Vec<DomainUpdatePlan> = files_by_domain
        .into_iter()
        .map(|(domain, files)| {
            let dependencies = rules
                .dependencies_of(&domain)
                .iter()
                .filter(|d| affected.contains(*d))
                .cloned()
                .collect();
            DomainUpdatePlan {
                domain,
                changed_files: files.into_iter().collect(),
                dependencies,
            }
        })
        .collect();

    order_plans(plans)
}

/// Greedy dependency-first placement: repeatedly emit every plan whose
/// dependencies are already emitted. A stall appends the remainder unordered
/// rather than looping forever.
pub(crate) fn order_plans(mut plans: Vec<DomainUpdatePlan>) -> Vec<DomainUpdatePlan> {
    let mut ordered: Vec<DomainUpdatePlan> = Vec::with_capacity(plans.len());
    let mut placed: BTreeSet<String> = BTreeSet::new();

    while !plans.is_empty() {
        let mut progressed = false;
        let mut rest = Vec::with_capacity(plans.len());
        for plan in plans.into_iter() {
            if plan.dependencies.iter().all(|d| placed.contains(d)) {
                placed.insert(plan.domain.clone());
                ordered.push(plan);
                progressed = true;
            } else {
                rest.push(plan);
            }
        }
        plans = rest;
        if !progressed {
            warn!(
                remaining = plans.len(),
                "update plan ordering stalled, appending remainder"
            );
            ordered.extend(plans);
            break;
        }
    }
    ordered
}

/// A semantic record belongs to a domain when its context names the domain
/// directly, names a dotted subdomain of it, tags it at concept level, or
/// its file path resolves into the domain.
pub(crate) fn summaries_for_domain(
    analyzer: &DomainBoundaryAnalyzer,
    domain: &str,
    summaries: &[SemanticSummary],
) -> Vec<SemanticSummary> {
    let prefix = format!("{}.", domain);
    summaries
        .iter()
        .filter(|s| {
            s.domain_context == domain
                || s.domain_context.starts_with(&prefix)
                || s.business_concepts.iter().any(|c| c == domain)
                || analyzer
                    .resolve(&s.file_path)
                    .map(|m| DomainBoundaryAnalyzer::consolidate(&m.domain) == domain)
                    .unwrap_or(false)
        })
        .cloned()
        .collect()
}
