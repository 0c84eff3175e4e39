//! Change-impact prediction: builds the per-run impact graph from a changed
//! file set, derives a safe update sequence and critical path, and surfaces
//! risk factors for the coordinator.

mod cache;
mod graph;
mod risk;
mod sequence;

pub use cache::{CacheStats, ImpactCache};

use domainsync_core::{
    DomainBoundaryAnalyzer, DomainRules, ImpactAnalysis, MapperConfig, Result,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// Maps a changed-file set to an impact graph, update sequence and risk
/// factors. Explicitly constructed and passed by reference; holds no
/// process-wide state beyond its own cache.
pub struct ImpactMapper {
    config: MapperConfig,
    rules: DomainRules,
    analyzer: DomainBoundaryAnalyzer,
    cache: ImpactCache,
}

impl Default for ImpactMapper {
    fn default() -> Self {
        Self::new(MapperConfig::default(), DomainRules::default())
    }
}

impl ImpactMapper {
    pub fn new(config: MapperConfig, rules: DomainRules) -> Self {
        Self {
            config,
            rules,
            analyzer: DomainBoundaryAnalyzer::new(),
            cache: ImpactCache::new(),
        }
    }

    pub fn rules(&self) -> &DomainRules {
        &self.rules
    }

    /// Predict which domains a change impacts and in what order they must
    /// update. Empty input yields an empty analysis, not an error.
    pub fn predict_change_impact(&self, changed_files: &[String]) -> Result<ImpactAnalysis> {
        if changed_files.is_empty() {
            return Ok(ImpactAnalysis::default());
        }

        let key = cache::fingerprint(changed_files);
        if let Some(cached) = self.cache.get(&key) {
            debug!(fingerprint = %key, "impact analysis served from cache");
            return Ok(cached);
        }

        let groups = graph::group_by_domain(&self.analyzer, changed_files);
        let nodes = graph::build_nodes(&self.config, &groups);
        let in_play: HashSet<String> = nodes.iter().map(|n| n.domain.clone()).collect();
        let edges = graph::build_edges(&self.config, &self.rules, &in_play);
        let mut impact_graph = graph::finalize_graph(nodes, edges);

        let update_sequence = sequence::update_sequence(&impact_graph);
        impact_graph.critical_path = sequence::critical_path(&impact_graph, &update_sequence);

        let risk_factors = risk::detect_risks(&self.config, &self.analyzer, &impact_graph);

        info!(
            domains = impact_graph.nodes.len(),
            edges = impact_graph.edges.len(),
            risks = risk_factors.len(),
            "impact analysis complete"
        );

        let analysis = ImpactAnalysis {
            graph: impact_graph,
            update_sequence,
            risk_factors,
        };
        self.cache.insert(key, analysis.clone());
        Ok(analysis)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainsync_core::{ImpactKind, RiskKind};

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn empty_input_yields_empty_graph() {
        let mapper = ImpactMapper::default();
        let analysis = mapper.predict_change_impact(&[]).unwrap();
        assert!(analysis.graph.is_empty());
        assert!(analysis.update_sequence.is_empty());
        assert!(analysis.risk_factors.is_empty());
    }

    #[test]
    fn dependents_not_pulled_in_unless_changed() {
        // Console -> Analysis and Services -> {Analysis, Data, Messaging}
        // exist in the table, but only Analysis changed.
        let mapper = ImpactMapper::default();
        let analysis = mapper
            .predict_change_impact(&files(&["Analysis/Foo.cs"]))
            .unwrap();
        assert_eq!(analysis.update_sequence, vec!["Analysis"]);
        assert_eq!(analysis.graph.nodes.len(), 1);
        assert!(analysis.graph.edges.is_empty());
    }

    #[test]
    fn data_precedes_analysis_when_both_change() {
        let mapper = ImpactMapper::default();
        let analysis = mapper
            .predict_change_impact(&files(&["Analysis/Foo.cs", "Data/Bar.cs"]))
            .unwrap();
        assert_eq!(analysis.update_sequence, vec!["Data", "Analysis"]);
        let edge = &analysis.graph.edges[0];
        assert_eq!((edge.source.as_str(), edge.target.as_str()), ("Data", "Analysis"));
        assert_eq!(edge.impact, ImpactKind::Direct);
    }

    #[test]
    fn subdomain_files_consolidate_into_parent() {
        let mapper = ImpactMapper::default();
        let analysis = mapper
            .predict_change_impact(&files(&["Analysis/Indicator/Rsi.cs"]))
            .unwrap();
        assert_eq!(analysis.update_sequence, vec!["Analysis"]);
    }

    #[test]
    fn planning_is_idempotent_for_fixed_input() {
        let mapper = ImpactMapper::default();
        let input = files(&["Analysis/Foo.cs", "Data/Bar.cs", "Services/Api.cs"]);
        let first = mapper.predict_change_impact(&input).unwrap();
        let second = mapper.predict_change_impact(&input).unwrap();
        assert_eq!(first.update_sequence, second.update_sequence);
        assert_eq!(first.graph.critical_path, second.graph.critical_path);
        assert_eq!(mapper.cache_stats().hits, 1);
    }

    #[test]
    fn clear_cache_forces_recompute() {
        let mapper = ImpactMapper::default();
        let input = files(&["Data/Bar.cs"]);
        mapper.predict_change_impact(&input).unwrap();
        mapper.clear_cache();
        mapper.predict_change_impact(&input).unwrap();
        let stats = mapper.cache_stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn configured_cycle_is_reported() {
        let mut rules = DomainRules::default();
        rules.dependencies.insert("Data".into(), vec!["Analysis".into()]);
        let mapper = ImpactMapper::new(MapperConfig::default(), rules);
        let analysis = mapper
            .predict_change_impact(&files(&["Analysis/Foo.cs", "Data/Bar.cs"]))
            .unwrap();
        assert!(analysis
            .risk_factors
            .iter()
            .any(|r| r.kind == RiskKind::CircularDependency));
        // Every node still appears exactly once in the sequence.
        assert_eq!(analysis.update_sequence.len(), 2);
    }

    #[test]
    fn total_estimate_is_sequential_sum() {
        let mapper = ImpactMapper::default();
        let analysis = mapper
            .predict_change_impact(&files(&["Analysis/Foo.cs", "Data/Bar.cs"]))
            .unwrap();
        let sum: f64 = analysis.graph.nodes.iter().map(|n| n.estimated_secs).sum();
        assert!((analysis.graph.total_estimated_secs - sum).abs() < f64::EPSILON);
    }
}
