use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Static domain dependency table: domain -> the domains it depends on.
///
/// Propagation and phase planning both read this table; it is configuration,
/// not discovered state, so a deployment can describe its own module layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRules {
    pub dependencies: HashMap<String, Vec<String>>,
}

impl Default for DomainRules {
    fn default() -> Self {
        let mut dependencies = HashMap::new();
        dependencies.insert("Console".to_string(), vec!["Analysis".to_string()]);
        dependencies.insert(
            "Services".to_string(),
            vec![
                "Analysis".to_string(),
                "Data".to_string(),
                "Messaging".to_string(),
            ],
        );
        dependencies.insert("Analysis".to_string(), vec!["Data".to_string()]);
        dependencies.insert("Messaging".to_string(), vec!["Data".to_string()]);
        dependencies.insert("Data".to_string(), vec![]);
        dependencies.insert("Configuration".to_string(), vec![]);
        dependencies.insert("Infrastructure".to_string(), vec![]);
        dependencies.insert("Testing".to_string(), vec![]);
        Self { dependencies }
    }
}

impl DomainRules {
    pub fn dependencies_of(&self, domain: &str) -> &[String] {
        self.dependencies
            .get(domain)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, domain: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .dependencies
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| d == domain))
            .map(|(k, _)| k.clone())
            .collect();
        out.sort();
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Cap on cascade propagation depth; guarantees termination.
    pub max_propagation_depth: u32,
    /// Combined in+out degree above which a domain is flagged high-coupling.
    pub coupling_threshold: usize,
    /// Base per-domain update estimate plus a per-file increment, seconds.
    pub base_estimate_secs: f64,
    pub per_file_estimate_secs: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            max_propagation_depth: 3,
            coupling_threshold: 4,
            base_estimate_secs: 5.0,
            per_file_estimate_secs: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Wall-clock budget for a whole coordination run.
    pub run_timeout_secs: u64,
    /// Fixed per-domain sub-budget handed to the update pipeline.
    pub domain_timeout_secs: u64,
    /// Soft warning fires at this fraction of the run budget.
    pub warn_fraction: f64,
    /// Validation flags runs slower than this multiple of the estimate.
    pub sla_factor: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: 300,
            domain_timeout_secs: 30,
            warn_fraction: 0.8,
            sla_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Wall-clock budget applied to update calls that carry no budget of
    /// their own.
    pub timeout_secs: u64,
    /// Directory the generated domain-context files live under.
    pub context_root: String,
    /// Extensions treated as source files for semantic analysis.
    pub source_extensions: Vec<String>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            context_root: "docs/context".to_string(),
            source_extensions: vec![
                "cs".to_string(),
                "rs".to_string(),
                "ts".to_string(),
                "js".to_string(),
                "py".to_string(),
                "go".to_string(),
            ],
        }
    }
}
