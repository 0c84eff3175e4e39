use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Ordered path-pattern table, first match wins. Subdomain paths sit before
/// their parent so they resolve to the dotted form and consolidate later.
static PATH_PATTERNS: Lazy<Vec<(Regex, &'static str, f64)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)(^|/)analysis/indicator(s)?/").unwrap(),
            "Analysis.Indicator",
            0.9,
        ),
        (Regex::new(r"(?i)(^|/)analysis/").unwrap(), "Analysis", 0.9),
        (Regex::new(r"(?i)(^|/)data/").unwrap(), "Data", 0.9),
        (Regex::new(r"(?i)(^|/)messaging/").unwrap(), "Messaging", 0.9),
        (Regex::new(r"(?i)(^|/)services?/").unwrap(), "Services", 0.9),
        (Regex::new(r"(?i)(^|/)console/").unwrap(), "Console", 0.9),
        (
            Regex::new(r"(?i)(^|/)(config|configuration)/").unwrap(),
            "Configuration",
            0.8,
        ),
        (
            Regex::new(r"(?i)(^|/)(infra|infrastructure|deploy(ment)?)/").unwrap(),
            "Infrastructure",
            0.8,
        ),
        (
            Regex::new(r"(?i)(^|/)tests?/").unwrap(),
            "Testing",
            0.8,
        ),
    ]
});

static CONFIG_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\.(json|env|toml|ini)$|appsettings)").unwrap());
static INFRA_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(dockerfile|docker-compose|\.ya?ml$|(^|/)deploy)").unwrap());
static TEST_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)((^|/)tests?(/|$)|\.tests?\.|_test\.|\.spec\.)").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainMatch {
    pub domain: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DomainProfile {
    pub has_test_coverage: bool,
    pub performance_sensitive: bool,
}

/// Pure path-to-domain resolution. No mutable state beyond the static
/// pattern table; safe to call concurrently without synchronization.
#[derive(Debug, Default, Clone)]
pub struct DomainBoundaryAnalyzer;

impl DomainBoundaryAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, path: &str) -> Option<DomainMatch> {
        for (pattern, domain, confidence) in PATH_PATTERNS.iter() {
            if pattern.is_match(path) {
                return Some(DomainMatch {
                    domain: (*domain).to_string(),
                    confidence: *confidence,
                });
            }
        }
        None
    }

    /// Path-based resolution with a confidence boost when semantic
    /// business-concept tags corroborate the guess.
    pub fn resolve_with_hints(&self, path: &str, concepts: &[String]) -> Option<DomainMatch> {
        let mut m = self.resolve(path)?;
        let parent = Self::consolidate(&m.domain).to_lowercase();
        if concepts.iter().any(|c| c.to_lowercase().contains(&parent)) {
            m.confidence = (m.confidence + 0.1).min(1.0);
        }
        Some(m)
    }

    /// Collapse dotted subdomains into their parent domain so context files
    /// do not fragment ("Analysis.Indicator" -> "Analysis").
    pub fn consolidate(domain: &str) -> String {
        match domain.split_once('.') {
            Some((parent, _)) => parent.to_string(),
            None => domain.to_string(),
        }
    }

    /// Cross-cutting domains a file always contributes to, independent of
    /// its primary domain.
    pub fn cross_cutting(&self, path: &str) -> Vec<String> {
        let mut out = Vec::new();
        if CONFIG_FILE.is_match(path) {
            out.push("Configuration".to_string());
        }
        if INFRA_FILE.is_match(path) {
            out.push("Infrastructure".to_string());
        }
        if TEST_PATH.is_match(path) {
            out.push("Testing".to_string());
        }
        out
    }

    pub fn is_source_file(&self, path: &str, extensions: &[String]) -> bool {
        match path.rsplit_once('.') {
            Some((_, ext)) => extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    /// Static per-domain metadata feeding the mapper's heuristic risk flags.
    pub fn profile(&self, domain: &str) -> DomainProfile {
        match DomainBoundaryAnalyzer::consolidate(domain).as_str() {
            "Analysis" | "Data" | "Messaging" => DomainProfile {
                has_test_coverage: true,
                performance_sensitive: true,
            },
            "Services" | "Testing" => DomainProfile {
                has_test_coverage: true,
                performance_sensitive: false,
            },
            _ => DomainProfile {
                has_test_coverage: false,
                performance_sensitive: false,
            },
        }
    }
}
