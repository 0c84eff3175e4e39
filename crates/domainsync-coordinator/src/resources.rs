use domainsync_core::{DomainSyncError, ResourceKind, Result};
use std::collections::HashSet;

/// Advisory capability-availability check, not a mutual-exclusion lock. The
/// coordination-lock resource is verified but not enforced; concurrent runs
/// against the same domain set are not a supported configuration.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    available: HashSet<ResourceKind>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self {
            available: [
                ResourceKind::AtomicWrite,
                ResourceKind::Rollback,
                ResourceKind::SemanticAnalysis,
                ResourceKind::CoordinationLock,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl ResourceRegistry {
    pub fn with_available(resources: impl IntoIterator<Item = ResourceKind>) -> Self {
        Self {
            available: resources.into_iter().collect(),
        }
    }

    /// Fails fast with the first missing resource, named.
    pub fn verify(&self, required: &HashSet<ResourceKind>) -> Result<()> {
        let mut missing: Vec<&ResourceKind> = required
            .iter()
            .filter(|r| !self.available.contains(r))
            .collect();
        missing.sort_by_key(|r| r.to_string());
        match missing.first() {
            Some(r) => Err(DomainSyncError::ResourceUnavailable(r.to_string())),
            None => Ok(()),
        }
    }
}
