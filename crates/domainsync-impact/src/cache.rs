use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

use domainsync_core::ImpactAnalysis;

/// Fingerprint of a changed-file set: order-insensitive, duplicate-insensitive.
pub fn fingerprint(changed_files: &[String]) -> String {
    let mut files: Vec<&str> = changed_files.iter().map(|s| s.as_str()).collect();
    files.sort_unstable();
    files.dedup();
    let mut hasher = Sha256::new();
    for f in files {
        hasher.update(f.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Result cache keyed by changed-file-set fingerprint with explicit
/// invalidation only.
#[derive(Debug, Default)]
pub struct ImpactCache {
    entries: DashMap<String, ImpactAnalysis>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl ImpactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ImpactAnalysis> {
        match self.entries.get(key) {
            Some(v) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(v.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: String, analysis: ImpactAnalysis) {
        self.entries.insert(key, analysis);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
