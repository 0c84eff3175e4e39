use domainsync_core::{DomainCoordination, ExecutionPhase, ImpactGraph};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Batch the update sequence into execution phases: each pass collects every
/// not-yet-placed domain whose dependencies are already placed.
///
/// If no domain can be placed while some remain, the remainder becomes one
/// final degraded phase instead of looping forever; the caller surfaces that
/// loudly since it means a cycle survived past the mapper's detector.
pub(crate) fn build_phases(
    sequence: &[String],
    domains: &BTreeMap<String, DomainCoordination>,
    graph: &ImpactGraph,
) -> (Vec<ExecutionPhase>, bool) {
    let mut phases = Vec::new();
    let mut placed: BTreeSet<String> = BTreeSet::new();
    let mut remaining: Vec<String> = sequence.to_vec();
    let mut degraded = false;

    while !remaining.is_empty() {
        let batch: Vec<String> = remaining
            .iter()
            .filter(|d| {
                domains
                    .get(*d)
                    .map(|c| c.dependencies.iter().all(|dep| placed.contains(dep)))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        let (batch, is_degraded) = if batch.is_empty() {
            warn!(
                remainder = ?remaining,
                "no domain placeable, emitting degraded final phase"
            );
            degraded = true;
            (remaining.clone(), true)
        } else {
            (batch, false)
        };

        for d in &batch {
            placed.insert(d.clone());
        }
        remaining.retain(|d| !placed.contains(d));

        let number = phases.len() as u32 + 1;
        phases.push(make_phase(number, &batch, domains, graph, is_degraded));

        if is_degraded {
            break;
        }
    }

    (phases, degraded)
}

fn make_phase(
    number: u32,
    batch: &[String],
    domains: &BTreeMap<String, DomainCoordination>,
    graph: &ImpactGraph,
    degraded: bool,
) -> ExecutionPhase {
    let parallel = !degraded
        && batch
            .iter()
            .all(|d| domains.get(d).map(|c| c.strategy.parallelizable).unwrap_or(false));

    let estimated_secs = batch
        .iter()
        .filter_map(|d| graph.node(d))
        .map(|n| n.estimated_secs)
        .fold(0.0, f64::max);

    let mut dependencies: Vec<String> = batch
        .iter()
        .filter_map(|d| domains.get(d))
        .flat_map(|c| c.dependencies.iter().cloned())
        .collect();
    dependencies.sort();
    dependencies.dedup();

    let on_critical_path = batch.iter().any(|d| graph.critical_path.contains(d));

    let name = if degraded {
        format!("Phase {} (degraded)", number)
    } else {
        format!("Phase {}", number)
    };

    ExecutionPhase {
        number,
        name,
        domains: batch.to_vec(),
        parallel,
        estimated_secs,
        dependencies,
        on_critical_path,
    }
}
