use domainsync_core::{
    CoordinationStrategy, DomainNode, ResourceKind, RiskTier, StrategyKind, UpdatePriority,
};

/// Derive a domain's coordination strategy from its graph position.
///
/// A domain is parallelizable exactly when it has no dependencies and is not
/// critical priority. The risk tier escalates one step for each of: high
/// impact score, critical priority, more than two dependents.
pub(crate) fn build_strategy(
    node: &DomainNode,
    dependencies: &[String],
    dependents: &[String],
) -> CoordinationStrategy {
    let parallelizable = dependencies.is_empty() && node.priority != UpdatePriority::Critical;

    let mut escalations = 0u8;
    if node.impact_score >= 0.7 {
        escalations += 1;
    }
    if node.priority == UpdatePriority::Critical {
        escalations += 1;
    }
    if dependents.len() > 2 {
        escalations += 1;
    }
    let risk = match escalations {
        0 => RiskTier::Low,
        1 => RiskTier::Medium,
        _ => RiskTier::High,
    };

    let name = if node.priority == UpdatePriority::Critical {
        StrategyKind::CriticalSequential
    } else if parallelizable {
        if risk == RiskTier::Low {
            StrategyKind::ParallelLowRisk
        } else {
            StrategyKind::ParallelMonitored
        }
    } else if risk == RiskTier::High {
        StrategyKind::SequentialHighRisk
    } else {
        StrategyKind::SequentialStandard
    };

    let mut required_resources = vec![ResourceKind::AtomicWrite, ResourceKind::Rollback];
    if node.impact_score >= 0.7 || node.priority >= UpdatePriority::High {
        required_resources.push(ResourceKind::SemanticAnalysis);
    }
    if dependents.len() > 2 {
        required_resources.push(ResourceKind::CoordinationLock);
    }

    CoordinationStrategy {
        name,
        parallelizable,
        risk,
        required_resources,
    }
}
