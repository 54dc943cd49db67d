use meshgraph_core::ServiceIdentity;
use serde::Serialize;

use crate::aggregator::Aggregation;

/// A branch that stopped growing for a reason other than running out of
/// destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchEvent {
    /// `path` ends with an identity already present earlier on it.
    CycleDetected { path: Vec<ServiceIdentity> },
    /// The node sits at the configured depth bound and was not expanded.
    DepthLimited { identity: ServiceIdentity, depth: usize },
    /// The node's outbound query failed; it is kept as a leaf.
    SkippedBranch { identity: ServiceIdentity, reason: String },
}

/// Non-fatal diagnostics collected over one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryReport {
    pub queries: usize,
    pub malformed_samples: usize,
    pub unknown_status_samples: usize,
    pub self_invocations: usize,
    pub events: Vec<BranchEvent>,
}

impl DiscoveryReport {
    pub fn absorb(&mut self, aggregation: &Aggregation) {
        self.malformed_samples += aggregation.malformed;
        self.unknown_status_samples += aggregation.unknown_status;
        self.self_invocations += aggregation.self_invocations;
    }

    pub fn merge(&mut self, other: DiscoveryReport) {
        self.queries += other.queries;
        self.malformed_samples += other.malformed_samples;
        self.unknown_status_samples += other.unknown_status_samples;
        self.self_invocations += other.self_invocations;
        self.events.extend(other.events);
    }

    pub fn cycles(&self) -> impl Iterator<Item = &[ServiceIdentity]> {
        self.events.iter().filter_map(|e| match e {
            BranchEvent::CycleDetected { path } => Some(path.as_slice()),
            _ => None,
        })
    }

    pub fn skipped_branches(&self) -> impl Iterator<Item = &ServiceIdentity> {
        self.events.iter().filter_map(|e| match e {
            BranchEvent::SkippedBranch { identity, .. } => Some(identity),
            _ => None,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.events.is_empty() && self.malformed_samples == 0
    }
}
