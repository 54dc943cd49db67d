use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use meshgraph_core::{
    BranchFailurePolicy, DependencyTree, EdgeCounters, MeshGraphError, NodeIndex, Result,
    ServiceIdentity, Settings,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::aggregator::aggregate;
use crate::client::{MetricsQueryClient, Sample};
use crate::query::{QueryWindow, TrafficSignal};
use crate::report::{BranchEvent, DiscoveryReport};

/// Knobs for a discovery pass
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Backend base URL used for deep links.
    pub server: String,
    pub query_timeout: Duration,
    /// Concurrent child expansions per node.
    pub max_concurrent_queries: usize,
    /// Nodes this deep are kept but not expanded.
    pub max_depth: usize,
    pub branch_failure: BranchFailurePolicy,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            server: "http://localhost:9090".to_string(),
            query_timeout: Duration::from_secs(10),
            max_concurrent_queries: 8,
            max_depth: 32,
            branch_failure: BranchFailurePolicy::Skip,
        }
    }
}

impl DiscoveryOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            server: settings.prometheus.server.trim_end_matches('/').to_string(),
            query_timeout: settings.prometheus.query_timeout()?,
            max_concurrent_queries: settings.discovery.max_concurrent_queries.max(1),
            max_depth: settings.discovery.max_depth,
            branch_failure: settings.discovery.branch_failure,
        })
    }
}

/// Result of one pass over one signal.
#[derive(Debug, Clone)]
pub struct DiscoveryPass {
    pub signal: TrafficSignal,
    pub window: QueryWindow,
    pub roots: Vec<DependencyTree>,
    pub report: DiscoveryReport,
}

impl DiscoveryPass {
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(DependencyTree::len).sum()
    }
}

type Branch = (DependencyTree, DiscoveryReport);

/// Builds dependency trees by asking the backend "who does this node call"
/// until no new destinations turn up.
pub struct DiscoveryEngine {
    client: Arc<dyn MetricsQueryClient>,
    options: DiscoveryOptions,
}

impl DiscoveryEngine {
    pub fn new(client: Arc<dyn MetricsQueryClient>, options: DiscoveryOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Runs one pass. Fails only when the root query fails, or when a child
    /// query fails under [`BranchFailurePolicy::FailPass`].
    pub async fn discover(
        &self,
        signal: &TrafficSignal,
        window: QueryWindow,
    ) -> Result<DiscoveryPass> {
        let span = info_span!("discovery", signal = %signal, at = %window.at);
        async move {
            let mut report = DiscoveryReport::default();

            let expr = signal.root_query(&window);
            report.queries += 1;
            let samples = self.query(&expr, &window).await?;
            let roots = aggregate(&samples, None);
            report.absorb(&roots);
            info!("Found [{}] root destinations", roots.destinations.len());

            let branches: Vec<Branch> = stream::iter(roots.destinations)
                .map(|(identity, counters)| {
                    debug!("Root Service: {}", identity);
                    self.expand(signal, &window, identity, counters, Vec::new())
                })
                .buffered(self.options.max_concurrent_queries)
                .try_collect()
                .await?;

            let mut trees = Vec::with_capacity(branches.len());
            for (tree, branch_report) in branches {
                report.merge(branch_report);
                trees.push(tree);
            }

            let pass = DiscoveryPass {
                signal: signal.clone(),
                window,
                roots: trees,
                report,
            };
            info!(
                "Discovered {} nodes under {} roots with {} queries ({} cycles, {} skipped branches)",
                pass.node_count(),
                pass.roots.len(),
                pass.report.queries,
                pass.report.cycles().count(),
                pass.report.skipped_branches().count()
            );
            Ok(pass)
        }
        .instrument(span)
        .await
    }

    /// [`discover`](Self::discover) under a hard deadline for the whole pass.
    pub async fn discover_within(
        &self,
        signal: &TrafficSignal,
        window: QueryWindow,
        deadline: Duration,
    ) -> Result<DiscoveryPass> {
        tokio::time::timeout(deadline, self.discover(signal, window))
            .await
            .map_err(|_| {
                MeshGraphError::DeadlineExceeded(format!(
                    "discovery of {} did not finish within {:?}",
                    signal, deadline
                ))
            })?
    }

    async fn query(&self, expr: &str, window: &QueryWindow) -> Result<Vec<Sample>> {
        let timeout = self.options.query_timeout;
        tokio::time::timeout(timeout, self.client.instant_query(expr, window.at))
            .await
            .map_err(|_| {
                MeshGraphError::Timeout(format!("query `{}` exceeded {:?}", expr, timeout))
            })?
    }

    /// Builds the subtree rooted at `identity`. `path` holds the identities
    /// between the tree root and this node, exclusive.
    fn expand<'a>(
        &'a self,
        signal: &'a TrafficSignal,
        window: &'a QueryWindow,
        identity: ServiceIdentity,
        incoming: EdgeCounters,
        mut path: Vec<ServiceIdentity>,
    ) -> BoxFuture<'a, Result<Branch>> {
        Box::pin(async move {
            let link = signal.deep_link(&self.options.server, &identity);
            let mut tree = DependencyTree::new(identity.clone(), incoming, link);
            let mut report = DiscoveryReport::default();

            let depth = path.len();
            if depth >= self.options.max_depth {
                warn!("Not expanding {} at depth {}", identity, depth);
                report.events.push(BranchEvent::DepthLimited { identity, depth });
                return Ok((tree, report));
            }

            let expr = signal.outbound_query(&identity, window);
            report.queries += 1;
            let samples = match self.query(&expr, window).await {
                Ok(samples) => samples,
                Err(e) => match self.options.branch_failure {
                    BranchFailurePolicy::Skip => {
                        warn!("Skipping branch below {}: {}", identity, e);
                        report.events.push(BranchEvent::SkippedBranch {
                            identity,
                            reason: e.to_string(),
                        });
                        return Ok((tree, report));
                    }
                    BranchFailurePolicy::FailPass => return Err(e),
                },
            };

            let destinations = aggregate(&samples, Some(&identity));
            report.absorb(&destinations);
            path.push(identity.clone());

            let mut children = Vec::with_capacity(destinations.destinations.len());
            for (child, counters) in destinations.destinations {
                if path.contains(&child) {
                    let mut cycle = path.clone();
                    cycle.push(child);
                    warn!(
                        "Cycle detected: {}",
                        cycle.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(" -> ")
                    );
                    report.events.push(BranchEvent::CycleDetected { path: cycle });
                    continue;
                }
                debug!("Child Service: {} -> {}", identity, child);
                children.push((child, counters));
            }

            let path = &path;
            let branches: Vec<Branch> = stream::iter(children)
                .map(|(child, counters)| self.expand(signal, window, child, counters, path.clone()))
                .buffered(self.options.max_concurrent_queries)
                .try_collect()
                .await?;

            for (subtree, sub_report) in branches {
                tree.graft(NodeIndex::ROOT, subtree);
                report.merge(sub_report);
            }
            Ok((tree, report))
        })
    }
}
