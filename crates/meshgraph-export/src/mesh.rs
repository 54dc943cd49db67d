use meshgraph_core::{DependencyTree, EdgeCounters, ExportFormat, IdScheme};
use serde::{Deserialize, Serialize};

use crate::traverse::{node_id, visits};
use crate::Exporter;

/// Name of the synthetic outside node at both nesting levels.
pub const INTERNET: &str = "INTERNET";
pub const NOTICE_TITLE: &str = "Prometheus Graph";

const INBOUND_NORMAL_SHARE: f64 = 0.95;
const INBOUND_WARNING_SHARE: f64 = 0.02;
const INBOUND_DANGER_SHARE: f64 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub streaming: u8,
}

impl Default for Metadata {
    fn default() -> Self {
        Self { streaming: 1 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub danger: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<f64>,
}

impl Metrics {
    /// normal = 2xx + 3xx, warning = 4xx, danger = 5xx.
    pub fn from_counters(counters: &EdgeCounters) -> Self {
        Self {
            danger: positive(counters.rate_5xx),
            warning: positive(counters.rate_4xx),
            normal: positive(counters.rate_2xx + counters.rate_3xx),
        }
    }

    /// Synthetic split of the region's inbound volume.
    pub fn inbound(max_volume: f64) -> Self {
        Self {
            danger: positive(max_volume * INBOUND_DANGER_SHARE),
            warning: positive(max_volume * INBOUND_WARNING_SHARE),
            normal: positive(max_volume * INBOUND_NORMAL_SHARE),
        }
    }

    pub fn sum(&self) -> f64 {
        self.danger.unwrap_or(0.0) + self.warning.unwrap_or(0.0) + self.normal.unwrap_or(0.0)
    }
}

fn positive(value: f64) -> Option<f64> {
    (value > 0.0).then_some(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub source: String,
    pub target: String,
    pub metadata: Metadata,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshNode {
    pub renderer: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_volume: Option<f64>,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<MeshNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,
}

impl MeshNode {
    fn named(renderer: &str, name: impl Into<String>) -> Self {
        Self {
            renderer: renderer.to_string(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Top-level "global" node of the traffic mesh document.
pub type MeshDocument = MeshNode;

impl MeshDocument {
    /// The region node holding every discovered service.
    pub fn region(&self) -> Option<&MeshNode> {
        self.nodes.iter().find(|n| n.renderer == "region" && n.name != INTERNET)
    }

    pub fn inbound(&self) -> Option<&Connection> {
        self.connections.iter().find(|c| c.source == INTERNET)
    }
}

/// Two-level region/node traffic mesh with a synthetic outside node.
#[derive(Debug, Clone)]
pub struct RegionMeshExporter {
    pub id_scheme: IdScheme,
    pub region_name: String,
    /// Unix seconds stamped into the `updated` field.
    pub timestamp: i64,
}

impl RegionMeshExporter {
    pub fn new(id_scheme: IdScheme, region_name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id_scheme,
            region_name: region_name.into(),
            timestamp,
        }
    }
}

/// Sum of the incoming edge total over every node, roots included.
pub fn max_volume(roots: &[DependencyTree]) -> f64 {
    roots.iter().map(DependencyTree::total_volume).sum()
}

impl Exporter for RegionMeshExporter {
    type Document = MeshDocument;

    fn format(&self) -> ExportFormat {
        ExportFormat::Mesh
    }

    fn render(&self, roots: &[DependencyTree]) -> MeshDocument {
        let visits = visits(roots);
        let ids: Vec<String> = visits.iter().map(|v| node_id(self.id_scheme, v)).collect();

        let mut nodes = Vec::with_capacity(visits.len() + 1);
        nodes.push(MeshNode::named("focusedChild", INTERNET));
        let mut connections = Vec::with_capacity(visits.len());

        for visit in &visits {
            let name = ids[visit.ordinal].clone();
            nodes.push(MeshNode {
                display_name: Some(visit.node.identity.display_name()),
                notices: vec![Notice {
                    title: NOTICE_TITLE.to_string(),
                    link: visit.node.graph_link.clone(),
                }],
                ..MeshNode::named("focusedChild", name.clone())
            });

            let source = match visit.parent_ordinal {
                Some(parent) => ids[parent].clone(),
                None => INTERNET.to_string(),
            };
            connections.push(Connection {
                source,
                target: name,
                metadata: Metadata::default(),
                metrics: Metrics::from_counters(&visit.node.incoming_edge),
            });
        }

        let volume = max_volume(roots);
        let region = MeshNode {
            max_volume: Some(volume),
            nodes,
            connections,
            ..MeshNode::named("region", self.region_name.clone())
        };

        MeshNode {
            updated: Some(self.timestamp),
            max_volume: Some(volume),
            nodes: vec![MeshNode::named("region", INTERNET), region],
            connections: vec![Connection {
                source: INTERNET.to_string(),
                target: self.region_name.clone(),
                metadata: Metadata::default(),
                metrics: Metrics::inbound(volume),
            }],
            ..MeshNode::named("global", "edge")
        }
    }
}
