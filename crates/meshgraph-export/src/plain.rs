use meshgraph_core::{DependencyTree, EdgeCounters, ExportFormat, IdScheme};
use serde::{Deserialize, Serialize};

use crate::traverse::{node_id, rate_field, visits};
use crate::Exporter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link_prom_graph: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeElement {
    pub data: NodeData,
}

/// Per-class rates, each present only when the rate is above zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "req_per_min_2XX", default, skip_serializing_if = "Option::is_none")]
    pub rate_2xx: Option<String>,
    #[serde(rename = "req_per_min_3XX", default, skip_serializing_if = "Option::is_none")]
    pub rate_3xx: Option<String>,
    #[serde(rename = "req_per_min_4XX", default, skip_serializing_if = "Option::is_none")]
    pub rate_4xx: Option<String>,
    #[serde(rename = "req_per_min_5XX", default, skip_serializing_if = "Option::is_none")]
    pub rate_5xx: Option<String>,
}

impl EdgeData {
    pub(crate) fn new(id: String, source: String, target: String, counters: &EdgeCounters) -> Self {
        Self {
            id,
            source,
            target,
            rate_2xx: rate_field(counters.rate_2xx),
            rate_3xx: rate_field(counters.rate_3xx),
            rate_4xx: rate_field(counters.rate_4xx),
            rate_5xx: rate_field(counters.rate_5xx),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeElement<D = EdgeData> {
    pub data: D,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elements<D = EdgeData> {
    pub nodes: Vec<NodeElement>,
    pub edges: Vec<EdgeElement<D>>,
}

/// Flat node/edge elements document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainDocument<D = EdgeData> {
    pub elements: Elements<D>,
}

impl<D> PlainDocument<D> {
    pub fn nodes(&self) -> &[NodeElement] {
        &self.elements.nodes
    }

    pub fn edges(&self) -> &[EdgeElement<D>] {
        &self.elements.edges
    }
}

/// Builds the elements list, letting `edge` decorate each parent→child edge.
pub(crate) fn build_elements<D>(
    roots: &[DependencyTree],
    scheme: IdScheme,
    mut edge: impl FnMut(EdgeData, &EdgeCounters) -> D,
) -> PlainDocument<D> {
    let visits = visits(roots);
    let ids: Vec<String> = visits.iter().map(|v| node_id(scheme, v)).collect();

    let mut nodes = Vec::with_capacity(visits.len());
    let mut edges = Vec::new();
    for visit in &visits {
        let id = ids[visit.ordinal].clone();
        nodes.push(NodeElement {
            data: NodeData {
                id: id.clone(),
                name: visit.node.identity.display_name(),
                link_prom_graph: visit.node.graph_link.clone(),
            },
        });

        if let Some(parent) = visit.parent_ordinal {
            let counters = &visit.node.incoming_edge;
            let base = EdgeData::new(edges.len().to_string(), ids[parent].clone(), id, counters);
            edges.push(EdgeElement {
                data: edge(base, counters),
            });
        }
    }

    PlainDocument {
        elements: Elements { nodes, edges },
    }
}

/// Plain graph exporter; one id scheme per instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainExporter {
    pub id_scheme: IdScheme,
}

impl PlainExporter {
    pub fn new(id_scheme: IdScheme) -> Self {
        Self { id_scheme }
    }
}

impl Exporter for PlainExporter {
    type Document = PlainDocument;

    fn format(&self) -> ExportFormat {
        ExportFormat::Plain
    }

    fn render(&self, roots: &[DependencyTree]) -> PlainDocument {
        build_elements(roots, self.id_scheme, |data, _| data)
    }
}
