use meshgraph_core::{DependencyTree, ExportFormat, StatusClass};
use serde::{Deserialize, Serialize};

use crate::mesh::NOTICE_TITLE;
use crate::traverse::{rate_field, visits};
use crate::Exporter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectMetadata {
    pub name: String,
    pub version: i64,
    pub id_counter: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CxNode {
    #[serde(rename = "@id")]
    pub id: usize,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "r")]
    pub represents: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CxEdge {
    #[serde(rename = "@id")]
    pub id: usize,
    #[serde(rename = "s")]
    pub source: usize,
    #[serde(rename = "t")]
    pub target: usize,
}

/// Attribute attached to a node or edge (`po` is the owner id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CxAttribute {
    #[serde(rename = "po")]
    pub owner: usize,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "v")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CxDocument {
    pub nodes_aspect: AspectMetadata,
    pub edges_aspect: AspectMetadata,
    pub nodes: Vec<CxNode>,
    pub edges: Vec<CxEdge>,
    pub node_attributes: Vec<CxAttribute>,
    pub edge_attributes: Vec<CxAttribute>,
}

fn edge_attribute_name(class: StatusClass) -> &'static str {
    match class {
        StatusClass::Success => "req_per_min_2xx",
        StatusClass::Redirect => "req_per_min_3xx",
        StatusClass::ClientError => "req_per_min_4xx",
        StatusClass::ServerError => "req_per_min_5xx",
    }
}

/// Aspect-oriented network document. Node ids are pre-order ordinals, so
/// the id scheme setting does not apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct CxExporter {
    /// Unix seconds used as the aspect version.
    pub timestamp: i64,
}

impl CxExporter {
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }

    fn aspect(&self, name: &str, id_counter: usize) -> AspectMetadata {
        AspectMetadata {
            name: name.to_string(),
            version: self.timestamp,
            id_counter,
        }
    }
}

impl Exporter for CxExporter {
    type Document = CxDocument;

    fn format(&self) -> ExportFormat {
        ExportFormat::Cx
    }

    fn render(&self, roots: &[DependencyTree]) -> CxDocument {
        let visits = visits(roots);
        let mut nodes = Vec::with_capacity(visits.len());
        let mut node_attributes = Vec::with_capacity(visits.len());
        let mut edges = Vec::new();
        let mut edge_attributes = Vec::new();

        for visit in &visits {
            let identity = &visit.node.identity;
            nodes.push(CxNode {
                id: visit.ordinal,
                name: identity.display_name(),
                represents: identity.qualified(),
            });
            node_attributes.push(CxAttribute {
                owner: visit.ordinal,
                name: NOTICE_TITLE.to_string(),
                values: vec![visit.node.graph_link.clone()],
            });

            let Some(parent) = visit.parent_ordinal else {
                continue;
            };
            let edge_id = edges.len();
            edges.push(CxEdge {
                id: edge_id,
                source: parent,
                target: visit.ordinal,
            });
            for class in StatusClass::ALL {
                if let Some(value) = rate_field(visit.node.incoming_edge.bucket(class)) {
                    edge_attributes.push(CxAttribute {
                        owner: edge_id,
                        name: edge_attribute_name(class).to_string(),
                        values: vec![value],
                    });
                }
            }
        }

        CxDocument {
            nodes_aspect: self.aspect("nodes", nodes.len()),
            edges_aspect: self.aspect("edges", edges.len()),
            nodes,
            edges,
            node_attributes,
            edge_attributes,
        }
    }
}
