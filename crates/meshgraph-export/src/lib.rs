//! Exchange documents rendered from discovered dependency trees.
//!
//! Every exporter is a pure function of its input forest: nodes are emitted
//! in pre-order (parent first, children in tree order, roots in the order
//! given), and anything time-dependent comes in through [`RenderOptions`].

pub mod annotated;
pub mod cx;
pub mod mesh;
pub mod plain;
mod traverse;

pub use annotated::{AnnotatedDocument, AnnotatedEdgeData, AnnotatedExporter, EdgeAnnotation, EdgeColor};
pub use cx::{CxDocument, CxExporter};
pub use mesh::{max_volume, MeshDocument, RegionMeshExporter};
pub use meshgraph_core::{ExportFormat, IdScheme};
pub use plain::{EdgeData, NodeData, PlainDocument, PlainExporter};

use meshgraph_core::{DependencyTree, Result};
use serde::Serialize;

/// One output format over the dependency tree model.
pub trait Exporter {
    type Document: Serialize;

    fn format(&self) -> ExportFormat;

    fn render(&self, roots: &[DependencyTree]) -> Self::Document;
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub id_scheme: IdScheme,
    pub region_name: String,
    /// Unix seconds; only the mesh and cx documents carry it.
    pub timestamp: i64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            id_scheme: IdScheme::default(),
            region_name: "istio-mesh".to_string(),
            timestamp: 0,
        }
    }
}

/// A rendered document of any format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Plain(PlainDocument),
    Annotated(AnnotatedDocument),
    Mesh(MeshDocument),
    Cx(CxDocument),
}

impl Document {
    pub fn format(&self) -> ExportFormat {
        match self {
            Document::Plain(_) => ExportFormat::Plain,
            Document::Annotated(_) => ExportFormat::Annotated,
            Document::Mesh(_) => ExportFormat::Mesh,
            Document::Cx(_) => ExportFormat::Cx,
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

/// Renders `roots` in the requested format.
pub fn render(format: ExportFormat, roots: &[DependencyTree], options: &RenderOptions) -> Document {
    match format {
        ExportFormat::Plain => Document::Plain(PlainExporter::new(options.id_scheme).render(roots)),
        ExportFormat::Annotated => {
            Document::Annotated(AnnotatedExporter::new(options.id_scheme).render(roots))
        }
        ExportFormat::Mesh => Document::Mesh(
            RegionMeshExporter::new(options.id_scheme, options.region_name.clone(), options.timestamp)
                .render(roots),
        ),
        ExportFormat::Cx => Document::Cx(CxExporter::new(options.timestamp).render(roots)),
    }
}
