use meshgraph_core::{DependencyTree, EdgeCounters, ExportFormat, IdScheme};
use serde::{Deserialize, Serialize};

use crate::plain::{build_elements, EdgeData, PlainDocument};
use crate::traverse::rate_field;
use crate::Exporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeColor {
    Red,
    Orange,
    Green,
    /// No traffic at all.
    Black,
}

/// Display values derived from one edge's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeAnnotation {
    pub total_rate: f64,
    /// `None` when there is no traffic.
    pub error_rate: Option<f64>,
    pub color: EdgeColor,
    pub label: String,
}

impl EdgeAnnotation {
    /// Classifies an edge.
    ///
    /// The error rate is `total - (2xx / total * 100)`, which subtracts a
    /// percentage from a rate. Dashboards built on this document expect that
    /// exact number, so it is kept as is; it goes negative whenever the
    /// success percentage exceeds the raw rate.
    pub fn classify(counters: &EdgeCounters) -> Self {
        let total_rate = counters.total;
        if total_rate <= 0.0 {
            return Self {
                total_rate: 0.0,
                error_rate: None,
                color: EdgeColor::Black,
                label: "rpm=0".to_string(),
            };
        }

        let error_rate = total_rate - (counters.rate_2xx / total_rate * 100.0);
        let color = if error_rate > 1.0 {
            EdgeColor::Red
        } else if error_rate > 0.0 {
            EdgeColor::Orange
        } else {
            EdgeColor::Green
        };
        let label = if error_rate > 0.0 {
            format!("rpm={:.2} (err={:.2}%)", total_rate, error_rate)
        } else {
            format!("rpm={:.2}", total_rate)
        };

        Self {
            total_rate,
            error_rate: Some(error_rate),
            color,
            label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedEdgeData {
    #[serde(flatten)]
    pub base: EdgeData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_per_min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<String>,
    pub color: EdgeColor,
    pub text: String,
}

pub type AnnotatedDocument = PlainDocument<AnnotatedEdgeData>;

/// Plain document plus per-edge error-rate colouring and labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotatedExporter {
    pub id_scheme: IdScheme,
}

impl AnnotatedExporter {
    pub fn new(id_scheme: IdScheme) -> Self {
        Self { id_scheme }
    }
}

impl Exporter for AnnotatedExporter {
    type Document = AnnotatedDocument;

    fn format(&self) -> ExportFormat {
        ExportFormat::Annotated
    }

    fn render(&self, roots: &[DependencyTree]) -> AnnotatedDocument {
        build_elements(roots, self.id_scheme, |base, counters| {
            let annotation = EdgeAnnotation::classify(counters);
            AnnotatedEdgeData {
                base,
                req_per_min: rate_field(annotation.total_rate),
                error_rate: annotation.error_rate.map(|e| format!("{:.2}", e)),
                color: annotation.color,
                text: annotation.label,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgraph_core::StatusClass;

    fn counters(ok: f64, server_errors: f64) -> EdgeCounters {
        EdgeCounters::zero()
            .with(StatusClass::Success, ok)
            .with(StatusClass::ServerError, server_errors)
    }

    #[test]
    fn all_success_is_green() {
        let a = EdgeAnnotation::classify(&counters(100.0, 0.0));
        assert_eq!(a.error_rate, Some(0.0));
        assert_eq!(a.color, EdgeColor::Green);
        assert_eq!(a.label, "rpm=100.00");
    }

    #[test]
    fn no_traffic_is_black() {
        let a = EdgeAnnotation::classify(&EdgeCounters::zero());
        assert_eq!(a.error_rate, None);
        assert_eq!(a.color, EdgeColor::Black);
        assert_eq!(a.label, "rpm=0");
    }

    // Known quirk: 38 of 40 succeeding gives 40 - 95 = -55, classified green.
    #[test]
    fn mixed_percentage_formula_goes_negative() {
        let a = EdgeAnnotation::classify(&counters(38.0, 2.0));
        assert_eq!(a.error_rate, Some(-55.0));
        assert_eq!(a.color, EdgeColor::Green);
        assert_eq!(a.label, "rpm=40.00");
    }

    #[test]
    fn error_rate_thresholds() {
        // 0.5 rpm, all failing: 0.5 - 0 = 0.5
        let orange = EdgeAnnotation::classify(&counters(0.0, 0.5));
        assert_eq!(orange.color, EdgeColor::Orange);
        assert_eq!(orange.label, "rpm=0.50 (err=0.50%)");

        // 200 rpm, 100 ok: 200 - 50 = 150
        let red = EdgeAnnotation::classify(&counters(100.0, 100.0));
        assert_eq!(red.color, EdgeColor::Red);
        assert_eq!(red.label, "rpm=200.00 (err=150.00%)");

        // exactly 1.0 is still orange
        let edge = EdgeAnnotation::classify(&counters(0.0, 1.0));
        assert_eq!(edge.error_rate, Some(1.0));
        assert_eq!(edge.color, EdgeColor::Orange);
    }
}
