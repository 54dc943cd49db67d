use approx::assert_relative_eq;
use meshgraph_core::{DependencyTree, EdgeCounters, NodeIndex, ServiceIdentity, StatusClass};
use meshgraph_export::{
    max_volume, render, AnnotatedExporter, CxExporter, Document, EdgeColor, ExportFormat,
    Exporter, IdScheme, PlainExporter, RegionMeshExporter, RenderOptions,
};
use serde_json::Value;

fn link(name: &str) -> String {
    format!("http://prom:9090/graph?g0.expr={}", name)
}

fn rpm(ok: f64, server_errors: f64) -> EdgeCounters {
    EdgeCounters::zero()
        .with(StatusClass::Success, ok)
        .with(StatusClass::ServerError, server_errors)
}

/// outside -> checkout (v1) at 120 rpm -> payments (v2) at 38 ok / 2 failing
fn checkout() -> DependencyTree {
    let mut tree = DependencyTree::new(
        ServiceIdentity::new("checkout.shop.svc", "v1"),
        rpm(120.0, 0.0),
        link("checkout"),
    );
    tree.add_child(
        NodeIndex::ROOT,
        ServiceIdentity::new("payments.shop.svc", "v2"),
        rpm(38.0, 2.0),
        link("payments"),
    );
    tree
}

/// a -> {b -> d, c}, plus a second root e
fn forest() -> Vec<DependencyTree> {
    let mut a = DependencyTree::new(ServiceIdentity::new("a", "v1"), rpm(10.0, 0.0), link("a"));
    let b = a.add_child(NodeIndex::ROOT, ServiceIdentity::new("b", "v1"), rpm(4.0, 1.0), link("b"));
    a.add_child(b, ServiceIdentity::new("d", "v1"), rpm(2.0, 0.0), link("d"));
    a.add_child(
        NodeIndex::ROOT,
        ServiceIdentity::new("c", "v1"),
        EdgeCounters::zero().with(StatusClass::ClientError, 3.0),
        link("c"),
    );
    let e = DependencyTree::new(ServiceIdentity::new("e", "v2"), rpm(7.0, 0.0), link("e"));
    vec![a, e]
}

#[test]
fn plain_counts_match_tree() {
    let roots = forest();
    let doc = PlainExporter::default().render(&roots);

    let total: usize = roots.iter().map(DependencyTree::len).sum();
    assert_eq!(doc.nodes().len(), total);
    assert_eq!(doc.edges().len(), total - roots.len());
}

#[test]
fn plain_checkout_scenario() {
    let doc = PlainExporter::new(IdScheme::Qualified).render(&[checkout()]);
    assert_eq!(doc.nodes().len(), 2);
    assert_eq!(doc.edges().len(), 1);

    let root = &doc.nodes()[0].data;
    assert_eq!(root.id, "checkout.shop.svc (v1)");
    assert_eq!(root.name, "checkout (v1)");
    assert_eq!(root.link_prom_graph, link("checkout"));

    let edge = &doc.edges()[0].data;
    assert_eq!(edge.id, "0");
    assert_eq!(edge.source, "checkout.shop.svc (v1)");
    assert_eq!(edge.target, "payments.shop.svc (v2)");
    assert_eq!(edge.rate_2xx.as_deref(), Some("38.00"));
    assert_eq!(edge.rate_5xx.as_deref(), Some("2.00"));

    let json = serde_json::to_value(&doc).unwrap();
    let data = &json["elements"]["edges"][0]["data"];
    assert_eq!(data["req_per_min_2XX"], "38.00");
    assert_eq!(data["req_per_min_5XX"], "2.00");
    assert!(data.get("req_per_min_3XX").is_none());
    assert!(data.get("req_per_min_4XX").is_none());
}

#[test]
fn plain_pre_order_and_sequential_ids() {
    let doc = PlainExporter::new(IdScheme::Sequential).render(&forest());

    let ids: Vec<_> = doc.nodes().iter().map(|n| n.data.id.as_str()).collect();
    assert_eq!(ids, vec!["n0", "n1", "n2", "n3", "n4"]);
    let names: Vec<_> = doc.nodes().iter().map(|n| n.data.name.as_str()).collect();
    assert_eq!(names, vec!["a (v1)", "b (v1)", "d (v1)", "c (v1)", "e (v2)"]);

    let pairs: Vec<_> = doc
        .edges()
        .iter()
        .map(|e| (e.data.id.as_str(), e.data.source.as_str(), e.data.target.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![("0", "n0", "n1"), ("1", "n1", "n2"), ("2", "n0", "n3")]
    );
}

#[test]
fn annotated_checkout_edge_is_green() {
    let doc = AnnotatedExporter::default().render(&[checkout()]);
    let edge = &doc.edges()[0].data;

    // 40 - (38 / 40 * 100) = -55: the formula mixes a rate with a percentage.
    assert_eq!(edge.error_rate.as_deref(), Some("-55.00"));
    assert_eq!(edge.color, EdgeColor::Green);
    assert_eq!(edge.text, "rpm=40.00");
    assert_eq!(edge.req_per_min.as_deref(), Some("40.00"));
    assert_eq!(edge.base.rate_2xx.as_deref(), Some("38.00"));

    let json = serde_json::to_value(&doc).unwrap();
    let data = &json["elements"]["edges"][0]["data"];
    assert_eq!(data["color"], "green");
    assert_eq!(data["source"], "checkout.shop.svc (v1)");
    assert_eq!(data["req_per_min_2XX"], "38.00");
}

#[test]
fn annotated_zero_traffic_edge_is_black() {
    let mut tree = DependencyTree::new(ServiceIdentity::new("a", "v1"), rpm(1.0, 0.0), link("a"));
    tree.add_child(NodeIndex::ROOT, ServiceIdentity::new("b", "v1"), EdgeCounters::zero(), link("b"));

    let doc = AnnotatedExporter::default().render(&[tree]);
    let edge = &doc.edges()[0].data;
    assert_eq!(edge.color, EdgeColor::Black);
    assert_eq!(edge.text, "rpm=0");
    assert!(edge.error_rate.is_none());
    assert!(edge.req_per_min.is_none());

    let json = serde_json::to_value(&doc).unwrap();
    let data = &json["elements"]["edges"][0]["data"];
    assert!(data.get("error_rate").is_none());
    assert!(data.get("req_per_min").is_none());
}

#[test]
fn mesh_rolls_up_volume() {
    let roots = forest();
    // 10 + 5 + 2 + 3 + 7
    assert_relative_eq!(max_volume(&roots), 27.0);

    let doc = RegionMeshExporter::new(IdScheme::Qualified, "istio-mesh", 1_700_000_000).render(&roots);
    assert_eq!(doc.renderer, "global");
    assert_eq!(doc.name, "edge");
    assert_eq!(doc.updated, Some(1_700_000_000));
    assert_relative_eq!(doc.max_volume.unwrap_or_default(), 27.0);

    let inbound = doc.inbound().expect("inbound connection");
    assert_eq!(inbound.target, "istio-mesh");
    assert_relative_eq!(inbound.metrics.sum(), 27.0, epsilon = 1e-9);
    assert_relative_eq!(inbound.metrics.normal.unwrap_or_default(), 27.0 * 0.95, epsilon = 1e-9);
}

#[test]
fn mesh_region_holds_every_node() {
    let roots = forest();
    let doc = RegionMeshExporter::new(IdScheme::Qualified, "prod", 0).render(&roots);
    let region = doc.region().expect("region node");
    assert_eq!(region.name, "prod");

    // INTERNET plus five services
    assert_eq!(region.nodes.len(), 6);
    assert_eq!(region.nodes[0].name, "INTERNET");
    let b = &region.nodes[2];
    assert_eq!(b.name, "b (v1)");
    assert_eq!(b.display_name.as_deref(), Some("b (v1)"));
    assert_eq!(b.notices[0].title, "Prometheus Graph");
    assert_eq!(b.notices[0].link, link("b"));

    let sources: Vec<_> = region.connections.iter().map(|c| c.source.as_str()).collect();
    assert_eq!(sources, vec!["INTERNET", "a (v1)", "b (v1)", "a (v1)", "INTERNET"]);

    // b: 4 ok, 1 failing
    let to_b = &region.connections[1].metrics;
    assert_eq!(to_b.normal, Some(4.0));
    assert_eq!(to_b.danger, Some(1.0));
    assert_eq!(to_b.warning, None);

    // c only saw 4xx
    let to_c = &region.connections[3].metrics;
    assert_eq!(to_c.warning, Some(3.0));
    assert_eq!(to_c.normal, None);
}

#[test]
fn mesh_of_nothing_has_zero_volume() {
    let doc = RegionMeshExporter::new(IdScheme::Qualified, "istio-mesh", 0).render(&[]);
    assert_eq!(doc.max_volume, Some(0.0));
    assert_relative_eq!(doc.inbound().expect("inbound").metrics.sum(), 0.0);
    assert_eq!(doc.region().expect("region").nodes.len(), 1);
}

#[test]
fn cx_ids_follow_pre_order() {
    let doc = CxExporter::new(42).render(&forest());

    let ids: Vec<_> = doc.nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(doc.nodes[2].represents, "d (v1)");

    let edges: Vec<_> = doc.edges.iter().map(|e| (e.id, e.source, e.target)).collect();
    assert_eq!(edges, vec![(0, 0, 1), (1, 1, 2), (2, 0, 3)]);

    assert_eq!(doc.nodes_aspect.id_counter, 5);
    assert_eq!(doc.edges_aspect.id_counter, 3);
    assert_eq!(doc.nodes_aspect.version, 42);
    assert_eq!(doc.node_attributes.len(), 5);
    assert_eq!(doc.node_attributes[4].values, vec![link("e")]);

    // b has 2xx and 5xx, d 2xx, c 4xx
    let attrs: Vec<_> = doc
        .edge_attributes
        .iter()
        .map(|a| (a.owner, a.name.as_str(), a.values[0].as_str()))
        .collect();
    assert_eq!(
        attrs,
        vec![
            (0, "req_per_min_2xx", "4.00"),
            (0, "req_per_min_5xx", "1.00"),
            (1, "req_per_min_2xx", "2.00"),
            (2, "req_per_min_4xx", "3.00"),
        ]
    );

    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["nodesAspect"]["idCounter"], 5);
    assert_eq!(json["edges"][0]["@id"], 0);
    assert_eq!(json["nodes"][0]["n"], "a (v1)");
}

#[test]
fn rendering_is_byte_identical() {
    let roots = forest();
    let options = RenderOptions {
        timestamp: 1_700_000_000,
        ..RenderOptions::default()
    };
    for format in [
        ExportFormat::Plain,
        ExportFormat::Annotated,
        ExportFormat::Mesh,
        ExportFormat::Cx,
    ] {
        let first = render(format, &roots, &options).to_json(true).unwrap();
        let second = render(format, &roots, &options).to_json(true).unwrap();
        assert_eq!(first, second, "{} output differs between runs", format);
    }
}

#[test]
fn render_dispatches_by_format() {
    let roots = [checkout()];
    let options = RenderOptions::default();

    let doc = render(ExportFormat::Annotated, &roots, &options);
    assert_eq!(doc.format(), ExportFormat::Annotated);
    assert!(matches!(doc, Document::Annotated(_)));

    let json: Value = serde_json::from_str(&doc.to_json(false).unwrap()).unwrap();
    assert_eq!(json["elements"]["edges"][0]["data"]["text"], "rpm=40.00");

    let mesh: Value = serde_json::from_str(
        &render(ExportFormat::Mesh, &roots, &options).to_json(false).unwrap(),
    )
    .unwrap();
    assert_eq!(mesh["renderer"], "global");
    assert_eq!(mesh["nodes"][1]["name"], "istio-mesh");
}
