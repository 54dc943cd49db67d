use meshgraph_core::{DependencyTree, IdScheme, ServiceNode};

/// A node in emission order across a whole forest.
pub(crate) struct Visit<'a> {
    /// Position in pre-order over all roots, starting at 0.
    pub ordinal: usize,
    pub node: &'a ServiceNode,
    pub parent_ordinal: Option<usize>,
}

/// Pre-order over every tree in turn: parent before children, children in
/// tree order, roots in the given order.
pub(crate) fn visits(roots: &[DependencyTree]) -> Vec<Visit<'_>> {
    let mut out = Vec::with_capacity(roots.iter().map(DependencyTree::len).sum());
    for tree in roots {
        let mut ordinals = vec![0usize; tree.len()];
        for (idx, node) in tree.pre_order() {
            let ordinal = out.len();
            ordinals[idx.get()] = ordinal;
            out.push(Visit {
                ordinal,
                node,
                parent_ordinal: node.parent.map(|p| ordinals[p.get()]),
            });
        }
    }
    out
}

pub(crate) fn node_id(scheme: IdScheme, visit: &Visit<'_>) -> String {
    match scheme {
        IdScheme::Qualified => visit.node.identity.qualified(),
        IdScheme::Sequential => format!("n{}", visit.ordinal),
    }
}

/// Two-decimal rate, or `None` unless strictly positive.
pub(crate) fn rate_field(value: f64) -> Option<String> {
    (value > 0.0).then(|| format!("{:.2}", value))
}
