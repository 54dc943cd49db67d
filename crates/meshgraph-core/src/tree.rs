use crate::{EdgeCounters, ServiceIdentity};
use serde::{Deserialize, Serialize};

/// Index of a node inside its owning [`DependencyTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub const ROOT: NodeIndex = NodeIndex(0);

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

/// One service+version in a discovered graph.
///
/// `parent` is a back-pointer into the same arena and never owns anything;
/// ownership runs strictly from the tree to its `nodes` vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub identity: ServiceIdentity,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    /// Traffic from `parent` into this node. For roots, traffic from outside.
    pub incoming_edge: EdgeCounters,
    /// Opaque deep link into the metrics backend UI.
    pub graph_link: String,
}

impl ServiceNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Arena-backed dependency tree rooted at a service reached from outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyTree {
    nodes: Vec<ServiceNode>,
}

impl DependencyTree {
    pub fn new(identity: ServiceIdentity, incoming_edge: EdgeCounters, graph_link: String) -> Self {
        Self {
            nodes: vec![ServiceNode {
                identity,
                parent: None,
                children: Vec::new(),
                incoming_edge,
                graph_link,
            }],
        }
    }

    pub fn root(&self) -> &ServiceNode {
        &self.nodes[NodeIndex::ROOT.0]
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&ServiceNode> {
        self.nodes.get(idx.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent_of(&self, idx: NodeIndex) -> Option<&ServiceNode> {
        self.node(idx)
            .and_then(|n| n.parent)
            .and_then(|p| self.node(p))
    }

    pub fn children_of(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, &ServiceNode)> + '_ {
        self.node(idx)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&c| (c, &self.nodes[c.0]))
    }

    /// Appends a leaf under `parent` and returns its index.
    pub fn add_child(
        &mut self,
        parent: NodeIndex,
        identity: ServiceIdentity,
        incoming_edge: EdgeCounters,
        graph_link: String,
    ) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len());
        self.nodes.push(ServiceNode {
            identity,
            parent: Some(parent),
            children: Vec::new(),
            incoming_edge,
            graph_link,
        });
        self.nodes[parent.0].children.push(idx);
        idx
    }

    /// Moves every node of `subtree` under `parent`, keeping the subtree's
    /// shape and child order. Returns the new index of the subtree root.
    pub fn graft(&mut self, parent: NodeIndex, subtree: DependencyTree) -> NodeIndex {
        let offset = self.nodes.len();
        let shift = |i: NodeIndex| NodeIndex(i.0 + offset);
        for mut node in subtree.nodes {
            node.parent = Some(node.parent.map(shift).unwrap_or(parent));
            node.children = node.children.into_iter().map(shift).collect();
            self.nodes.push(node);
        }
        let grafted = NodeIndex(offset);
        self.nodes[parent.0].children.push(grafted);
        grafted
    }

    /// Parent-before-children traversal, children in insertion order.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![NodeIndex::ROOT],
        }
    }

    /// Parent→child pairs in pre-order of the child.
    pub fn edges(&self) -> impl Iterator<Item = (&ServiceNode, &ServiceNode)> + '_ {
        self.pre_order().filter_map(move |(_, node)| {
            node.parent
                .and_then(|p| self.node(p))
                .map(|parent| (parent, node))
        })
    }

    pub fn depth_of(&self, idx: NodeIndex) -> usize {
        let mut depth = 0;
        let mut cursor = self.node(idx).and_then(|n| n.parent);
        while let Some(p) = cursor {
            depth += 1;
            cursor = self.nodes[p.0].parent;
        }
        depth
    }

    /// Identities from the root down to `idx`, inclusive.
    pub fn path_to(&self, idx: NodeIndex) -> Vec<&ServiceIdentity> {
        let mut path = Vec::new();
        let mut cursor = self.node(idx).map(|_| idx);
        while let Some(i) = cursor {
            let node = &self.nodes[i.0];
            path.push(&node.identity);
            cursor = node.parent;
        }
        path.reverse();
        path
    }

    /// Sum of `incoming_edge.total` over every node, root included.
    pub fn total_volume(&self) -> f64 {
        self.nodes.iter().map(|n| n.incoming_edge.total).sum()
    }
}

pub struct PreOrder<'a> {
    tree: &'a DependencyTree,
    stack: Vec<NodeIndex>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = (NodeIndex, &'a ServiceNode);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let node = self.tree.node(idx)?;
        self.stack.extend(node.children.iter().rev().copied());
        Some((idx, node))
    }
}
