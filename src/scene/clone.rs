//! Copy operation used to bake template instances into static chunks.
//!
//! The copy resolves everything that would make an instance dynamic: switch
//! and LOD nodes collapse into plain groups holding the children that are
//! active for this instance, skinned and morphed drawables fall back to their
//! source mesh, particles are dropped and callbacks are not carried over.

use std::sync::Arc;

use super::node::{DataVariance, LodChild, Node, NodeKind, SwitchChild};

/// Paging copy of a template subgraph.
#[derive(Clone, Copy, Debug)]
pub struct CopyOp {
    /// Duplicate geometry. Without it, drawables stay shared with the template.
    pub deep_drawables: bool,
    /// Distance from the viewer to the instance, for LOD selection.
    pub distance: f32,
}

impl CopyOp {
    pub fn new(deep_drawables: bool) -> Self {
        Self {
            deep_drawables,
            distance: 0.0,
        }
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = distance;
        self
    }

    /// Copy `node`. `None` means the node has no place in a static chunk.
    pub fn copy(&self, node: &Arc<Node>) -> Option<Arc<Node>> {
        match &node.kind {
            NodeKind::Particle(_) => None,
            NodeKind::Switch { children } => Some(self.copy_switch(node, children)),
            NodeKind::Lod { children } => Some(self.copy_lod(node, children)),
            NodeKind::Drawable(_) => Some(self.copy_drawable(node)),
            NodeKind::RigGeometry { source } | NodeKind::MorphGeometry { source } => {
                self.copy(source)
            }
            NodeKind::Group { children } => {
                let children = self.copy_children(children.iter());
                Some(self.stripped(node, NodeKind::Group { children }))
            }
            NodeKind::Transform { matrix, children } => {
                let children = self.copy_children(children.iter());
                Some(self.stripped(
                    node,
                    NodeKind::Transform {
                        matrix: *matrix,
                        children,
                    },
                ))
            }
        }
    }

    fn copy_children<'a>(&self, children: impl Iterator<Item = &'a Arc<Node>>) -> Vec<Arc<Node>> {
        children.filter_map(|child| self.copy(child)).collect()
    }

    fn copy_switch(&self, node: &Node, children: &[SwitchChild]) -> Arc<Node> {
        let active = children.iter().filter(|c| c.enabled).map(|c| &c.node);
        let mut group = Node::group(self.copy_children(active));
        group.state = node.state.clone();
        group.data_variance = DataVariance::Static;
        Arc::new(group)
    }

    fn copy_lod(&self, node: &Node, children: &[LodChild]) -> Arc<Node> {
        let d = self.distance;
        let active = children
            .iter()
            .filter(|c| c.min_range <= d && d < c.max_range)
            .map(|c| &c.node);
        let mut group = Node::group(self.copy_children(active));
        group.state = node.state.clone();
        group.data_variance = DataVariance::Static;
        Arc::new(group)
    }

    fn copy_drawable(&self, node: &Arc<Node>) -> Arc<Node> {
        if !self.deep_drawables {
            return Arc::clone(node);
        }
        let kind = match &node.kind {
            NodeKind::Drawable(geometry) => NodeKind::Drawable(Arc::new((**geometry).clone())),
            other => other.clone(),
        };
        self.stripped(node, kind)
    }

    /// A new node with `kind`, keeping only the state set of `node`.
    fn stripped(&self, node: &Node, kind: NodeKind) -> Arc<Node> {
        Arc::new(Node {
            name: String::new(),
            state: node.state.clone(),
            callbacks: Vec::new(),
            user_data: None,
            data_variance: DataVariance::Static,
            node_mask: node.node_mask,
            kind,
        })
    }
}
