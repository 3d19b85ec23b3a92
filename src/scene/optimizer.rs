//! Static-scene optimizer for merged chunk geometry.
//!
//! Passes run in a fixed order: flatten static transforms, remove redundant
//! nodes, merge geometry. Every node handed to the optimizer is treated as
//! safe to rewrite; callers only pass subgraphs they own.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;

use super::flatten::flatten_static_transforms;
use super::node::{DataVariance, Geometry, Node, NodeKind, StateKey};

/// Which passes to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptimizerOptions {
    pub flatten_static_transforms: bool,
    pub remove_redundant_nodes: bool,
    pub merge_geometry: bool,
}

impl OptimizerOptions {
    /// The pass set used for paged chunks.
    pub fn all() -> Self {
        Self {
            flatten_static_transforms: true,
            remove_redundant_nodes: true,
            merge_geometry: true,
        }
    }
}

/// Drawable counts before and after a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub drawables_before: usize,
    pub drawables_after: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Optimizer {
    view_point: Option<Vec3>,
    merge_alpha_blending: bool,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Viewer position in the optimized subgraph's space; orders merged transparent geometry.
    pub fn set_view_point(&mut self, view_point: Vec3) {
        self.view_point = Some(view_point);
    }

    /// Allow merging drawables whose state is alpha blended.
    pub fn set_merge_alpha_blending(&mut self, merge: bool) {
        self.merge_alpha_blending = merge;
    }

    pub fn optimize(&self, root: &mut Node, options: OptimizerOptions) -> OptimizeStats {
        let drawables_before = count_drawables(root);
        if options.flatten_static_transforms {
            flatten_static_transforms(root);
        }
        if options.remove_redundant_nodes {
            remove_redundant_nodes(root);
        }
        if options.merge_geometry {
            self.merge_geometry(root);
        }
        let stats = OptimizeStats {
            drawables_before,
            drawables_after: count_drawables(root),
        };
        log::trace!(
            "optimizer: {} -> {} drawables",
            stats.drawables_before,
            stats.drawables_after
        );
        stats
    }

    fn merge_geometry(&self, node: &mut Node) {
        let Some(children) = node.group_children_mut() else {
            return;
        };
        for child in children.iter_mut() {
            if has_group_children(child) {
                self.merge_geometry(Arc::make_mut(child));
            }
        }

        // Buckets of mergeable drawables keyed by state, in order of first appearance.
        let mut buckets: Vec<Vec<usize>> = Vec::new();
        let mut bucket_of: HashMap<Option<StateKey>, usize> = HashMap::new();
        for (index, child) in children.iter().enumerate() {
            if !is_mergeable(child) {
                continue;
            }
            let key = child.state.as_ref().map(StateKey::of);
            let bucket = *bucket_of.entry(key).or_insert_with(|| {
                buckets.push(Vec::new());
                buckets.len() - 1
            });
            buckets[bucket].push(index);
        }

        let mut replacements: Vec<(usize, Arc<Node>)> = Vec::new();
        let mut removed = vec![false; children.len()];
        for mut indices in buckets {
            if indices.len() < 2 {
                continue;
            }
            let first = indices[0];
            let transparent = children[first]
                .state
                .as_ref()
                .is_some_and(|state| state.transparent);
            if transparent {
                if !self.merge_alpha_blending {
                    continue;
                }
                if let Some(eye) = self.view_point {
                    // Farthest first so the merged mesh draws back to front.
                    indices.sort_by(|a, b| {
                        let da = distance_to(&children[*a], eye);
                        let db = distance_to(&children[*b], eye);
                        db.total_cmp(&da)
                    });
                }
            }

            let mut merged = Geometry::default();
            for index in &indices {
                if let Some(geometry) = children[*index].geometry() {
                    merged.append(geometry);
                }
            }
            let mut node = (*children[first]).clone();
            node.name.clear();
            node.kind = NodeKind::Drawable(Arc::new(merged));
            node.data_variance = DataVariance::Static;
            replacements.push((first, Arc::new(node)));
            for index in indices {
                removed[index] = index != first;
            }
        }

        for (index, node) in replacements {
            children[index] = node;
        }
        let mut removed = removed.into_iter();
        children.retain(|_| !removed.next().unwrap_or(false));
    }
}

fn has_group_children(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Group { .. } | NodeKind::Transform { .. })
}

fn is_mergeable(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Drawable(_))
        && node.callbacks.is_empty()
        && node.data_variance != DataVariance::Dynamic
}

fn distance_to(node: &Node, eye: Vec3) -> f32 {
    let bound = node.bound();
    if bound.is_valid() {
        (bound.center - eye).length()
    } else {
        0.0
    }
}

/// Replace stateless plain groups by their children and drop empty groups.
pub fn remove_redundant_nodes(root: &mut Node) {
    let Some(children) = root.group_children_mut() else {
        return;
    };
    let old = std::mem::take(children);
    let mut lifted = Vec::with_capacity(old.len());
    for child in old {
        lift(child, &mut lifted);
    }
    *children = lifted;
}

fn lift(mut node: Arc<Node>, out: &mut Vec<Arc<Node>>) {
    if !has_group_children(&node) {
        out.push(node);
        return;
    }
    let inner = Arc::make_mut(&mut node);
    remove_redundant_nodes(inner);
    push_state_to_drawables(inner);

    if node.num_children() == 0 {
        return;
    }
    if matches!(node.kind, NodeKind::Group { .. }) && is_plain(&node) {
        out.extend(node.children().into_iter().cloned());
        return;
    }
    out.push(node);
}

fn is_plain(node: &Node) -> bool {
    node.state.is_none()
        && node.callbacks.is_empty()
        && node.user_data.is_none()
        && node.data_variance != DataVariance::Dynamic
}

/// A group holding only drawables hands its state to those without one.
fn push_state_to_drawables(node: &mut Node) {
    let Some(state) = node.state.clone() else {
        return;
    };
    if !matches!(node.kind, NodeKind::Group { .. }) {
        return;
    }
    let Some(children) = node.group_children_mut() else {
        return;
    };
    if children.is_empty() || !children.iter().all(|c| c.is_drawable()) {
        return;
    }
    for child in children.iter_mut() {
        if child.state.is_none() {
            Arc::make_mut(child).state = Some(state.clone());
        }
    }
    node.state = None;
}

fn count_drawables(node: &Node) -> usize {
    if node.is_drawable() {
        return 1;
    }
    node.children().into_iter().map(|c| count_drawables(c)).sum()
}
