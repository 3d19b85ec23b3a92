//! Merge cost/benefit statistics for a template subgraph.

use std::collections::HashMap;

use super::node::{Node, NodeKind, StateKey};

/// Per-template statistics.
///
/// Drawables reached before any state set are counted under `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalyzeResult {
    pub num_verts: u64,
    pub state_counts: HashMap<Option<StateKey>, u32>,
}

/// State usage summed over every template analyzed during one chunk build.
///
/// Create one per build and drop it afterwards.
#[derive(Debug, Default)]
pub struct StateUsage {
    counts: HashMap<Option<StateKey>, u32>,
}

impl StateUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of drawables attributed to `key` so far in this build.
    pub fn count(&self, key: Option<StateKey>) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// Average build-wide usage of the states a template draws with; 1 if it draws nothing.
    pub fn merge_benefit(&self, result: &AnalyzeResult) -> f32 {
        if result.state_counts.is_empty() {
            return 1.0;
        }
        let total: f32 = result
            .state_counts
            .keys()
            .map(|key| self.count(*key) as f32)
            .sum();
        total / result.state_counts.len() as f32
    }
}

/// Traverse `root` once and count vertices and state usage.
pub fn analyze(root: &Node, usage: &mut StateUsage) -> AnalyzeResult {
    let mut visitor = AnalyzeVisitor {
        result: AnalyzeResult::default(),
        current: None,
        usage,
    };
    visitor.apply(root);
    visitor.result
}

struct AnalyzeVisitor<'a> {
    result: AnalyzeResult,
    // Not restored on the way back up: siblings inherit the last state seen.
    current: Option<StateKey>,
    usage: &'a mut StateUsage,
}

impl AnalyzeVisitor<'_> {
    fn apply(&mut self, node: &Node) {
        if let Some(state) = &node.state {
            self.current = Some(StateKey::of(state));
        }
        match &node.kind {
            NodeKind::Drawable(geometry) => self.count_drawable(geometry.vertex_count()),
            NodeKind::RigGeometry { .. } | NodeKind::MorphGeometry { .. } => {
                let verts = node.geometry().map_or(0, |g| g.vertex_count());
                self.count_drawable(verts);
            }
            NodeKind::Particle(_) => {}
            _ => {
                for child in node.children() {
                    self.apply(child);
                }
            }
        }
    }

    fn count_drawable(&mut self, verts: usize) {
        self.result.num_verts = self.result.num_verts.saturating_add(verts as u64);
        *self.result.state_counts.entry(self.current).or_insert(0) += 1;
        *self.usage.counts.entry(self.current).or_insert(0) += 1;
    }
}
