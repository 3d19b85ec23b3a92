//! Chunk synthesis: instance lists in, one static scene graph out.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::core::types::Result;
use crate::math::BoundingSphere;
use crate::records::{ObjectReference, RefNum};
use crate::resource::{CompileQueue, Template};
use crate::scene::{
    AnalyzeResult, CopyOp, DataVariance, LocalTransform, Node, OptimizeStats, Optimizer,
    OptimizerOptions, StateUsage, MASK_STATIC,
};

use super::collect::{CollectedInstances, InstanceCollector};

/// Cache key of a chunk: its center in cell units and its size in cells.
#[derive(Clone, Copy, Debug)]
pub struct ChunkId {
    pub center: Vec2,
    pub size: f32,
}

impl ChunkId {
    pub fn new(center: Vec2, size: f32) -> Self {
        Self { center, size }
    }

    fn key(&self) -> [u32; 3] {
        [
            canonical_bits(self.center.x),
            canonical_bits(self.center.y),
            canonical_bits(self.size),
        ]
    }
}

// -0.0 and 0.0 name the same chunk.
fn canonical_bits(value: f32) -> u32 {
    if value == 0.0 { 0 } else { value.to_bits() }
}

impl PartialEq for ChunkId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ChunkId {}

impl Hash for ChunkId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) size {}", self.center.x, self.center.y, self.size)
    }
}

/// Where one reference ended up in a chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub ref_num: RefNum,
    pub template: String,
    pub merged: bool,
    /// Template space to chunk-local space.
    pub matrix: Mat4,
}

/// A built chunk.
///
/// The root holds one transform per unmerged instance followed by the
/// optimized merge group, if any. Geometry is relative to
/// [`world_center`] of the chunk. The chunk holds every template it was built
/// from so the template cache keeps them while the chunk lives.
#[derive(Debug)]
pub struct Chunk {
    pub id: ChunkId,
    pub root: Arc<Node>,
    pub bound: BoundingSphere,
    pub placements: Vec<Placement>,
    pub merge_stats: Option<OptimizeStats>,
    templates: Vec<Arc<Template>>,
}

impl Chunk {
    pub fn templates(&self) -> &[Arc<Template>] {
        &self.templates
    }

    pub fn instance_count(&self) -> usize {
        self.placements.len()
    }

    pub fn merged_count(&self) -> usize {
        self.placements.iter().filter(|p| p.merged).count()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn contains(&self, ref_num: RefNum) -> bool {
        self.placements.iter().any(|p| p.ref_num == ref_num)
    }
}

/// Origin of a chunk's local space in world units.
pub fn world_center(center: Vec2, cell_size: f32) -> Vec3 {
    Vec3::new(center.x, center.y, 0.0) * cell_size
}

/// Chunk-local transform of one reference: scale, then rotate Z, Y, X, then
/// translate to the position relative to `world_center`.
pub fn placement_matrix(reference: &ObjectReference, world_center: Vec3) -> Mat4 {
    let r = reference.rotation;
    let rotation = Quat::from_axis_angle(Vec3::NEG_X, r.x)
        * Quat::from_axis_angle(Vec3::NEG_Y, r.y)
        * Quat::from_axis_angle(Vec3::NEG_Z, r.z);
    LocalTransform {
        position: reference.position - world_center,
        rotation,
        scale: reference.scale,
    }
    .to_mat4()
}

/// Merge when the shared-state benefit outweighs vertex count times chunk size.
pub fn should_merge(
    analysis: &AnalyzeResult,
    usage: &StateUsage,
    size: f32,
    merge_factor: f32,
) -> bool {
    let cost = analysis.num_verts as f32 * size;
    let benefit = usage.merge_benefit(analysis) * merge_factor;
    benefit > cost
}

/// Builds one chunk from the world data.
pub struct ChunkBuilder<'a> {
    collector: InstanceCollector<'a>,
    compile_queue: Option<&'a dyn CompileQueue>,
}

impl<'a> ChunkBuilder<'a> {
    pub fn new(collector: InstanceCollector<'a>) -> Self {
        Self {
            collector,
            compile_queue: None,
        }
    }

    pub fn with_compile_queue(mut self, queue: Option<&'a dyn CompileQueue>) -> Self {
        self.compile_queue = queue;
        self
    }

    pub fn build(&self, id: ChunkId, view_point: Vec3, compile: bool) -> Result<Chunk> {
        let far = id.size >= self.collector.config.far_type_filter_size;
        let collected = self
            .collector
            .collect(id.size, id.center, far, view_point, compile)?;
        Ok(self.synthesize(id, collected, view_point, compile))
    }

    /// Clone, place and merge collected instances.
    pub fn synthesize(
        &self,
        id: ChunkId,
        collected: CollectedInstances,
        view_point: Vec3,
        compile: bool,
    ) -> Chunk {
        let config = self.collector.config;
        let world_center = world_center(id.center, config.cell_size);
        let relative_view_point = view_point - world_center;

        let mut children = Vec::new();
        let mut merge_children = Vec::new();
        let mut placements = Vec::with_capacity(collected.instance_count());
        let mut templates = Vec::with_capacity(collected.lists.len());

        for list in &collected.lists {
            templates.push(Arc::clone(&list.template));
            let merge =
                should_merge(&list.analysis, &collected.usage, id.size, config.merge_factor);

            for reference in &list.instances {
                let distance = view_point.distance(reference.position);
                let Some(instance) = CopyOp::new(merge)
                    .with_distance(distance)
                    .copy(&list.template.root)
                else {
                    continue;
                };
                let instance = without_user_data(instance);

                let matrix = placement_matrix(reference, world_center);
                let mut transform = Node::transform(matrix, vec![instance]);
                transform.data_variance = DataVariance::Static;

                placements.push(Placement {
                    ref_num: reference.ref_num,
                    template: list.template.path.clone(),
                    merged: merge,
                    matrix,
                });
                if merge {
                    merge_children.push(transform.into_arc());
                } else {
                    children.push(transform.into_arc());
                }
            }
        }

        let mut merge_stats = None;
        if !merge_children.is_empty() {
            let mut merge_group = Node::group(merge_children);
            let bound = merge_group.bound();
            let mut optimizer = Optimizer::new();
            if (relative_view_point - bound.center).length_squared() > bound.radius_squared() {
                optimizer.set_view_point(relative_view_point);
                optimizer.set_merge_alpha_blending(true);
            }
            merge_stats = Some(optimizer.optimize(&mut merge_group, OptimizerOptions::all()));

            let merge_group = merge_group.into_arc();
            if compile {
                if let Some(queue) = self.compile_queue {
                    queue.enqueue(Arc::clone(&merge_group));
                }
            }
            children.push(merge_group);
        }

        let mut root = Node::group(children);
        root.node_mask = MASK_STATIC;
        let bound = root.bound();

        log::debug!(
            "Built chunk {}: {} instances ({} merged) from {} templates",
            id,
            placements.len(),
            placements.iter().filter(|p| p.merged).count(),
            templates.len()
        );

        Chunk {
            id,
            root: root.into_arc(),
            bound,
            placements,
            merge_stats,
            templates,
        }
    }
}

fn without_user_data(node: Arc<Node>) -> Arc<Node> {
    if node.user_data.is_none() {
        return node;
    }
    let mut node = Arc::unwrap_or_clone(node);
    node.user_data = None;
    Arc::new(node)
}
