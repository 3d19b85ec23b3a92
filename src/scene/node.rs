//! Scene graph node types
//!
//! Nodes are immutable once shared. Templates are handed out as `Arc<Node>`
//! trees; paging output is built from fresh clones that are uniquely owned
//! until the chunk is published, so `Arc::make_mut` never copies on that path.

use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::math::{Aabb, BoundingSphere};

/// Visibility mask bit for static background geometry.
pub const MASK_STATIC: u32 = 1 << 7;

/// Default mask of a freshly created node: visible to every traversal.
pub const MASK_ALL: u32 = !0;

/// Local transform relative to the parent node.
#[derive(Clone, Debug)]
pub struct LocalTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl LocalTransform {
    /// Convert to a 4x4 matrix: scale, then rotate, then translate.
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.position,
        )
    }
}

/// A material. Two drawables share a material only when they share the allocation.
#[derive(Clone, Debug, Default)]
pub struct StateSet {
    pub name: String,
    /// Alpha blended; draw order matters when merged.
    pub transparent: bool,
}

impl StateSet {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            transparent: false,
        })
    }

    pub fn transparent(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            transparent: true,
        })
    }
}

/// Identity of a shared [`StateSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey(usize);

impl StateKey {
    pub fn of(state: &Arc<StateSet>) -> Self {
        StateKey(Arc::as_ptr(state) as usize)
    }
}

/// Whether a node may change after it has been handed to the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataVariance {
    #[default]
    Unspecified,
    Static,
    Dynamic,
}

/// A per-frame behavior attached to a node (animation controller, billboard, ...).
pub trait NodeCallback: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
}

/// Free-form description attached by loaders and game logic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserData {
    pub entries: Vec<(String, String)>,
}

/// Triangle mesh data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn new(vertices: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Axis-aligned box around the origin: 8 corners, 12 triangles.
    pub fn cuboid(half_extents: Vec3) -> Self {
        let h = half_extents;
        let vertices = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -h.x } else { h.x },
                    if i & 2 == 0 { -h.y } else { h.y },
                    if i & 4 == 0 { -h.z } else { h.z },
                )
            })
            .collect();
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 1, 2, 3, // -z
            4, 5, 6, 5, 7, 6, // +z
            0, 1, 4, 1, 5, 4, // -y
            2, 6, 3, 3, 6, 7, // +y
            0, 4, 2, 2, 4, 6, // -x
            1, 3, 5, 3, 7, 5, // +x
        ];
        Self { vertices, indices }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Raw vertex bytes in upload layout.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn bound(&self) -> BoundingSphere {
        BoundingSphere::from_aabb(&Aabb::from_points(&self.vertices))
    }

    /// Copy with every vertex moved by `matrix`.
    pub fn transformed(&self, matrix: &Mat4) -> Geometry {
        Geometry {
            vertices: self.vertices.iter().map(|v| matrix.transform_point3(*v)).collect(),
            indices: self.indices.clone(),
        }
    }

    /// Append another mesh, rebasing its indices.
    pub fn append(&mut self, other: &Geometry) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }
}

/// Particle-related node types. None of them survive paging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticleKind {
    System,
    Processor,
    Updater,
}

/// Child of a switch node with its on/off value.
#[derive(Clone, Debug)]
pub struct SwitchChild {
    pub enabled: bool,
    pub node: Arc<Node>,
}

/// Child of a level-of-detail node, shown for distances in `[min_range, max_range)`.
#[derive(Clone, Debug)]
pub struct LodChild {
    pub min_range: f32,
    pub max_range: f32,
    pub node: Arc<Node>,
}

/// The closed set of node variants.
#[derive(Clone, Debug)]
pub enum NodeKind {
    Group { children: Vec<Arc<Node>> },
    Switch { children: Vec<SwitchChild> },
    Lod { children: Vec<LodChild> },
    Transform { matrix: Mat4, children: Vec<Arc<Node>> },
    Drawable(Arc<Geometry>),
    /// Skinned drawable; `source` is the bind-pose drawable node.
    RigGeometry { source: Arc<Node> },
    /// Morph-target drawable; `source` is the base drawable node.
    MorphGeometry { source: Arc<Node> },
    Particle(ParticleKind),
}

/// A single node in the scene graph.
///
/// State sets do not combine: the innermost one on a path applies.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub state: Option<Arc<StateSet>>,
    pub callbacks: Vec<Arc<dyn NodeCallback>>,
    pub user_data: Option<Arc<UserData>>,
    pub data_variance: DataVariance,
    pub node_mask: u32,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            name: String::new(),
            state: None,
            callbacks: Vec::new(),
            user_data: None,
            data_variance: DataVariance::Unspecified,
            node_mask: MASK_ALL,
            kind,
        }
    }

    pub fn group(children: Vec<Arc<Node>>) -> Self {
        Self::new(NodeKind::Group { children })
    }

    pub fn transform(matrix: Mat4, children: Vec<Arc<Node>>) -> Self {
        Self::new(NodeKind::Transform { matrix, children })
    }

    pub fn drawable(geometry: Geometry) -> Self {
        Self::new(NodeKind::Drawable(Arc::new(geometry)))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_state(mut self, state: Arc<StateSet>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn NodeCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn with_user_data(mut self, user_data: UserData) -> Self {
        self.user_data = Some(Arc::new(user_data));
        self
    }

    pub fn into_arc(self) -> Arc<Node> {
        Arc::new(self)
    }

    /// True for the drawable variants (plain, rigged, morphed).
    pub fn is_drawable(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Drawable(_) | NodeKind::RigGeometry { .. } | NodeKind::MorphGeometry { .. }
        )
    }

    /// Geometry drawn by this node; rigged and morphed nodes draw their source.
    pub fn geometry(&self) -> Option<&Arc<Geometry>> {
        match &self.kind {
            NodeKind::Drawable(geometry) => Some(geometry),
            NodeKind::RigGeometry { source } | NodeKind::MorphGeometry { source } => {
                source.geometry()
            }
            _ => None,
        }
    }

    /// All children regardless of switch values or LOD ranges.
    pub fn children(&self) -> Vec<&Arc<Node>> {
        match &self.kind {
            NodeKind::Group { children } | NodeKind::Transform { children, .. } => {
                children.iter().collect()
            }
            NodeKind::Switch { children } => children.iter().map(|c| &c.node).collect(),
            NodeKind::Lod { children } => children.iter().map(|c| &c.node).collect(),
            _ => Vec::new(),
        }
    }

    /// Mutable child list of a group or transform.
    pub fn group_children_mut(&mut self) -> Option<&mut Vec<Arc<Node>>> {
        match &mut self.kind {
            NodeKind::Group { children } | NodeKind::Transform { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn num_children(&self) -> usize {
        self.children().len()
    }

    /// Bounding sphere in this node's parent space.
    pub fn bound(&self) -> BoundingSphere {
        match &self.kind {
            NodeKind::Drawable(geometry) => geometry.bound(),
            NodeKind::RigGeometry { source } | NodeKind::MorphGeometry { source } => source.bound(),
            NodeKind::Particle(_) => BoundingSphere::empty(),
            NodeKind::Transform { matrix, children } => {
                let spheres: Vec<BoundingSphere> = children.iter().map(|c| c.bound()).collect();
                BoundingSphere::enclosing(&spheres).transformed(matrix)
            }
            _ => {
                let spheres: Vec<BoundingSphere> =
                    self.children().into_iter().map(|c| c.bound()).collect();
                BoundingSphere::enclosing(&spheres)
            }
        }
    }
}
