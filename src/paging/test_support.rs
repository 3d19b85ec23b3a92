//! Fixtures shared by the paging tests.

use std::sync::Arc;

use glam::Vec3;

use crate::core::error::Error;
use crate::records::{MemoryWorld, ObjectReference, RecordType, RefNum};
use crate::resource::TemplateCache;
use crate::scene::{Geometry, Node};

use super::collect::InstanceCollector;
use super::config::PagingConfig;
use super::disabled::DisabledSet;
use super::object_paging::ObjectPaging;

pub const CELL: f32 = 8192.0;

/// Half extent of the box every test template is made of.
pub const BOX_HALF: f32 = 200.0;

/// World position of a point given in cell units.
pub fn at_cell(x: f32, y: f32) -> Vec3 {
    Vec3::new(x * CELL, y * CELL, 0.0)
}

pub fn reference(index: u32, record_type: RecordType, id: &str, position: Vec3) -> ObjectReference {
    ObjectReference::new(RefNum::new(0, index), record_type, id, position)
}

pub fn rock(index: u32, position: Vec3) -> ObjectReference {
    reference(index, RecordType::Static, "rock_01", position)
}

/// Records for the ids the tests place.
pub fn test_world() -> MemoryWorld {
    let mut world = MemoryWorld::new();
    world
        .add_model("rock_01", RecordType::Static, "x/rock_01.nif")
        .add_model("tree_01", RecordType::Static, "f/tree_01.nif")
        .add_model("door_01", RecordType::Door, "d/door_01.nif")
        .add_model("lever_01", RecordType::Activator, "x/lever_01.nif")
        .add_model("chest_01", RecordType::Container, "o/chest_01.nif")
        .add_model("northmarker", RecordType::Static, "marker_north.nif")
        .add_model("collision_only", RecordType::Static, "");
    world
}

/// Every template is a stateless box; paths containing "broken" fail to load.
pub fn box_templates() -> TemplateCache {
    TemplateCache::new(|path| {
        if path.contains("broken") {
            return Err(Error::Config(format!("{path}: no such file")));
        }
        Ok(Node::drawable(Geometry::cuboid(Vec3::splat(BOX_HALF))))
    })
}

/// Every template is one stateless drawable with `verts` vertices.
pub fn dense_templates(verts: usize) -> TemplateCache {
    TemplateCache::new(move |_| {
        let vertices = (0..verts)
            .map(|i| if i % 2 == 0 { Vec3::splat(-BOX_HALF) } else { Vec3::splat(BOX_HALF) })
            .collect();
        Ok(Node::drawable(Geometry::new(vertices, Vec::new())))
    })
}

/// A world plus everything a collector or paging instance needs around it.
pub struct Fixture {
    pub world: MemoryWorld,
    pub templates: TemplateCache,
    pub disabled: DisabledSet,
    pub config: PagingConfig,
}

impl Fixture {
    pub fn new(world: MemoryWorld) -> Self {
        Self {
            world,
            templates: box_templates(),
            disabled: DisabledSet::new(),
            config: PagingConfig::default(),
        }
    }

    pub fn with_templates(mut self, templates: TemplateCache) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_config(mut self, config: PagingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn collector(&self) -> InstanceCollector<'_> {
        InstanceCollector {
            records: &self.world,
            models: &self.world,
            templates: &self.templates,
            disabled: &self.disabled,
            config: &self.config,
        }
    }

    pub fn into_paging(self) -> ObjectPaging {
        let world = Arc::new(self.world);
        ObjectPaging::new(world.clone(), world, Arc::new(self.templates), self.config)
    }
}
