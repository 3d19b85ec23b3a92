//! Instance collection: which references a chunk shows, grouped by template.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::core::types::Result;
use crate::records::{ModelResolver, ObjectReference, RecordStore, RecordType, RefNum};
use crate::resource::{Template, TemplateSource};
use crate::scene::{analyze, AnalyzeResult, StateUsage};

use super::config::PagingConfig;
use super::disabled::DisabledSet;

/// Ids of logic anchors that are never drawn.
pub const MARKER_IDS: [&str; 4] = ["prisonmarker", "divinemarker", "templemarker", "northmarker"];

/// Record types a chunk may show. Far chunks leave out containers.
pub fn type_filter(record_type: RecordType, far: bool) -> bool {
    match record_type {
        RecordType::Static | RecordType::Activator | RecordType::Door => true,
        RecordType::Container => !far,
        _ => false,
    }
}

/// Cells scanned for a chunk of `size` cells centred on `center`, row by row.
pub fn covered_cells(size: f32, center: Vec2) -> Vec<(i32, i32)> {
    let start = (center - Vec2::splat(size / 2.0)).floor();
    let (start_x, start_y) = (start.x as i32, start.y as i32);
    let mut cells = Vec::new();
    let mut x = start_x;
    while (x as f32) < start.x + size {
        let mut y = start_y;
        while (y as f32) < start.y + size {
            cells.push((x, y));
            y += 1;
        }
        x += 1;
    }
    cells
}

/// All instances of one template within a chunk.
#[derive(Debug)]
pub struct InstanceList {
    pub template: Arc<Template>,
    pub analysis: AnalyzeResult,
    pub instances: Vec<ObjectReference>,
}

/// Output of [`InstanceCollector::collect`]: instance lists in first-seen
/// template order, plus the state usage accumulated while analyzing them.
#[derive(Debug, Default)]
pub struct CollectedInstances {
    pub lists: Vec<InstanceList>,
    pub usage: StateUsage,
}

impl CollectedInstances {
    pub fn instance_count(&self) -> usize {
        self.lists.iter().map(|l| l.instances.len()).sum()
    }
}

/// Gathers the references of a chunk from the world data.
pub struct InstanceCollector<'a> {
    pub records: &'a dyn RecordStore,
    pub models: &'a dyn ModelResolver,
    pub templates: &'a dyn TemplateSource,
    pub disabled: &'a DisabledSet,
    pub config: &'a PagingConfig,
}

impl InstanceCollector<'_> {
    pub fn collect(
        &self,
        size: f32,
        center: Vec2,
        far: bool,
        view_point: Vec3,
        compile: bool,
    ) -> Result<CollectedInstances> {
        let refs = self.collect_references(size, center, far);
        self.group_instances(refs, size, center, view_point, compile)
    }

    /// Scan every covered cell and resolve overrides by reference number.
    ///
    /// Context entries are applied in file order, then the leased overlay.
    /// A deletion marker erases whatever was collected for its number so far;
    /// a later entry for the same number brings it back.
    pub fn collect_references(
        &self,
        size: f32,
        center: Vec2,
        far: bool,
    ) -> BTreeMap<RefNum, ObjectReference> {
        let disabled = self.disabled.read();
        let mut refs = BTreeMap::new();

        for (x, y) in covered_cells(size, center) {
            let Some(cell) = self.records.find_cell(x, y) else {
                continue;
            };
            let moved = self.records.moved_refs(cell);

            for context in 0..self.records.context_count(cell) {
                let entries = match self.records.read_context(cell, context) {
                    Ok(entries) => entries,
                    Err(e) => {
                        log::warn!("Skipping unreadable references: {}", e);
                        continue;
                    }
                };
                for reference in entries {
                    if moved.contains(&reference.ref_num) {
                        continue;
                    }
                    if !type_filter(reference.record_type, far) {
                        continue;
                    }
                    if reference.deleted {
                        refs.remove(&reference.ref_num);
                        continue;
                    }
                    if disabled.contains(&reference.ref_num) {
                        continue;
                    }
                    refs.insert(reference.ref_num, reference);
                }
            }

            for reference in self.records.leased_refs(cell) {
                if reference.deleted {
                    refs.remove(&reference.ref_num);
                    continue;
                }
                if !type_filter(reference.record_type, far) {
                    continue;
                }
                if disabled.contains(&reference.ref_num) {
                    continue;
                }
                refs.insert(reference.ref_num, reference);
            }
        }
        refs
    }

    /// Cull, resolve templates and group the references by template.
    ///
    /// Model lookup and template errors abort the build.
    pub fn group_instances(
        &self,
        refs: BTreeMap<RefNum, ObjectReference>,
        size: f32,
        center: Vec2,
        view_point: Vec3,
        compile: bool,
    ) -> Result<CollectedInstances> {
        let half = Vec2::splat(size / 2.0);
        let (min_bound, max_bound) = (center - half, center + half);

        let mut collected = CollectedInstances::default();
        let mut by_path: HashMap<String, usize> = HashMap::new();

        for reference in refs.into_values() {
            let position = reference.position;
            if size < 1.0 && !self.in_fine_chunk(position, min_bound, max_bound) {
                log::trace!("{} lies outside fine chunk", reference.ref_num);
                continue;
            }
            let id = reference.id.to_lowercase();
            if MARKER_IDS.contains(&id.as_str()) {
                continue;
            }

            let model = self.models.resolve_model(reference.record_type, &id)?;
            if model.is_empty() {
                continue;
            }
            let path = format!("meshes/{model}");
            let template = self.templates.get_template(&path, compile)?;

            let distance = view_point.distance(position);
            if template.bound().radius * reference.scale < distance * self.config.min_size {
                log::trace!("{} too small at distance {:.0}", reference.ref_num, distance);
                continue;
            }

            let index = match by_path.get(&path) {
                Some(&index) => index,
                None => {
                    let analysis = analyze(&template.root, &mut collected.usage);
                    collected.lists.push(InstanceList {
                        template,
                        analysis,
                        instances: Vec::new(),
                    });
                    by_path.insert(path, collected.lists.len() - 1);
                    collected.lists.len() - 1
                }
            };
            collected.lists[index].instances.push(reference);
        }
        Ok(collected)
    }

    /// Cell-space position, clamped to the covering cells, must lie within the chunk.
    fn in_fine_chunk(&self, position: Vec3, min_bound: Vec2, max_bound: Vec2) -> bool {
        let cell_pos = (Vec2::new(position.x, position.y) / self.config.cell_size)
            .max(min_bound.floor())
            .min(max_bound.ceil());
        cell_pos.x >= min_bound.x
            && cell_pos.x <= max_bound.x
            && cell_pos.y >= min_bound.y
            && cell_pos.y <= max_bound.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::paging::test_support::{at_cell, reference, rock, test_world, Fixture};
    use crate::records::MemoryWorld;

    fn ids(refs: &BTreeMap<RefNum, ObjectReference>) -> Vec<u32> {
        refs.keys().map(|r| r.index).collect()
    }

    #[test]
    fn test_type_filter() {
        for far in [false, true] {
            assert!(type_filter(RecordType::Static, far));
            assert!(type_filter(RecordType::Activator, far));
            assert!(type_filter(RecordType::Door, far));
            assert!(!type_filter(RecordType::Creature, far));
            assert!(!type_filter(RecordType::Npc, far));
            assert!(!type_filter(RecordType::Light, far));
        }
        assert!(type_filter(RecordType::Container, false));
        assert!(!type_filter(RecordType::Container, true));
    }

    #[test]
    fn test_covered_cells() {
        let cells = covered_cells(4.0, Vec2::new(10.0, 10.0));
        assert_eq!(cells.len(), 16);
        assert_eq!(cells.first(), Some(&(8, 8)));
        assert_eq!(cells.last(), Some(&(11, 11)));

        assert_eq!(covered_cells(1.0, Vec2::new(-0.5, 2.5)), vec![(-1, 2)]);
        assert_eq!(covered_cells(0.5, Vec2::new(3.25, 3.75)), vec![(3, 3)]);
    }

    #[test]
    fn test_container_depends_on_far() {
        let mut world = test_world();
        world.cell_mut(0, 0).push_context(vec![
            reference(1, RecordType::Container, "chest_01", at_cell(0.5, 0.5)),
            reference(2, RecordType::Creature, "mudcrab", at_cell(0.5, 0.5)),
        ]);
        let fixture = Fixture::new(world);
        let collector = fixture.collector();

        let near = collector.collect_references(1.0, Vec2::splat(0.5), false);
        let far = collector.collect_references(1.0, Vec2::splat(0.5), true);
        assert_eq!(ids(&near), vec![1]);
        assert!(far.is_empty());
    }

    #[test]
    fn test_later_entries_override() {
        let mut world = test_world();
        world
            .cell_mut(0, 0)
            .push_context(vec![rock(1, at_cell(0.1, 0.1))])
            .push_context(vec![rock(1, at_cell(0.9, 0.9))]);
        let fixture = Fixture::new(world);
        let refs = fixture.collector().collect_references(1.0, Vec2::splat(0.5), true);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[&RefNum::new(0, 1)].position, at_cell(0.9, 0.9));
    }

    #[test]
    fn test_delete_then_lease_restores() {
        let mut world = test_world();
        world.cell_mut(0, 0).push_context(vec![
            rock(1, at_cell(0.5, 0.5)),
            rock(1, at_cell(0.5, 0.5)).into_deleted(),
        ]);
        let fixture = Fixture::new(world.clone());
        let refs = fixture.collector().collect_references(1.0, Vec2::splat(0.5), true);
        assert!(refs.is_empty());

        world.cell_mut(0, 0).lease(rock(1, at_cell(0.6, 0.6)));
        let fixture = Fixture::new(world);
        let refs = fixture.collector().collect_references(1.0, Vec2::splat(0.5), true);
        assert_eq!(refs[&RefNum::new(0, 1)].position, at_cell(0.6, 0.6));
    }

    #[test]
    fn test_lease_delete_removes_loaded_reference() {
        let mut world = test_world();
        world
            .cell_mut(0, 0)
            .push_context(vec![rock(1, at_cell(0.5, 0.5)), rock(2, at_cell(0.5, 0.5))])
            .lease_delete(rock(2, at_cell(0.5, 0.5)));
        let fixture = Fixture::new(world);
        let refs = fixture.collector().collect_references(1.0, Vec2::splat(0.5), true);
        assert_eq!(ids(&refs), vec![1]);
    }

    #[test]
    fn test_deletion_of_filtered_type_is_ignored() {
        // The marker is filtered by type before it can erase anything.
        let mut world = test_world();
        let marker =
            reference(1, RecordType::Creature, "mudcrab", at_cell(0.5, 0.5)).into_deleted();
        world
            .cell_mut(0, 0)
            .push_context(vec![rock(1, at_cell(0.5, 0.5)), marker]);
        let fixture = Fixture::new(world);
        let refs = fixture.collector().collect_references(1.0, Vec2::splat(0.5), true);
        assert_eq!(ids(&refs), vec![1]);
    }

    #[test]
    fn test_moved_refs_are_skipped() {
        let mut world = test_world();
        world
            .cell_mut(0, 0)
            .push_context(vec![rock(1, at_cell(0.5, 0.5)), rock(2, at_cell(0.5, 0.5))])
            .mark_moved(RefNum::new(0, 2));
        let fixture = Fixture::new(world);
        let refs = fixture.collector().collect_references(1.0, Vec2::splat(0.5), true);
        assert_eq!(ids(&refs), vec![1]);
    }

    #[test]
    fn test_corrupt_context_does_not_abort_scan() {
        let mut world = test_world();
        world
            .cell_mut(0, 0)
            .push_corrupt_context()
            .push_context(vec![rock(1, at_cell(0.5, 0.5))]);
        world.cell_mut(1, 0).push_context(vec![rock(2, at_cell(1.5, 0.5))]);
        let fixture = Fixture::new(world);
        let refs = fixture.collector().collect_references(2.0, Vec2::new(1.0, 1.0), true);
        assert_eq!(ids(&refs), vec![1, 2]);
    }

    #[test]
    fn test_disabled_refs_are_skipped() {
        let mut world = test_world();
        world
            .cell_mut(0, 0)
            .push_context(vec![rock(1, at_cell(0.5, 0.5)), rock(2, at_cell(0.5, 0.5))])
            .lease(rock(3, at_cell(0.5, 0.5)));
        let fixture = Fixture::new(world);
        fixture.disabled.enable(RefNum::new(0, 2), false);
        fixture.disabled.enable(RefNum::new(0, 3), false);
        let refs = fixture.collector().collect_references(1.0, Vec2::splat(0.5), true);
        assert_eq!(ids(&refs), vec![1]);
    }

    #[test]
    fn test_refs_are_ordered_by_ref_num() {
        let mut world = test_world();
        let mut late = rock(1, at_cell(0.5, 0.5));
        late.ref_num = RefNum::new(2, 0);
        world
            .cell_mut(0, 0)
            .push_context(vec![late, rock(9, at_cell(0.5, 0.5)), rock(3, at_cell(0.5, 0.5))]);
        let fixture = Fixture::new(world);
        let refs = fixture.collector().collect_references(1.0, Vec2::splat(0.5), true);
        let keys: Vec<RefNum> = refs.keys().copied().collect();
        assert_eq!(keys, vec![RefNum::new(0, 3), RefNum::new(0, 9), RefNum::new(2, 0)]);
    }

    #[test]
    fn test_group_skips_markers_and_empty_models() {
        let mut world = test_world();
        world.cell_mut(0, 0).push_context(vec![
            rock(1, at_cell(0.5, 0.5)),
            reference(2, RecordType::Static, "NorthMarker", at_cell(0.5, 0.5)),
            reference(3, RecordType::Static, "collision_only", at_cell(0.5, 0.5)),
            reference(4, RecordType::Static, "unknown_static", at_cell(0.5, 0.5)),
        ]);
        let fixture = Fixture::new(world);
        let collected = fixture
            .collector()
            .collect(1.0, Vec2::splat(0.5), true, at_cell(0.5, 0.5), false)
            .unwrap();
        assert_eq!(collected.instance_count(), 1);
        assert_eq!(collected.lists[0].template.path, "meshes/x/rock_01.nif");
    }

    #[test]
    fn test_mixed_case_ids_from_json() {
        let json = r#"{
            "models": {
                "NorthMarker": {"record_type": "static", "model": "marker_north.nif"},
                "rock_01": {"record_type": "static", "model": "x/rock_01.nif"}
            },
            "cells": [{
                "x": 0,
                "y": 0,
                "contexts": [{"refs": [
                    {"ref_num": {"content_file": 0, "index": 1}, "record_type": "static",
                     "id": "NorthMarker", "position": [4096.0, 4096.0, 0.0]},
                    {"ref_num": {"content_file": 0, "index": 2}, "record_type": "static",
                     "id": "Rock_01", "position": [4096.0, 4096.0, 0.0]}
                ]}]
            }]
        }"#;
        let fixture = Fixture::new(MemoryWorld::from_json(json).unwrap());
        let collected = fixture
            .collector()
            .collect(1.0, Vec2::splat(0.5), true, at_cell(0.5, 0.5), false)
            .unwrap();
        let kept: Vec<(u32, String)> = collected
            .lists
            .iter()
            .flat_map(|list| list.instances.iter())
            .map(|r| (r.ref_num.index, r.id.clone()))
            .collect();
        assert_eq!(kept, vec![(2, "rock_01".to_string())]);
        assert_eq!(collected.lists[0].template.path, "meshes/x/rock_01.nif");
    }

    #[test]
    fn test_group_shares_template_and_analyzes_once() {
        let mut world = test_world();
        world.cell_mut(0, 0).push_context(vec![
            rock(1, at_cell(0.2, 0.2)),
            reference(2, RecordType::Door, "door_01", at_cell(0.5, 0.5)),
            rock(3, at_cell(0.8, 0.8)),
        ]);
        let fixture = Fixture::new(world);
        let collected = fixture
            .collector()
            .collect(1.0, Vec2::splat(0.5), true, at_cell(0.5, 0.5), false)
            .unwrap();
        assert_eq!(collected.lists.len(), 2);
        assert_eq!(collected.lists[0].instances.len(), 2);
        assert_eq!(collected.lists[1].template.path, "meshes/d/door_01.nif");
        // One stateless drawable per template, counted once per template.
        assert_eq!(collected.usage.count(None), 2);
        assert_eq!(collected.lists[0].analysis.num_verts, 8);
    }

    #[test]
    fn test_small_distant_objects_are_skipped() {
        let mut world = test_world();
        world.cell_mut(0, 0).push_context(vec![
            rock(1, at_cell(0.5, 0.5)),
            rock(2, at_cell(0.5, 0.5)).with_scale(0.01),
        ]);
        let fixture = Fixture::new(world);
        let view_point = at_cell(0.5, 0.5) + Vec3::new(0.0, 0.0, 2000.0);
        let collected = fixture
            .collector()
            .collect(1.0, Vec2::splat(0.5), true, view_point, false)
            .unwrap();
        let kept: Vec<u32> = collected.lists[0].instances.iter().map(|r| r.ref_num.index).collect();
        assert_eq!(kept, vec![1]);
    }

    #[test]
    fn test_fine_chunks_cull_neighbouring_objects() {
        let mut world = test_world();
        world.cell_mut(0, 0).push_context(vec![
            rock(1, at_cell(0.25, 0.25)),
            rock(2, at_cell(0.75, 0.25)),
        ]);
        let fixture = Fixture::new(world);
        let collected = fixture
            .collector()
            .collect(0.5, Vec2::splat(0.25), true, at_cell(0.25, 0.25), false)
            .unwrap();
        assert_eq!(collected.instance_count(), 1);
        assert_eq!(collected.lists[0].instances[0].ref_num.index, 1);
    }

    #[test]
    fn test_template_failure_propagates() {
        let mut world = MemoryWorld::new();
        world.add_model("broken", RecordType::Static, "broken.nif");
        world
            .cell_mut(0, 0)
            .push_context(vec![reference(1, RecordType::Static, "broken", at_cell(0.5, 0.5))]);
        let fixture = Fixture::new(world);
        let result = fixture
            .collector()
            .collect(1.0, Vec2::splat(0.5), true, at_cell(0.5, 0.5), false);
        assert!(matches!(result, Err(Error::TemplateLoad { .. })));
    }
}
