//! In-memory world data, loadable from JSON.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

use super::reference::{ObjectReference, RecordType, RefNum};
use super::store::{CellHandle, ModelResolver, RecordStore};

/// One content context of a cell.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContextData {
    #[serde(default)]
    pub refs: Vec<ObjectReference>,
    /// The context cannot be restored; reading it fails.
    #[serde(default)]
    pub corrupt: bool,
}

/// Reference data of one exterior cell.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CellData {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub contexts: Vec<ContextData>,
    #[serde(default)]
    pub moved: Vec<RefNum>,
    #[serde(default)]
    pub leased: Vec<ObjectReference>,
}

impl CellData {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn push_context(&mut self, refs: Vec<ObjectReference>) -> &mut Self {
        self.contexts.push(ContextData { refs, corrupt: false });
        self
    }

    pub fn push_corrupt_context(&mut self) -> &mut Self {
        self.contexts.push(ContextData {
            refs: Vec::new(),
            corrupt: true,
        });
        self
    }

    pub fn mark_moved(&mut self, ref_num: RefNum) -> &mut Self {
        self.moved.push(ref_num);
        self
    }

    /// Add a runtime reference, placed after everything loaded from content files.
    pub fn lease(&mut self, reference: ObjectReference) -> &mut Self {
        self.leased.push(reference);
        self
    }

    /// Delete a reference at runtime.
    pub fn lease_delete(&mut self, reference: ObjectReference) -> &mut Self {
        self.leased.push(reference.into_deleted());
        self
    }
}

/// Object record: its type and mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub record_type: RecordType,
    #[serde(default)]
    pub model: String,
}

/// World data held in memory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryWorld {
    #[serde(default)]
    cells: Vec<CellData>,
    /// Object records by lowercase id.
    #[serde(default)]
    models: BTreeMap<String, ModelRecord>,
    #[serde(skip)]
    index: HashMap<(i32, i32), usize>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut world: MemoryWorld = serde_json::from_str(json)?;
        world.models = std::mem::take(&mut world.models)
            .into_iter()
            .map(|(id, record)| (id.to_lowercase(), record))
            .collect();
        world.rebuild_index();
        Ok(world)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let world = Self::from_json(&json)?;
        log::info!(
            "Loaded world {}: {} cells, {} object records",
            path.display(),
            world.cells.len(),
            world.models.len()
        );
        Ok(world)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| ((cell.x, cell.y), i))
            .collect();
    }

    /// Register an object record.
    pub fn add_model(&mut self, id: &str, record_type: RecordType, model: &str) -> &mut Self {
        self.models.insert(
            id.to_lowercase(),
            ModelRecord {
                record_type,
                model: model.to_string(),
            },
        );
        self
    }

    /// Cell at (x, y), created empty if missing.
    pub fn cell_mut(&mut self, x: i32, y: i32) -> &mut CellData {
        let index = match self.index.get(&(x, y)) {
            Some(&i) => i,
            None => {
                self.cells.push(CellData::new(x, y));
                let i = self.cells.len() - 1;
                self.index.insert((x, y), i);
                i
            }
        };
        &mut self.cells[index]
    }

    pub fn cells(&self) -> &[CellData] {
        &self.cells
    }

    /// Inclusive cell-coordinate range covered by the world, if any cells exist.
    pub fn cell_range(&self) -> Option<((i32, i32), (i32, i32))> {
        let first = self.cells.first()?;
        let mut min = (first.x, first.y);
        let mut max = min;
        for cell in &self.cells {
            min = (min.0.min(cell.x), min.1.min(cell.y));
            max = (max.0.max(cell.x), max.1.max(cell.y));
        }
        Some((min, max))
    }

    /// Every distinct non-empty model path referenced by the records.
    pub fn model_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .models
            .values()
            .filter(|m| !m.model.is_empty())
            .map(|m| m.model.clone())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    fn cell(&self, cell: CellHandle) -> Option<&CellData> {
        self.cells.get(cell.0)
    }
}

impl RecordStore for MemoryWorld {
    fn find_cell(&self, x: i32, y: i32) -> Option<CellHandle> {
        self.index.get(&(x, y)).map(|&i| CellHandle(i))
    }

    fn context_count(&self, cell: CellHandle) -> usize {
        self.cell(cell).map_or(0, |c| c.contexts.len())
    }

    fn read_context(&self, cell: CellHandle, context: usize) -> Result<Vec<ObjectReference>> {
        let data = self.cell(cell).ok_or_else(|| Error::CellRead {
            x: 0,
            y: 0,
            context,
            reason: format!("unknown cell handle {}", cell.0),
        })?;
        match data.contexts.get(context) {
            Some(ctx) if !ctx.corrupt => Ok(ctx.refs.clone()),
            Some(_) => Err(Error::CellRead {
                x: data.x,
                y: data.y,
                context,
                reason: "context data is corrupt".to_string(),
            }),
            None => Err(Error::CellRead {
                x: data.x,
                y: data.y,
                context,
                reason: "no such context".to_string(),
            }),
        }
    }

    fn moved_refs(&self, cell: CellHandle) -> Vec<RefNum> {
        self.cell(cell).map(|c| c.moved.clone()).unwrap_or_default()
    }

    fn leased_refs(&self, cell: CellHandle) -> Vec<ObjectReference> {
        self.cell(cell).map(|c| c.leased.clone()).unwrap_or_default()
    }
}

impl ModelResolver for MemoryWorld {
    fn resolve_model(&self, record_type: RecordType, id: &str) -> Result<String> {
        match record_type {
            RecordType::Static
            | RecordType::Activator
            | RecordType::Door
            | RecordType::Container => {
                match self.models.get(id) {
                    Some(record) if record.record_type == record_type => Ok(record.model.clone()),
                    _ => {
                        log::debug!("no {:?} record for '{}'", record_type, id);
                        Ok(String::new())
                    }
                }
            }
            other => Err(Error::UnresolvableType(other)),
        }
    }
}
