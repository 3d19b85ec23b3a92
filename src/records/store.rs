//! Interfaces to the world data paging consumes.

use crate::core::types::Result;

use super::reference::{ObjectReference, RecordType, RefNum};

/// Opaque handle to a cell found by [`RecordStore::find_cell`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellHandle(pub usize);

/// Read access to placed-object data, cell by cell.
///
/// A cell's reference list is split into content contexts (one per content
/// file that touches the cell). Each context is read independently so a
/// damaged one does not hide the others.
pub trait RecordStore: Send + Sync {
    /// Exterior cell at grid coordinate (x, y).
    fn find_cell(&self, x: i32, y: i32) -> Option<CellHandle>;

    fn context_count(&self, cell: CellHandle) -> usize;

    /// References of one context, in file order, deletion markers included.
    fn read_context(&self, cell: CellHandle, context: usize) -> Result<Vec<ObjectReference>>;

    /// References that were moved out of this cell; their entries here are stale.
    fn moved_refs(&self, cell: CellHandle) -> Vec<RefNum>;

    /// References added or deleted at runtime, applied after the contexts.
    fn leased_refs(&self, cell: CellHandle) -> Vec<ObjectReference>;
}

/// Maps an object record to the mesh it is drawn with.
pub trait ModelResolver: Send + Sync {
    /// Mesh path relative to the `meshes/` root. An empty string means the
    /// object has no visual. Types other than static, activator, door and
    /// container have no lookup and return an error.
    fn resolve_model(&self, record_type: RecordType, id: &str) -> Result<String>;
}
