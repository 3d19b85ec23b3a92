//! Placed-object records: the world data paging reads from.

pub mod memory;
pub mod reference;
pub mod store;

pub use memory::{CellData, ContextData, MemoryWorld, ModelRecord};
pub use reference::{ObjectReference, RecordType, RefNum};
pub use store::{CellHandle, ModelResolver, RecordStore};
