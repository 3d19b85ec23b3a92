//! Objpaging - distant static object paging for open-world renderers
//!
//! Placed objects from the world's cell data are aggregated into chunk scene
//! graphs: instances of cheap, widely shared meshes are merged into a few
//! draw calls, the rest stay individual transformed copies. Chunks are cached
//! per (center, size) and objects can be hidden at runtime.

pub mod core;
pub mod math;
pub mod scene;
pub mod records;
pub mod resource;
pub mod paging;

pub use paging::{Chunk, ChunkId, ObjectPaging, PagingConfig};
