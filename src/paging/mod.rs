//! Object paging: static world objects aggregated into merged far chunks.
//!
//! A request for a chunk (center and size in cell units) scans every cell the
//! chunk covers, resolves reference overrides, culls what is too small to
//! see, groups the survivors by mesh template and decides per template
//! whether merging its instances pays off. The resulting scene graph is
//! cached per chunk until it goes unused for the expiry delay.

pub mod cache;
pub mod chunk;
pub mod collect;
pub mod config;
pub mod disabled;
pub mod object_paging;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::ChunkCache;
pub use chunk::{
    placement_matrix, should_merge, world_center, Chunk, ChunkBuilder, ChunkId, Placement,
};
pub use collect::{covered_cells, type_filter, CollectedInstances, InstanceCollector, InstanceList};
pub use config::PagingConfig;
pub use disabled::DisabledSet;
pub use object_paging::{ChunkRequest, ObjectPaging, PagingStats};
