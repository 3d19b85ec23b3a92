//! Object paging entry point: cached far chunks of static world objects.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Vec2, Vec3};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::core::types::Result;
use crate::records::{ModelResolver, RecordStore, RefNum};
use crate::resource::{CompileQueue, TemplateSource};

use super::cache::ChunkCache;
use super::chunk::{Chunk, ChunkBuilder, ChunkId};
use super::collect::InstanceCollector;
use super::config::PagingConfig;
use super::disabled::DisabledSet;

/// One `get_chunk` call, for batch prefetching.
#[derive(Clone, Copy, Debug)]
pub struct ChunkRequest {
    pub size: f32,
    pub center: Vec2,
    pub lod: u8,
    pub lod_flags: u32,
    pub far: bool,
    pub view_point: Vec3,
    pub compile: bool,
}

impl ChunkRequest {
    /// Far request for a chunk, without compilation.
    pub fn far(size: f32, center: Vec2, view_point: Vec3) -> Self {
        Self {
            size,
            center,
            lod: 0,
            lod_flags: 0,
            far: true,
            view_point,
            compile: false,
        }
    }
}

/// Counters since creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PagingStats {
    pub cached_chunks: usize,
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
    evictions: AtomicU64,
}

/// Pages static objects into merged far chunks.
///
/// Safe to share between worker threads. Builds for different chunks run
/// concurrently; concurrent requests for the same chunk wait for one build.
pub struct ObjectPaging {
    records: Arc<dyn RecordStore>,
    models: Arc<dyn ModelResolver>,
    templates: Arc<dyn TemplateSource>,
    compile_queue: Option<Arc<dyn CompileQueue>>,
    config: PagingConfig,
    disabled: DisabledSet,
    cache: Mutex<ChunkCache>,
    building: Mutex<HashMap<ChunkId, Arc<Mutex<()>>>>,
    counters: Counters,
}

impl ObjectPaging {
    pub fn new(
        records: Arc<dyn RecordStore>,
        models: Arc<dyn ModelResolver>,
        templates: Arc<dyn TemplateSource>,
        config: PagingConfig,
    ) -> Self {
        let cache = ChunkCache::new(config.expiry_delay);
        Self {
            records,
            models,
            templates,
            compile_queue: None,
            config,
            disabled: DisabledSet::new(),
            cache: Mutex::new(cache),
            building: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Queue merged geometry of chunks requested with `compile` for upload.
    pub fn with_compile_queue(mut self, queue: Arc<dyn CompileQueue>) -> Self {
        self.compile_queue = Some(queue);
        self
    }

    pub fn config(&self) -> &PagingConfig {
        &self.config
    }

    /// Cached chunk for (center, size), built on a miss.
    ///
    /// Only far chunks are paged; near requests return `None`. `lod` and
    /// `lod_flags` do not affect the result.
    #[allow(clippy::too_many_arguments)]
    pub fn get_chunk(
        &self,
        size: f32,
        center: Vec2,
        _lod: u8,
        _lod_flags: u32,
        far: bool,
        view_point: Vec3,
        compile: bool,
    ) -> Result<Option<Arc<Chunk>>> {
        if !far {
            return Ok(None);
        }
        let id = ChunkId::new(center, size);
        if let Some(chunk) = self.cached(&id) {
            return Ok(Some(chunk));
        }

        let build_lock = self.build_lock(id);
        let result = {
            let _building = build_lock.lock();
            // Another thread may have finished this chunk while we waited.
            match self.cached(&id) {
                Some(chunk) => Ok(chunk),
                None => self.build_and_insert(id, view_point, compile),
            }
        };
        self.release_build_lock(id, build_lock);
        result.map(Some)
    }

    /// Build a chunk without touching the cache.
    pub fn create_chunk(
        &self,
        size: f32,
        center: Vec2,
        view_point: Vec3,
        compile: bool,
    ) -> Result<Chunk> {
        let collector = InstanceCollector {
            records: self.records.as_ref(),
            models: self.models.as_ref(),
            templates: self.templates.as_ref(),
            disabled: &self.disabled,
            config: &self.config,
        };
        ChunkBuilder::new(collector)
            .with_compile_queue(self.compile_queue.as_deref())
            .build(ChunkId::new(center, size), view_point, compile)
    }

    /// Show or hide one object in chunks built from now on.
    ///
    /// Chunks already cached keep showing their old state until rebuilt.
    pub fn enable_object(&self, ref_num: RefNum, enabled: bool) {
        if self.disabled.enable(ref_num, enabled) {
            log::debug!(
                "Object {} {}",
                ref_num,
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    pub fn is_enabled(&self, ref_num: RefNum) -> bool {
        !self.disabled.contains(ref_num)
    }

    /// Re-enable every object.
    pub fn clear(&self) {
        self.disabled.clear();
    }

    /// Seconds an unused chunk stays cached.
    pub fn set_expiry_delay(&self, seconds: f64) {
        self.cache.lock().set_expiry_delay(seconds);
    }

    pub fn expiry_delay(&self) -> f64 {
        self.cache.lock().expiry_delay()
    }

    /// Advance the cache clock to `now` seconds and evict expired chunks.
    pub fn update_cache(&self, now: f64) -> usize {
        let evicted = self.cache.lock().update(now);
        self.counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn stats(&self) -> PagingStats {
        PagingStats {
            cached_chunks: self.cache.lock().len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            builds: self.counters.builds.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Serve many requests in parallel on the rayon pool, in request order.
    pub fn prefetch(&self, requests: &[ChunkRequest]) -> Result<Vec<Option<Arc<Chunk>>>> {
        requests
            .par_iter()
            .map(|r| {
                self.get_chunk(r.size, r.center, r.lod, r.lod_flags, r.far, r.view_point, r.compile)
            })
            .collect()
    }

    fn cached(&self, id: &ChunkId) -> Option<Arc<Chunk>> {
        let chunk = self.cache.lock().get(id);
        let counter = if chunk.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        chunk
    }

    fn build_and_insert(&self, id: ChunkId, view_point: Vec3, compile: bool) -> Result<Arc<Chunk>> {
        let chunk = Arc::new(self.create_chunk(id.size, id.center, view_point, compile)?);
        self.counters.builds.fetch_add(1, Ordering::Relaxed);
        self.cache.lock().insert(Arc::clone(&chunk));
        Ok(chunk)
    }

    fn build_lock(&self, id: ChunkId) -> Arc<Mutex<()>> {
        let mut building = self.building.lock();
        Arc::clone(building.entry(id).or_default())
    }

    fn release_build_lock(&self, id: ChunkId, lock: Arc<Mutex<()>>) {
        let mut building = self.building.lock();
        // Only the map and this caller hold it: nobody else is waiting.
        if Arc::strong_count(&lock) <= 2 {
            building.remove(&id);
        }
    }
}
