//! Expiring cache for built chunks
//!
//! Chunks stay cached while anything outside the cache still holds them.
//! Once the last outside holder lets go, a chunk survives for the expiry
//! delay and is then evicted on the next [`ChunkCache::update`].

use std::collections::HashMap;
use std::sync::Arc;

use super::chunk::{Chunk, ChunkId};

struct CacheEntry {
    chunk: Arc<Chunk>,
    /// Last time the entry was inserted or seen in use, in seconds
    last_used: f64,
}

/// Chunk cache keyed by [`ChunkId`].
pub struct ChunkCache {
    entries: HashMap<ChunkId, CacheEntry>,
    /// Seconds an unused chunk is kept
    expiry_delay: f64,
    /// Time of the most recent update
    now: f64,
}

impl ChunkCache {
    /// Create an empty cache
    ///
    /// # Arguments
    /// * `expiry_delay` - Seconds an unused chunk is kept
    pub fn new(expiry_delay: f64) -> Self {
        Self {
            entries: HashMap::new(),
            expiry_delay,
            now: 0.0,
        }
    }

    pub fn expiry_delay(&self) -> f64 {
        self.expiry_delay
    }

    pub fn set_expiry_delay(&mut self, seconds: f64) {
        self.expiry_delay = seconds;
    }

    /// Get a chunk by id
    pub fn get(&self, id: &ChunkId) -> Option<Arc<Chunk>> {
        self.entries.get(id).map(|entry| Arc::clone(&entry.chunk))
    }

    /// Insert a chunk, stamped with the time of the last update
    ///
    /// # Returns
    /// The chunk previously cached under the same id, if any
    pub fn insert(&mut self, chunk: Arc<Chunk>) -> Option<Arc<Chunk>> {
        let entry = CacheEntry {
            chunk,
            last_used: self.now,
        };
        self.entries
            .insert(entry.chunk.id, entry)
            .map(|old| old.chunk)
    }

    pub fn contains(&self, id: &ChunkId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance the clock to `now` and evict expired chunks
    ///
    /// Chunks held outside the cache have their timestamp refreshed first;
    /// the rest are evicted once older than `now - expiry_delay`.
    ///
    /// # Returns
    /// Number of evicted chunks
    pub fn update(&mut self, now: f64) -> usize {
        self.now = now;
        let expiry_time = now - self.expiry_delay;
        let before = self.entries.len();
        self.entries.retain(|id, entry| {
            if Arc::strong_count(&entry.chunk) > 1 {
                entry.last_used = now;
            }
            let keep = entry.last_used > expiry_time;
            if !keep {
                log::trace!("Evicting chunk {}", id);
            }
            keep
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            log::debug!("Evicted {} chunks, {} cached", evicted, self.entries.len());
        }
        evicted
    }

    /// Drop every chunk
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
