//! Texture cache
//!
//! Shared textures (keyed by source URL) are owned by the cache, not by any
//! one consumer: many materials across many pages may reference the same
//! image, and none of them may dispose it. The cache guarantees at most one
//! construction per key, even when several consumers request the same
//! texture while mounting in the same frame, and it is the only component
//! allowed to release a cached entry.

use crate::resources::{Resources, TextureId};
use rustc_hash::FxHashMap;

/// Cache hit/miss counters
#[derive(Clone, Copy, Debug, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate from 0.0 to 1.0
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// URL-keyed cache of shared textures
pub struct TextureCache {
    entries: FxHashMap<String, TextureId>,
    hits: u64,
    misses: u64,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached texture for `key`, constructing it via `factory`
    /// on first request
    ///
    /// All callers for the same key receive the identical handle, and the
    /// factory runs at most once per key. The returned texture is marked
    /// cache-owned, so tree disposal will never release it.
    pub fn get_or_create<F>(&mut self, resources: &mut Resources, key: &str, factory: F) -> TextureId
    where
        F: FnOnce(&mut Resources) -> TextureId,
    {
        if let Some(&id) = self.entries.get(key) {
            self.hits += 1;
            return id;
        }

        self.misses += 1;
        let id = factory(resources);
        resources.mark_cache_owned(id);
        self.entries.insert(key.to_string(), id);
        id
    }

    /// The cached texture for `key`, if present
    pub fn get(&mut self, key: &str) -> Option<TextureId> {
        match self.entries.get(key) {
            Some(&id) => {
                self.hits += 1;
                Some(id)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Release one entry; the cache is the only component allowed to do this
    pub fn evict(&mut self, resources: &mut Resources, key: &str) {
        if let Some(id) = self.entries.remove(key) {
            resources.dispose_cached_texture(id);
        }
    }

    /// Release every entry
    pub fn clear(&mut self, resources: &mut Resources) {
        for (_, id) in self.entries.drain() {
            resources.dispose_cached_texture(id);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}
