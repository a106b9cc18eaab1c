//! The two result caches consulted by the matcher.
//!
//! The chunk cache reuses per-chunk scan results across successive
//! queries that share cacheable terms (typing a suffix keystroke only
//! recomputes the partial tail chunk). The merger cache short-circuits
//! whole scans when neither the query nor the item count has changed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::chunk::Chunk;
use crate::item::MatchedItem;
use crate::matcher::Merger;

/// Per-chunk results keyed by `(chunk identity, pattern cache key)`.
///
/// Populated only for full (frozen) chunks and cacheable patterns, so
/// an entry can never be invalidated by appends; reloads are handled
/// wholesale via [`clear`](Self::clear). Read concurrently by all
/// matcher workers.
#[derive(Default)]
pub struct ChunkCache {
    map: Mutex<HashMap<(usize, String), Arc<Vec<MatchedItem>>>>,
}

impl ChunkCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(usize, String), Arc<Vec<MatchedItem>>>> {
        self.map
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn key(chunk: &Arc<Chunk>, cache_key: &str) -> (usize, String) {
        (Arc::as_ptr(chunk) as usize, cache_key.to_string())
    }

    /// Returns the cached results for `chunk` under `cache_key`.
    #[must_use]
    pub fn lookup(&self, chunk: &Arc<Chunk>, cache_key: &str) -> Option<Arc<Vec<MatchedItem>>> {
        self.lock().get(&Self::key(chunk, cache_key)).map(Arc::clone)
    }

    /// Stores `results` for `chunk` under `cache_key`.
    ///
    /// Callers must only insert results for full chunks; a partial
    /// chunk may still grow and its snapshot copies have unstable
    /// addresses.
    pub fn insert(&self, chunk: &Arc<Chunk>, cache_key: &str, results: Arc<Vec<MatchedItem>>) {
        debug_assert!(chunk.is_full());
        self.lock().insert(Self::key(chunk, cache_key), results);
    }

    /// Drops every entry (reload, sort toggle, grammar change).
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of cached `(chunk, key)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Completed mergers keyed by the full query string.
///
/// Owned by the matcher thread; consulted only when the item count is
/// unchanged since the entry was stored, and dropped wholesale when it
/// changes.
#[derive(Default)]
pub struct MergerCache {
    map: HashMap<String, Arc<Merger>>,
}

impl MergerCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached merger for `query`.
    #[must_use]
    pub fn lookup(&self, query: &str) -> Option<Arc<Merger>> {
        self.map.get(query).map(Arc::clone)
    }

    /// Stores `merger` under `query`.
    pub fn insert(&mut self, query: &str, merger: Arc<Merger>) {
        self.map.insert(query.to_string(), merger);
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chunk::{CHUNK_SIZE, ChunkStore};
    use crate::item::ItemBuilder;

    fn full_chunk() -> Arc<Chunk> {
        let store = ChunkStore::new(ItemBuilder::new());
        for i in 0..CHUNK_SIZE {
            assert!(store.push(format!("{i}").as_bytes()));
        }
        store.snapshot().chunks[0].clone()
    }

    #[test]
    fn test_chunk_cache_roundtrip() {
        let cache = ChunkCache::new();
        let chunk = full_chunk();
        assert!(cache.lookup(&chunk, "q").is_none());
        let results = Arc::new(vec![MatchedItem::unranked(chunk.items()[3].clone())]);
        cache.insert(&chunk, "q", Arc::clone(&results));
        let hit = cache.lookup(&chunk, "q").unwrap_or_else(|| panic!("miss"));
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].item.index(), 3);
    }

    #[test]
    fn test_chunk_cache_distinguishes_chunks_and_keys() {
        let cache = ChunkCache::new();
        let a = full_chunk();
        let b = full_chunk();
        cache.insert(&a, "q", Arc::new(Vec::new()));
        assert!(cache.lookup(&b, "q").is_none());
        assert!(cache.lookup(&a, "other").is_none());
        assert!(cache.lookup(&a, "q").is_some());
    }

    #[test]
    fn test_chunk_cache_clear() {
        let cache = ChunkCache::new();
        let chunk = full_chunk();
        cache.insert(&chunk, "q", Arc::new(Vec::new()));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_merger_cache_roundtrip() {
        let mut cache = MergerCache::new();
        assert!(cache.lookup("q").is_none());
        cache.insert("q", Arc::new(Merger::empty(true)));
        let hit = cache.lookup("q").unwrap_or_else(|| panic!("miss"));
        assert!(hit.is_final());
        cache.clear();
        assert!(cache.lookup("q").is_none());
    }
}
