//! Append-only chunked storage for items.
//!
//! Incoming lines land in fixed-capacity chunks behind a single mutex.
//! Only the tail chunk ever mutates; every earlier chunk is full and
//! frozen, which is what lets matcher workers scan snapshots without
//! locking and lets the chunk cache key results by chunk identity.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::item::{Item, ItemBuilder};

/// Number of items per chunk.
pub const CHUNK_SIZE: usize = 100;

/// A bounded, append-only run of items.
///
/// Full chunks are immutable and shared; the store's non-full tail is
/// the only chunk that grows.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    items: Vec<Arc<Item>>,
}

impl Chunk {
    fn with_capacity() -> Self {
        Self {
            items: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    /// Number of items currently in the chunk.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// `true` iff the chunk has reached [`CHUNK_SIZE`].
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() == CHUNK_SIZE
    }

    /// The items of the chunk, in append order.
    #[must_use]
    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }
}

/// A stable view of the store at an instant.
///
/// The chunk vector is a shallow copy; a non-full tail is deep-copied
/// so subsequent appends mutate a fresh tail instead. A full tail is
/// frozen by the append-only invariant and shared as-is — that keeps
/// its address stable for the chunk cache.
#[derive(Clone)]
pub struct Snapshot {
    /// Chunk references, oldest first.
    pub chunks: Vec<Arc<Chunk>>,
    /// Total item count at snapshot time.
    pub count: usize,
    /// Store generation at snapshot time; bumped by [`ChunkStore::clear`].
    pub generation: u64,
}

struct Inner {
    chunks: Vec<Arc<Chunk>>,
    count: usize,
    generation: u64,
    builder: ItemBuilder,
}

/// Mutex-guarded growable sequence of chunks.
pub struct ChunkStore {
    inner: Mutex<Inner>,
}

impl ChunkStore {
    /// Creates an empty store whose items are produced by `builder`.
    #[must_use]
    pub fn new(builder: ItemBuilder) -> Self {
        Self {
            inner: Mutex::new(Inner {
                chunks: Vec::new(),
                count: 0,
                generation: 0,
                builder,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Appends one record, allocating a new tail chunk when the current
    /// one is full or absent. Returns `true` iff the builder accepted
    /// the record. Amortized O(1).
    pub fn push(&self, bytes: &[u8]) -> bool {
        let mut inner = self.lock();
        let index = u32::try_from(inner.count).unwrap_or(u32::MAX);
        let Some(item) = inner.builder.build(bytes, index) else {
            return false;
        };
        if inner.chunks.last().is_none_or(|c| c.is_full()) {
            inner.chunks.push(Arc::new(Chunk::with_capacity()));
        }
        if let Some(tail) = inner.chunks.last_mut() {
            // The non-full tail is never shared (snapshots copy it), so
            // this does not clone in practice.
            Arc::make_mut(tail).items.push(Arc::new(item));
        }
        inner.count += 1;
        true
    }

    /// Returns a stable snapshot of the store.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        let mut chunks = inner.chunks.clone();
        if let Some(tail) = chunks.last_mut()
            && !tail.is_full()
        {
            *tail = Arc::new(Chunk::clone(tail));
        }
        Snapshot {
            chunks,
            count: inner.count,
            generation: inner.generation,
        }
    }

    /// Total number of accepted items.
    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().count
    }

    /// Drops all chunks and resets the count; used on reload. Bumps the
    /// generation so pointer-keyed caches discard stale entries.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.chunks.clear();
        inner.count = 0;
        inner.generation += 1;
    }
}
