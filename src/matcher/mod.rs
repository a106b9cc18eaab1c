//! Parallel matcher: scans snapshots against patterns on a worker pool.
//!
//! The matcher runs a single dedicated loop on its own thread. Each
//! iteration takes the latest pending [`MatchRequest`] from its private
//! mailbox (coalescing: only the newest request matters), consults the
//! merger cache, then fans the snapshot's chunks out over a rayon pool.
//! Workers observe a shared cancellation flag at every chunk boundary;
//! a pending `Reset` in the mailbox flips the flag, the workers drain
//! their in-flight chunk, and the dispatcher returns without emitting —
//! the reset request is re-processed on the next iteration. Exactly one
//! `SearchFin` is emitted per successful run.

mod cache;
mod merger;

pub use cache::{ChunkCache, MergerCache};
pub use merger::Merger;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel;
use tracing::{debug, trace};

use crate::chunk::{Chunk, Snapshot};
use crate::error::{Error, TerminalError};
use crate::event::{CoreEvent, EventBox, EventType};
use crate::item::{MatchedItem, RankCriteria, RankInput, build_rank};
use crate::pattern::{MatchScratch, Pattern};

/// Hard cap on parallel scan partitions.
const MAX_PARTITIONS: usize = 32;
/// Partitions per hardware thread before the cap.
const PARTITION_MULTIPLIER: usize = 8;
/// Minimum scan time before the first progress event.
const PROGRESS_MIN_DURATION: Duration = Duration::from_millis(200);
/// Minimum gap between progress events.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
/// Poll granularity of the progress/cancellation loop.
const PROGRESS_POLL: Duration = Duration::from_millis(10);
/// Mergers are cached only below this item count.
const MERGER_CACHE_LIMIT: usize = 100_000;

/// Keys of the matcher's private mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherEvent {
    /// A new request that lets any in-flight scan finish first.
    Retry,
    /// A new request that cancels any in-flight scan.
    Reset,
}

/// One coalesced unit of matcher work.
#[derive(Clone)]
pub struct MatchRequest {
    /// Stable view of the store to scan.
    pub snapshot: Snapshot,
    /// Pattern to match with.
    pub pattern: Arc<Pattern>,
    /// `true` when the reader finished before this request was issued.
    pub is_final: bool,
    /// Rank-sort the results (`false` under `--no-sort`).
    pub sort: bool,
}

/// Session-fixed ranking configuration.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Tie-break criteria after the primary score.
    pub criteria: Vec<RankCriteria>,
    /// Reverse the index tie-breaker (`--tac`).
    pub tac: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            criteria: vec![RankCriteria::Score],
            tac: false,
        }
    }
}

/// The matcher actor.
pub struct Matcher {
    reqbox: EventBox<MatcherEvent, MatchRequest>,
    out: Arc<EventBox<EventType, CoreEvent>>,
    config: MatcherConfig,
    chunk_cache: ChunkCache,
    pool: rayon::ThreadPool,
}

impl Matcher {
    /// Creates a matcher posting results to the global mailbox `out`.
    pub fn new(
        config: MatcherConfig,
        out: Arc<EventBox<EventType, CoreEvent>>,
    ) -> Result<Arc<Self>, Error> {
        let threads = partition_count(usize::MAX);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("sift-matcher-{i}"))
            .build()
            .map_err(|e| TerminalError::Init(format!("matcher pool: {e}")))?;
        Ok(Arc::new(Self {
            reqbox: EventBox::new(),
            out,
            config,
            chunk_cache: ChunkCache::new(),
            pool,
        }))
    }

    /// Submits a request. With `cancel` set, any in-flight scan aborts
    /// and this request is processed in its place; otherwise the scan
    /// in flight completes first.
    pub fn reset(&self, snapshot: Snapshot, pattern: Arc<Pattern>, is_final: bool, sort: bool, cancel: bool) {
        let request = MatchRequest {
            snapshot,
            pattern,
            is_final,
            sort,
        };
        let key = if cancel { MatcherEvent::Reset } else { MatcherEvent::Retry };
        self.reqbox.set(key, request);
    }

    /// Spawns the matcher loop.
    #[must_use]
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let matcher = Arc::clone(self);
        std::thread::Builder::new()
            .name("sift-matcher".to_string())
            .spawn(move || matcher.run())
            .unwrap_or_else(|_| std::process::abort())
    }

    fn run(&self) {
        let mut merger_cache = MergerCache::new();
        let mut last_count: Option<usize> = None;
        let mut last_generation: Option<u64> = None;

        loop {
            let request = self.reqbox.wait(|events| {
                let request = events
                    .remove(&MatcherEvent::Reset)
                    .or_else(|| events.remove(&MatcherEvent::Retry));
                events.clear();
                request
            });
            let Some(request) = request else { continue };

            // Cache maintenance. A reload invalidates chunk identities,
            // so both caches go; a count change only invalidates whole
            // mergers — per-chunk results for frozen chunks stay valid.
            if last_generation != Some(request.snapshot.generation) {
                self.chunk_cache.clear();
                merger_cache.clear();
            } else if last_count != Some(request.snapshot.count) {
                merger_cache.clear();
            } else if let Some(hit) = merger_cache.lookup(request.pattern.as_string()) {
                trace!(query = request.pattern.as_string(), "merger cache hit");
                self.out.set(EventType::SearchFin, CoreEvent::SearchFinished(hit));
                last_generation = Some(request.snapshot.generation);
                continue;
            }
            last_count = Some(request.snapshot.count);
            last_generation = Some(request.snapshot.generation);

            let started = Instant::now();
            if let Some(merger) = self.scan(&request) {
                debug!(
                    query = request.pattern.as_string(),
                    matched = merger.len(),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "scan finished"
                );
                let merger = Arc::new(merger);
                if request.pattern.is_cacheable() && request.snapshot.count <= MERGER_CACHE_LIMIT {
                    merger_cache.insert(request.pattern.as_string(), Arc::clone(&merger));
                }
                self.out.set(EventType::SearchFin, CoreEvent::SearchFinished(merger));
            } else {
                trace!(query = request.pattern.as_string(), "scan cancelled");
            }
        }
    }

    /// Runs one parallel scan. Returns `None` when a pending `Reset`
    /// cancelled it; no partial result is ever emitted.
    fn scan(&self, request: &MatchRequest) -> Option<Merger> {
        let chunks = &request.snapshot.chunks;
        let total_chunks = chunks.len();
        if total_chunks == 0 {
            return Some(Merger::empty(request.is_final));
        }

        let partitions = partition_count(total_chunks);
        let slice_size = total_chunks.div_ceil(partitions);
        let cancelled = AtomicBool::new(false);
        let (progress_tx, progress_rx) = channel::bounded::<usize>(total_chunks);
        let (result_tx, result_rx) = channel::bounded::<(usize, Vec<MatchedItem>)>(partitions);

        self.pool.scope(|scope| {
            for (slice_index, slice) in chunks.chunks(slice_size).enumerate() {
                let progress_tx = progress_tx.clone();
                let result_tx = result_tx.clone();
                let cancelled = &cancelled;
                let pattern = &request.pattern;
                let sort = request.sort;
                scope.spawn(move |_| {
                    let mut scratch = MatchScratch::default();
                    let mut results: Vec<MatchedItem> = Vec::new();
                    for chunk in slice {
                        if cancelled.load(Ordering::Relaxed) {
                            return;
                        }
                        let before = results.len();
                        self.match_chunk(chunk, pattern, &mut scratch, &mut results);
                        let _ = progress_tx.try_send(results.len() - before);
                    }
                    if sort {
                        results.sort_unstable();
                    }
                    let _ = result_tx.send((slice_index, results));
                });
            }
            drop(progress_tx);
            drop(result_tx);

            // Progress/cancellation loop on the dispatcher itself: runs
            // until every chunk reported or the workers disconnected.
            let started = Instant::now();
            let mut processed = 0usize;
            let mut last_emit: Option<Instant> = None;
            while processed < total_chunks {
                if self.reqbox.peek(MatcherEvent::Reset) {
                    cancelled.store(true, Ordering::Relaxed);
                    break;
                }
                match progress_rx.recv_timeout(PROGRESS_POLL) {
                    Ok(_) => processed += 1,
                    Err(channel::RecvTimeoutError::Timeout) => {}
                    Err(channel::RecvTimeoutError::Disconnected) => break,
                }
                let elapsed = started.elapsed();
                if elapsed >= PROGRESS_MIN_DURATION
                    && last_emit.is_none_or(|t| t.elapsed() >= PROGRESS_INTERVAL)
                {
                    #[allow(clippy::cast_precision_loss)]
                    let fraction = processed as f32 / total_chunks as f32;
                    self.out
                        .set(EventType::SearchProgress, CoreEvent::Progress(fraction));
                    last_emit = Some(Instant::now());
                }
            }
        });

        if cancelled.load(Ordering::Relaxed) {
            return None;
        }

        let mut slots: Vec<Vec<MatchedItem>> = (0..partitions).map(|_| Vec::new()).collect();
        while let Ok((slice_index, results)) = result_rx.try_recv() {
            if let Some(slot) = slots.get_mut(slice_index) {
                *slot = results;
            }
        }
        Some(Merger::new(
            slots,
            request.sort,
            self.config.tac,
            request.is_final,
        ))
    }

    /// Matches one chunk, consulting and populating the chunk cache for
    /// frozen chunks under cacheable patterns.
    fn match_chunk(
        &self,
        chunk: &Arc<Chunk>,
        pattern: &Arc<Pattern>,
        scratch: &mut MatchScratch,
        results: &mut Vec<MatchedItem>,
    ) {
        let cache_friendly = pattern.is_cacheable() && chunk.is_full();
        if cache_friendly
            && let Some(hit) = self.chunk_cache.lookup(chunk, pattern.cache_key())
        {
            results.extend(hit.iter().cloned());
            return;
        }

        let matched = match_chunk_items(chunk, pattern, &self.config, scratch);
        if cache_friendly {
            self.chunk_cache
                .insert(chunk, pattern.cache_key(), Arc::new(matched.clone()));
        }
        results.extend(matched);
    }

    /// Chunk-cache size, exposed for tests.
    #[must_use]
    pub fn cached_chunks(&self) -> usize {
        self.chunk_cache.len()
    }
}

/// Matches every item of one chunk, building ranked results.
///
/// This is the sequential kernel shared by the parallel scan and the
/// non-interactive filter mode.
pub fn match_chunk_items(
    chunk: &Chunk,
    pattern: &Pattern,
    config: &MatcherConfig,
    scratch: &mut MatchScratch,
) -> Vec<MatchedItem> {
    let mut results = Vec::new();
    for item in chunk.items() {
        if let Some(m) = pattern.match_item(item, scratch) {
            let length = i32::try_from(item.target().chars().count()).unwrap_or(i32::MAX);
            let rank = build_rank(
                &RankInput {
                    score: m.score,
                    begin: i32::try_from(m.begin).unwrap_or(i32::MAX),
                    end: i32::try_from(m.end).unwrap_or(i32::MAX),
                    length,
                    index: item.index(),
                },
                &config.criteria,
                config.tac,
            );
            results.push(MatchedItem {
                item: Arc::clone(item),
                rank,
                offsets: m.offsets,
            });
        }
    }
    results
}

fn partition_count(chunks: usize) -> usize {
    let cores = std::thread::available_parallelism().map_or(4, std::num::NonZero::get);
    MAX_PARTITIONS
        .min(PARTITION_MULTIPLIER * cores)
        .min(chunks)
        .max(1)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chunk::{CHUNK_SIZE, ChunkStore};
    use crate::item::ItemBuilder;
    use crate::pattern::{PatternConfig, PatternCache};
    use std::time::Duration;

    fn setup() -> (ChunkStore, Arc<EventBox<EventType, CoreEvent>>, Arc<Matcher>) {
        let store = ChunkStore::new(ItemBuilder::new());
        let out = Arc::new(EventBox::new());
        let matcher = Matcher::new(MatcherConfig::default(), Arc::clone(&out))
            .unwrap_or_else(|e| panic!("matcher init failed: {e}"));
        (store, out, matcher)
    }

    fn wait_fin(out: &EventBox<EventType, CoreEvent>) -> Arc<Merger> {
        match out.wait_for(EventType::SearchFin) {
            CoreEvent::SearchFinished(merger) => merger,
            _ => panic!("unexpected payload on SearchFin"),
        }
    }

    fn pattern(query: &str) -> Arc<Pattern> {
        PatternCache::new(PatternConfig::default()).get(query)
    }

    #[test]
    fn test_scan_ranks_across_partitions() {
        let (store, out, matcher) = setup();
        for i in 0..350 {
            assert!(store.push(format!("item-{i:03}").as_bytes()));
        }
        assert!(store.push(b"exact"));
        let _handle = matcher.start();
        matcher.reset(store.snapshot(), pattern("exact"), true, true, false);
        let merger = wait_fin(&out);
        assert!(merger.is_final());
        assert_eq!(merger.len(), 1);
        assert_eq!(merger.get(0).map(|m| m.item.text().to_string()), Some("exact".to_string()));
    }

    #[test]
    fn test_empty_query_matches_all_in_index_order() {
        let (store, out, matcher) = setup();
        for i in 0..42 {
            assert!(store.push(format!("{i}").as_bytes()));
        }
        let _handle = matcher.start();
        matcher.reset(store.snapshot(), pattern(""), false, true, false);
        let merger = wait_fin(&out);
        assert!(!merger.is_final());
        assert_eq!(merger.len(), 42);
        let indices: Vec<u32> = (0..42).filter_map(|i| merger.get(i).map(|m| m.item.index())).collect();
        assert_eq!(indices, (0..42).collect::<Vec<u32>>());
    }

    #[test]
    fn test_incremental_scan_reuses_chunk_cache() {
        // S5: full chunks from the first scan are served from cache on
        // the second; only the fresh tail is computed.
        let (store, out, matcher) = setup();
        for i in 0..300 {
            assert!(store.push(format!("a{i}").as_bytes()));
        }
        let _handle = matcher.start();
        let pat = pattern("a");
        matcher.reset(store.snapshot(), Arc::clone(&pat), false, true, false);
        let first = wait_fin(&out);
        assert_eq!(first.len(), 300);
        assert_eq!(matcher.cached_chunks(), 3);

        for i in 300..350 {
            assert!(store.push(format!("a{i}").as_bytes()));
        }
        matcher.reset(store.snapshot(), pat, false, true, false);
        let second = wait_fin(&out);
        assert_eq!(second.len(), 350);
        // The three frozen chunks stayed cached; no entry was added for
        // the partial tail.
        assert_eq!(matcher.cached_chunks(), 3);
    }

    #[test]
    fn test_uncacheable_pattern_skips_chunk_cache() {
        // S4: inverted terms must not populate the cache.
        let (store, out, matcher) = setup();
        for i in 0..(2 * CHUNK_SIZE) {
            assert!(store.push(format!("apple {i}").as_bytes()));
        }
        assert!(store.push(b"apple tart"));
        let _handle = matcher.start();
        matcher.reset(store.snapshot(), pattern("apple !tart"), true, true, false);
        let merger = wait_fin(&out);
        assert_eq!(merger.len(), 2 * CHUNK_SIZE);
        assert_eq!(matcher.cached_chunks(), 0);
    }

    #[test]
    fn test_merger_cache_hit_when_count_unchanged() {
        let (store, out, matcher) = setup();
        for i in 0..120 {
            assert!(store.push(format!("x{i}").as_bytes()));
        }
        let _handle = matcher.start();
        let pat = pattern("x");
        matcher.reset(store.snapshot(), Arc::clone(&pat), true, true, false);
        let first = wait_fin(&out);
        matcher.reset(store.snapshot(), pat, true, true, false);
        let second = wait_fin(&out);
        // Same Arc: the merger was served from the cache.
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_reset_cancels_in_flight_scan() {
        // S6-shaped: a reset with cancel yields exactly one fin, for
        // the newest pattern.
        let (store, out, matcher) = setup();
        for i in 0..10_000 {
            assert!(store.push(format!("candidate {i}").as_bytes()));
        }
        let _handle = matcher.start();
        // `candidate` matches everything; the follow-up reset matches
        // nothing, so the two runs are distinguishable by length.
        matcher.reset(store.snapshot(), pattern("candidate"), false, true, false);
        matcher.reset(store.snapshot(), pattern("candidate zz"), false, true, true);

        // The matcher loop processes requests in order, so the fin for
        // the reset request is always the last one observed; a
        // cancelled first scan emits none at all.
        let mut last = wait_fin(&out);
        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
            if let Some(CoreEvent::SearchFinished(m)) = out.try_take(EventType::SearchFin) {
                last = m;
            }
        }
        assert_eq!(last.len(), 0);
    }

    #[test]
    fn test_generation_change_purges_chunk_cache() {
        let (store, out, matcher) = setup();
        for i in 0..200 {
            assert!(store.push(format!("q{i}").as_bytes()));
        }
        let _handle = matcher.start();
        let pat = pattern("q");
        matcher.reset(store.snapshot(), Arc::clone(&pat), false, true, false);
        let _ = wait_fin(&out);
        assert_eq!(matcher.cached_chunks(), 2);

        store.clear();
        assert!(store.push(b"q-after-reload"));
        matcher.reset(store.snapshot(), pat, true, true, false);
        let merger = wait_fin(&out);
        assert_eq!(merger.len(), 1);
        assert_eq!(matcher.cached_chunks(), 0);
    }

    #[test]
    fn test_deterministic_ranking_across_runs() {
        let (store, out, matcher) = setup();
        for word in ["banana", "bandana", "cabana", "abba", "bna"] {
            for i in 0..60 {
                assert!(store.push(format!("{word}-{i}").as_bytes()));
            }
        }
        let _handle = matcher.start();
        let collect = || {
            matcher.reset(store.snapshot(), pattern("bna"), true, true, false);
            let merger = wait_fin(&out);
            (0..merger.len())
                .filter_map(|i| merger.get(i).map(|m| m.item.index()))
                .collect::<Vec<u32>>()
        };
        let first = collect();
        // Growing the store invalidates the merger cache, so the next
        // two runs are real scans over identical snapshots.
        assert!(store.push(b"banana-extra"));
        let second = collect();
        let third = collect();
        assert_eq!(second.len(), first.len() + 1);
        assert_eq!(second, third);
    }
}
