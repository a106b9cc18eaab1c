//! Ranked output of one matcher pass.
//!
//! A [`Merger`] wraps the per-slice sorted vectors produced by the
//! parallel scan. Small result sets are flattened and sorted eagerly;
//! larger ones are merged lazily with per-list cursors so `get(i)`
//! near the top of the list never materializes the full array. With
//! sorting disabled the merger concatenates slices in scan order.

use std::sync::Mutex;

use crate::item::MatchedItem;

/// Below this many results the merger flattens eagerly instead of
/// maintaining k-way cursors.
const EAGER_MERGE_LIMIT: usize = 1000;

struct MergeState {
    merged: Vec<MatchedItem>,
    cursors: Vec<usize>,
}

/// Ranked, lazily merged match results.
pub struct Merger {
    lists: Vec<Vec<MatchedItem>>,
    sorted: bool,
    tac: bool,
    is_final: bool,
    count: usize,
    state: Mutex<MergeState>,
}

impl Merger {
    /// Wraps per-slice result vectors.
    ///
    /// When `sorted` is set, each list must already be sorted by rank
    /// (the scan sorts its slice before delivery).
    #[must_use]
    pub fn new(mut lists: Vec<Vec<MatchedItem>>, sorted: bool, tac: bool, is_final: bool) -> Self {
        let count = lists.iter().map(Vec::len).sum();
        let mut state = MergeState {
            merged: Vec::new(),
            cursors: vec![0; lists.len()],
        };
        if sorted && count <= EAGER_MERGE_LIMIT {
            let mut merged: Vec<MatchedItem> = lists.drain(..).flatten().collect();
            merged.sort_unstable();
            state.merged = merged;
            state.cursors.clear();
        }
        Self {
            lists,
            sorted,
            tac,
            is_final,
            count,
            state: Mutex::new(state),
        }
    }

    /// An empty merger.
    #[must_use]
    pub fn empty(is_final: bool) -> Self {
        Self::new(Vec::new(), true, false, is_final)
    }

    /// Number of matched items.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// `true` when nothing matched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `true` when the scan ran over a complete input stream.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        self.is_final
    }

    /// Returns the `i`-th item in rank order (scan order when sorting
    /// is disabled, reversed under `--tac`).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<MatchedItem> {
        if index >= self.count {
            return None;
        }
        if !self.sorted {
            let index = if self.tac { self.count - 1 - index } else { index };
            let mut base = 0;
            for list in &self.lists {
                if index < base + list.len() {
                    return Some(list[index - base].clone());
                }
                base += list.len();
            }
            return None;
        }

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        while state.merged.len() <= index {
            // Advance the cursor of the list with the smallest head.
            let mut best: Option<(usize, &MatchedItem)> = None;
            for (li, list) in self.lists.iter().enumerate() {
                if let Some(head) = list.get(state.cursors[li])
                    && best.is_none_or(|(_, b)| head < b)
                {
                    best = Some((li, head));
                }
            }
            let (li, head) = best?;
            let head = head.clone();
            state.cursors[li] += 1;
            state.merged.push(head);
        }
        state.merged.get(index).cloned()
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::empty(false)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::item::{Item, ItemBuilder};
    use std::sync::Arc;

    fn item(index: u32) -> Arc<Item> {
        Arc::new(
            ItemBuilder::new()
                .build(format!("item-{index}").as_bytes(), index)
                .unwrap_or_else(|| panic!("rejected")),
        )
    }

    fn matched(score: i32, index: u32) -> MatchedItem {
        let idx = i32::try_from(index).unwrap_or(i32::MAX);
        MatchedItem {
            item: item(index),
            rank: [-score, 0, 0, 0, idx],
            offsets: Vec::new(),
        }
    }

    fn indices(merger: &Merger) -> Vec<u32> {
        (0..merger.len())
            .filter_map(|i| merger.get(i).map(|m| m.item.index()))
            .collect()
    }

    #[test]
    fn test_empty_merger() {
        let merger = Merger::empty(true);
        assert_eq!(merger.len(), 0);
        assert!(merger.is_empty());
        assert!(merger.is_final());
        assert!(merger.get(0).is_none());
    }

    #[test]
    fn test_sorted_merge_across_slices() {
        let a = vec![matched(90, 0), matched(50, 2), matched(10, 4)];
        let b = vec![matched(70, 1), matched(30, 3)];
        let merger = Merger::new(vec![a, b], true, false, false);
        assert_eq!(indices(&merger), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_unsorted_concatenates_in_order() {
        let a = vec![matched(1, 0), matched(9, 1)];
        let b = vec![matched(5, 2)];
        let merger = Merger::new(vec![a, b], false, false, false);
        assert_eq!(indices(&merger), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsorted_tac_reverses() {
        let a = vec![matched(1, 0), matched(9, 1)];
        let b = vec![matched(5, 2)];
        let merger = Merger::new(vec![a, b], false, true, false);
        assert_eq!(indices(&merger), vec![2, 1, 0]);
    }

    #[test]
    fn test_lazy_merge_beyond_eager_limit() {
        // Two interleaved slices big enough to bypass the eager path.
        let a: Vec<MatchedItem> = (0..700).map(|i| matched(10_000 - i, u32::try_from(i * 2).unwrap_or(0))).collect();
        let b: Vec<MatchedItem> = (0..700).map(|i| matched(10_000 - i, u32::try_from(i * 2 + 1).unwrap_or(0))).collect();
        let merger = Merger::new(vec![a, b], true, false, true);
        assert_eq!(merger.len(), 1400);
        // Equal scores break by index, so the head alternates slices.
        assert_eq!(merger.get(0).map(|m| m.item.index()), Some(0));
        assert_eq!(merger.get(1).map(|m| m.item.index()), Some(1));
        assert_eq!(merger.get(2).map(|m| m.item.index()), Some(2));
        // Random access far down the list works without full iteration.
        assert!(merger.get(1399).is_some());
        assert!(merger.get(1400).is_none());
    }

    #[test]
    fn test_deterministic_iteration() {
        let make = || {
            let a = vec![matched(90, 0), matched(50, 2)];
            let b = vec![matched(70, 1), matched(50, 3)];
            Merger::new(vec![a, b], true, false, false)
        };
        assert_eq!(indices(&make()), indices(&make()));
    }
}
