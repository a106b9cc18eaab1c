//! The multi-select set.
//!
//! Selection order is part of the output contract: items are emitted
//! in the chronological order of the toggle operations that last left
//! them selected, so each entry carries a monotonically increasing
//! sequence number.

use std::collections::HashMap;
use std::sync::Arc;

use crate::item::Item;

struct Entry {
    item: Arc<Item>,
    selected_at: u64,
}

/// Item-index-keyed selection set.
#[derive(Default)]
pub struct Selection {
    entries: HashMap<u32, Entry>,
    seq: u64,
}

impl Selection {
    /// Creates an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles `item`; returns `true` when it is now selected.
    pub fn toggle(&mut self, item: &Arc<Item>) -> bool {
        let index = item.index();
        if self.entries.remove(&index).is_some() {
            return false;
        }
        self.seq += 1;
        self.entries.insert(
            index,
            Entry {
                item: Arc::clone(item),
                selected_at: self.seq,
            },
        );
        true
    }

    /// Selects `item` if it is not already selected.
    pub fn select(&mut self, item: &Arc<Item>) {
        if !self.entries.contains_key(&item.index()) {
            self.toggle(item);
        }
    }

    /// Deselects `item`.
    pub fn deselect(&mut self, item: &Arc<Item>) {
        self.entries.remove(&item.index());
    }

    /// `true` when the item at `index` is selected.
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.entries.contains_key(&index)
    }

    /// Number of selected items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every selection.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Selected items in chronological selection order.
    #[must_use]
    pub fn in_order(&self) -> Vec<Arc<Item>> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.selected_at);
        entries.iter().map(|e| Arc::clone(&e.item)).collect()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::item::ItemBuilder;

    fn item(index: u32) -> Arc<Item> {
        Arc::new(
            ItemBuilder::new()
                .build(format!("item-{index}").as_bytes(), index)
                .unwrap_or_else(|| panic!("rejected")),
        )
    }

    #[test]
    fn test_toggle_in_and_out() {
        let mut sel = Selection::new();
        let a = item(0);
        assert!(sel.toggle(&a));
        assert!(sel.contains(0));
        assert!(!sel.toggle(&a));
        assert!(sel.is_empty());
    }

    #[test]
    fn test_output_order_is_selection_order() {
        let mut sel = Selection::new();
        let (a, b, c) = (item(5), item(1), item(9));
        sel.toggle(&b);
        sel.toggle(&c);
        sel.toggle(&a);
        let order: Vec<u32> = sel.in_order().iter().map(|i| i.index()).collect();
        assert_eq!(order, vec![1, 9, 5]);
    }

    #[test]
    fn test_retoggle_moves_to_back() {
        // Deselecting and reselecting updates the timestamp: the item
        // is ordered by the toggle that last left it selected.
        let mut sel = Selection::new();
        let (a, b) = (item(1), item(2));
        sel.toggle(&a);
        sel.toggle(&b);
        sel.toggle(&a);
        sel.toggle(&a);
        let order: Vec<u32> = sel.in_order().iter().map(|i| i.index()).collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn test_select_is_idempotent() {
        let mut sel = Selection::new();
        let a = item(3);
        sel.select(&a);
        sel.select(&a);
        assert_eq!(sel.len(), 1);
        sel.deselect(&a);
        assert!(sel.is_empty());
    }
}
