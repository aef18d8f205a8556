use std::collections::VecDeque;

pub const HISTORY_CAPACITY: usize = 5;

/// Most-recent-first list of generated artifacts holding at most
/// [`HISTORY_CAPACITY`] entries.
#[derive(Debug, Clone)]
pub struct HistoryRing<T> {
    items: VecDeque<T>,
}

impl<T> Default for HistoryRing<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }
}

impl<T> HistoryRing<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts at the head and returns the evicted tail, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        self.items.push_front(item);
        if self.items.len() > HISTORY_CAPACITY {
            return self.items.pop_back();
        }
        None
    }

    pub fn list(&self) -> impl ExactSizeIterator<Item = &T> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{HistoryRing, HISTORY_CAPACITY};

    #[test]
    fn sixth_push_evicts_the_oldest() {
        let mut ring = HistoryRing::new();
        let mut evicted = Vec::new();
        for item in ["A", "B", "C", "D", "E", "F"] {
            if let Some(dropped) = ring.push(item) {
                evicted.push(dropped);
            }
        }
        assert_eq!(ring.list().copied().collect::<Vec<_>>(), vec!["F", "E", "D", "C", "B"]);
        assert_eq!(evicted, vec!["A"]);
        assert_eq!(ring.latest(), Some(&"F"));
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut ring = HistoryRing::new();
        for idx in 0..20 {
            ring.push(idx);
            assert!(ring.len() <= HISTORY_CAPACITY);
        }
        assert_eq!(ring.list().copied().collect::<Vec<_>>(), vec![19, 18, 17, 16, 15]);
    }

    #[test]
    fn identical_items_are_all_kept() {
        let mut ring = HistoryRing::new();
        ring.push("same");
        ring.push("same");
        assert_eq!(ring.len(), 2);
    }
}
