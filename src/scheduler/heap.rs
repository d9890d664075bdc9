//! Binary min-heap keyed by an extracted sort key.
//!
//! Backs both scheduler queues: the sleep queue orders by start time and
//! the ready queue orders by deadline. Ties fall back to insertion id so
//! equal keys pop first-in first-out.

/// Sort key: a millisecond timestamp plus a tie-breaking sequence number.
pub type HeapKey = (f64, u64);

/// Min-heap over `T`, ordered by `key(item)`.
pub struct Heap<T> {
    nodes: Vec<T>,
    key: fn(&T) -> HeapKey,
}

fn less(a: HeapKey, b: HeapKey) -> bool {
    match a.0.total_cmp(&b.0) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => a.1 < b.1,
    }
}

impl<T> Heap<T> {
    /// Create an empty heap ordered by `key`.
    pub fn new(key: fn(&T) -> HeapKey) -> Self {
        Self {
            nodes: Vec::new(),
            key,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Smallest item, if any.
    pub fn peek(&self) -> Option<&T> {
        self.nodes.first()
    }

    /// Insert an item and sift it up.
    pub fn push(&mut self, node: T) {
        self.nodes.push(node);
        self.sift_up(self.nodes.len() - 1);
    }

    /// Remove and return the smallest item.
    pub fn pop(&mut self) -> Option<T> {
        if self.nodes.is_empty() {
            return None;
        }
        let last = self.nodes.len() - 1;
        self.nodes.swap(0, last);
        let top = self.nodes.pop();
        self.sift_down(0);
        top
    }

    fn weight(&self, index: usize) -> HeapKey {
        (self.key)(&self.nodes[index])
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) >> 1;
            if less(self.weight(index), self.weight(parent)) {
                self.nodes.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.nodes.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;
            if left < len && less(self.weight(left), self.weight(smallest)) {
                smallest = left;
            }
            if right < len && less(self.weight(right), self.weight(smallest)) {
                smallest = right;
            }
            if smallest == index {
                return;
            }
            self.nodes.swap(index, smallest);
            index = smallest;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn by_value(item: &(f64, u64)) -> HeapKey {
        *item
    }

    #[test]
    fn test_pop_order() {
        let mut heap = Heap::new(by_value);
        for (i, w) in [5.0, 1.0, 4.0, 1.0, 3.0].into_iter().enumerate() {
            heap.push((w, i as u64));
        }
        assert_eq!(heap.len(), 5);
        assert_eq!(heap.peek(), Some(&(1.0, 1)));

        let popped: Vec<_> = std::iter::from_fn(|| heap.pop()).collect();
        assert_eq!(
            popped,
            vec![(1.0, 1), (1.0, 3), (3.0, 4), (4.0, 2), (5.0, 0)]
        );
        assert!(heap.is_empty());
        assert_eq!(heap.pop(), None);
    }

    proptest! {
        #[test]
        fn prop_heap_pops_sorted(weights in proptest::collection::vec(-1000i32..1000, 0..64)) {
            let mut heap = Heap::new(by_value);
            for (i, w) in weights.iter().enumerate() {
                heap.push((*w as f64, i as u64));
            }
            let mut last: Option<HeapKey> = None;
            while let Some(item) = heap.pop() {
                if let Some(prev) = last {
                    prop_assert!(!less(item, prev));
                }
                last = Some(item);
            }
        }
    }
}
