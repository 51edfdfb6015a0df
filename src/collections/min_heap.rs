// src/collections/min_heap.rs
//! Binary min-heap with an explicit comparison strategy
//!
//! Element 0 is always the minimum under the heap's comparator. Unlike
//! [`std::collections::BinaryHeap`] the comparator is a value supplied at
//! construction, arbitrary elements can be removed by index or by
//! comparison-equality, and iteration exposes the backing array order.
//!
//! ```text
//!            [0]
//!          /     \
//!       [1]       [2]        parent(i) = (i - 1) / 2
//!      /   \     /   \       left(i)   = 2i + 1
//!    [3]  [4]  [5]  [6]      right(i)  = 2i + 2
//! ```

use std::cmp::Ordering;
use std::fmt;

/// Comparator used when `T: Ord`
pub type OrdComparator<T> = fn(&T, &T) -> Ordering;

/// Binary min-heap ordered by `C`
pub struct MinHeap<T, C = OrdComparator<T>>
where
    C: Fn(&T, &T) -> Ordering,
{
    items: Vec<T>,
    compare: C,
}

impl<T: Ord> MinHeap<T> {
    /// Create an empty heap ordered by `T`'s total order
    pub fn new() -> Self {
        Self::with_comparator(T::cmp)
    }

    /// Create an empty heap with room for `capacity` elements
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_comparator(capacity, T::cmp)
    }
}

impl<T: Ord> Default for MinHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> MinHeap<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    /// Create an empty heap ordered by `compare`
    ///
    /// The comparator must be a total order: `Less` places the left operand
    /// closer to the top.
    pub fn with_comparator(compare: C) -> Self {
        Self {
            items: Vec::new(),
            compare,
        }
    }

    pub fn with_capacity_and_comparator(capacity: usize, compare: C) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            compare,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Smallest element, if any
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Alias of [`MinHeap::peek`]
    pub fn top(&self) -> Option<&T> {
        self.peek()
    }

    /// Insert an element, O(log n) amortized
    pub fn push(&mut self, value: T) {
        if self.items.len() == self.items.capacity() {
            let grow = self.items.capacity().max(4);
            self.items.reserve_exact(grow);
        }
        self.items.push(value);
        let last = self.items.len() - 1;
        self.sift_up(last);
    }

    /// Alias of [`MinHeap::push`]
    pub fn add(&mut self, value: T) {
        self.push(value);
    }

    /// Remove and return the smallest element
    pub fn pop(&mut self) -> Option<T> {
        self.remove_at(0)
    }

    /// Alias of [`MinHeap::pop`]
    pub fn remove_top(&mut self) -> Option<T> {
        self.pop()
    }

    /// Remove the element stored at `index` in the backing array
    ///
    /// Returns `None` when `index` is out of bounds.
    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }

        let removed = self.items.swap_remove(index);
        if index < self.items.len() {
            // The moved tail element may belong above or below `index`
            let settled = self.sift_down(index);
            self.sift_up(settled);
        }
        Some(removed)
    }

    /// Index of the first element comparing equal to `item`
    pub fn position(&self, item: &T) -> Option<usize> {
        self.items
            .iter()
            .position(|candidate| (self.compare)(candidate, item) == Ordering::Equal)
    }

    /// Linear scan by comparator equality, not identity
    pub fn contains(&self, item: &T) -> bool {
        self.position(item).is_some()
    }

    /// Remove the first element comparing equal to `item`
    pub fn remove(&mut self, item: &T) -> bool {
        match self.position(item) {
            Some(index) => self.remove_at(index).is_some(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate in backing-array order (not sorted)
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Backing array as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Drain the heap in ascending order
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        let mut sorted = Vec::with_capacity(self.items.len());
        while let Some(item) = self.pop() {
            sorted.push(item);
        }
        sorted
    }

    fn less(&self, a: usize, b: usize) -> bool {
        (self.compare)(&self.items[a], &self.items[b]) == Ordering::Less
    }

    fn sift_up(&mut self, mut child: usize) -> usize {
        while child > 0 {
            let parent = (child - 1) / 2;
            if !self.less(child, parent) {
                break;
            }
            self.items.swap(child, parent);
            child = parent;
        }
        child
    }

    fn sift_down(&mut self, mut parent: usize) -> usize {
        let len = self.items.len();
        loop {
            let left = 2 * parent + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let smallest = if right < len && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(smallest, parent) {
                break;
            }
            self.items.swap(parent, smallest);
            parent = smallest;
        }
        parent
    }
}

impl<'a, T, C> IntoIterator for &'a MinHeap<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: fmt::Debug, C> fmt::Debug for MinHeap<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinHeap").field("items", &self.items).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_heap_property<T, C>(heap: &MinHeap<T, C>)
    where
        C: Fn(&T, &T) -> Ordering,
    {
        let items = heap.as_slice();
        for child in 1..items.len() {
            let parent = (child - 1) / 2;
            assert_ne!(
                (heap.compare)(&items[child], &items[parent]),
                Ordering::Less,
                "child {} sorts before parent {}",
                child,
                parent
            );
        }
    }

    #[test]
    fn test_push_pop_ascending() {
        let mut heap = MinHeap::new();
        for value in [5, 3, 8, 1, 9, 2] {
            heap.push(value);
        }
        assert_eq!(heap.peek(), Some(&1));
        assert_eq!(heap.into_sorted_vec(), vec![1, 2, 3, 5, 8, 9]);
    }

    #[test]
    fn test_custom_comparator_max_heap() {
        let mut heap = MinHeap::with_comparator(|a: &i32, b: &i32| b.cmp(a));
        for value in [4, 10, 7] {
            heap.add(value);
        }
        assert_eq!(heap.remove_top(), Some(10));
        assert_eq!(heap.top(), Some(&7));
    }

    #[test]
    fn test_remove_at_keeps_heap_property() {
        let mut heap = MinHeap::new();
        for value in [1, 10, 2, 11, 12, 3, 4] {
            heap.push(value);
        }
        // Removing a deep node pulls the tail element into its place
        assert!(heap.remove_at(4).is_some());
        assert_heap_property(&heap);
        assert_eq!(heap.len(), 6);
        assert!(heap.remove_at(99).is_none());
    }

    #[test]
    fn test_contains_and_remove_by_comparator_equality() {
        // Ordered by key only, so equality ignores the payload
        let mut heap = MinHeap::with_comparator(|a: &(u32, char), b: &(u32, char)| a.0.cmp(&b.0));
        heap.push((3, 'c'));
        heap.push((1, 'a'));

        assert!(heap.contains(&(3, 'z')));
        assert!(heap.remove(&(3, 'y')));
        assert!(!heap.contains(&(3, 'c')));
        assert!(!heap.remove(&(42, 'm')));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_iteration_is_array_order() {
        let mut heap = MinHeap::new();
        for value in [3, 2, 1] {
            heap.push(value);
        }
        let seen: Vec<_> = heap.iter().copied().collect();
        assert_eq!(seen, heap.as_slice());
        assert_eq!(seen[0], 1);
    }

    #[test]
    fn test_capacity_grows() {
        let mut heap = MinHeap::with_capacity(2);
        for value in 0..64 {
            heap.push(value);
        }
        assert!(heap.capacity() >= 64);
        heap.clear();
        assert!(heap.is_empty());
    }

    proptest! {
        #[test]
        fn prop_top_is_minimum(values in proptest::collection::vec(any::<i64>(), 1..200), pops in 0usize..50) {
            let mut heap = MinHeap::new();
            for value in &values {
                heap.push(*value);
            }
            let mut remaining = values.clone();
            remaining.sort();
            for _ in 0..pops.min(values.len() - 1) {
                let popped = heap.pop().unwrap();
                prop_assert_eq!(popped, remaining.remove(0));
            }
            let top = *heap.peek().unwrap();
            prop_assert!(heap.iter().all(|v| top <= *v));
            assert_heap_property(&heap);
        }

        #[test]
        fn prop_remove_at_preserves_order(values in proptest::collection::vec(0u16..1000, 2..100), index in any::<prop::sample::Index>()) {
            let mut heap = MinHeap::new();
            for value in &values {
                heap.push(*value);
            }
            let target = index.index(heap.len());
            heap.remove_at(target);
            assert_heap_property(&heap);
            let sorted = heap.into_sorted_vec();
            prop_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
