//! A priority-indexed pending queue for cells that returned
//! [`super::Response::Delay`].
//!
//! Grounded on `dfir_rs::util::indexed_queue::IndexedQueue`: entries are
//! bucketed by an index (here, the priority pass a handler asked for)
//! and popped highest-index-first, so [`crate::eval::Engine::eval`] can
//! drain one priority level completely before admitting a lower one,
//! matching spec.md §5's "re-enqueue ... at a higher priority pass".

use std::collections::VecDeque;

#[derive(Default)]
pub struct DelayQueue<T> {
    buckets: Vec<VecDeque<T>>,
}

impl<T> DelayQueue<T> {
    pub fn new() -> Self {
        Self { buckets: Vec::new() }
    }

    pub fn push(&mut self, priority: u32, item: T) {
        let idx = priority as usize;
        if self.buckets.len() <= idx {
            self.buckets.resize_with(idx + 1, VecDeque::new);
        }
        self.buckets[idx].push_back(item);
    }

    /// Removes and returns one item from the highest nonempty bucket,
    /// along with that bucket's priority.
    pub fn pop(&mut self) -> Option<(u32, T)> {
        for (idx, bucket) in self.buckets.iter_mut().enumerate().rev() {
            if let Some(item) = bucket.pop_front() {
                return Some((idx as u32, item));
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_highest_priority_first() {
        let mut q = DelayQueue::new();
        q.push(0, "low");
        q.push(5, "high");
        q.push(2, "mid");
        assert_eq!(q.pop(), Some((5, "high")));
        assert_eq!(q.pop(), Some((2, "mid")));
        assert_eq!(q.pop(), Some((0, "low")));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn preserves_fifo_within_a_bucket() {
        let mut q = DelayQueue::new();
        q.push(1, "a");
        q.push(1, "b");
        assert_eq!(q.pop(), Some((1, "a")));
        assert_eq!(q.pop(), Some((1, "b")));
    }
}
