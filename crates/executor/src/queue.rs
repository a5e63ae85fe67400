//! Priority-ordered pending queue.
//!
//! Entries are kept in non-increasing priority order. Entries with equal
//! priority keep their insertion order, so the front of the queue is always
//! the oldest entry of the highest priority present.

use std::collections::VecDeque;

use crate::task::Priority;

/// Anything that can sit in a [`PendingQueue`].
pub trait Prioritized {
    fn priority(&self) -> Priority;
}

/// Stable priority queue backed by a `VecDeque` with linear-scan insertion.
///
/// Pending depths are expected to be small and bursty, so insertion is O(n)
/// in the worst case and O(1) for the common "equal or lowest" case.
#[derive(Debug)]
pub struct PendingQueue<T> {
    entries: VecDeque<T>,
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<T: Prioritized> PendingQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry behind everything of equal or higher priority.
    pub fn insert(&mut self, entry: T) {
        let priority = entry.priority();

        match self.entries.back() {
            None => self.entries.push_back(entry),
            Some(last) if priority <= last.priority() => self.entries.push_back(entry),
            Some(_) => {
                match self.entries.iter().position(|e| e.priority() < priority) {
                    Some(idx) => self.entries.insert(idx, entry),
                    None => self.entries.push_back(entry),
                }
            }
        }
    }

    /// Remove and return the highest-priority entry.
    pub fn pop_front(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    /// Remove every entry, front to back.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.drain(..)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        id: &'static str,
        priority: Priority,
    }

    impl Prioritized for Entry {
        fn priority(&self) -> Priority {
            self.priority
        }
    }

    fn entry(id: &'static str, priority: Priority) -> Entry {
        Entry { id, priority }
    }

    fn ids(queue: &PendingQueue<Entry>) -> Vec<&'static str> {
        queue.iter().map(|e| e.id).collect()
    }

    fn assert_non_increasing(queue: &PendingQueue<Entry>) {
        let priorities: Vec<Priority> = queue.iter().map(|e| e.priority).collect();
        for pair in priorities.windows(2) {
            assert!(pair[0] >= pair[1], "queue out of order: {:?}", priorities);
        }
    }

    #[test]
    fn empty_queue_appends() {
        let mut queue = PendingQueue::new();
        assert!(queue.is_empty());
        queue.insert(entry("a", 3));
        assert_eq!(ids(&queue), vec!["a"]);
    }

    #[test]
    fn equal_priority_keeps_submission_order() {
        let mut queue = PendingQueue::new();
        queue.insert(entry("a", 0));
        queue.insert(entry("b", 0));
        queue.insert(entry("c", 0));
        assert_eq!(ids(&queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn lower_priority_goes_to_back() {
        let mut queue = PendingQueue::new();
        queue.insert(entry("a", 5));
        queue.insert(entry("b", -1));
        assert_eq!(ids(&queue), vec!["a", "b"]);
    }

    #[test]
    fn higher_priority_jumps_ahead_of_lower_only() {
        let mut queue = PendingQueue::new();
        queue.insert(entry("a", 5));
        queue.insert(entry("b", 5));
        queue.insert(entry("c", 1));
        queue.insert(entry("d", 0));
        queue.insert(entry("e", 3));
        assert_eq!(ids(&queue), vec!["a", "b", "e", "c", "d"]);
        assert_non_increasing(&queue);
    }

    #[test]
    fn new_highest_goes_to_front() {
        let mut queue = PendingQueue::new();
        queue.insert(entry("a", 0));
        queue.insert(entry("b", 0));
        queue.insert(entry("c", 9));
        assert_eq!(ids(&queue), vec!["c", "a", "b"]);
    }

    #[test]
    fn mixed_sequence_stays_sorted_and_stable() {
        let mut queue = PendingQueue::new();
        let inputs = [
            ("t0", 0),
            ("t1", 0),
            ("t2", 5),
            ("t3", 0),
            ("t4", 0),
            ("t5", 5),
            ("t6", -2),
            ("t7", 2),
        ];
        for (id, p) in inputs {
            queue.insert(entry(id, p));
        }
        assert_eq!(
            ids(&queue),
            vec!["t2", "t5", "t7", "t0", "t1", "t3", "t4", "t6"]
        );
        assert_non_increasing(&queue);
    }

    #[test]
    fn pop_front_and_drain() {
        let mut queue = PendingQueue::new();
        queue.insert(entry("low", 0));
        queue.insert(entry("high", 1));
        assert_eq!(queue.pop_front().map(|e| e.id), Some("high"));
        assert_eq!(queue.len(), 1);

        let drained: Vec<_> = queue.drain().map(|e| e.id).collect();
        assert_eq!(drained, vec!["low"]);
        assert!(queue.pop_front().is_none());
    }
}
