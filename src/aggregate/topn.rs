//! Bounded top-N selector: keep only the N slowest statements seen,
//! in O(log N) per insertion and O(N) memory.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::record::LogRecord;

/// One candidate: a record and its statement duration.
#[derive(Debug, Clone)]
pub struct SlowEntry {
    pub record: LogRecord,
    pub duration_ms: f64,
}

impl PartialEq for SlowEntry {
    fn eq(&self, other: &Self) -> bool {
        self.duration_ms.total_cmp(&other.duration_ms) == Ordering::Equal
    }
}

impl Eq for SlowEntry {}

impl PartialOrd for SlowEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SlowEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.duration_ms.total_cmp(&other.duration_ms)
    }
}

/// Fixed-capacity min-heap over statement durations.
///
/// Under capacity every entry is pushed; at capacity a new entry replaces
/// the current minimum only when it is slower.
#[derive(Debug)]
pub struct TopN {
    capacity: usize,
    heap: BinaryHeap<std::cmp::Reverse<SlowEntry>>,
}

impl TopN {
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 { 10 } else { capacity };
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, entry: SlowEntry) {
        if self.heap.len() < self.capacity {
            self.heap.push(std::cmp::Reverse(entry));
        } else if let Some(min) = self.heap.peek()
            && entry.duration_ms > min.0.duration_ms
        {
            self.heap.pop();
            self.heap.push(std::cmp::Reverse(entry));
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Retained entries, slowest first.
    pub fn into_sorted(self) -> Vec<SlowEntry> {
        let mut entries: Vec<SlowEntry> = self.heap.into_iter().map(|r| r.0).collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }
}
