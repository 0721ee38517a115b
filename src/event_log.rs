use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Append-only window that keeps only the most recent `capacity` entries.
/// Capacity is at least 1, including after deserializing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredLog<T>", bound(deserialize = "T: Deserialize<'de>"))]
pub struct BoundedLog<T> {
    capacity: usize,
    entries: VecDeque<T>,
}

#[derive(Deserialize)]
struct StoredLog<T> {
    capacity: usize,
    entries: VecDeque<T>,
}

impl<T> From<StoredLog<T>> for BoundedLog<T> {
    fn from(stored: StoredLog<T>) -> Self {
        let mut log = Self {
            capacity: 1,
            entries: stored.entries,
        };
        log.set_capacity(stored.capacity);
        log
    }
}

impl<T> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, entry: T) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops the oldest entries if the new capacity is smaller.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }
}

impl<T: Clone> BoundedLog<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}
