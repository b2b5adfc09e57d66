//! Bounded MFT record cache, capped because a full recovery scan touches
//! every record in the table.
//!
//! Simple insertion-order eviction; re-decoding an evicted record yields
//! identical bytes regardless (the image is read-only), so eviction
//! never affects correctness, only how much memory a full recovery
//! scan retains.

use std::collections::{HashMap, VecDeque};

use crate::domain::MftRecord;

const DEFAULT_CAPACITY: usize = 4096;

pub struct RecordCache {
    capacity: usize,
    map: HashMap<u64, MftRecord>,
    order: VecDeque<u64>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, index: u64) -> Option<&MftRecord> {
        self.map.get(&index)
    }

    /// First decode wins; callers only insert after a `get` miss, so
    /// this never overwrites a live entry in practice.
    pub fn insert(&mut self, index: u64, record: MftRecord) {
        if !self.map.contains_key(&index) {
            if self.map.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.map.remove(&oldest);
                }
            }
            self.order.push_back(index);
        }
        self.map.insert(index, record);
    }
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new()
    }
}
