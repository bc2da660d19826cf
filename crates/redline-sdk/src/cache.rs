//! Bounded diff cache.
//!
//! A diff depends on the two forests and names the two documents it
//! compares, so entries are keyed by both document ids and both forest
//! content digests. Eviction is first-in first-out.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use uuid::Uuid;

use redline_diff::StructuralDiff;
use redline_types::Digest;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DiffKey {
    pub left_id: Uuid,
    pub right_id: Uuid,
    pub left_digest: Digest,
    pub right_digest: Digest,
}

#[derive(Debug, Default)]
pub struct DiffCache {
    capacity: usize,
    entries: HashMap<DiffKey, Arc<StructuralDiff>>,
    order: VecDeque<DiffKey>,
}

impl DiffCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &DiffKey) -> Option<Arc<StructuralDiff>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: DiffKey, diff: Arc<StructuralDiff>) {
        if self.capacity == 0 || self.entries.contains_key(&key) {
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key);
        self.entries.insert(key, diff);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
