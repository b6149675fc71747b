//! Per-worker memo of recently observed key presence.

use std::collections::VecDeque;

/// Last known presence of a handful of keys, as seen by one worker.
///
/// Not authoritative: other workers' writes are invisible here. The adapter
/// only trusts a "known absent" answer, and only to skip the read that
/// immediately follows this worker's own delete or miss.
///
/// Last write wins, nothing expires, and once `capacity` keys are remembered
/// the oldest one is forgotten.
#[derive(Debug)]
pub struct StatusCache {
    entries: VecDeque<(String, bool)>,
    capacity: usize,
}

impl StatusCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        StatusCache {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Overwrite the memo for `key`.
    pub fn record(&mut self, key: &str, present: bool) {
        if let Some(pos) = self.entries.iter().position(|(k, _)| k == key) {
            self.entries.remove(pos);
        } else if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key.to_string(), present));
    }

    /// Memo for exactly `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, present)| *present)
    }

    pub fn is_known_absent(&self, key: &str) -> bool {
        self.lookup(key) == Some(false)
    }

    pub fn forget(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
