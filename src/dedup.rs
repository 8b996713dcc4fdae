//! Bounded insertion-ordered dedup window.
//!
//! History replay followed by live tailing can hand the engine a line it has
//! already processed: checkpoint granularity is line-based, and a rotation
//! restart rereads the live file from offset 0. [`UniqueWindow`] makes
//! re-application idempotent without a full persisted dedup index by
//! remembering the last N admitted items.
//!
//! # Guarantees
//!
//! The window is a heuristic bound, not a proof: an overlap longer than the
//! capacity could readmit an old item as new. The capacity only needs to
//! span the practical replay/tail overlap (the engine uses 200 entries for
//! ingest dedup). The same container backs the bounded most-recent-first
//! display histories, which want identical suppress-and-evict behavior at a
//! smaller capacity.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// A bounded FIFO of unique items with O(1) membership checks.
///
/// Newest items sit at the front; when full, admitting a new item evicts the
/// oldest and frees its membership. Iteration yields most-recent-first.
#[derive(Debug, Clone)]
pub struct UniqueWindow<T> {
    capacity: usize,
    items: VecDeque<T>,
    seen: HashSet<T>,
}

impl<T: Eq + Hash + Clone> UniqueWindow<T> {
    /// Creates a window holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be at least 1");
        UniqueWindow {
            capacity,
            items: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Admits `item` unless it is already in the window.
    ///
    /// Returns true if the item was newly admitted, false if it was a
    /// duplicate (and was ignored). Admitting into a full window evicts the
    /// oldest item, which then counts as unseen again.
    pub fn offer(&mut self, item: T) -> bool {
        if self.seen.contains(&item) {
            return false;
        }
        if self.items.len() >= self.capacity {
            if let Some(oldest) = self.items.pop_back() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(item.clone());
        self.items.push_front(item);
        true
    }

    /// Removes `item` from the window if present. Returns true if removed.
    pub fn remove(&mut self, item: &T) -> bool {
        if !self.seen.remove(item) {
            return false;
        }
        if let Some(pos) = self.items.iter().position(|x| x == item) {
            self.items.remove(pos);
        }
        true
    }

    pub fn contains(&self, item: &T) -> bool {
        self.seen.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates items most-recent-first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}
