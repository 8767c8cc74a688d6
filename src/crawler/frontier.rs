//! Shared work queue of discovered addresses

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

/// A discovered address waiting to be claimed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Canonical address
    pub address: Url,
    /// Page the address was found on; `None` for seeds
    pub referrer: Option<Url>,
    /// Link hops from the nearest seed
    pub depth: u32,
}

impl WorkItem {
    /// A seed address at depth zero
    pub fn seed(address: Url) -> Self {
        Self {
            address,
            referrer: None,
            depth: 0,
        }
    }

    /// An address discovered on `referrer`, one hop deeper than it
    pub fn discovered(address: Url, referrer: &WorkItem) -> Self {
        Self {
            address,
            referrer: Some(referrer.address.clone()),
            depth: referrer.depth + 1,
        }
    }
}

/// FIFO queue shared by the dispatcher and every worker
///
/// The queue may hold the same address more than once; duplicates are
/// resolved when the dispatcher claims them.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: Mutex<VecDeque<WorkItem>>,
    pushed: AtomicUsize,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item to the back of the queue
    pub fn push(&self, item: WorkItem) {
        self.lock().push_back(item);
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Appends several items in order
    pub fn extend(&self, items: impl IntoIterator<Item = WorkItem>) {
        let mut queue = self.lock();
        let before = queue.len();
        queue.extend(items);
        self.pushed
            .fetch_add(queue.len() - before, Ordering::Relaxed);
    }

    /// Removes the oldest item
    pub fn pop(&self) -> Option<WorkItem> {
        self.lock().pop_front()
    }

    /// Discards everything still queued and returns how many items were dropped
    pub fn clear(&self) -> usize {
        let mut queue = self.lock();
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total number of items ever pushed
    pub fn total_pushed(&self) -> usize {
        self.pushed.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<WorkItem>> {
        // No operation here leaves the deque partially updated
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
