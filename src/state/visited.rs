//! Run-scoped registry of claimed addresses
//!
//! `VisitedSet::claim` is the single admission point into the crawl: a worker
//! may only fetch an address after winning its claim.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use url::Url;

/// Claim state of an address that has entered the visited set
///
/// Absence from the set is the "unclaimed" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    Claimed,
    Done,
}

/// Concurrency-safe set of addresses claimed during one crawl run
///
/// Backed by a sharded concurrent map so claims on different addresses rarely
/// contend; claims on the same address are linearized by the shard lock. The
/// set never shrinks during a run.
#[derive(Debug, Default)]
pub struct VisitedSet {
    entries: DashMap<Url, ClaimState>,
}

impl VisitedSet {
    /// Creates an empty visited set
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims an address
    ///
    /// Returns `true` for exactly one caller per address; every later or
    /// concurrent caller gets `false`. The address must already be canonical.
    pub fn claim(&self, address: &Url) -> bool {
        match self.entries.entry(address.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ClaimState::Claimed);
                true
            }
        }
    }

    /// Marks a claimed address as finished
    ///
    /// Bookkeeping only; it does not affect admission. Returns `false` if the
    /// address was never claimed.
    pub fn mark_done(&self, address: &Url) -> bool {
        match self.entries.get_mut(address) {
            Some(mut state) => {
                *state = ClaimState::Done;
                true
            }
            None => false,
        }
    }

    /// Returns the claim state of an address, or `None` if unclaimed
    pub fn state(&self, address: &Url) -> Option<ClaimState> {
        self.entries.get(address).map(|entry| *entry.value())
    }

    /// Returns true if the address has been claimed (whether or not it is done)
    pub fn contains(&self, address: &Url) -> bool {
        self.entries.contains_key(address)
    }

    /// Number of claimed addresses
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been claimed yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of addresses marked done
    pub fn done_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| *entry.value() == ClaimState::Done)
            .count()
    }
}
