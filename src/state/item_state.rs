/// Work item state definitions for tracking crawl progress
///
/// This module defines every state an address passes through during a run.
use std::fmt;

/// Represents the current state of a work item in the crawl process
///
/// The only legal paths are `Discovered → Claimed → Fetched → Done` and
/// `Discovered → Claimed → Failed`. An item whose claim is refused is dropped
/// while still `Discovered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    // ===== Active States =====
    /// Address has been found and queued but not yet claimed
    Discovered,

    /// Address has been claimed by exactly one worker
    Claimed,

    /// Primary document was fetched and is being archived and parsed
    Fetched,

    // ===== Terminal States =====
    /// Transport or storage failed; the item is dropped without retry
    Failed,

    /// Archived and link-extracted
    Done,
}

impl ItemState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Done)
    }

    /// Returns true if this state is owned by a worker
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Claimed | Self::Fetched)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        matches!(
            (self, next),
            (Self::Discovered, Self::Claimed)
                | (Self::Claimed, Self::Fetched)
                | (Self::Claimed, Self::Failed)
                | (Self::Fetched, Self::Done)
                | (Self::Fetched, Self::Failed)
        )
    }

    /// Short lowercase label used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Claimed => "claimed",
            Self::Fetched => "fetched",
            Self::Failed => "failed",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an item ended in `ItemState::Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// No complete response within the request timeout
    Timeout,
    /// The proxy or the hidden service refused the connection
    Refused,
    /// Malformed or aborted response
    Protocol,
    /// Response with a non-2xx status
    Status,
    /// The primary document could not be written to the archive
    Storage,
}

impl FailureKind {
    /// Short lowercase label used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Refused => "refused",
            Self::Protocol => "protocol",
            Self::Status => "status",
            Self::Storage => "storage",
        }
    }

    /// Returns all failure kinds in report order
    pub fn all() -> [Self; 5] {
        [
            Self::Timeout,
            Self::Refused,
            Self::Protocol,
            Self::Status,
            Self::Storage,
        ]
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
