//! State module for tracking crawl progress
//!
//! This module provides the run-scoped state shared by the scheduler and its
//! workers.
//!
//! # Components
//!
//! - `ItemState`: Lifecycle of a single work item (discovered, claimed, fetched, failed, done)
//! - `FailureKind`: Classification of failed items for the run summary
//! - `VisitedSet`: Atomic claim registry guaranteeing each address is processed at most once

mod item_state;
mod visited;

// Re-export main types
pub use item_state::{FailureKind, ItemState};
pub use visited::{ClaimState, VisitedSet};
