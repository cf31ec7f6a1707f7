//! Pipeline stage builders
//!
//! Each stage emits named fragments numbered from the offset it is given:
//!
//! - **base**: deduplicated, filtered event rows (`base_events`)
//! - **filter_group**: best filter group per event (`filter_matches`,
//!   `matched_events`, `best_matches`)
//! - **aggregation**: final projection, one row per bucket

pub mod aggregation;
pub mod base;
pub mod filter_group;

pub use aggregation::{AggregationSource, AggregationStage};
pub use base::BaseFilterStage;
pub use filter_group::FilterGroupStage;

/// Deduplicated, filtered events
pub const BASE_EVENTS: &str = "base_events";
/// Per-event array of (group id, priority, matched)
pub const FILTER_MATCHES: &str = "filter_matches";
/// One row per (event, group) pair
pub const MATCHED_EVENTS: &str = "matched_events";
/// Winning group per event
pub const BEST_MATCHES: &str = "best_matches";
/// Final projection
pub const USAGE: &str = "usage";
