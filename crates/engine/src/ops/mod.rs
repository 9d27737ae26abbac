//! Pipeline stages, in execution order.

pub mod dedup;
pub mod fetch;
pub mod resolve;
pub mod transform;
pub mod write;

/// Upper bound of conditions in one compound query filter.
pub const MAX_FILTER_CONDITIONS: usize = 100;
