pub mod stats;

// Re-export types for convenience.
pub use crate::types::stats::{split_statistic_key, MinMax, PropertyStats, Statistic};
