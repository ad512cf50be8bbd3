//! Aggregator implementations

pub mod running_total;
pub mod slot;

pub use running_total::RunningTotalAggregator;
pub use slot::{FinishedSlot, SlotAggregator};
