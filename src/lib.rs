//! This crate aggregates telemetry datum. Raw readings from a source are reduced into fixed
//! length time slots, and slot results can be combined further into weighted running totals.
//!
//! * [Slot aggregation](aggregators::slot) averages instantaneous samples with their range,
//!   attributes accumulating counter deltas to slots by temporal overlap, and derives
//!   accumulating quantities from rates ("hour fill") when they are not reported.
//! * [Running totals](aggregators::running_total) combine already aggregated records by weight.
//! * [Filters](filter) select records with an LDAP-like expression language over paths with
//!   `*` and `**` wildcards.
//!
//! The aggregators are synchronous and own their state; callers that want parallelism shard by
//! source and slot. The [pipeline] module provides drivers over record streams and the
//! `datum-aggregate` binary exposes them over newline-delimited JSON.
//!
//! The crate is built on top of a number of open source components.
//!
//! * [Serde](serde) performs (de)serialisation of JSON records and results.
//! * [IndexMap](indexmap) keeps property maps and tags in insertion order.
//! * [regex] implements pattern comparisons in filters.
//! * [tracing](::tracing) records what the aggregators ignore, and why.

pub mod aggregator;
pub mod aggregators;
pub mod app;
pub mod cli;
pub mod error;
pub mod filter;
pub mod models;
pub mod numeric;
pub mod pipeline;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod types;
