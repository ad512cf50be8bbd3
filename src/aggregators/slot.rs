//! Slot aggregation.
//!
//! A [SlotAggregator] folds raw datum into one aggregate for the half-open slot
//! `[slot_start, slot_end)`.
//!
//! * Instantaneous samples nominally in the slot are averaged, with their range.
//! * Accumulating counters contribute the delta between consecutive readings, scaled by how much
//!   of the gap between the two readings overlaps the slot.
//! * Configured rate properties are integrated over time ("hour fill") when the derived
//!   accumulating property is not reported explicitly.
//!
//! Readings either side of the slot are needed to attribute the leading and trailing fractions of
//! a counter delta. The reading before the slot is supplied with [Aggregator::add_record] and the
//! first reading after it is handed to [SlotAggregator::finish]. [FinishedSlot::start_next] then
//! carries both into the adjacent slot so that a delta straddling the boundary is split between
//! the two slots.

use crate::aggregator::Aggregator;
use crate::error::AggregationError;
use crate::models::{AggregateConfig, AggregateDatum, AggregateMeta, AggregateSamples, Datum, DatumSamples};
use crate::numeric::{add_to, fix_precision, merge_objects};
use crate::types::{split_statistic_key, PropertyStats, Statistic};

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, trace};
use validator::Validate;

/// Milliseconds in an hour, used to turn a rate into a quantity.
const MS_PER_HOUR: f64 = 3_600_000.0;

/// Returns the fraction of the gap between two readings attributed to the slot.
///
/// # Arguments
///
/// * `ts`: Timestamp of the current reading
/// * `prev_ts`: Timestamp of the previous reading
/// * `slot_start`: Start of the slot
/// * `slot_end`: End of the slot
/// * `tolerance_ms`: Largest gap across which interpolation is trusted
fn overlap_fraction(ts: i64, prev_ts: i64, slot_start: i64, slot_end: i64, tolerance_ms: i64) -> f64 {
    let gap = ts - prev_ts;
    if gap > tolerance_ms {
        0.0
    } else if ts > slot_end && prev_ts + (slot_end - slot_start) > ts {
        // Trailing boundary: only the part of the gap before the slot end counts.
        (slot_end - prev_ts) as f64 / gap as f64
    } else if prev_ts < slot_start {
        // Leading boundary: only the part of the gap after the slot start counts.
        (ts - slot_start) as f64 / gap as f64
    } else {
        1.0
    }
}

/// Aggregates raw datum for one source over one slot
#[derive(Debug)]
pub struct SlotAggregator {
    source_id: String,
    slot_start: i64,
    slot_end: i64,
    config: AggregateConfig,
    inst_sums: IndexMap<String, f64>,
    inst_counts: IndexMap<String, f64>,
    inst_stats: IndexMap<String, PropertyStats>,
    acc_sums: IndexMap<String, f64>,
    status: IndexMap<String, Value>,
    tags: IndexSet<String>,
    prev: Option<Datum>,
}

impl SlotAggregator {
    /// Return a new SlotAggregator.
    ///
    /// # Arguments
    ///
    /// * `source_id`: Source being aggregated
    /// * `slot_start`: Inclusive slot start, in epoch milliseconds
    /// * `slot_end`: Exclusive slot end, in epoch milliseconds; must be after `slot_start`
    /// * `config`: Tolerance and hour-fill configuration
    pub fn new(
        source_id: &str,
        slot_start: i64,
        slot_end: i64,
        config: AggregateConfig,
    ) -> Result<Self, AggregationError> {
        if slot_end <= slot_start {
            return Err(AggregationError::InvalidSlot {
                start: slot_start,
                end: slot_end,
            });
        }
        config.validate()?;
        Ok(SlotAggregator {
            source_id: source_id.to_string(),
            slot_start,
            slot_end,
            config,
            inst_sums: IndexMap::new(),
            inst_counts: IndexMap::new(),
            inst_stats: IndexMap::new(),
            acc_sums: IndexMap::new(),
            status: IndexMap::new(),
            tags: IndexSet::new(),
            prev: None,
        })
    }

    /// Inclusive start of the slot.
    pub fn slot_start(&self) -> i64 {
        self.slot_start
    }

    /// Exclusive end of the slot.
    pub fn slot_end(&self) -> i64 {
        self.slot_end
    }

    /// Effective interpolation tolerance in milliseconds.
    pub fn tolerance_ms(&self) -> i64 {
        self.config.tolerance_ms
    }

    /// Effective hour-fill mapping.
    pub fn hour_fill(&self) -> &IndexMap<String, String> {
        &self.config.hour_fill
    }

    /// Attribute the accumulating delta between `prev` and the current reading.
    fn accumulate(&mut self, ts: i64, slot: i64, data: &DatumSamples, prev: Option<&Datum>) {
        if slot < self.slot_start {
            return;
        }
        let Some((prev_ts, prev_data)) = prev.and_then(|prev| Some((prev.ts?, prev.data.as_ref()?)))
        else {
            return;
        };
        let gap = ts - prev_ts;
        if gap < 0 {
            debug!(source_id = %self.source_id, ts, prev_ts, "Record out of order");
            return;
        }
        let percent = overlap_fraction(
            ts,
            prev_ts,
            self.slot_start,
            self.slot_end,
            self.config.tolerance_ms,
        );
        if percent <= 0.0 {
            trace!(source_id = %self.source_id, ts, gap, "No accumulation attributed to slot");
            return;
        }

        for (prop, value) in &data.accumulating {
            if split_statistic_key(prop).is_some() {
                continue;
            }
            let delta = prev_data
                .accumulating
                .get(prop)
                .map_or(0.0, |prev_value| value - prev_value);
            add_to(prop, delta * percent, &mut self.acc_sums, 1.0, None, None);
        }

        // Explicit accumulating values always win over values derived from a rate.
        for (rate_prop, quantity_prop) in &self.config.hour_fill {
            if data.accumulating.contains_key(quantity_prop) {
                continue;
            }
            let (Some(rate), Some(prev_rate)) = (
                data.instantaneous.get(rate_prop),
                prev_data.instantaneous.get(rate_prop),
            ) else {
                continue;
            };
            let estimate = (rate + prev_rate) / 2.0 * (gap as f64 / MS_PER_HOUR);
            add_to(
                quantity_prop,
                estimate * percent,
                &mut self.acc_sums,
                1.0,
                None,
                None,
            );
        }
    }

    /// Finalise the slot.
    ///
    /// Returns a [FinishedSlot] holding the aggregate, if any data contributed, and the boundary
    /// records needed to continue into the next slot.
    ///
    /// # Arguments
    ///
    /// * `next`: Optional first record of the following slot. When it is within tolerance of
    ///   the last record seen, the fraction of their delta that falls inside this slot is
    ///   added. Otherwise the last record is considered stale and is not carried forward.
    ///   An incomplete record is treated as absent.
    pub fn finish(mut self, next: Option<&Datum>) -> FinishedSlot {
        let next = next.filter(|next| next.ts.is_some() && next.ts_start.is_some() && next.data.is_some());
        let mut boundary = Vec::new();
        if let Some(next) = next {
            let prev_ts = self.prev.as_ref().and_then(|prev| prev.ts);
            match (prev_ts, next.ts) {
                (Some(prev_ts), Some(ts)) if ts - prev_ts <= self.config.tolerance_ms => {
                    boundary.extend(self.prev.clone());
                    self.add_record(next);
                }
                _ => {
                    if self.prev.take().is_some() {
                        debug!(
                            source_id = %self.source_id,
                            slot_start = self.slot_start,
                            "Discarding stale boundary record"
                        );
                    }
                }
            }
            boundary.push(next.clone());
        } else {
            boundary.extend(self.prev.take());
        }

        let result = self.result();
        debug!(
            source_id = %self.source_id,
            slot_start = self.slot_start,
            slot_end = self.slot_end,
            has_data = result.is_some(),
            "Finished slot"
        );
        FinishedSlot {
            source_id: self.source_id,
            config: self.config,
            result,
            boundary,
        }
    }

    /// Assemble the aggregate from the running state.
    fn result(&self) -> Option<AggregateDatum> {
        let mut instantaneous = IndexMap::new();
        for (prop, sum) in &self.inst_sums {
            let count = self.inst_counts.get(prop).copied().unwrap_or_default();
            if count <= 0.0 {
                continue;
            }
            let average = fix_precision(sum / count);
            instantaneous.insert(prop.clone(), average);
            if let Some(stats) = self.inst_stats.get(prop) {
                for (stat, value) in [(Statistic::Min, stats.min), (Statistic::Max, stats.max)] {
                    let value = fix_precision(value);
                    if value != average {
                        instantaneous.insert(stat.key(prop), value);
                    }
                }
            }
        }

        let mut accumulating = IndexMap::new();
        merge_objects(&mut accumulating, &self.acc_sums);
        let mut status = IndexMap::new();
        merge_objects(&mut status, &self.status);

        let data = AggregateSamples {
            instantaneous: Some(instantaneous).filter(|map| !map.is_empty()),
            accumulating: Some(accumulating).filter(|map| !map.is_empty()),
            status: Some(status).filter(|map| !map.is_empty()),
            tags: Some(self.tags.iter().cloned().collect::<Vec<_>>()).filter(|tags| !tags.is_empty()),
        };
        if data.is_empty() {
            return None;
        }
        let meta = data.instantaneous.as_ref().map(|_| AggregateMeta {
            instantaneous: self.inst_stats.clone(),
        });
        Some(AggregateDatum {
            source_id: self.source_id.clone(),
            ts_start: Some(self.slot_start),
            data,
            meta,
        })
    }
}

impl Aggregator for SlotAggregator {
    type Record = Datum;

    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn add_record(&mut self, record: &Datum) {
        let (Some(ts), Some(slot), Some(data)) = (record.ts, record.ts_start, record.data.as_ref())
        else {
            trace!(source_id = %self.source_id, "Ignoring incomplete record");
            return;
        };
        if slot == self.slot_start {
            for (prop, value) in &data.instantaneous {
                add_to(
                    prop,
                    *value,
                    &mut self.inst_sums,
                    1.0,
                    Some(&mut self.inst_counts),
                    Some(&mut self.inst_stats),
                );
            }
            for (prop, value) in &data.status {
                self.status.insert(prop.clone(), value.clone());
            }
            self.tags.extend(data.tags.iter().cloned());
        }
        let prev = self.prev.take();
        self.accumulate(ts, slot, data, prev.as_ref());
        self.prev = Some(record.clone());
    }
}

/// A finalised slot
///
/// Holds the slot's aggregate and the boundary records captured when it was finished.
#[derive(Debug)]
pub struct FinishedSlot {
    source_id: String,
    config: AggregateConfig,
    result: Option<AggregateDatum>,
    boundary: Vec<Datum>,
}

impl FinishedSlot {
    /// The aggregate, or `None` if nothing contributed to the slot.
    pub fn result(&self) -> Option<&AggregateDatum> {
        self.result.as_ref()
    }

    /// Consume the finished slot, returning its aggregate.
    pub fn into_result(self) -> Option<AggregateDatum> {
        self.result
    }

    /// Records carried over into the next slot, oldest first.
    pub fn boundary_records(&self) -> &[Datum] {
        &self.boundary
    }

    /// Return an aggregator for the adjacent slot, seeded with the boundary records.
    ///
    /// # Arguments
    ///
    /// * `next_start`: Inclusive start of the next slot
    /// * `next_end`: Exclusive end of the next slot
    pub fn start_next(&self, next_start: i64, next_end: i64) -> Result<SlotAggregator, AggregationError> {
        let mut next = SlotAggregator::new(&self.source_id, next_start, next_end, self.config.clone())?;
        next.add_records(&self.boundary);
        Ok(next)
    }
}
