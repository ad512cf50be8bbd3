//! Drivers that run the aggregators over record streams.
//!
//! Both drivers shard their input by source, giving each source its own aggregator, and expect
//! records for a source to arrive in timestamp order.

use crate::aggregator::Aggregator;
use crate::aggregators::{RunningTotalAggregator, SlotAggregator};
use crate::error::AggregationError;
use crate::filter::{Filter, FilterEvaluator};
use crate::models::{AggregateConfig, AggregateDatum, Datum, WeightedDatum};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

/// Aggregate raw records into fixed-length slots.
///
/// Returns the aggregates of every slot that received data. A slot's aggregate is emitted when
/// the first record of a later slot arrives for the same source; the remaining slots are emitted
/// at the end of input in order of first appearance of their source.
///
/// # Arguments
///
/// * `records`: Raw records, in timestamp order per source
/// * `slot_ms`: Slot length in milliseconds
/// * `config`: Tolerance and hour-fill configuration
/// * `filter`: Optional filter; records that do not match are skipped
#[tracing::instrument(
    level = "DEBUG",
    skip(records, config, filter),
    fields(filter = ?filter.map(ToString::to_string))
)]
pub fn aggregate_slots<I>(
    records: I,
    slot_ms: i64,
    config: &AggregateConfig,
    filter: Option<&Filter>,
) -> Result<Vec<AggregateDatum>, AggregationError>
where
    I: IntoIterator<Item = Datum>,
{
    if slot_ms <= 0 {
        return Err(AggregationError::InvalidSlot {
            start: 0,
            end: slot_ms,
        });
    }
    let mut aggregators: IndexMap<String, Option<SlotAggregator>> = IndexMap::new();
    let mut results = Vec::new();

    for mut record in records {
        // Incomplete rows must not close a slot.
        let (Some(ts), Some(_)) = (record.ts, record.data.as_ref()) else {
            trace!(source_id = %record.source_id, "Ignoring incomplete record");
            continue;
        };
        let slot = *record
            .ts_start
            .get_or_insert(ts.div_euclid(slot_ms) * slot_ms);
        if let Some(filter) = filter {
            let target = serde_json::to_value(&record)?;
            if !FilterEvaluator::new(&target).matches_parsed(filter) {
                trace!(source_id = %record.source_id, ts = record.ts, "Record filtered out");
                continue;
            }
        }

        let entry = aggregators.entry(record.source_id.clone()).or_default();
        let next = match entry.take() {
            None => open_slot(&record, slot, slot_ms, config)?,
            Some(aggregator) if slot < aggregator.slot_start() => {
                warn!(
                    source_id = %record.source_id,
                    ts = record.ts,
                    slot,
                    current_slot = aggregator.slot_start(),
                    "Dropping out of order record"
                );
                aggregator
            }
            Some(mut aggregator) if slot < aggregator.slot_end() => {
                aggregator.add_record(&record);
                aggregator
            }
            Some(aggregator) if slot == aggregator.slot_end() => {
                let finished = aggregator.finish(Some(&record));
                let next = finished.start_next(slot, slot + slot_ms)?;
                results.extend(finished.into_result());
                next
            }
            Some(aggregator) => {
                // The finishing slot already takes the whole delta to a record beyond the
                // adjacent slot, so the new slot starts from that record alone.
                debug!(
                    source_id = %record.source_id,
                    slot,
                    skipped_from = aggregator.slot_end(),
                    "Skipping empty slots"
                );
                let finished = aggregator.finish(Some(&record));
                results.extend(finished.into_result());
                open_slot(&record, slot, slot_ms, config)?
            }
        };
        *entry = Some(next);
    }

    for aggregator in aggregators.into_values().flatten() {
        results.extend(aggregator.finish(None).into_result());
    }
    debug!(count = results.len(), "Aggregated slots");
    Ok(results)
}

/// Return an aggregator for the slot starting at `slot`, seeded with `record`.
fn open_slot(
    record: &Datum,
    slot: i64,
    slot_ms: i64,
    config: &AggregateConfig,
) -> Result<SlotAggregator, AggregationError> {
    let mut aggregator = SlotAggregator::new(&record.source_id, slot, slot + slot_ms, config.clone())?;
    aggregator.add_record(record);
    Ok(aggregator)
}

/// Combine weighted aggregates into one running total per source.
///
/// Results are returned in order of first appearance of their source; sources without any
/// contributing record are omitted.
#[tracing::instrument(level = "DEBUG", skip(records))]
pub fn rollup<I>(records: I) -> Vec<AggregateDatum>
where
    I: IntoIterator<Item = WeightedDatum>,
{
    let mut aggregators: IndexMap<String, RunningTotalAggregator> = IndexMap::new();
    for record in records {
        aggregators
            .entry(record.source_id.clone())
            .or_insert_with(|| RunningTotalAggregator::new(&record.source_id))
            .add_record(&record);
    }
    let results: Vec<AggregateDatum> = aggregators
        .into_values()
        .filter_map(RunningTotalAggregator::finish)
        .collect();
    debug!(count = results.len(), "Rolled up running totals");
    results
}
