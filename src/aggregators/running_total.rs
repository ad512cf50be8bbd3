//! Running-total aggregation over already-aggregated records.

use crate::aggregator::Aggregator;
use crate::models::{AggregateDatum, AggregateSamples, WeightedDatum};
use crate::numeric::{add_to, fix_precision, merge_objects};
use crate::types::{split_statistic_key, MinMax, Statistic};

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, trace};

/// Combines weighted aggregates for one source into a single aggregate
///
/// Instantaneous averages are weighted by each record's weight, so slots of unequal duration
/// combine correctly. `_min`/`_max` siblings carried by the inputs feed a range tracker rather
/// than being averaged. Accumulating values are per-slot totals and are summed as they are.
#[derive(Debug, Default)]
pub struct RunningTotalAggregator {
    source_id: String,
    ts_start: Option<i64>,
    inst_sums: IndexMap<String, f64>,
    ranges: IndexMap<String, MinMax>,
    acc_sums: IndexMap<String, f64>,
    status: IndexMap<String, Value>,
    tags: IndexSet<String>,
    total_weight: f64,
}

impl RunningTotalAggregator {
    /// Return a new RunningTotalAggregator.
    ///
    /// # Arguments
    ///
    /// * `source_id`: Source being aggregated
    pub fn new(source_id: &str) -> Self {
        RunningTotalAggregator {
            source_id: source_id.to_string(),
            ..Default::default()
        }
    }

    /// Sum of the weights of all contributing records.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Finalise the running total.
    ///
    /// Returns `None` if nothing contributed.
    pub fn finish(self) -> Option<AggregateDatum> {
        let mut instantaneous = IndexMap::new();
        if self.total_weight > 0.0 {
            for (prop, sum) in &self.inst_sums {
                let average = fix_precision(sum / self.total_weight);
                instantaneous.insert(prop.clone(), average);
                let Some(range) = self.ranges.get(prop) else {
                    continue;
                };
                for stat in [Statistic::Min, Statistic::Max] {
                    if let Some(value) = range.get(stat).map(fix_precision) {
                        if value != average {
                            instantaneous.insert(stat.key(prop), value);
                        }
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
            tags: Some(self.tags.into_iter().collect::<Vec<_>>()).filter(|tags| !tags.is_empty()),
        };
        debug!(
            source_id = %self.source_id,
            total_weight = self.total_weight,
            has_data = !data.is_empty(),
            "Finished running total"
        );
        if data.is_empty() {
            return None;
        }
        Some(AggregateDatum {
            source_id: self.source_id,
            ts_start: self.ts_start,
            data,
            meta: None,
        })
    }
}

impl Aggregator for RunningTotalAggregator {
    type Record = WeightedDatum;

    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn add_record(&mut self, record: &WeightedDatum) {
        let (Some(data), Some(weight)) = (record.data.as_ref(), record.weight.filter(|w| *w > 0.0))
        else {
            trace!(source_id = %self.source_id, "Ignoring record without data or weight");
            return;
        };
        if self.ts_start.is_none() {
            self.ts_start = record.ts_start;
        }
        for (prop, value) in &data.instantaneous {
            match split_statistic_key(prop) {
                Some((base, stat)) => self
                    .ranges
                    .entry(base.to_string())
                    .or_default()
                    .widen(stat, *value),
                None => add_to(prop, *value, &mut self.inst_sums, weight, None, None),
            }
        }
        for (prop, value) in &data.accumulating {
            if split_statistic_key(prop).is_none() {
                add_to(prop, *value, &mut self.acc_sums, 1.0, None, None);
            }
        }
        for (prop, value) in &data.status {
            self.status.insert(prop.clone(), value.clone());
        }
        self.tags.extend(data.tags.iter().cloned());
        self.total_weight += weight;
    }
}
