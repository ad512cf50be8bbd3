//! Property statistics
//!
//! Instantaneous properties carry running statistics alongside their averages. Aggregated
//! records expose a property's extremes as sibling keys named `<prop>_min` and `<prop>_max`,
//! and these must never be mistaken for independent properties when they are read back in.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// A statistic that can be attached to a property name as a suffix
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum Statistic {
    /// Minimum value, suffix `_min`
    Min,
    /// Maximum value, suffix `_max`
    Max,
}

impl Statistic {
    /// Returns the sibling key carrying this statistic for `prop`.
    pub fn key(self, prop: &str) -> String {
        format!("{}_{}", prop, self)
    }
}

/// Split a statistic-suffixed key such as `watts_max` into its base property and statistic.
///
/// Returns `None` for ordinary property keys. The base name must be non-empty, so a key of just
/// `_min` is an ordinary property.
pub fn split_statistic_key(key: &str) -> Option<(&str, Statistic)> {
    [Statistic::Min, Statistic::Max]
        .into_iter()
        .find_map(|stat| {
            let suffix = match stat {
                Statistic::Min => "_min",
                Statistic::Max => "_max",
            };
            key.strip_suffix(suffix).map(|base| (base, stat))
        })
        .filter(|(base, _)| !base.is_empty())
}

/// Raw sample statistics for one instantaneous property within a slot
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct PropertyStats {
    /// Number of samples seen
    pub count: u64,
    /// Smallest sample seen
    pub min: f64,
    /// Largest sample seen
    pub max: f64,
}

impl PropertyStats {
    /// Return statistics for a single sample.
    pub fn new(value: f64) -> Self {
        PropertyStats {
            count: 1,
            min: value,
            max: value,
        }
    }

    /// Fold another sample into the statistics.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }
}

/// Range tracker fed from already-aggregated `_min`/`_max` values
///
/// Each bound is seeded by its first occurrence and only ever widens afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MinMax {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl MinMax {
    /// Widen the bound for `stat` to include `value`.
    pub fn widen(&mut self, stat: Statistic, value: f64) {
        match stat {
            Statistic::Min => self.min = Some(self.min.map_or(value, |min| min.min(value))),
            Statistic::Max => self.max = Some(self.max.map_or(value, |max| max.max(value))),
        }
    }

    /// Returns the tracked bound for `stat`, if any value has been seen.
    pub fn get(&self, stat: Statistic) -> Option<f64> {
        match stat {
            Statistic::Min => self.min,
            Statistic::Max => self.max,
        }
    }
}
