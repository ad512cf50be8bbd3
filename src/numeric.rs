//! Numeric helpers shared by the aggregators.
//!
//! All emitted numbers pass through [fix_precision], which rounds to three decimal places with
//! ties going to the even neighbour. Rounding happens once, when a result is assembled, never on
//! running sums.

use crate::types::PropertyStats;

use indexmap::IndexMap;
use serde_json::{Number, Value};

/// Scale applied before rounding; three decimal places.
const PRECISION_SCALE: f64 = 1_000.0;

/// Round a number to the fixed output precision.
///
/// Non-finite values are returned unchanged. Negative zero is normalised to zero so that a
/// vanishing delta never serialises as `-0.0`.
pub fn fix_precision(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let rounded = (value * PRECISION_SCALE).round_ties_even() / PRECISION_SCALE;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Values that can be rounded to the fixed output precision.
pub trait FixPrecision {
    /// Returns a copy of the value rounded with [fix_precision].
    fn fix_precision(&self) -> Self;
}

impl FixPrecision for f64 {
    fn fix_precision(&self) -> Self {
        fix_precision(*self)
    }
}

impl FixPrecision for Value {
    /// Rounds non-integer numbers; integers, strings, booleans and containers pass through.
    fn fix_precision(&self) -> Self {
        match self {
            Value::Number(number) if number.is_f64() => number
                .as_f64()
                .and_then(|float| Number::from_f64(fix_precision(float)))
                .map(Value::Number)
                .unwrap_or_else(|| self.clone()),
            _ => self.clone(),
        }
    }
}

/// Add a weighted value into a running sum.
///
/// # Arguments
///
/// * `prop`: Property name
/// * `value`: Sample value
/// * `sums`: Running sums; `value * weight` is added to the entry for `prop`
/// * `weight`: Weight of the sample
/// * `counts`: Optional running counts; incremented by `weight`
/// * `stats`: Optional raw statistics; count incremented by one and min/max widened with `value`
pub fn add_to(
    prop: &str,
    value: f64,
    sums: &mut IndexMap<String, f64>,
    weight: f64,
    counts: Option<&mut IndexMap<String, f64>>,
    stats: Option<&mut IndexMap<String, PropertyStats>>,
) {
    *sums.entry(prop.to_string()).or_insert(0.0) += value * weight;
    if let Some(counts) = counts {
        *counts.entry(prop.to_string()).or_insert(0.0) += weight;
    }
    if let Some(stats) = stats {
        stats
            .entry(prop.to_string())
            .and_modify(|stats| stats.update(value))
            .or_insert_with(|| PropertyStats::new(value));
    }
}

/// Shallow merge `src` into `dest`, rounding every value on the way in.
///
/// Existing keys in `dest` are overwritten but keep their position.
pub fn merge_objects<V: FixPrecision>(dest: &mut IndexMap<String, V>, src: &IndexMap<String, V>) {
    for (key, value) in src {
        dest.insert(key.clone(), value.fix_precision());
    }
}
