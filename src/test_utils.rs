use crate::models::*;

use indexmap::IndexMap;

/// Source identifier used by test records.
pub(crate) const TEST_SOURCE: &str = "meter/1";

/// One minute in milliseconds.
pub(crate) const MINUTE: i64 = 60_000;

/// Length of the test slot.
pub(crate) const SLOT_LENGTH: i64 = 15 * MINUTE;

/// Start of the test slot, aligned to a quarter hour.
pub(crate) const SLOT_START: i64 = 1_699_999_200_000;

/// End of the test slot.
pub(crate) const SLOT_END: i64 = SLOT_START + SLOT_LENGTH;

/// Create a Datum `minutes` after the test slot start with a `watts` sample and a `bar` counter.
///
/// The nominal slot is the quarter hour containing the timestamp.
pub(crate) fn get_test_datum(minutes: i64, watts: f64, bar: f64) -> Datum {
    let ts = SLOT_START + minutes * MINUTE;
    let ts_start = ts.div_euclid(SLOT_LENGTH) * SLOT_LENGTH;
    Datum::new(
        TEST_SOURCE,
        ts,
        ts_start,
        DatumSamples::default()
            .with_instantaneous("watts", watts)
            .with_accumulating("bar", bar),
    )
}

/// Create an AggregateDatum with a `watts` average and its range.
pub(crate) fn get_test_aggregate(ts_start: i64, watts: f64, min: f64, max: f64) -> AggregateDatum {
    AggregateDatum {
        source_id: TEST_SOURCE.to_string(),
        ts_start: Some(ts_start),
        data: AggregateSamples {
            instantaneous: Some(IndexMap::from([
                ("watts".to_string(), watts),
                ("watts_min".to_string(), min),
                ("watts_max".to_string(), max),
            ])),
            ..Default::default()
        },
        meta: None,
    }
}
