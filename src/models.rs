//! Data types and associated functions and methods

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use crate::types::PropertyStats;

/// Default maximum gap between two records across which accumulating values are interpolated
pub const DEFAULT_TOLERANCE_MS: i64 = 3_600_000;

/// Property maps of a datum, by kind of sample
///
/// Every map is optional on input. Compact single letter keys (`i`, `a`, `s`, `t`) are accepted
/// as aliases. Empty maps are omitted when serialising.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DatumSamples {
    /// Point-in-time samples, such as power
    #[serde(alias = "i", skip_serializing_if = "IndexMap::is_empty")]
    pub instantaneous: IndexMap<String, f64>,
    /// Monotonically increasing counters, such as energy to date
    #[serde(alias = "a", skip_serializing_if = "IndexMap::is_empty")]
    pub accumulating: IndexMap<String, f64>,
    /// Last-write-wins scalars, such as a nameplate rating
    #[serde(rename = "static", alias = "s", skip_serializing_if = "IndexMap::is_empty")]
    pub status: IndexMap<String, Value>,
    /// Labels, de-duplicated in first-seen order
    #[serde(alias = "t", skip_serializing_if = "IndexSet::is_empty")]
    pub tags: IndexSet<String>,
}

impl DatumSamples {
    /// Add an instantaneous sample.
    pub fn with_instantaneous(mut self, prop: &str, value: f64) -> Self {
        self.instantaneous.insert(prop.to_string(), value);
        self
    }

    /// Add an accumulating reading.
    pub fn with_accumulating(mut self, prop: &str, value: f64) -> Self {
        self.accumulating.insert(prop.to_string(), value);
        self
    }

    /// Add a static value.
    pub fn with_status(mut self, prop: &str, value: impl Into<Value>) -> Self {
        self.status.insert(prop.to_string(), value.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }
}

/// A single timestamped reading from a source
///
/// Every field other than the source is optional so that partial rows can be read and then
/// skipped by the aggregators rather than failing a whole stream.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Datum {
    /// Identifier of the originating data stream
    #[serde(default)]
    pub source_id: String,
    /// When the reading was taken, in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    /// Start of the slot this reading nominally belongs to, in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_start: Option<i64>,
    /// Sample payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DatumSamples>,
}

impl Datum {
    /// Return a new Datum with all fields present.
    pub fn new(source_id: &str, ts: i64, ts_start: i64, data: DatumSamples) -> Self {
        Datum {
            source_id: source_id.to_string(),
            ts: Some(ts),
            ts_start: Some(ts_start),
            data: Some(data),
        }
    }
}

/// An already-aggregated record, weighted for a running total
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedDatum {
    /// Identifier of the originating data stream
    #[serde(default)]
    pub source_id: String,
    /// Start of the period this record summarises
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_start: Option<i64>,
    /// Relative weight of the record, typically the fraction of a period it covers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Aggregated sample payload; instantaneous maps may carry `_min`/`_max` siblings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DatumSamples>,
}

impl WeightedDatum {
    /// Return a WeightedDatum for a finished aggregate.
    ///
    /// # Arguments
    ///
    /// * `aggregate`: Result of an earlier aggregation
    /// * `weight`: Weight of the aggregate within the running total
    pub fn from_aggregate(aggregate: &AggregateDatum, weight: f64) -> Self {
        let samples = &aggregate.data;
        WeightedDatum {
            source_id: aggregate.source_id.clone(),
            ts_start: aggregate.ts_start,
            weight: Some(weight),
            data: Some(DatumSamples {
                instantaneous: samples.instantaneous.clone().unwrap_or_default(),
                accumulating: samples.accumulating.clone().unwrap_or_default(),
                status: samples.status.clone().unwrap_or_default(),
                tags: samples.tags.iter().flatten().cloned().collect(),
            }),
        }
    }
}

/// Aggregated property maps
///
/// A map is `None`, and absent from the serialised form, when nothing contributed to it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AggregateSamples {
    /// Averages, with `_min`/`_max` siblings where they differ from the average
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instantaneous: Option<IndexMap<String, f64>>,
    /// Quantities accumulated over the period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accumulating: Option<IndexMap<String, f64>>,
    /// Merged static values
    #[serde(default, rename = "static", skip_serializing_if = "Option::is_none")]
    pub status: Option<IndexMap<String, Value>>,
    /// Union of tags in first-seen order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl AggregateSamples {
    /// Returns true if no property or tag was produced.
    pub fn is_empty(&self) -> bool {
        self.instantaneous.is_none()
            && self.accumulating.is_none()
            && self.status.is_none()
            && self.tags.is_none()
    }
}

/// Raw statistics reported next to a slot aggregate for auditing
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AggregateMeta {
    /// Unrounded count, minimum and maximum of each instantaneous property
    pub instantaneous: IndexMap<String, PropertyStats>,
}

/// Result of an aggregation
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateDatum {
    /// Identifier of the originating data stream
    pub source_id: String,
    /// Start of the aggregated period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_start: Option<i64>,
    /// Aggregated samples
    pub data: AggregateSamples,
    /// Raw statistics; only produced by slot aggregation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<AggregateMeta>,
}

/// Slot aggregation configuration
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
#[validate(schema(function = "validate_config"))]
pub struct AggregateConfig {
    /// Largest gap in milliseconds between consecutive records across which accumulating
    /// values are still interpolated
    pub tolerance_ms: i64,
    /// Instantaneous rate property mapped to the accumulating property derived from it
    #[validate(custom = "validate_hour_fill")]
    pub hour_fill: IndexMap<String, String>,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        AggregateConfig {
            tolerance_ms: DEFAULT_TOLERANCE_MS,
            hour_fill: IndexMap::from([("watts".to_string(), "wattHours".to_string())]),
        }
    }
}

/// Validate hour-fill mappings
fn validate_hour_fill(hour_fill: &IndexMap<String, String>) -> Result<(), ValidationError> {
    for (source, target) in hour_fill {
        if source.is_empty() || target.is_empty() {
            return Err(ValidationError::new(
                "hourFill property names must not be empty",
            ));
        }
        if source == target {
            let mut error =
                ValidationError::new("hourFill target must differ from its source property");
            error.add_param("property".into(), source);
            return Err(error);
        }
    }
    Ok(())
}

/// Validate aggregate configuration
fn validate_config(config: &AggregateConfig) -> Result<(), ValidationError> {
    if config.tolerance_ms < 0 {
        let mut error = ValidationError::new("toleranceMs must not be negative");
        error.add_param("toleranceMs".into(), &config.tolerance_ms);
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;
    use serde_json::json;
    use serde_test::{assert_de_tokens, assert_de_tokens_error, Token};

    #[test]
    fn test_config_defaults() {
        let config: AggregateConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(AggregateConfig::default(), config);
        assert_eq!(3_600_000, config.tolerance_ms);
        assert_eq!(Some(&"wattHours".to_string()), config.hour_fill.get("watts"));
        config.validate().unwrap()
    }

    #[test]
    fn test_config_fields() {
        let config = AggregateConfig {
            tolerance_ms: 900_000,
            hour_fill: IndexMap::from([("amps".to_string(), "ampHours".to_string())]),
        };
        assert_de_tokens(
            &config,
            &[
                Token::Struct {
                    name: "AggregateConfig",
                    len: 2,
                },
                Token::Str("toleranceMs"),
                Token::I64(900_000),
                Token::Str("hourFill"),
                Token::Map { len: Some(1) },
                Token::Str("amps"),
                Token::Str("ampHours"),
                Token::MapEnd,
                Token::StructEnd,
            ],
        );
        config.validate().unwrap()
    }

    #[test]
    fn test_config_unknown_field() {
        assert_de_tokens_error::<AggregateConfig>(
            &[
                Token::Struct {
                    name: "AggregateConfig",
                    len: 1,
                },
                Token::Str("tolerance"),
            ],
            "unknown field `tolerance`, expected `toleranceMs` or `hourFill`",
        )
    }

    #[test]
    #[should_panic(expected = "toleranceMs must not be negative")]
    fn test_config_negative_tolerance() {
        let config = AggregateConfig {
            tolerance_ms: -1,
            ..Default::default()
        };
        config.validate().unwrap()
    }

    #[test]
    #[should_panic(expected = "hourFill target must differ from its source property")]
    fn test_config_hour_fill_same_property() {
        let config = AggregateConfig {
            hour_fill: IndexMap::from([("watts".to_string(), "watts".to_string())]),
            ..Default::default()
        };
        config.validate().unwrap()
    }

    #[test]
    #[should_panic(expected = "hourFill property names must not be empty")]
    fn test_config_hour_fill_empty_name() {
        let config = AggregateConfig {
            hour_fill: IndexMap::from([("watts".to_string(), "".to_string())]),
            ..Default::default()
        };
        config.validate().unwrap()
    }

    #[test]
    fn test_datum_deserialise() {
        let datum: Datum = serde_json::from_value(json!({
            "sourceId": "meter/1",
            "ts": 1000,
            "tsStart": 0,
            "data": {
                "instantaneous": {"watts": 13},
                "accumulating": {"wattHours": 100.5},
                "static": {"model": "X100"},
                "tags": ["a", "b", "a"]
            }
        }))
        .unwrap();
        let expected = Datum::new(
            "meter/1",
            1000,
            0,
            DatumSamples::default()
                .with_instantaneous("watts", 13.0)
                .with_accumulating("wattHours", 100.5)
                .with_status("model", "X100")
                .with_tag("a")
                .with_tag("b"),
        );
        assert_eq!(expected, datum);
    }

    #[test]
    fn test_datum_deserialise_aliases() {
        let datum: Datum = serde_json::from_value(json!({
            "sourceId": "meter/1",
            "ts": 1000,
            "data": {"i": {"watts": 1}, "a": {"wattHours": 2}, "s": {"phase": 3}, "t": ["x"]}
        }))
        .unwrap();
        let data = datum.data.unwrap();
        assert_eq!(Some(&1.0), data.instantaneous.get("watts"));
        assert_eq!(Some(&2.0), data.accumulating.get("wattHours"));
        assert_eq!(Some(&json!(3)), data.status.get("phase"));
        assert!(data.tags.contains("x"));
        assert_eq!(None, datum.ts_start);
    }

    #[test]
    fn test_datum_partial() {
        let datum: Datum = serde_json::from_str(r#"{"sourceId": "meter/1"}"#).unwrap();
        assert_eq!(None, datum.ts);
        assert_eq!(None, datum.data);
    }

    #[test]
    fn test_aggregate_serialise_omits_absent() {
        let aggregate = AggregateDatum {
            source_id: "meter/1".to_string(),
            ts_start: Some(0),
            data: AggregateSamples {
                accumulating: Some(IndexMap::from([("wattHours".to_string(), 1.5)])),
                ..Default::default()
            },
            meta: None,
        };
        assert_eq!(
            r#"{"sourceId":"meter/1","tsStart":0,"data":{"accumulating":{"wattHours":1.5}}}"#,
            serde_json::to_string(&aggregate).unwrap()
        );
        assert!(!aggregate.data.is_empty());
        assert!(AggregateSamples::default().is_empty());
    }

    #[test]
    fn test_weighted_from_aggregate() {
        let aggregate = test_utils::get_test_aggregate(0, 9.0, 8.0, 10.0);
        let weighted = WeightedDatum::from_aggregate(&aggregate, 0.5);
        assert_eq!(Some(0.5), weighted.weight);
        assert_eq!(Some(0), weighted.ts_start);
        let data = weighted.data.unwrap();
        assert_eq!(Some(&9.0), data.instantaneous.get("watts"));
        assert_eq!(Some(&8.0), data.instantaneous.get("watts_min"));
        assert_eq!(Some(&10.0), data.instantaneous.get("watts_max"));
        assert!(data.tags.is_empty());
    }
}
