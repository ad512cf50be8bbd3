//! Command line application: reads records, runs a command and writes results.

use crate::cli::{CommandLineArgs, Command};
use crate::error::AggregationError;
use crate::filter::{parse_filter, FilterEvaluator};
use crate::models::{AggregateConfig, Datum, WeightedDatum};
use crate::pipeline;

use expanduser::expanduser;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use tracing::info;
use validator::Validate;

/// Run the command given on the command line.
pub fn run(args: &CommandLineArgs) -> Result<(), AggregationError> {
    let stdout = io::stdout();
    let mut output = stdout.lock();
    match &args.input {
        Some(path) => {
            let file = File::open(expanduser(path)?)?;
            execute(&args.command, BufReader::new(file), &mut output)
        }
        None => execute(&args.command, io::stdin().lock(), &mut output),
    }
}

/// Run `command` over newline-delimited JSON from `input`, writing newline-delimited JSON to
/// `output`.
pub fn execute<R: BufRead, W: Write>(
    command: &Command,
    input: R,
    output: &mut W,
) -> Result<(), AggregationError> {
    match command {
        Command::Slots {
            slot_secs,
            config,
            filter,
        } => {
            let slot_ms = slot_secs
                .checked_mul(1000)
                .ok_or(AggregationError::InvalidSlot {
                    start: 0,
                    end: *slot_secs,
                })?;
            let config = match config {
                Some(path) => load_config(path)?,
                None => AggregateConfig::default(),
            };
            let filter = filter.as_deref().map(parse_filter).transpose()?;
            let records: Vec<Datum> = read_json_lines(input)?;
            info!(records = records.len(), slot_secs, "Aggregating slots");
            let results =
                pipeline::aggregate_slots(records, slot_ms, &config, filter.as_ref())?;
            write_json_lines(output, &results)
        }
        Command::Rollup => {
            let records: Vec<WeightedDatum> = read_json_lines(input)?;
            info!(records = records.len(), "Rolling up running totals");
            write_json_lines(output, &pipeline::rollup(records))
        }
        Command::Filter { filter } => {
            let filter = parse_filter(filter)?;
            let objects: Vec<Value> = read_json_lines(input)?;
            let matched: Vec<&Value> = objects
                .iter()
                .filter(|object| FilterEvaluator::new(object).matches_parsed(&filter))
                .collect();
            info!(objects = objects.len(), matched = matched.len(), %filter, "Filtered objects");
            write_json_lines(output, &matched)
        }
    }
}

/// Load and validate an aggregate configuration file.
pub fn load_config(path: &str) -> Result<AggregateConfig, AggregationError> {
    let file = File::open(expanduser(path)?)?;
    let config: AggregateConfig = serde_json::from_reader(BufReader::new(file))?;
    config.validate()?;
    Ok(config)
}

/// Decode one JSON value per non-blank line.
fn read_json_lines<T: DeserializeOwned, R: BufRead>(input: R) -> Result<Vec<T>, AggregationError> {
    let mut values = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|source| AggregationError::InputLine {
            line: index + 1,
            source,
        })?;
        values.push(value);
    }
    Ok(values)
}

fn write_json_lines<T: Serialize, W: Write>(output: &mut W, values: &[T]) -> Result<(), AggregationError> {
    for value in values {
        serde_json::to_writer(&mut *output, value)?;
        writeln!(output)?;
    }
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{get_test_datum, SLOT_END, SLOT_START};
    use serde_json::json;

    fn to_lines<T: Serialize>(values: &[T]) -> String {
        values
            .iter()
            .map(|value| serde_json::to_string(value).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn run_command(command: Command, input: &str) -> Result<Vec<Value>, AggregationError> {
        let mut output = Vec::new();
        execute(&command, input.as_bytes(), &mut output)?;
        let output = String::from_utf8(output).unwrap();
        Ok(output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect())
    }

    fn test_records() -> String {
        to_lines(&[
            get_test_datum(1, 13.0, 110.0),
            get_test_datum(6, 15.0, 120.0),
            get_test_datum(11, 17.0, 140.0),
            get_test_datum(16, 19.0, 150.0),
        ])
    }

    #[test]
    fn test_slots() {
        let command = Command::Slots {
            slot_secs: 900,
            config: None,
            filter: None,
        };
        let results = run_command(command, &test_records()).unwrap();
        assert_eq!(2, results.len());
        assert_eq!(json!(SLOT_START), results[0]["tsStart"]);
        assert_eq!(json!(38.0), results[0]["data"]["accumulating"]["bar"]);
        assert_eq!(json!(SLOT_END), results[1]["tsStart"]);
    }

    #[test]
    fn test_slots_blank_lines() {
        let command = Command::Slots {
            slot_secs: 900,
            config: None,
            filter: Some("(/data/instantaneous/watts<16)".to_string()),
        };
        let input = format!("\n{}\n\n", test_records());
        let results = run_command(command, &input).unwrap();
        assert_eq!(1, results.len());
        assert_eq!(json!(14.0), results[0]["data"]["instantaneous"]["watts"]);
    }

    #[test]
    fn test_slots_invalid_filter() {
        let command = Command::Slots {
            slot_secs: 900,
            config: None,
            filter: Some("(&".to_string()),
        };
        let result = run_command(command, &test_records());
        assert!(matches!(result, Err(AggregationError::FilterParse { .. })));
    }

    #[test]
    fn test_slots_length_overflow() {
        let command = Command::Slots {
            slot_secs: i64::MAX / 999,
            config: None,
            filter: None,
        };
        let result = run_command(command, &test_records());
        assert!(matches!(result, Err(AggregationError::InvalidSlot { .. })));
    }

    #[test]
    fn test_rollup() {
        let input = r#"
            {"sourceId": "meter/1", "tsStart": 0, "weight": 1, "data": {"i": {"watts": 10}, "a": {"wattHours": 1}}}
            {"sourceId": "meter/1", "tsStart": 900000, "weight": 3, "data": {"i": {"watts": 20}, "a": {"wattHours": 2}}}
        "#;
        let results = run_command(Command::Rollup, input).unwrap();
        assert_eq!(
            vec![json!({
                "sourceId": "meter/1",
                "tsStart": 0,
                "data": {
                    "instantaneous": {"watts": 17.5},
                    "accumulating": {"wattHours": 3.0}
                }
            })],
            results
        );
    }

    #[test]
    fn test_filter() {
        let input = r#"{"foo": {"a": 1, "b": "X"}}
{"foo": {"a": 2}}
{"bam": "mab"}"#;
        let command = Command::Filter {
            filter: "(|(/foo/*=X)(/bam=mab))".to_string(),
        };
        let results = run_command(command, input).unwrap();
        assert_eq!(
            vec![json!({"foo": {"a": 1, "b": "X"}}), json!({"bam": "mab"})],
            results
        );
    }

    #[test]
    fn test_invalid_line() {
        let input = "{\"foo\": 1}\n\nnot json\n";
        let command = Command::Filter {
            filter: "(/foo=1)".to_string(),
        };
        let result = run_command(command, input);
        assert!(matches!(result, Err(AggregationError::InputLine { line: 3, .. })));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/datum-aggregate/config.json");
        assert!(matches!(result, Err(AggregationError::Io(_))));
    }
}
