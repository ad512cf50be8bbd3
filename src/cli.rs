//! Command Line Interface (CLI) arguments.

use clap::{Parser, Subcommand};

/// Datum aggregation command line interface
///
/// Reads newline-delimited JSON records and writes newline-delimited JSON results to stdout.
#[derive(Clone, Debug, Parser)]
#[command(name = "datum-aggregate", version)]
pub struct CommandLineArgs {
    /// Path to the input file. Reads from stdin if not set
    #[arg(long, global = true, env = "DATUM_AGGREGATE_INPUT")]
    pub input: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

/// Operation to run over the input records
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Aggregate raw datum into fixed-length slots
    Slots {
        /// Slot length in seconds
        #[arg(
            long,
            value_parser = clap::value_parser!(i64).range(1..),
            env = "DATUM_AGGREGATE_SLOT_SECS"
        )]
        slot_secs: i64,
        /// Path to a JSON aggregate configuration file
        #[arg(long, env = "DATUM_AGGREGATE_CONFIG")]
        config: Option<String>,
        /// Only aggregate records matching this filter
        #[arg(long, env = "DATUM_AGGREGATE_FILTER")]
        filter: Option<String>,
    },
    /// Combine weighted aggregates into one running total per source
    Rollup,
    /// Print input objects matching a filter
    Filter {
        /// Filter expression, e.g. `(&(/sourceId=meter/1)(/data/instantaneous/watts>100))`
        #[arg(long, env = "DATUM_AGGREGATE_FILTER")]
        filter: String,
    },
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
