//! Error handling.

use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tracing::{event, Level};

/// Datum aggregation error type
///
/// The aggregators themselves never fail on individual records; malformed input is absorbed into
/// the shape of their output. These errors cover the surfaces around them: building an
/// aggregator, parsing filter text and reading record streams.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// Aggregator configuration failed validation
    #[error("aggregate configuration is not valid")]
    ConfigValidation(#[from] validator::ValidationErrors),

    /// Filter text could not be parsed
    #[error("invalid filter at position {position}: {reason}")]
    FilterParse { position: usize, reason: String },

    /// A line of newline-delimited JSON input could not be decoded
    #[error("failed to decode input line {line}")]
    InputLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A `~=` comparison pattern is not a valid regular expression
    #[error("invalid pattern in filter")]
    InvalidRegex(#[from] regex::Error),

    /// Slot bounds do not describe a non-empty interval
    #[error("invalid slot [{start}, {end}): end must be after start")]
    InvalidSlot { start: i64, end: i64 },

    /// Error reading input or writing output
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Error (de)serialising JSON
    #[error("JSON error")]
    Json(#[from] serde_json::Error),
}

impl AggregationError {
    /// Return a filter parse error for the given character position.
    pub fn filter_parse(position: usize, reason: impl Into<String>) -> Self {
        AggregationError::FilterParse {
            position,
            reason: reason.into(),
        }
    }
}

/// Error report rendered by the command line tool
///
/// Implements serde (de)serialise.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    /// Main error message
    pub message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    pub fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

impl From<&AggregationError> for ErrorBody {
    /// Convert from an `AggregationError` into an `ErrorBody`, logging the error chain.
    fn from(error: &AggregationError) -> Self {
        event!(Level::ERROR, "{}", error.to_string());
        let mut current = error.source();
        while let Some(source) = current {
            event!(Level::ERROR, "Caused by: {}", source.to_string());
            current = source.source();
        }
        ErrorBody::new(error)
    }
}
