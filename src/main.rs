//! This file defines the datum-aggregate binary entry point.

use datum_aggregate::app;
use datum_aggregate::cli;
use datum_aggregate::error::ErrorBody;
use datum_aggregate::tracing;

use std::process::exit;

/// Application entry point
fn main() {
    let args = cli::parse();
    tracing::init_tracing();
    if let Err(error) = app::run(&args) {
        let body = ErrorBody::from(&error);
        match serde_json::to_string(&body) {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("{}", body.message),
        }
        exit(1)
    }
}
