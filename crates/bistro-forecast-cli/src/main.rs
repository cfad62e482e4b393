//! Smoke-test harness for `bistro-forecast-core`.
//!
//! Reads a `{ request: RunRequest, rows: Vec<RawBucket> }` JSON document
//! from a file or stdin, runs the forecast pipeline, and prints the
//! resulting `RunSummary` as JSON. No persistence of its own — the engine's
//! sinks (registry, audit, forecast tables) stay external, as spec.md
//! requires.

use bistro_forecast_core::{run, RawBucket, RunRequest};
use clap::Parser;
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bistro-forecast", about = "Run the hourly forecast engine against a JSON input document")]
struct Cli {
    /// Path to the input JSON document; reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Pretty-print the output JSON.
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Deserialize)]
struct RunInput {
    request: RunRequest,
    rows: Vec<RawBucket>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let input_json = match &cli.input {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "failed to read input file");
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                tracing::error!(error = %e, "failed to read stdin");
                return ExitCode::FAILURE;
            }
            buf
        }
    };

    let input: RunInput = match serde_json::from_str(&input_json) {
        Ok(input) => input,
        Err(e) => {
            tracing::error!(error = %e, "failed to parse input JSON");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        location_id = %input.request.location_id,
        rows = input.rows.len(),
        "running forecast"
    );
    let summary = run(&input.request, &input.rows);

    let output = if cli.pretty {
        serde_json::to_string_pretty(&summary)
    } else {
        serde_json::to_string(&summary)
    };

    match output {
        Ok(json) => {
            println!("{json}");
            if summary.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize run summary");
            ExitCode::FAILURE
        }
    }
}
