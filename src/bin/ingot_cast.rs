//! ingot-cast: Cast JSON messages into per-array-field CSV files
//!
//! Usage:
//!   # Read from file, write CSVs to ./output
//!   ingot-cast data.json
//!
//!   # Read from stdin
//!   echo '{"id": 1, "posts": [{"id": 10}]}' | ingot-cast
//!
//!   # Process NDJSON, write to a custom directory
//!   ingot-cast --ndjson events.jsonl --output-dir ./csv
//!
//! A top-level JSON array is unrolled into one message per element, the
//! same way a file-backed producer would publish it to a topic.

// Use MiMalloc allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use ingot::cast::{CastConfig, ProcessSummary, RecordProcessor};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ingot-cast")]
#[command(about = "Cast JSON messages into per-array-field CSV files", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON (one message per line)
    #[arg(long)]
    ndjson: bool,

    /// Directory for the generated CSV files
    #[arg(long, short = 'o', default_value = "output")]
    output_dir: PathBuf,

    /// Separator for flattened key paths and group names
    #[arg(long, default_value = "_")]
    separator: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = CastConfig {
        output_dir: args.output_dir,
        separator: args.separator,
    };
    let processor = RecordProcessor::new(config).context("Failed to initialize CSV sink")?;

    let reader: Box<dyn Read> = if let Some(file_path) = &args.input {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open input file: {}", file_path))?;
        Box::new(BufReader::new(file))
    } else {
        Box::new(std::io::stdin())
    };

    let summary = process_values(reader, &processor, args.ndjson)?;

    info!(
        groups = summary.groups_written,
        rows = summary.rows_written,
        failed = summary.failed_groups,
        "finished"
    );
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

/// Read JSON values off the input and feed each one to the processor as a
/// message. A top-level array is unrolled into one message per element.
fn process_values(
    reader: Box<dyn Read>,
    processor: &RecordProcessor,
    ndjson: bool,
) -> Result<ProcessSummary> {
    let mut total = ProcessSummary::default();

    let buf_reader = serde_json::de::IoRead::new(BufReader::new(reader));
    let stream = serde_json::StreamDeserializer::new(buf_reader);

    for result in stream.into_iter() {
        let value: Value = result.context("Failed to parse JSON")?;
        dispatch_value(value, processor, &mut total)?;

        if !ndjson {
            break;
        }
    }

    Ok(total)
}

fn dispatch_value(
    value: Value,
    processor: &RecordProcessor,
    total: &mut ProcessSummary,
) -> Result<()> {
    match value {
        Value::Array(elements) => {
            let count = elements.len();
            for element in elements {
                send_message(&element, processor, total)?;
            }
            info!(count, "unrolled top-level array into messages");
        }
        other => send_message(&other, processor, total)?,
    }
    Ok(())
}

fn send_message(value: &Value, processor: &RecordProcessor, total: &mut ProcessSummary) -> Result<()> {
    let payload = serde_json::to_string(value)?;
    match processor.process_message(&payload) {
        Ok(summary) => total.merge(summary),
        Err(err) => warn!(error = %err, "skipping message"),
    }
    Ok(())
}
