//! lrutrace - replay put/get traces against an LRU cache

mod replay;
mod stats;
mod trace;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::replay::Replayer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trace file to replay (`-` or omitted reads stdin)
    trace: Option<PathBuf>,

    /// Cache capacity (number of entries)
    #[arg(short, long, default_value_t = 1024, allow_negative_numbers = true)]
    capacity: i64,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Log and skip malformed lines instead of aborting
    #[arg(long)]
    skip_invalid: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    // Logs go to stderr so the report on stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    info!("Starting lrutrace v{}", env!("CARGO_PKG_VERSION"));
    info!("Cache capacity: {}", args.capacity);

    let mut replayer = Replayer::new(args.capacity).context("failed to create cache")?;
    let reader = open_trace(args.trace.as_deref())?;

    let print_lookups = args.format == Format::Text;
    replayer.replay(reader, args.skip_invalid, |outcome| {
        if print_lookups && outcome.is_lookup() {
            println!("{}", outcome);
        }
    })?;

    let stats = replayer.stats();
    info!(
        "Replay finished: {} hits, {} misses, {} evictions",
        stats.hits(),
        stats.misses(),
        stats.evictions()
    );

    let report = replayer.report();
    match args.format {
        Format::Text => println!("{}", report),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn open_trace(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) if path != Path::new("-") => {
            info!("Reading trace from {}", path.display());
            let file = File::open(path)
                .with_context(|| format!("failed to open trace {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => {
            info!("Reading trace from stdin");
            Ok(Box::new(io::stdin().lock()))
        }
    }
}
