use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use one_brc::config::DEFAULT_CHUNK_SIZE;
use one_brc::{Config, Executor, OutputFormat, Report, Strategy};

/// Prints min/mean/max per station of a `station;temperature` file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Measurements file, or `-` to read stdin.
    #[arg(default_value = "data/measurements.txt")]
    input: PathBuf,

    /// Minimum chunk size in bytes; chunks always end on a line boundary.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Aggregation workers. Defaults to the available parallelism.
    #[arg(long)]
    workers: Option<usize>,

    /// Chunks allowed to wait for a worker. Defaults to the worker count.
    #[arg(long)]
    queue_depth: Option<usize>,

    /// Single-byte field separator.
    #[arg(long, default_value = ";", value_parser = parse_delimiter)]
    delimiter: u8,

    #[arg(long, value_enum, default_value_t = StrategyArg::Stream)]
    strategy: StrategyArg,

    #[arg(long, value_enum, default_value_t = FormatArg::Lines)]
    format: FormatArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Read through a bounded worker pipeline.
    Stream,
    /// Memory-map the file and reduce in parallel.
    Mmap,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Stream => Strategy::Stream,
            StrategyArg::Mmap => Strategy::Mmap,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// `station: min/mean/max` per line.
    Lines,
    /// `{station=min/mean/max, ...}`.
    Braces,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Lines => OutputFormat::Lines,
            FormatArg::Braces => OutputFormat::Braces,
        }
    }
}

fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s.as_bytes() {
        [b] if *b != b'\n' => Ok(*b),
        _ => Err(format!("expected a single byte, got {s:?}")),
    }
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::default()
            .with_chunk_size(self.chunk_size)
            .with_delimiter(self.delimiter)
            .with_strategy(self.strategy.into());
        if let Some(workers) = self.workers {
            config = config.with_workers(workers).with_queue_depth(workers);
        }
        if let Some(depth) = self.queue_depth {
            config = config.with_queue_depth(depth);
        }
        config
    }

    fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let started = Instant::now();

    let config = args.config();
    info!(
        workers = config.workers,
        chunk_size = config.chunk_size,
        queue_depth = config.queue_depth,
        "starting"
    );
    let executor = Executor::new(config).context("invalid run configuration")?;

    let aggregate = if args.reads_stdin() {
        if executor.config().strategy == Strategy::Mmap {
            warn!("stdin cannot be memory-mapped, streaming instead");
        }
        executor.aggregate_reader(io::stdin().lock())
    } else {
        executor.aggregate_file(&args.input)
    }
    .with_context(|| format!("failed to aggregate {}", args.input.display()))?;

    let report = Report::from_aggregate(aggregate);
    info!(stations = report.len(), "sorted results");

    let mut out = BufWriter::new(io::stdout().lock());
    let format = OutputFormat::from(args.format);
    write!(out, "{}", report.display(format)).context("failed to write results")?;
    if format == OutputFormat::Braces {
        writeln!(out).context("failed to write results")?;
    }
    out.flush().context("failed to write results")?;

    info!(elapsed = ?started.elapsed(), "processing finished");
    Ok(())
}
