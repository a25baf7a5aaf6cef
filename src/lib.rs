//! Exact per-station min/mean/max over very large `station;temperature` files.
//!
//! The input is cut into line-aligned chunks, each chunk is folded into a
//! partial [`Aggregate`] by one worker, and the partials are merged into the
//! final result. Merging is associative and commutative, so neither chunk
//! size nor worker count nor completion order changes the answer.
//!
//! ```no_run
//! use one_brc::{Config, Executor, OutputFormat, Report};
//!
//! let executor = Executor::new(Config::default())?;
//! let aggregate = executor.aggregate_file("data/measurements.txt")?;
//! print!("{}", Report::from_aggregate(aggregate).display(OutputFormat::Lines));
//! # Ok::<(), one_brc::AggregateError>(())
//! ```

pub mod aggregate;
pub mod chunk;
pub mod config;
pub mod error;
pub mod executor;
pub mod record;
pub mod report;
pub mod stats;

pub use aggregate::{aggregate_chunk, Aggregate};
pub use chunk::{split_mapped, Chunk, ChunkReader};
pub use config::{Config, Strategy};
pub use error::{AggregateError, Result};
pub use executor::Executor;
pub use record::{parse_record, ParseError, Record, Temperature};
pub use report::{OutputFormat, Report, StationSummary};
pub use stats::StationStats;
