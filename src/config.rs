use std::num::NonZeroUsize;
use std::thread;

use crate::error::{AggregateError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_DELIMITER: u8 = b';';

/// How an input file is turned into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Read the file as a stream through a bounded worker pipeline.
    #[default]
    Stream,
    /// Memory-map the file and reduce chunks as a parallel tree.
    Mmap,
}

/// Knobs of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Minimum size of a chunk in bytes; chunks are extended to the next line end.
    pub chunk_size: usize,
    /// Number of aggregation workers.
    pub workers: usize,
    /// Chunks that may wait for a worker on top of the ones being processed.
    pub queue_depth: usize,
    pub delimiter: u8,
    pub strategy: Strategy,
}

impl Default for Config {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Config {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers,
            queue_depth: workers,
            delimiter: DEFAULT_DELIMITER,
            strategy: Strategy::default(),
        }
    }
}

impl Config {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AggregateError::InvalidConfig(
                "chunk size must be at least one byte".into(),
            ));
        }
        if self.workers == 0 {
            return Err(AggregateError::InvalidConfig(
                "at least one worker is required".into(),
            ));
        }
        if self.queue_depth == 0 {
            return Err(AggregateError::InvalidConfig(
                "queue depth must be at least one".into(),
            ));
        }
        if self.delimiter == b'\n' {
            return Err(AggregateError::InvalidConfig(
                "the delimiter cannot be the line terminator".into(),
            ));
        }
        Ok(())
    }
}
