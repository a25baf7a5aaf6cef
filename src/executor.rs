//! Drives chunking, per-chunk aggregation and merging for one input.
//!
//! Two strategies share the same parser, aggregator and merge:
//!
//! * streaming: the calling thread reads chunks into a bounded queue, the
//!   workers of the executor's pool turn them into partial aggregates, and a
//!   single merger thread folds the partials as they arrive;
//! * memory-mapped: the file is mapped, split in place, and the partials are
//!   combined by a parallel reduction tree on the same pool.
//!
//! On failure the first error wins, no new chunks are handed out, and no
//! partial result escapes.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver};
use memmap2::Mmap;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate_chunk, Aggregate};
use crate::chunk::{split_mapped, Chunk, ChunkReader};
use crate::config::{Config, Strategy};
use crate::error::{AggregateError, Result};

/// Owns the worker pool for aggregation runs. Dropping it shuts the pool down.
pub struct Executor {
    config: Config,
    pool: ThreadPool,
}

impl Executor {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("brc-worker-{i}"))
            .build()
            .map_err(|e| AggregateError::exhausted(0, 0, "worker pool", e))?;
        Ok(Executor { config, pool })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Aggregates the file at `path` using the configured [`Strategy`].
    pub fn aggregate_file(&self, path: impl AsRef<Path>) -> Result<Aggregate> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| AggregateError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), strategy = ?self.config.strategy, "aggregating file");
        match self.config.strategy {
            Strategy::Stream => self.aggregate_reader(file),
            Strategy::Mmap => self.aggregate_mapped(&file),
        }
    }

    /// Aggregates any byte stream through the bounded worker pipeline.
    ///
    /// At most `workers + queue_depth` chunks are alive at once, plus the one
    /// the reader is handing over and the partials waiting for the merger.
    pub fn aggregate_reader<R: Read>(&self, reader: R) -> Result<Aggregate> {
        let delimiter = self.config.delimiter;
        self.run_pipeline(reader, |chunk| aggregate_chunk(chunk, delimiter))
    }

    fn run_pipeline<R, F>(&self, reader: R, process: F) -> Result<Aggregate>
    where
        R: Read,
        F: Fn(&Chunk<'_>) -> Result<Aggregate> + Sync,
    {
        let started = Instant::now();
        let Config {
            chunk_size,
            workers,
            queue_depth,
            ..
        } = self.config;
        let process = &process;

        let failure = OnceLock::new();
        let mut chunks = ChunkReader::new(reader, chunk_size);

        let merged = thread::scope(|scope| {
            let failure = &failure;
            let (chunk_tx, chunk_rx) = bounded::<Chunk<'static>>(queue_depth);
            let (partial_tx, partial_rx) = bounded::<Aggregate>(workers);

            let merger = thread::Builder::new()
                .name("brc-merger".into())
                .spawn_scoped(scope, move || merge_partials(partial_rx, failure))
                .map_err(|e| AggregateError::exhausted(0, 0, "merger thread", e))?;

            let dispatched = self.pool.in_place_scope(|s| {
                // every worker holds a pool thread for the whole run
                for _ in 0..workers {
                    let chunk_rx = chunk_rx.clone();
                    let partial_tx = partial_tx.clone();
                    s.spawn(move |_| {
                        for chunk in chunk_rx.iter() {
                            if failure.get().is_some() {
                                break;
                            }
                            debug!(chunk = chunk.index, offset = chunk.offset, bytes = chunk.len(), "aggregating chunk");
                            match process(&chunk) {
                                Ok(partial) => {
                                    if partial_tx.send(partial).is_err() {
                                        break;
                                    }
                                }
                                Err(err) => {
                                    record_failure(failure, err);
                                    break;
                                }
                            }
                        }
                    });
                }
                drop(chunk_rx);
                drop(partial_tx);

                let mut dispatched = 0usize;
                while failure.get().is_none() {
                    match chunks.next() {
                        Some(Ok(chunk)) => {
                            // fails only once every worker has stopped
                            if chunk_tx.send(chunk).is_err() {
                                break;
                            }
                            dispatched += 1;
                        }
                        Some(Err(err)) => {
                            record_failure(failure, err);
                            break;
                        }
                        None => break,
                    }
                }
                drop(chunk_tx);
                dispatched
            });

            merger
                .join()
                .map(|total| (total, dispatched))
                .map_err(|_| AggregateError::WorkerPanicked { role: "merger" })
        });

        if let Some(err) = failure.into_inner() {
            warn!(error = %err, "aggregation aborted");
            return Err(err);
        }
        let (aggregate, dispatched) = merged?;
        info!(
            bytes = chunks.bytes_consumed(),
            chunks = dispatched,
            records = aggregate.records(),
            stations = aggregate.len(),
            elapsed = ?started.elapsed(),
            "aggregation finished"
        );
        Ok(aggregate)
    }

    /// Aggregates an in-memory buffer as a parallel reduction tree.
    pub fn aggregate_bytes(&self, bytes: &[u8]) -> Result<Aggregate> {
        let started = Instant::now();
        let delimiter = self.config.delimiter;
        let chunks: Vec<Chunk<'_>> = split_mapped(bytes, self.config.chunk_size).collect();
        debug!(chunks = chunks.len(), "split mapped input");

        let result = self.pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| aggregate_chunk(chunk, delimiter))
                .try_reduce(Aggregate::new, |a, b| Ok(a.merged(b)))
        });

        match result {
            Ok(aggregate) => {
                info!(
                    bytes = bytes.len(),
                    chunks = chunks.len(),
                    records = aggregate.records(),
                    stations = aggregate.len(),
                    elapsed = ?started.elapsed(),
                    "aggregation finished"
                );
                Ok(aggregate)
            }
            Err(err) => {
                warn!(error = %err, "aggregation aborted");
                Err(err)
            }
        }
    }

    fn aggregate_mapped(&self, file: &File) -> Result<Aggregate> {
        let io_error = |source| AggregateError::Io {
            chunk: 0,
            offset: 0,
            source,
        };
        // mapping an empty file is an error on some platforms
        if file.metadata().map_err(io_error)?.len() == 0 {
            return Ok(Aggregate::new());
        }
        // SAFETY: the map is read-only and dropped before returning. The input
        // must not be truncated by another process while it is aggregated.
        let mmap = unsafe { Mmap::map(file) }.map_err(io_error)?;
        self.aggregate_bytes(&mmap)
    }
}

fn merge_partials(partials: Receiver<Aggregate>, failure: &OnceLock<AggregateError>) -> Aggregate {
    let mut total = Aggregate::new();
    for partial in partials {
        // keep draining after a failure so workers never block on send
        if failure.get().is_none() {
            total.merge(partial);
        }
    }
    total
}

fn record_failure(failure: &OnceLock<AggregateError>, err: AggregateError) {
    if let Err(later) = failure.set(err) {
        debug!(error = %later, "dropping error raised after the first failure");
    }
}
