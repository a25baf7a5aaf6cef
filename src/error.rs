use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::ParseError;

/// Longest slice of an offending line kept in a [`AggregateError::MalformedRecord`].
const LINE_EXCERPT_LEN: usize = 128;

pub type Result<T, E = AggregateError> = std::result::Result<T, E>;

/// Every way a run can fail. A run that fails never yields a partial result.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("malformed record in chunk {chunk} at byte {offset}: {reason} (line: {line:?})")]
    MalformedRecord {
        chunk: usize,
        offset: u64,
        line: String,
        reason: ParseError,
    },

    #[error("failed to read chunk {chunk} at byte {offset}")]
    Io {
        chunk: usize,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not allocate {what} for chunk {chunk} at byte {offset}")]
    ResourceExhausted {
        chunk: usize,
        offset: u64,
        what: &'static str,
        #[source]
        source: ResourceError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{role} thread panicked")]
    WorkerPanicked { role: &'static str },
}

/// The underlying failure behind [`AggregateError::ResourceExhausted`].
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Alloc(#[from] TryReserveError),
    #[error(transparent)]
    Spawn(#[from] io::Error),
    #[error(transparent)]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl AggregateError {
    pub(crate) fn malformed(chunk: usize, offset: u64, line: &[u8], reason: ParseError) -> Self {
        let excerpt = &line[..line.len().min(LINE_EXCERPT_LEN)];
        AggregateError::MalformedRecord {
            chunk,
            offset,
            line: String::from_utf8_lossy(excerpt).into_owned(),
            reason,
        }
    }

    pub(crate) fn exhausted(
        chunk: usize,
        offset: u64,
        what: &'static str,
        source: impl Into<ResourceError>,
    ) -> Self {
        AggregateError::ResourceExhausted {
            chunk,
            offset,
            what,
            source: source.into(),
        }
    }
}
