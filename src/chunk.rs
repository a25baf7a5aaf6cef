//! Line-aligned chunking of the input.
//!
//! A chunk is cut at the first line terminator found at or after its target
//! size, so every chunk except possibly the last ends with `\n`. The cut rule
//! only looks at the bytes, which means a stream and a memory map of the same
//! input are split at exactly the same places.

use std::borrow::Cow;
use std::io::{self, Read};
use std::iter::FusedIterator;

use memchr::memchr;

use crate::error::{AggregateError, Result};

/// How much more to read while looking for the end of the current line.
pub(crate) const EXTEND_READ: usize = 64 * 1024;
/// Largest single read while filling a chunk up to its target size.
const MAX_READ: usize = 8 * 1024 * 1024;

/// A contiguous, line-aligned byte range of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Position of this chunk in input order, starting at zero.
    pub index: usize,
    /// Absolute byte offset of the first byte of this chunk.
    pub offset: u64,
    pub bytes: Cow<'a, [u8]>,
}

impl<'a> Chunk<'a> {
    pub fn borrowed(index: usize, offset: u64, bytes: &'a [u8]) -> Self {
        Chunk {
            index,
            offset,
            bytes: Cow::Borrowed(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lines of the chunk without their terminators, paired with their
    /// offset relative to the start of the chunk.
    pub fn lines(&self) -> Lines<'_> {
        Lines {
            bytes: &self.bytes,
            pos: 0,
        }
    }
}

pub struct Lines<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = (usize, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.bytes[start..];
        let end = memchr(b'\n', rest).unwrap_or(rest.len());
        self.pos = start + end + 1;
        Some((start, &rest[..end]))
    }
}

impl FusedIterator for Lines<'_> {}

/// Index just past the first `\n` in `buf[from..]`.
fn cut_after(buf: &[u8], from: usize) -> Option<usize> {
    memchr(b'\n', &buf[from..]).map(|pos| from + pos + 1)
}

/// Splits any [`Read`] into owned, line-aligned chunks of at least
/// `target` bytes (the last one may be shorter).
pub struct ChunkReader<R> {
    reader: R,
    target: usize,
    /// Bytes read past the previous cut; they start the next chunk.
    carry: Vec<u8>,
    next_index: usize,
    offset: u64,
    eof: bool,
    failed: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R, target: usize) -> Self {
        ChunkReader {
            reader,
            target: target.max(1),
            carry: Vec::new(),
            next_index: 0,
            offset: 0,
            eof: false,
            failed: false,
        }
    }

    /// Total bytes handed out in chunks so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.offset
    }

    /// Appends up to `want` bytes to `buf`. Sets `eof` on a zero-length read.
    fn fill(&mut self, buf: &mut Vec<u8>, want: usize) -> Result<()> {
        let start = buf.len();
        let position = self.offset + start as u64;
        buf.try_reserve(want).map_err(|e| {
            AggregateError::exhausted(self.next_index, position, "chunk buffer", e)
        })?;
        buf.resize(start + want, 0);
        loop {
            match self.reader.read(&mut buf[start..]) {
                Ok(n) => {
                    buf.truncate(start + n);
                    if n == 0 {
                        self.eof = true;
                    }
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    buf.truncate(start);
                    return Err(AggregateError::Io {
                        chunk: self.next_index,
                        offset: position,
                        source,
                    });
                }
            }
        }
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk<'static>>> {
        let mut buf = std::mem::take(&mut self.carry);
        while buf.len() < self.target && !self.eof {
            let want = (self.target - buf.len()).min(MAX_READ);
            self.fill(&mut buf, want)?;
        }

        let mut search_from = (self.target - 1).min(buf.len());
        let cut = loop {
            if let Some(cut) = cut_after(&buf, search_from) {
                break cut;
            }
            if self.eof {
                break buf.len();
            }
            search_from = buf.len();
            self.fill(&mut buf, EXTEND_READ)?;
        };
        if cut == 0 {
            return Ok(None);
        }

        self.carry = buf.split_off(cut);
        let chunk = Chunk {
            index: self.next_index,
            offset: self.offset,
            bytes: Cow::Owned(buf),
        };
        self.next_index += 1;
        self.offset += cut as u64;
        Ok(Some(chunk))
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Chunk<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> FusedIterator for ChunkReader<R> {}

/// Splits an in-memory buffer (typically a memory map) with the same cut rule
/// as [`ChunkReader`], borrowing instead of copying.
pub fn split_mapped(bytes: &[u8], target: usize) -> MappedChunks<'_> {
    MappedChunks {
        bytes,
        target: target.max(1),
        index: 0,
        pos: 0,
    }
}

pub struct MappedChunks<'a> {
    bytes: &'a [u8],
    target: usize,
    index: usize,
    pos: usize,
}

impl<'a> Iterator for MappedChunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.bytes[self.pos..];
        if rest.is_empty() {
            return None;
        }
        let from = (self.target - 1).min(rest.len());
        let len = cut_after(rest, from).unwrap_or(rest.len());
        let chunk = Chunk::borrowed(self.index, self.pos as u64, &rest[..len]);
        self.index += 1;
        self.pos += len;
        Some(chunk)
    }
}

impl FusedIterator for MappedChunks<'_> {}
