//! Chunked reader over the raw pair stream.

use crate::progress::ProgressReporter;
use crate::types::{MembershipPair, PAIR_SIZE};
use setdex_storage::WORD_SIZE;
use std::io::{self, Read, Seek, SeekFrom};
use tracing::debug;

/// Result of one chunk read.
///
/// A chunk shorter than the reader's capacity is the only end-of-stream
/// signal; there is no EOF error for well-formed input.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome<'a> {
    /// A full chunk; more data may follow.
    Full(&'a [u32]),
    /// The last, shorter chunk. The stream is exhausted.
    Partial(&'a [u32]),
    /// Nothing left to read.
    Done,
}

/// Reads fixed-size chunks of little-endian `u32` words from a pair stream.
///
/// Every chunk holds whole pairs: the capacity is rounded down to an even
/// number of words, and bytes past the last whole pair at the end of the
/// stream are dropped.
#[derive(Debug)]
pub struct PairStreamReader<R> {
    inner: R,
    bytes: Vec<u8>,
    words: Vec<u32>,
    bytes_read: u64,
    finished: bool,
}

impl<R: Read + Seek> PairStreamReader<R> {
    /// Creates a reader returning at most `capacity` words per chunk.
    ///
    /// `capacity` is rounded down to a whole number of pairs, minimum one.
    pub fn new(inner: R, capacity: usize) -> Self {
        let capacity = (capacity - capacity % 2).max(2);
        Self {
            inner,
            bytes: vec![0; capacity * WORD_SIZE],
            words: Vec::with_capacity(capacity),
            bytes_read: 0,
            finished: false,
        }
    }

    /// Creates a reader whose chunks span `buffer_bytes` bytes.
    pub fn with_buffer_bytes(inner: R, buffer_bytes: usize) -> Self {
        Self::new(inner, buffer_bytes / WORD_SIZE)
    }

    /// Maximum number of words per chunk.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len() / WORD_SIZE
    }

    /// Bytes consumed since the last rewind, counting only whole pairs.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Seeks back to the start of the stream for another full scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying stream cannot seek.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(0))?;
        self.bytes_read = 0;
        self.finished = false;
        Ok(())
    }

    /// Reads the next chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails for a reason other
    /// than reaching the end of the stream.
    pub fn read_chunk(&mut self) -> io::Result<ReadOutcome<'_>> {
        if self.finished {
            return Ok(ReadOutcome::Done);
        }

        let filled = self.fill()?;
        let full = filled == self.bytes.len();
        let usable = filled - filled % PAIR_SIZE;
        if usable != filled {
            debug!(
                dropped = filled - usable,
                "ignoring trailing bytes that do not form a whole pair"
            );
        }

        self.words.clear();
        self.words.extend(
            self.bytes[..usable]
                .chunks_exact(WORD_SIZE)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
        );
        self.bytes_read += usable as u64;

        if full {
            Ok(ReadOutcome::Full(&self.words))
        } else {
            self.finished = true;
            if self.words.is_empty() {
                Ok(ReadOutcome::Done)
            } else {
                Ok(ReadOutcome::Partial(&self.words))
            }
        }
    }

    /// Rewinds and visits every pair of the stream in order.
    ///
    /// Returns the number of pairs visited.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking or reading fails.
    pub fn scan<F>(&mut self, progress: &mut ProgressReporter, mut visit: F) -> io::Result<u64>
    where
        F: FnMut(MembershipPair),
    {
        self.rewind()?;
        let mut pairs = 0u64;
        loop {
            let done = match self.read_chunk()? {
                ReadOutcome::Full(words) => {
                    pairs += visit_pairs(words, &mut visit);
                    false
                }
                ReadOutcome::Partial(words) => {
                    pairs += visit_pairs(words, &mut visit);
                    true
                }
                ReadOutcome::Done => true,
            };
            progress.update(self.bytes_read);
            if done {
                return Ok(pairs);
            }
        }
    }

    /// Reads until the buffer is full or the stream ends.
    fn fill(&mut self) -> io::Result<usize> {
        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.inner.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

fn visit_pairs<F: FnMut(MembershipPair)>(words: &[u32], visit: &mut F) -> u64 {
    let mut count = 0;
    for pair in words.chunks_exact(2) {
        visit(MembershipPair::from_words([pair[0], pair[1]]));
        count += 1;
    }
    count
}
