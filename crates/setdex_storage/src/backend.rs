//! Storage backend trait definition.

use crate::error::StorageResult;

/// Width in bytes of one stored word.
pub const WORD_SIZE: usize = 4;

/// A low-level append-only storage backend.
///
/// Backends are **opaque byte stores**. The member-array, index and
/// journal formats are interpreted by `setdex_core`; backends only move
/// bytes.
///
/// # Invariants
///
/// - `append` returns the offset where data was written, which equals
///   `size()` immediately before the call
/// - `read_at` returns exactly the bytes previously written at that offset
/// - bytes are never rewritten once appended
/// - `flush` pushes appended data to the OS, `sync` makes it durable
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`](crate::StorageError::ReadPastEnd)
    /// if the range extends past the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs or the backend is read-only.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes all pending writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Appends `words` as little-endian `u32` values.
    ///
    /// Returns the byte offset of the first word.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`append`](Self::append).
    fn append_words(&mut self, words: &[u32]) -> StorageResult<u64> {
        let mut data = Vec::with_capacity(words.len() * WORD_SIZE);
        for word in words {
            data.extend_from_slice(&word.to_le_bytes());
        }
        self.append(&data)
    }

    /// Reads the little-endian `u32` at byte `offset`.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`read_at`](Self::read_at).
    fn read_word_at(&self, offset: u64) -> StorageResult<u32> {
        let bytes = self.read_at(offset, WORD_SIZE)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads `count` consecutive little-endian `u32` values from `offset`.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`read_at`](Self::read_at).
    fn read_words_at(&self, offset: u64, count: usize) -> StorageResult<Vec<u32>> {
        let bytes = self.read_at(offset, count * WORD_SIZE)?;
        Ok(bytes
            .chunks_exact(WORD_SIZE)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}
