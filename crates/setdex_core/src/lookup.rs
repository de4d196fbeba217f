//! Reading member arrays back by offset.

use crate::error::{CoreError, CoreResult};
use crate::types::{UserId, SENTINEL};
use setdex_storage::{StorageBackend, WORD_SIZE};

/// Words fetched per read while scanning for the terminator.
const LOOKUP_CHUNK_WORDS: usize = 1024;

/// Reads the member array starting at byte `offset` of `arrays`.
///
/// Words are consumed until the [`SENTINEL`] terminator, which is not part
/// of the result.
///
/// # Errors
///
/// Returns [`CoreError::InvalidFormat`] if the offset is not word aligned or
/// the file ends before a terminator.
pub fn read_members(arrays: &dyn StorageBackend, offset: u32) -> CoreResult<Vec<UserId>> {
    let mut pos = u64::from(offset);
    if pos % WORD_SIZE as u64 != 0 {
        return Err(CoreError::invalid_format(format!(
            "offset {offset} is not aligned to {WORD_SIZE} bytes"
        )));
    }

    let size = arrays.size()?;
    let mut members = Vec::new();
    while pos + WORD_SIZE as u64 <= size {
        let remaining = ((size - pos) / WORD_SIZE as u64) as usize;
        let words = arrays.read_words_at(pos, remaining.min(LOOKUP_CHUNK_WORDS))?;
        if let Some(end) = words.iter().position(|&w| w == SENTINEL) {
            members.extend_from_slice(&words[..end]);
            return Ok(members);
        }
        pos += (words.len() * WORD_SIZE) as u64;
        members.extend(words);
    }

    Err(CoreError::invalid_format(format!(
        "array at offset {offset} has no terminator before end of file"
    )))
}
