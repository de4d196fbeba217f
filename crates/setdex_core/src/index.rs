//! Dense `set_id -> offset` index.

use crate::error::{CoreError, CoreResult};
use crate::types::{SetId, SENTINEL};
use crate::writer::OffsetMap;
use setdex_storage::{StorageBackend, WORD_SIZE};
use tracing::info;

/// Which ids the dense index covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexRange {
    /// `0..=max_set_id`; every observed id is addressable.
    #[default]
    Inclusive,
    /// `0..max_set_id`; the largest id has no slot. Matches older index files.
    Exclusive,
}

impl IndexRange {
    /// Number of index slots for a universe whose largest id is `max_set_id`.
    #[must_use]
    pub fn slot_count(self, max_set_id: Option<SetId>) -> usize {
        match (self, max_set_id) {
            (_, None) => 0,
            (Self::Inclusive, Some(max)) => max as usize + 1,
            (Self::Exclusive, Some(max)) => max as usize,
        }
    }
}

/// Expands a sparse [`OffsetMap`] into a dense array.
///
/// Slot `i` holds the offset of set `i`'s record, or `0` if set `i` has no
/// record. Memory is linear in the id range, not in the number of sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseIndexBuilder {
    range: IndexRange,
}

impl DenseIndexBuilder {
    /// Creates a builder for `range`.
    #[must_use]
    pub fn new(range: IndexRange) -> Self {
        Self { range }
    }

    /// Builds the dense array over the ids up to `max_set_id`.
    ///
    /// Offsets of ids outside the range are left out.
    #[must_use]
    pub fn build(&self, offsets: &OffsetMap, max_set_id: Option<SetId>) -> DenseIndex {
        let mut entries = vec![SENTINEL; self.range.slot_count(max_set_id)];
        for (set_id, offset) in offsets.iter() {
            if let Some(slot) = entries.get_mut(set_id as usize) {
                *slot = offset;
            }
        }
        DenseIndex { entries }
    }

    /// Builds the index and writes it to `backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write(
        &self,
        offsets: &OffsetMap,
        max_set_id: Option<SetId>,
        backend: &mut dyn StorageBackend,
    ) -> CoreResult<DenseIndex> {
        let index = self.build(offsets, max_set_id);
        backend.append_words(&index.entries)?;
        backend.flush()?;
        backend.sync()?;
        info!(
            slots = index.len(),
            populated = index.populated(),
            "finished generating index file"
        );
        Ok(index)
    }
}

/// A loaded dense index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenseIndex {
    entries: Vec<u32>,
}

impl DenseIndex {
    /// Reads a whole index file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if the file is not a whole number
    /// of words.
    pub fn load(backend: &dyn StorageBackend) -> CoreResult<Self> {
        let size = backend.size()?;
        if size % WORD_SIZE as u64 != 0 {
            return Err(CoreError::invalid_format(format!(
                "index file is {size} bytes, not a multiple of {WORD_SIZE}"
            )));
        }
        let entries = backend.read_words_at(0, (size / WORD_SIZE as u64) as usize)?;
        Ok(Self { entries })
    }

    /// Offset of `set_id`'s record, or `None` if the slot is `0` or out of range.
    ///
    /// With [`OffsetBase::Zero`](crate::OffsetBase::Zero) a record that
    /// really starts at byte 0 also reads as `None`.
    #[must_use]
    pub fn offset(&self, set_id: SetId) -> Option<u32> {
        match self.entries.get(set_id as usize) {
            Some(&offset) if offset != SENTINEL => Some(offset),
            _ => None,
        }
    }

    /// Raw slots.
    #[must_use]
    pub fn entries(&self) -> &[u32] {
        &self.entries
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of non-zero slots.
    #[must_use]
    pub fn populated(&self) -> usize {
        self.entries.iter().filter(|&&o| o != SENTINEL).count()
    }

    /// The non-zero slots as an offset map.
    #[must_use]
    pub fn to_offset_map(&self) -> OffsetMap {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, &offset)| offset != SENTINEL)
            .map(|(set_id, &offset)| (set_id as SetId, offset))
            .collect()
    }
}
