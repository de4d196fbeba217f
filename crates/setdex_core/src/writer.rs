//! Append-only writer for sentinel-terminated member arrays.

use crate::error::{CoreError, CoreResult};
use crate::extractor::SegmentMembership;
use crate::types::{SetId, UserId, SENTINEL};
use setdex_storage::{StorageBackend, WORD_SIZE};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Where the first record of a fresh array file may start.
///
/// The dense index stores `0` for absent sets. With [`OffsetBase::Zero`] the
/// first record written also starts at byte 0, so its index entry cannot be
/// told apart from "absent". [`OffsetBase::Reserved`] writes one leading
/// sentinel word, which moves every record to offset 4 or later and keeps
/// index value 0 unambiguous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffsetBase {
    /// Records start at byte 0. Compatible with existing consumers.
    #[default]
    Zero,
    /// A leading sentinel word reserves byte 0.
    Reserved,
}

/// `set_id -> byte offset` of every record written so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetMap {
    offsets: BTreeMap<SetId, u32>,
}

impl OffsetMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the offset of `set_id`, returning the previous one if any.
    pub fn insert(&mut self, set_id: SetId, offset: u32) -> Option<u32> {
        self.offsets.insert(set_id, offset)
    }

    /// Offset of `set_id`'s record.
    #[must_use]
    pub fn get(&self, set_id: SetId) -> Option<u32> {
        self.offsets.get(&set_id).copied()
    }

    /// Number of recorded sets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Largest recorded set id.
    #[must_use]
    pub fn max_set_id(&self) -> Option<SetId> {
        self.offsets.keys().next_back().copied()
    }

    /// Iterates `(set_id, offset)` in ascending set id order.
    pub fn iter(&self) -> impl Iterator<Item = (SetId, u32)> + '_ {
        self.offsets.iter().map(|(id, off)| (*id, *off))
    }
}

impl FromIterator<(SetId, u32)> for OffsetMap {
    fn from_iter<T: IntoIterator<Item = (SetId, u32)>>(iter: T) -> Self {
        Self {
            offsets: iter.into_iter().collect(),
        }
    }
}

/// Durable log of `(set_id, offset)` entries, one per written record.
///
/// Each entry is two little-endian `u32` words. Replaying the journal
/// rebuilds the offset map of an interrupted run; later entries for the
/// same set win.
pub struct OffsetJournal {
    backend: Box<dyn StorageBackend>,
}

impl OffsetJournal {
    /// Wraps a backend holding (or about to hold) journal entries.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub fn record(&mut self, set_id: SetId, offset: u32) -> CoreResult<()> {
        self.backend.append_words(&[set_id, offset])?;
        Ok(())
    }

    /// Rebuilds the offset map from the entries written so far.
    ///
    /// An entry is recorded just before its record is appended, so a crash
    /// in between leaves an entry at the end of the array file with no
    /// record behind it. Entries at or past `arrays_size` are skipped so a
    /// later record written at that offset is not attributed to them.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if the journal is not a whole
    /// number of entries.
    pub fn replay(&self, arrays_size: u64) -> CoreResult<OffsetMap> {
        let size = self.backend.size()?;
        let entry_size = (2 * WORD_SIZE) as u64;
        if size % entry_size != 0 {
            return Err(CoreError::invalid_format(format!(
                "offsets journal is {size} bytes, not a multiple of {entry_size}"
            )));
        }
        let words = self.backend.read_words_at(0, (size / WORD_SIZE as u64) as usize)?;

        let mut offsets = OffsetMap::new();
        for entry in words.chunks_exact(2) {
            let (set_id, offset) = (entry[0], entry[1]);
            if u64::from(offset) >= arrays_size {
                warn!(
                    set_id,
                    offset, arrays_size, "skipping journal entry without a written record"
                );
                continue;
            }
            offsets.insert(set_id, offset);
        }
        Ok(offsets)
    }

    fn sync(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        self.backend.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for OffsetJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffsetJournal").finish_non_exhaustive()
    }
}

/// Counters for one written segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentWriteStats {
    /// Records appended.
    pub written: usize,
    /// Sets skipped for having at most one member.
    pub dropped: usize,
    /// Bytes appended, terminators included.
    pub bytes: u64,
}

/// Appends member arrays to an array file and tracks their offsets.
///
/// Each record is the set's members followed by [`SENTINEL`], written as
/// little-endian `u32`. Records are appended and never rewritten, so an
/// offset is final the moment it is recorded.
pub struct CompactArrayWriter {
    arrays: Box<dyn StorageBackend>,
    journal: Option<OffsetJournal>,
    offsets: OffsetMap,
}

impl CompactArrayWriter {
    /// Creates a writer appending to `arrays`.
    pub fn new(arrays: Box<dyn StorageBackend>) -> Self {
        Self {
            arrays,
            journal: None,
            offsets: OffsetMap::new(),
        }
    }

    /// Mirrors every recorded offset into `journal`.
    #[must_use]
    pub fn with_journal(mut self, journal: OffsetJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Seeds the offset map, typically from a replayed journal.
    #[must_use]
    pub fn with_offsets(mut self, offsets: OffsetMap) -> Self {
        self.offsets = offsets;
        self
    }

    /// Applies `base` to an empty array file.
    ///
    /// With [`OffsetBase::Reserved`] a single sentinel word is written;
    /// a file that already has data is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub fn apply_offset_base(&mut self, base: OffsetBase) -> CoreResult<()> {
        if base == OffsetBase::Reserved && self.arrays.size()? == 0 {
            self.arrays.append_words(&[SENTINEL])?;
            debug!("reserved offset 0 with a leading sentinel");
        }
        Ok(())
    }

    /// Appends one set's record, unless it has at most one member.
    ///
    /// Returns the record's offset, or `None` if the set was dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OffsetOverflow`] if the record would start past
    /// `u32::MAX`, or a storage error.
    pub fn write_set(&mut self, set_id: SetId, members: &[UserId]) -> CoreResult<Option<u32>> {
        if members.len() <= 1 {
            return Ok(None);
        }

        let start = self.arrays.size()?;
        let offset = u32::try_from(start)
            .map_err(|_| CoreError::OffsetOverflow { set_id, offset: start })?;

        let mut record = Vec::with_capacity(members.len() + 1);
        record.extend_from_slice(members);
        record.push(SENTINEL);

        self.offsets.insert(set_id, offset);
        if let Some(journal) = self.journal.as_mut() {
            journal.record(set_id, offset)?;
        }
        let written_at = self.arrays.append_words(&record)?;
        debug_assert_eq!(written_at, start);
        debug!(
            set_id,
            offset,
            bytes = record.len() * WORD_SIZE,
            "wrote member array"
        );
        Ok(Some(offset))
    }

    /// Appends every eligible set of `membership` in segment order.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`write_set`](Self::write_set).
    pub fn write_segment(&mut self, membership: &SegmentMembership) -> CoreResult<SegmentWriteStats> {
        let before = self.arrays.size()?;
        let mut stats = SegmentWriteStats::default();
        for (set_id, members) in membership.iter() {
            match self.write_set(set_id, members)? {
                Some(_) => stats.written += 1,
                None => stats.dropped += 1,
            }
        }
        self.arrays.flush()?;
        let after = self.arrays.size()?;
        stats.bytes = after - before;

        info!(
            written = stats.written,
            bytes = stats.bytes,
            "{after} bytes in array file, skipped {} sets with at most 1 member",
            stats.dropped
        );
        Ok(stats)
    }

    /// Offsets recorded so far.
    #[must_use]
    pub fn offsets(&self) -> &OffsetMap {
        &self.offsets
    }

    /// Current size of the array file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.arrays.size()?)
    }

    /// Makes the array file and journal durable and hands back the array
    /// backend with the final offset map.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or syncing fails.
    pub fn finish(mut self) -> CoreResult<(Box<dyn StorageBackend>, OffsetMap)> {
        self.arrays.flush()?;
        self.arrays.sync()?;
        if let Some(journal) = self.journal.as_mut() {
            journal.sync()?;
        }
        Ok((self.arrays, self.offsets))
    }
}

impl std::fmt::Debug for CompactArrayWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactArrayWriter")
            .field("records", &self.offsets.len())
            .field("journaled", &self.journal.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setdex_storage::InMemoryBackend;
    use std::sync::Arc;

    /// Shares one in-memory buffer between the writer and the test.
    #[derive(Clone, Default)]
    struct Shared(Arc<parking_lot::Mutex<InMemoryBackend>>);

    impl StorageBackend for Shared {
        fn read_at(&self, offset: u64, len: usize) -> setdex_storage::StorageResult<Vec<u8>> {
            self.0.lock().read_at(offset, len)
        }
        fn append(&mut self, data: &[u8]) -> setdex_storage::StorageResult<u64> {
            self.0.lock().append(data)
        }
        fn flush(&mut self) -> setdex_storage::StorageResult<()> {
            Ok(())
        }
        fn size(&self) -> setdex_storage::StorageResult<u64> {
            self.0.lock().size()
        }
        fn sync(&mut self) -> setdex_storage::StorageResult<()> {
            Ok(())
        }
    }

    fn segment(sets: &[(SetId, &[UserId])]) -> SegmentMembership {
        let ids: Vec<SetId> = sets.iter().map(|(id, _)| *id).collect();
        let mut membership = SegmentMembership::new(&ids);
        for (set_id, members) in sets {
            for user_id in *members {
                membership.record(*user_id, *set_id);
            }
        }
        membership
    }

    #[test]
    fn writes_terminated_records_and_offsets() {
        let arrays = Shared::default();
        let mut writer = CompactArrayWriter::new(Box::new(arrays.clone()));

        let stats = writer
            .write_segment(&segment(&[(5, &[1, 2]), (7, &[3, 1]), (12, &[9])]))
            .unwrap();

        assert_eq!(
            stats,
            SegmentWriteStats {
                written: 2,
                dropped: 1,
                bytes: 24
            }
        );
        assert_eq!(arrays.0.lock().words(), vec![1, 2, 0, 3, 1, 0]);
        assert_eq!(writer.offsets().get(5), Some(0));
        assert_eq!(writer.offsets().get(7), Some(12));
        assert_eq!(writer.offsets().get(12), None);
    }

    #[test]
    fn empty_and_singleton_sets_are_dropped() {
        let mut writer = CompactArrayWriter::new(Box::new(InMemoryBackend::new()));
        assert_eq!(writer.write_set(1, &[]).unwrap(), None);
        assert_eq!(writer.write_set(2, &[8]).unwrap(), None);
        assert!(writer.offsets().is_empty());
        assert_eq!(writer.size().unwrap(), 0);
    }

    #[test]
    fn reserved_base_moves_first_record() {
        let arrays = Shared::default();
        let mut writer = CompactArrayWriter::new(Box::new(arrays.clone()));
        writer.apply_offset_base(OffsetBase::Reserved).unwrap();
        writer.apply_offset_base(OffsetBase::Reserved).unwrap();

        assert_eq!(writer.write_set(5, &[1, 2]).unwrap(), Some(4));
        assert_eq!(arrays.0.lock().words(), vec![0, 1, 2, 0]);
    }

    #[test]
    fn zero_base_writes_nothing() {
        let mut writer = CompactArrayWriter::new(Box::new(InMemoryBackend::new()));
        writer.apply_offset_base(OffsetBase::Zero).unwrap();
        assert_eq!(writer.size().unwrap(), 0);
    }

    #[test]
    fn journal_replays_to_offset_map() {
        let journal_store = Shared::default();
        let mut writer = CompactArrayWriter::new(Box::new(InMemoryBackend::new()))
            .with_journal(OffsetJournal::new(Box::new(journal_store.clone())));

        writer.write_set(5, &[1, 2]).unwrap();
        writer.write_set(7, &[3, 1]).unwrap();
        writer.write_set(5, &[4, 6]).unwrap();
        let (_, offsets) = writer.finish().unwrap();

        let replayed = OffsetJournal::new(Box::new(journal_store))
            .replay(36)
            .unwrap();
        assert_eq!(replayed, offsets);
        assert_eq!(replayed.get(5), Some(24));
    }

    #[test]
    fn torn_journal_is_rejected() {
        let journal = OffsetJournal::new(Box::new(InMemoryBackend::with_words(&[5, 0, 7])));
        assert!(matches!(journal.replay(64), Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn seeded_offsets_are_kept() {
        let seed: OffsetMap = [(3, 0)].into_iter().collect();
        let mut writer = CompactArrayWriter::new(Box::new(InMemoryBackend::with_words(&[8, 9, 0])))
            .with_offsets(seed);

        assert_eq!(writer.write_set(4, &[1, 2]).unwrap(), Some(12));
        assert_eq!(writer.offsets().get(3), Some(0));
        assert_eq!(writer.offsets().max_set_id(), Some(4));
    }

    #[test]
    fn replay_skips_entry_without_record() {
        // (7, 12) was journaled but the array file stopped at 12 bytes.
        let journal = OffsetJournal::new(Box::new(InMemoryBackend::with_words(&[5, 0, 7, 12])));
        let replayed = journal.replay(12).unwrap();
        assert_eq!(replayed.get(5), Some(0));
        assert_eq!(replayed.get(7), None);
        assert_eq!(replayed.len(), 1);
    }

    #[test]
    fn stale_entry_does_not_shadow_earlier_one() {
        let journal =
            OffsetJournal::new(Box::new(InMemoryBackend::with_words(&[5, 4, 5, 24])));
        assert_eq!(journal.replay(24).unwrap().get(5), Some(4));
    }

    #[test]
    fn reserved_base_leaves_existing_data_alone() {
        let arrays = Shared::default();
        arrays.0.lock().append_words(&[0, 1, 2, 0]).unwrap();
        let mut writer = CompactArrayWriter::new(Box::new(arrays.clone()));
        writer.apply_offset_base(OffsetBase::Reserved).unwrap();

        assert_eq!(writer.write_set(7, &[3, 1]).unwrap(), Some(16));
        assert_eq!(arrays.0.lock().words(), vec![0, 1, 2, 0, 3, 1, 0]);
    }
}
