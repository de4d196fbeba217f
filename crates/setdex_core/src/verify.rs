//! Post-build integrity check of the array file.

use crate::error::{CoreError, CoreResult};
use crate::index::DenseIndex;
use crate::types::SENTINEL;
use crate::writer::OffsetMap;
use setdex_storage::{StorageBackend, WORD_SIZE};
use tracing::{debug, info};

/// Outcome of a successful verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Offsets whose preceding word was checked.
    pub checked: usize,
    /// Offsets below one word, which have no preceding record.
    pub skipped: usize,
}

/// Checks that the word before every recorded offset is the terminator of
/// the previous record.
///
/// The first violation is fatal: the array file cannot be repaired and the
/// build must be rerun from scratch.
pub struct IntegrityVerifier<'a> {
    arrays: &'a dyn StorageBackend,
}

impl<'a> IntegrityVerifier<'a> {
    /// Creates a verifier over an array file.
    pub fn new(arrays: &'a dyn StorageBackend) -> Self {
        Self { arrays }
    }

    /// Verifies every offset of `offsets`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IntegrityViolation`] for a non-terminator word,
    /// [`CoreError::DanglingOffset`] for an offset outside the file, or a
    /// storage error.
    pub fn verify(&self, offsets: &OffsetMap) -> CoreResult<VerifyReport> {
        let size = self.arrays.size()?;
        let mut report = VerifyReport::default();

        for (set_id, offset) in offsets.iter() {
            debug!(set_id, offset, "checking terminator");
            if u64::from(offset) >= size {
                return Err(CoreError::DanglingOffset {
                    set_id,
                    offset,
                    size,
                });
            }
            let Some(preceding) = u64::from(offset).checked_sub(WORD_SIZE as u64) else {
                report.skipped += 1;
                continue;
            };
            let found = self.arrays.read_word_at(preceding)?;
            if found != SENTINEL {
                return Err(CoreError::IntegrityViolation {
                    set_id,
                    offset,
                    found,
                });
            }
            report.checked += 1;
        }

        info!(
            checked = report.checked,
            skipped = report.skipped,
            "array file integrity verified"
        );
        Ok(report)
    }

    /// Verifies the non-zero entries of a loaded index.
    ///
    /// # Errors
    ///
    /// Same as [`verify`](Self::verify).
    pub fn verify_index(&self, index: &DenseIndex) -> CoreResult<VerifyReport> {
        self.verify(&index.to_offset_map())
    }
}

impl std::fmt::Debug for IntegrityVerifier<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityVerifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setdex_storage::InMemoryBackend;

    fn offsets(entries: &[(u32, u32)]) -> OffsetMap {
        entries.iter().copied().collect()
    }

    #[test]
    fn well_formed_file_passes() {
        let arrays = InMemoryBackend::with_words(&[1, 2, 0, 3, 1, 0]);
        let report = IntegrityVerifier::new(&arrays)
            .verify(&offsets(&[(5, 0), (7, 12)]))
            .unwrap();
        assert_eq!(report, VerifyReport { checked: 1, skipped: 1 });
    }

    #[test]
    fn missing_terminator_is_detected() {
        // The first record lost its terminator.
        let arrays = InMemoryBackend::with_words(&[1, 2, 4, 3, 1, 0]);
        let result = IntegrityVerifier::new(&arrays).verify(&offsets(&[(5, 0), (7, 12)]));
        assert!(matches!(
            result,
            Err(CoreError::IntegrityViolation {
                set_id: 7,
                offset: 12,
                found: 4
            })
        ));
    }

    #[test]
    fn misrecorded_offset_is_detected() {
        let arrays = InMemoryBackend::with_words(&[1, 2, 0, 3, 1, 0]);
        let result = IntegrityVerifier::new(&arrays).verify(&offsets(&[(7, 8)]));
        assert!(matches!(result, Err(CoreError::IntegrityViolation { .. })));
    }

    #[test]
    fn offset_past_end_is_dangling() {
        let arrays = InMemoryBackend::with_words(&[1, 2, 0]);
        let result = IntegrityVerifier::new(&arrays).verify(&offsets(&[(7, 12)]));
        assert!(matches!(result, Err(CoreError::DanglingOffset { size: 12, .. })));
    }

    #[test]
    fn verify_index_uses_populated_slots() {
        let arrays = InMemoryBackend::with_words(&[0, 1, 2, 0, 3, 1, 0]);
        let index = crate::DenseIndexBuilder::default().build(&offsets(&[(1, 4), (2, 16)]), Some(2));
        let report = IntegrityVerifier::new(&arrays).verify_index(&index).unwrap();
        assert_eq!(report.checked, 2);
    }
}
