//! Pipeline configuration.

use crate::error::{CoreError, CoreResult};
use crate::index::IndexRange;
use crate::types::PAIR_SIZE;
use crate::universe::SetIdCache;
use crate::writer::OffsetBase;
use crate::{DEFAULT_BUFFER_BYTES, DEFAULT_SEGMENT_SIZE};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Configuration for one build of the array and index files.
///
/// Constructed with [`new`](Self::new) and the chained setters, then
/// checked by [`validate`](Self::validate) before any file is touched.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Raw `(user_id, set_id)` pair file.
    pub input_path: PathBuf,

    /// Member-array file to create (or extend on resume).
    pub arrays_path: PathBuf,

    /// Dense index file, regenerated on every run.
    pub index_path: PathBuf,

    /// Where to load or persist the set id universe.
    pub set_id_cache: Option<SetIdCache>,

    /// Where to journal `(set_id, offset)` entries as records are written.
    pub offsets_journal: Option<PathBuf>,

    /// Set ids per segment.
    pub segment_size: usize,

    /// Read chunk size in bytes. Must be a multiple of the pair width.
    pub buffer_bytes: usize,

    /// Number of leading segments to skip.
    pub resume_segment: usize,

    /// Range covered by the dense index.
    pub index_range: IndexRange,

    /// Whether byte 0 of a fresh array file is reserved.
    pub offset_base: OffsetBase,

    /// Progress log interval in MiB; 0 disables progress lines.
    pub progress_interval_mb: u64,
}

impl PipelineConfig {
    /// Creates a configuration with default tuning.
    pub fn new(
        input_path: impl Into<PathBuf>,
        arrays_path: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            arrays_path: arrays_path.into(),
            index_path: index_path.into(),
            set_id_cache: None,
            offsets_journal: None,
            segment_size: DEFAULT_SEGMENT_SIZE,
            buffer_bytes: DEFAULT_BUFFER_BYTES,
            resume_segment: 0,
            index_range: IndexRange::default(),
            offset_base: OffsetBase::default(),
            progress_interval_mb: 100,
        }
    }

    /// Sets the set id cache.
    #[must_use]
    pub fn set_id_cache(mut self, cache: SetIdCache) -> Self {
        self.set_id_cache = Some(cache);
        self
    }

    /// Sets the offsets journal path.
    #[must_use]
    pub fn offsets_journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.offsets_journal = Some(path.into());
        self
    }

    /// Sets the number of set ids per segment.
    #[must_use]
    pub fn segment_size(mut self, size: usize) -> Self {
        self.segment_size = size;
        self
    }

    /// Sets the read chunk size in bytes.
    #[must_use]
    pub fn buffer_bytes(mut self, bytes: usize) -> Self {
        self.buffer_bytes = bytes;
        self
    }

    /// Skips the first `segment` segments.
    #[must_use]
    pub fn resume_segment(mut self, segment: usize) -> Self {
        self.resume_segment = segment;
        self
    }

    /// Sets the dense index range.
    #[must_use]
    pub fn index_range(mut self, range: IndexRange) -> Self {
        self.index_range = range;
        self
    }

    /// Sets the offset base of a fresh array file.
    #[must_use]
    pub fn offset_base(mut self, base: OffsetBase) -> Self {
        self.offset_base = base;
        self
    }

    /// Sets the progress interval in MiB.
    #[must_use]
    pub fn progress_interval_mb(mut self, mb: u64) -> Self {
        self.progress_interval_mb = mb;
        self
    }

    /// Returns `true` if this run continues an earlier one.
    #[must_use]
    pub fn is_resume(&self) -> bool {
        self.resume_segment > 0
    }

    /// Checks every precondition that can be checked before processing.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InputUnreadable`] if the input cannot be opened
    /// - [`CoreError::OutputExists`] if a fresh run would overwrite the array
    ///   file or journal
    /// - [`CoreError::InvalidConfig`] for out-of-range values, two files
    ///   sharing a path, or a resume without an array file
    pub fn validate(&self) -> CoreResult<()> {
        if self.segment_size == 0 {
            return Err(CoreError::invalid_config("segment size must be at least 1"));
        }
        if self.buffer_bytes == 0 || self.buffer_bytes % PAIR_SIZE != 0 {
            return Err(CoreError::invalid_config(format!(
                "buffer size {} must be a non-zero multiple of {PAIR_SIZE}",
                self.buffer_bytes
            )));
        }
        self.check_distinct_paths()?;
        self.check_input()?;

        if self.is_resume() {
            if !self.arrays_path.exists() {
                return Err(CoreError::invalid_config(format!(
                    "cannot resume at segment {}: array file {:?} does not exist",
                    self.resume_segment, self.arrays_path
                )));
            }
        } else {
            if self.arrays_path.exists() {
                return Err(CoreError::OutputExists {
                    path: self.arrays_path.clone(),
                });
            }
            if let Some(journal) = self.offsets_journal.as_ref().filter(|p| p.exists()) {
                return Err(CoreError::OutputExists {
                    path: journal.clone(),
                });
            }
        }
        Ok(())
    }

    /// Every file the pipeline reads or writes must have its own path.
    fn check_distinct_paths(&self) -> CoreResult<()> {
        let mut paths: Vec<(&str, &Path)> = vec![
            ("input", self.input_path.as_path()),
            ("array", self.arrays_path.as_path()),
            ("index", self.index_path.as_path()),
        ];
        if let Some(cache) = &self.set_id_cache {
            paths.push(("set id cache", cache.path.as_path()));
        }
        if let Some(journal) = &self.offsets_journal {
            paths.push(("offsets journal", journal.as_path()));
        }

        for (i, (name, path)) in paths.iter().enumerate() {
            if let Some((other, _)) = paths[i + 1..].iter().find(|(_, p)| p == path) {
                return Err(CoreError::invalid_config(format!(
                    "{name} file and {other} file are both {path:?}"
                )));
            }
        }
        Ok(())
    }

    fn check_input(&self) -> CoreResult<()> {
        let unreadable = |source| CoreError::InputUnreadable {
            path: self.input_path.clone(),
            source,
        };
        let file = File::open(&self.input_path).map_err(unreadable)?;
        if !file.metadata().map_err(unreadable)?.is_file() {
            return Err(unreadable(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        Ok(())
    }
}
