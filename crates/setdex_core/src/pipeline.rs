//! End-to-end build of the array and index files.

use crate::config::PipelineConfig;
use crate::error::{CoreError, CoreResult};
use crate::extractor::SegmentedMembershipExtractor;
use crate::index::DenseIndexBuilder;
use crate::progress::ProgressReporter;
use crate::reader::PairStreamReader;
use crate::types::SetId;
use crate::universe::SetIdUniverseBuilder;
use crate::verify::IntegrityVerifier;
use crate::writer::{CompactArrayWriter, OffsetJournal, OffsetMap};
use serde::Serialize;
use setdex_storage::{FileBackend, StorageBackend};
use std::fs::File;
use tracing::info;

/// Figures reported at the end of a successful build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    /// Size of the input in bytes.
    pub input_bytes: u64,
    /// Distinct set ids in the universe.
    pub universe_size: usize,
    /// Segments scanned in this run.
    pub segments_processed: usize,
    /// Segments skipped because of a resume.
    pub segments_skipped: usize,
    /// Records appended in this run.
    pub records_written: usize,
    /// Sets skipped for having at most one member.
    pub sets_dropped: usize,
    /// Entries in the final offset map, resumed ones included.
    pub indexed_sets: usize,
    /// Final size of the array file.
    pub arrays_bytes: u64,
    /// Number of index slots.
    pub index_len: usize,
    /// Largest set id of the universe.
    pub max_set_id: Option<SetId>,
    /// Offsets whose preceding terminator was verified.
    pub verified: usize,
}

/// Runs the whole build for one [`PipelineConfig`].
///
/// Passes, in order: set id discovery (or cache load), one extraction scan
/// per segment with its records appended, the integrity check, and finally
/// the dense index. Any error aborts the run; there is no partial success.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validates `config` and prepares a pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first failed precondition from
    /// [`PipelineConfig::validate`].
    pub fn new(config: PipelineConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration this pipeline runs with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the build.
    ///
    /// # Errors
    ///
    /// Returns an error on any I/O failure, a corrupted cache or journal,
    /// an offset overflow, or an integrity violation.
    pub fn run(&self) -> CoreResult<BuildSummary> {
        let config = &self.config;
        let input = File::open(&config.input_path).map_err(|source| CoreError::InputUnreadable {
            path: config.input_path.clone(),
            source,
        })?;
        let input_bytes = input.metadata()?.len();
        info!(path = ?config.input_path, "input file size: {input_bytes} bytes");

        let mut reader = PairStreamReader::with_buffer_bytes(input, config.buffer_bytes);
        info!("reading {} integers at a time", reader.capacity());
        let mut progress =
            ProgressReporter::new("set ids", input_bytes, config.progress_interval_mb);

        let universe = SetIdUniverseBuilder::new()
            .with_cache(config.set_id_cache.clone())
            .load_or_enumerate(&mut reader, &mut progress)?;

        let mut writer = self.open_writer()?;
        writer.apply_offset_base(config.offset_base)?;

        let mut summary = BuildSummary {
            input_bytes,
            universe_size: universe.len(),
            max_set_id: universe.max(),
            ..BuildSummary::default()
        };

        let segment_count = universe.segment_count(config.segment_size);
        let extractor = SegmentedMembershipExtractor::new();
        for (number, segment) in universe.segments(config.segment_size).enumerate() {
            if number < config.resume_segment {
                summary.segments_skipped += 1;
                continue;
            }
            info!("starting segment {number} of {segment_count}");
            progress.restart(format!("segment {number}"));

            let membership = extractor.extract(&mut reader, segment, &mut progress)?;
            let stats = writer.write_segment(&membership)?;

            summary.segments_processed += 1;
            summary.records_written += stats.written;
            summary.sets_dropped += stats.dropped;
        }

        let (arrays, offsets) = writer.finish()?;
        summary.arrays_bytes = arrays.size()?;
        summary.indexed_sets = offsets.len();

        let report = IntegrityVerifier::new(&*arrays).verify(&offsets)?;
        summary.verified = report.checked;

        info!(path = ?config.index_path, "generating index file");
        let mut index_backend = FileBackend::create(&config.index_path)?;
        let index = DenseIndexBuilder::new(config.index_range).write(
            &offsets,
            summary.max_set_id,
            &mut index_backend,
        )?;
        summary.index_len = index.len();

        info!(
            records = summary.records_written,
            dropped = summary.sets_dropped,
            bytes = summary.arrays_bytes,
            "build complete"
        );
        Ok(summary)
    }

    fn open_writer(&self) -> CoreResult<CompactArrayWriter> {
        let config = &self.config;
        let arrays = if config.is_resume() {
            info!(
                path = ?config.arrays_path,
                "resuming at segment {}", config.resume_segment
            );
            FileBackend::open(&config.arrays_path)?
        } else {
            FileBackend::create_new(&config.arrays_path).map_err(CoreError::from_create)?
        };
        let arrays_size = arrays.size()?;
        let mut writer = CompactArrayWriter::new(Box::new(arrays));

        if let Some(path) = &config.offsets_journal {
            let backend = if config.is_resume() {
                FileBackend::open(path)?
            } else {
                FileBackend::create_new(path).map_err(CoreError::from_create)?
            };
            let journal = OffsetJournal::new(Box::new(backend));
            let replayed = if config.is_resume() {
                journal.replay(arrays_size)?
            } else {
                OffsetMap::new()
            };
            if !replayed.is_empty() {
                info!("replayed {} offsets from journal", replayed.len());
            }
            writer = writer.with_offsets(replayed).with_journal(journal);
        }
        Ok(writer)
    }
}
