//! Build command implementation.

use setdex_core::{
    BuildSummary, CacheFormat, IndexRange, OffsetBase, Pipeline, PipelineConfig, SetIdCache,
};
use std::path::PathBuf;
use tracing::info;

/// Options collected from the command line.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Input pair file.
    pub membership: PathBuf,
    /// Member-array file.
    pub arrays: PathBuf,
    /// Index file.
    pub index: PathBuf,
    /// Optional set id cache.
    pub set_ids: Option<PathBuf>,
    /// Cache encoding.
    pub set_id_format: CacheFormat,
    /// Set ids per segment.
    pub segment_size: usize,
    /// Read buffer size in bytes.
    pub buffer_size: usize,
    /// Segments to skip.
    pub resume_segment: usize,
    /// Optional offsets journal.
    pub offsets_journal: Option<PathBuf>,
    /// Index range.
    pub index_range: IndexRange,
    /// Offset base for a fresh array file.
    pub offset_base: OffsetBase,
    /// Progress interval in MiB.
    pub progress_mb: u64,
}

impl BuildOptions {
    /// Converts the options into a pipeline configuration.
    pub fn into_config(self) -> PipelineConfig {
        let mut config = PipelineConfig::new(self.membership, self.arrays, self.index)
            .segment_size(self.segment_size)
            .buffer_bytes(self.buffer_size)
            .resume_segment(self.resume_segment)
            .index_range(self.index_range)
            .offset_base(self.offset_base)
            .progress_interval_mb(self.progress_mb);
        if let Some(path) = self.set_ids {
            config = config.set_id_cache(SetIdCache::new(path, self.set_id_format));
        }
        if let Some(path) = self.offsets_journal {
            config = config.offsets_journal(path);
        }
        config
    }
}

/// Runs the build command.
pub fn run(options: BuildOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::new(options.into_config())?;
    info!(
        input = ?pipeline.config().input_path,
        arrays = ?pipeline.config().arrays_path,
        "starting build"
    );
    let summary = pipeline.run()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print_text_output(&summary),
    }
    Ok(())
}

fn print_text_output(summary: &BuildSummary) {
    println!("✓ Build completed");
    println!("  Input: {} bytes", summary.input_bytes);
    println!("  Set ids: {}", summary.universe_size);
    match summary.max_set_id {
        Some(max) => println!("  Max set id: {max}"),
        None => println!("  Max set id: none"),
    }
    println!(
        "  Segments: {} processed, {} skipped",
        summary.segments_processed, summary.segments_skipped
    );
    println!(
        "  Records: {} written, {} sets dropped",
        summary.records_written, summary.sets_dropped
    );
    println!("  Indexed sets: {}", summary.indexed_sets);
    println!("  Array file: {} bytes", summary.arrays_bytes);
    println!("  Index slots: {}", summary.index_len);
    println!("  Boundaries verified: {}", summary.verified);
}
