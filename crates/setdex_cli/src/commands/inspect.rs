//! Inspect command implementation.

use serde::Serialize;
use setdex_core::{DenseIndex, SENTINEL};
use setdex_storage::{FileBackend, StorageBackend, WORD_SIZE};
use std::path::Path;

/// Words read per chunk while scanning the array file.
const SCAN_CHUNK_WORDS: usize = 16 * 1024;

/// Array and index statistics.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct InspectResult {
    /// Array file path.
    pub arrays_path: String,
    /// Array file size in bytes.
    pub arrays_bytes: u64,
    /// Terminated records found in the array file.
    pub records: usize,
    /// Sum of member counts over all records.
    pub total_members: u64,
    /// Member count of the largest record.
    pub largest_record: usize,
    /// Words after the last terminator.
    pub unterminated_words: usize,
    /// Index file path.
    pub index_path: String,
    /// Number of index slots.
    pub index_slots: usize,
    /// Non-zero index slots.
    pub indexed_sets: usize,
    /// Largest set id with a non-zero slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_indexed_set_id: Option<u32>,
}

/// Runs the inspect command.
pub fn run(
    arrays_path: &Path,
    index_path: &Path,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let arrays = FileBackend::open_read_only(arrays_path)?;
    let index = DenseIndex::load(&FileBackend::open_read_only(index_path)?)?;

    let mut result = analyze_arrays(&arrays)?;
    result.arrays_path = arrays_path.display().to_string();
    result.index_path = index_path.display().to_string();
    result.index_slots = index.len();
    result.indexed_sets = index.populated();
    result.max_indexed_set_id = index.to_offset_map().max_set_id();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Walks the array file once, splitting it at terminators.
pub fn analyze_arrays(
    backend: &dyn StorageBackend,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let size = backend.size()?;
    let total_words = (size / WORD_SIZE as u64) as usize;
    let mut result = InspectResult {
        arrays_bytes: size,
        ..InspectResult::default()
    };

    let mut run = 0usize;
    let mut read = 0usize;
    while read < total_words {
        let count = (total_words - read).min(SCAN_CHUNK_WORDS);
        let words = backend.read_words_at((read * WORD_SIZE) as u64, count)?;
        for word in words {
            if word == SENTINEL {
                if run > 0 {
                    result.records += 1;
                    result.total_members += run as u64;
                    result.largest_record = result.largest_record.max(run);
                }
                run = 0;
            } else {
                run += 1;
            }
        }
        read += count;
    }
    result.unterminated_words = run;
    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("Array file: {}", result.arrays_path);
    println!("  Size: {} bytes", result.arrays_bytes);
    println!("  Records: {}", result.records);
    println!("  Members: {}", result.total_members);
    println!("  Largest record: {} members", result.largest_record);
    if result.unterminated_words > 0 {
        println!(
            "  Warning: {} words after the last terminator",
            result.unterminated_words
        );
    }
    println!();
    println!("Index file: {}", result.index_path);
    println!("  Slots: {}", result.index_slots);
    println!("  Indexed sets: {}", result.indexed_sets);
    if let Some(max) = result.max_indexed_set_id {
        println!("  Max indexed set id: {max}");
    }
}
