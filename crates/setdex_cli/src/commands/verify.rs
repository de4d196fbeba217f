//! Verify command implementation.

use setdex_core::{DenseIndex, IntegrityVerifier};
use setdex_storage::{FileBackend, StorageBackend};
use std::path::Path;

/// Runs the verify command.
///
/// Uses the non-zero slots of the index as the offset map, so a record at
/// byte 0 of a file built without a reserved offset is not checked; it has
/// no preceding record anyway.
pub fn run(arrays_path: &Path, index_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying {:?} against {:?}", arrays_path, index_path);
    println!();

    let arrays = FileBackend::open_read_only(arrays_path)?;
    let index = DenseIndex::load(&FileBackend::open_read_only(index_path)?)?;

    match IntegrityVerifier::new(&arrays).verify_index(&index) {
        Ok(report) => {
            println!(
                "  Array file: {} bytes, index slots: {}, populated: {}",
                arrays.size()?,
                index.len(),
                index.populated()
            );
            println!(
                "  Boundaries checked: {}, skipped: {}",
                report.checked, report.skipped
            );
            println!();
            println!("✓ Verification passed");
            Ok(())
        }
        Err(e) => {
            println!("  {e}");
            println!();
            println!("✗ Verification failed, rebuild the array file from scratch");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setdex_core::{Pipeline, PipelineConfig};
    use tempfile::tempdir;

    #[test]
    fn passes_then_fails_after_corruption() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("pairs.bin");
        let bytes: Vec<u8> = [1u32, 5, 2, 5, 3, 7, 1, 7]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        std::fs::write(&input, bytes).unwrap();
        let config = PipelineConfig::new(
            &input,
            dir.path().join("arrays.bin"),
            dir.path().join("index.bin"),
        )
        .progress_interval_mb(0);
        Pipeline::new(config.clone()).unwrap().run().unwrap();

        run(&config.arrays_path, &config.index_path).unwrap();

        let mut arrays = std::fs::read(&config.arrays_path).unwrap();
        arrays[8..12].copy_from_slice(&9u32.to_le_bytes());
        std::fs::write(&config.arrays_path, arrays).unwrap();
        assert!(run(&config.arrays_path, &config.index_path).is_err());
    }
}
