//! Lookup command implementation.

use serde::Serialize;
use setdex_core::{read_members, DenseIndex, SetId, UserId};
use setdex_storage::FileBackend;
use std::path::Path;

/// Members of one set.
#[derive(Debug, Serialize)]
pub struct LookupResult {
    /// The requested set.
    pub set_id: SetId,
    /// Byte offset of its record, if indexed.
    pub offset: Option<u32>,
    /// Members in stored order.
    pub members: Vec<UserId>,
}

/// Runs the lookup command.
pub fn run(
    arrays_path: &Path,
    index_path: &Path,
    set_id: SetId,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = lookup(arrays_path, index_path, set_id)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => match result.offset {
            Some(offset) => {
                println!("set {set_id} at offset {offset}: {} members", result.members.len());
                for member in &result.members {
                    println!("  {member}");
                }
            }
            None => println!("set {set_id} has no record"),
        },
    }
    Ok(())
}

/// Resolves `set_id` through the index and reads its record.
pub fn lookup(
    arrays_path: &Path,
    index_path: &Path,
    set_id: SetId,
) -> Result<LookupResult, Box<dyn std::error::Error>> {
    let arrays = FileBackend::open_read_only(arrays_path)?;
    let index = DenseIndex::load(&FileBackend::open_read_only(index_path)?)?;

    let offset = index.offset(set_id);
    let members = match offset {
        Some(offset) => read_members(&arrays, offset)?,
        None => Vec::new(),
    };
    Ok(LookupResult {
        set_id,
        offset,
        members,
    })
}
