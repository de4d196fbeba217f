//! setdex CLI
//!
//! Command-line tools for building and inspecting set-membership arrays.
//!
//! # Commands
//!
//! - `build` - Build the member-array and index files from a pair file
//! - `verify` - Check every indexed record boundary in an array file
//! - `lookup` - Print the members of one set
//! - `inspect` - Display array and index statistics

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use setdex_core::{CacheFormat, IndexRange, OffsetBase};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Build and query compact set-membership arrays.
#[derive(Parser)]
#[command(name = "setdex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Encoding of the set id cache file.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CacheFormatArg {
    /// Raw little-endian u32 array
    Binary,
    /// One decimal id per line
    Text,
}

impl From<CacheFormatArg> for CacheFormat {
    fn from(arg: CacheFormatArg) -> Self {
        match arg {
            CacheFormatArg::Binary => CacheFormat::Binary,
            CacheFormatArg::Text => CacheFormat::Text,
        }
    }
}

/// Range of set ids covered by the index.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum IndexRangeArg {
    /// Slots 0..=max_set_id
    Inclusive,
    /// Slots 0..max_set_id
    Exclusive,
}

impl From<IndexRangeArg> for IndexRange {
    fn from(arg: IndexRangeArg) -> Self {
        match arg {
            IndexRangeArg::Inclusive => IndexRange::Inclusive,
            IndexRangeArg::Exclusive => IndexRange::Exclusive,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the member-array and index files from a pair file
    Build {
        /// Binary file of (user_id, set_id) u32 pairs
        #[arg(long, value_name = "FILE")]
        membership: PathBuf,

        /// Member-array file to create; must not exist unless resuming
        #[arg(long, value_name = "FILE")]
        arrays: PathBuf,

        /// Index file to write
        #[arg(long, value_name = "FILE")]
        index: PathBuf,

        /// Set id cache, loaded if present and written otherwise
        #[arg(long, value_name = "FILE")]
        set_ids: Option<PathBuf>,

        /// Encoding of the set id cache
        #[arg(long, value_enum, default_value = "binary")]
        set_id_format: CacheFormatArg,

        /// Set ids processed per input scan
        #[arg(long, default_value_t = setdex_core::DEFAULT_SEGMENT_SIZE)]
        segment_size: usize,

        /// Read buffer size in bytes
        #[arg(long, default_value_t = setdex_core::DEFAULT_BUFFER_BYTES)]
        buffer_size: usize,

        /// Skip this many segments and append to an existing array file
        #[arg(long, default_value = "0")]
        resume_segment: usize,

        /// Journal of (set_id, offset) entries, replayed on resume
        #[arg(long, value_name = "FILE")]
        offsets_journal: Option<PathBuf>,

        /// Range of set ids covered by the index
        #[arg(long, value_enum, default_value = "inclusive")]
        index_range: IndexRangeArg,

        /// Write a leading terminator so no record starts at byte 0
        #[arg(long)]
        reserve_zero_offset: bool,

        /// Log read progress every this many MiB (0 disables)
        #[arg(long, default_value = "100")]
        progress_mb: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check every indexed record boundary in an array file
    Verify {
        /// Member-array file
        #[arg(long, value_name = "FILE")]
        arrays: PathBuf,

        /// Index file
        #[arg(long, value_name = "FILE")]
        index: PathBuf,
    },

    /// Print the members of one set
    Lookup {
        /// Member-array file
        #[arg(long, value_name = "FILE")]
        arrays: PathBuf,

        /// Index file
        #[arg(long, value_name = "FILE")]
        index: PathBuf,

        /// Set to look up
        #[arg(long)]
        set_id: u32,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display array and index statistics
    Inspect {
        /// Member-array file
        #[arg(long, value_name = "FILE")]
        arrays: PathBuf,

        /// Index file
        #[arg(long, value_name = "FILE")]
        index: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            membership,
            arrays,
            index,
            set_ids,
            set_id_format,
            segment_size,
            buffer_size,
            resume_segment,
            offsets_journal,
            index_range,
            reserve_zero_offset,
            progress_mb,
            format,
        } => {
            let options = commands::build::BuildOptions {
                membership,
                arrays,
                index,
                set_ids,
                set_id_format: set_id_format.into(),
                segment_size,
                buffer_size,
                resume_segment,
                offsets_journal,
                index_range: index_range.into(),
                offset_base: if reserve_zero_offset {
                    OffsetBase::Reserved
                } else {
                    OffsetBase::Zero
                },
                progress_mb,
            };
            commands::build::run(options, &format)?;
        }
        Commands::Verify { arrays, index } => {
            commands::verify::run(&arrays, &index)?;
        }
        Commands::Lookup {
            arrays,
            index,
            set_id,
            format,
        } => {
            commands::lookup::run(&arrays, &index, set_id, &format)?;
        }
        Commands::Inspect {
            arrays,
            index,
            format,
        } => {
            commands::inspect::run(&arrays, &index, &format)?;
        }
        Commands::Version => {
            println!("setdex CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("setdex core v{}", setdex_core::VERSION);
        }
    }

    Ok(())
}
