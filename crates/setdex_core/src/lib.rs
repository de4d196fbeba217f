//! # setdex core
//!
//! Turns a flat binary stream of `(user_id, set_id)` pairs into two files:
//!
//! - a member-array file holding one sentinel-terminated `u32` array per set
//! - a dense index mapping every `set_id` to the byte offset of its array
//!
//! The pipeline runs in passes over the input. One pass discovers the
//! universe of set ids (or loads it from a cache). Then each segment of at
//! most `segment_size` set ids gets a full rescan, its membership is
//! appended to the array file, and the segment is discarded. Peak memory is
//! bounded by one segment rather than by the whole universe.
//!
//! ## Components
//!
//! - [`PairStreamReader`] - chunked reads of little-endian `u32` pairs
//! - [`SetIdUniverseBuilder`] - set id discovery and caching
//! - [`SegmentedMembershipExtractor`] - per-segment membership scan
//! - [`CompactArrayWriter`] - append-only array writer with offset map
//! - [`DenseIndexBuilder`] - dense `set_id -> offset` index
//! - [`IntegrityVerifier`] - terminator check before every offset
//! - [`Pipeline`] - runs everything from a [`PipelineConfig`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use setdex_core::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::new("pairs.bin", "arrays.bin", "index.bin")
//!     .segment_size(50_000);
//! let summary = Pipeline::new(config)?.run()?;
//! println!("{} records written", summary.records_written);
//! # Ok::<(), setdex_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
mod index;
mod lookup;
mod pipeline;
mod progress;
mod reader;
mod types;
mod universe;
mod verify;
mod writer;

pub use config::PipelineConfig;
pub use error::{CoreError, CoreResult};
pub use extractor::{SegmentMembership, SegmentedMembershipExtractor};
pub use index::{DenseIndex, DenseIndexBuilder, IndexRange};
pub use lookup::read_members;
pub use pipeline::{BuildSummary, Pipeline};
pub use progress::ProgressReporter;
pub use reader::{PairStreamReader, ReadOutcome};
pub use types::{MembershipPair, SetId, UserId, PAIR_SIZE, SENTINEL};
pub use universe::{CacheFormat, SetIdCache, SetIdUniverse, SetIdUniverseBuilder};
pub use verify::{IntegrityVerifier, VerifyReport};
pub use writer::{CompactArrayWriter, OffsetBase, OffsetJournal, OffsetMap, SegmentWriteStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of set ids per segment.
pub const DEFAULT_SEGMENT_SIZE: usize = 10_000;

/// Default read buffer size in bytes (16 384 words per chunk).
pub const DEFAULT_BUFFER_BYTES: usize = 64 * 1024;
