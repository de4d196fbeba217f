//! Error types for setdex core.

use crate::types::SetId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building or reading setdex files.
///
/// Every variant is fatal for a pipeline run. End of input is not an
/// error; see [`ReadOutcome`](crate::ReadOutcome).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] setdex_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A configuration value is missing or out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// An output file that must be created fresh already exists.
    #[error("output file already exists: {path:?}")]
    OutputExists {
        /// The existing path.
        path: PathBuf,
    },

    /// The input pair file cannot be opened.
    #[error("input file {path:?} is unreadable: {source}")]
    InputUnreadable {
        /// The input path.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// The set id cache cannot be decoded.
    #[error("set id cache corrupted: {message}")]
    CacheCorrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The word before a recorded offset is not the terminator.
    #[error("integrity violation: set {set_id} at offset {offset} is preceded by {found}, not the terminator")]
    IntegrityViolation {
        /// The set whose record is misaligned.
        set_id: SetId,
        /// The recorded offset.
        offset: u32,
        /// The word found at `offset - 4`.
        found: u32,
    },

    /// A recorded offset points at or past the end of the array file.
    #[error("dangling offset: set {set_id} at offset {offset}, array file is {size} bytes")]
    DanglingOffset {
        /// The set whose offset is out of range.
        set_id: SetId,
        /// The recorded offset.
        offset: u32,
        /// Size of the array file.
        size: u64,
    },

    /// A record would start past the range of a `u32` offset.
    #[error("offset overflow: set {set_id} would start at byte {offset}")]
    OffsetOverflow {
        /// The set being written.
        set_id: SetId,
        /// The offending byte offset.
        offset: u64,
    },

    /// An index, journal or array file has an invalid layout.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a cache corrupted error.
    pub fn cache_corrupted(message: impl Into<String>) -> Self {
        Self::CacheCorrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Maps a storage "already exists" failure to [`CoreError::OutputExists`].
    pub(crate) fn from_create(err: setdex_storage::StorageError) -> Self {
        match err {
            setdex_storage::StorageError::AlreadyExists { path } => Self::OutputExists { path },
            other => Self::Storage(other),
        }
    }
}
