//! # setdex storage
//!
//! Append-only storage backends for the files produced by setdex.
//!
//! A backend is a flat byte store: it can append, read at an offset,
//! report its size and make its contents durable. Records are never
//! rewritten once appended, which is the property the member-array file
//! relies on for stable offsets.
//!
//! On top of the raw byte operations, [`StorageBackend`] provides word
//! helpers that encode and decode little-endian `u32` values, the unit
//! every setdex file is made of.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and scratch builds
//! - [`FileBackend`] - For on-disk array, index and journal files
//!
//! ## Example
//!
//! ```rust
//! use setdex_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append_words(&[7, 9, 0]).unwrap();
//! assert_eq!(offset, 0);
//! assert_eq!(backend.read_word_at(8).unwrap(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{StorageBackend, WORD_SIZE};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
