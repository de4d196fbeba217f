//! # setdex testkit
//!
//! Test utilities for setdex.
//!
//! This crate provides:
//! - A temporary workspace holding the input, array, index, cache and
//!   journal files of one build
//! - An in-memory reference model of the expected set membership
//! - Property-based generators for pair streams using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use setdex_testkit::prelude::*;
//!
//! #[test]
//! fn builds() {
//!     let ws = TempWorkspace::with_pairs(&[(1, 5), (2, 5)]);
//!     ws.build(ws.config());
//!     assert_eq!(ws.members(5), Some(vec![1, 2]));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
