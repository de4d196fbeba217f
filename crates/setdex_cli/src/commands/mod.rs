//! CLI command implementations.

pub mod build;
pub mod inspect;
pub mod lookup;
pub mod verify;
