//! Cross-cutting core types: errors shared by every layer.

pub mod error;

pub use error::{NtfsError, Result};
