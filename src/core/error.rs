//! Error kinds shared across the NTFS decoder.

use thiserror::Error;

/// Errors produced by the core decoder.
///
/// Every fallible core operation returns `Result<T, NtfsError>`. The CLI
/// front end wraps these in `anyhow::Context` at the boundary; nothing
/// inside the core itself loses the original kind.
#[derive(Error, Debug)]
pub enum NtfsError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt volume: {0}")]
    CorruptVolume(String),

    #[error("invalid boot sector: {0}")]
    InvalidBootSector(String),

    #[error("invalid MFT: {0}")]
    InvalidMft(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, NtfsError>;
