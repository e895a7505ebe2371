//! Error types for sostenuto-core.

use thiserror::Error;

/// Error type for sostenuto-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid chunk size magnitude: {0}. Must be between {min} and {max}", min = crate::MIN_CHUNK_SIZE_MAGNITUDE, max = crate::MAX_CHUNK_SIZE_MAGNITUDE)]
    InvalidChunkSize(u32),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
