//! Error types.

use crate::pool::LoadError;
use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] sostenuto_core::Error),

    /// Chunk load error.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Sample metadata is unusable.
    #[error("Invalid sample: {0}")]
    InvalidSample(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
