//! Error type for the sostenuto umbrella crate.
//!
//! Pool and sample errors arrive through [`Error::Sampler`]. [`Error::Load`]
//! is for application code that drives a [`ChunkLoader`] itself, such as a
//! prefetch thread filling chunks through its own storage handle, so its
//! storage errors reach the caller unwrapped.
//!
//! [`ChunkLoader`]: sostenuto_sampler::ChunkLoader

use sostenuto_sampler::LoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or chunk geometry
    #[error(transparent)]
    Core(#[from] sostenuto_core::Error),

    /// Raised by the pool, a sample or a cache
    #[error("Sampler: {0}")]
    Sampler(#[from] sostenuto_sampler::Error),

    /// Raised by a loader called outside the pool
    #[error("Load: {0}")]
    Load(#[from] LoadError),
}

impl Error {
    /// Whether storage was only busy and the load is worth retrying.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Load(LoadError::Busy)
                | Self::Sampler(sostenuto_sampler::Error::Load(LoadError::Busy))
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
