//! Chunk loading from storage.

use crate::sample::Sample;
use thiserror::Error;

/// How eagerly a claim should get the chunk's bytes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadInstruction {
    /// Bind the chunk but leave loading to the caller
    DontLoad,
    /// Queue the load for [`ChunkPool::process_load_queue`](super::ChunkPool::process_load_queue)
    #[default]
    Enqueue,
    /// Load before returning, or return nothing
    LoadImmediately,
    /// Load before returning, queueing it if storage is busy
    LoadImmediatelyOrEnqueue,
}

impl LoadInstruction {
    pub fn is_immediate(self) -> bool {
        matches!(self, Self::LoadImmediately | Self::LoadImmediatelyOrEnqueue)
    }
}

/// What to read into a chunk.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub sample: &'a Sample,
    pub chunk_index: usize,
    /// Absolute file position of the chunk's first byte
    pub byte_offset: u64,
}

/// Load error.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Storage cannot take the request right now.
    #[error("Storage busy")]
    Busy,

    /// No loader was configured.
    #[error("No chunk loader configured")]
    NoLoader,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes were available than requested.
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
}

/// Storage layer that fills chunks with file bytes.
///
/// `buffer` is one whole chunk. Bytes past the end of the file should be
/// zeroed. Returning [`LoadError::Busy`] asks for a retry later.
pub trait ChunkLoader: Send {
    fn load_chunk(&mut self, request: &LoadRequest<'_>, buffer: &mut [u8]) -> Result<(), LoadError>;
}

/// Loader for pools that are only ever filled by their callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLoader;

impl ChunkLoader for NullLoader {
    fn load_chunk(&mut self, _request: &LoadRequest<'_>, _buffer: &mut [u8]) -> Result<(), LoadError> {
        Err(LoadError::NoLoader)
    }
}
