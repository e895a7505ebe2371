//! Chunk pool configuration.

use crate::{ChunkLayout, Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the chunk pool and the holders that claim from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Chunk size as a power of two (default: 15, i.e. 32768 bytes)
    pub chunk_size_magnitude: u32,
    /// Number of chunk slabs allocated up front (default: 256)
    pub num_chunks: usize,
    /// Chunks a holder keeps claimed ahead of its playback marker (default: 2)
    pub lookahead_chunks: usize,
    /// Frames before the start marker (or after the end marker, in reverse)
    /// at which claiming begins (default: 150)
    pub marker_frames_before_claim: u64,
    /// Native playback rate of the device (default: 44100)
    pub system_sample_rate: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chunk_size_magnitude: 15,
            num_chunks: 256,
            lookahead_chunks: 2,
            marker_frames_before_claim: 150,
            system_sample_rate: 44100,
        }
    }
}

impl PoolConfig {
    /// Upper bound on a holder's lookahead window.
    pub const MAX_LOOKAHEAD_CHUNKS: usize = 8;

    pub fn validate(&self) -> Result<()> {
        ChunkLayout::new(self.chunk_size_magnitude)?;

        if self.num_chunks == 0 {
            return Err(Error::InvalidConfig("num_chunks must be at least 1".into()));
        }
        if self.lookahead_chunks == 0 || self.lookahead_chunks > Self::MAX_LOOKAHEAD_CHUNKS {
            return Err(Error::InvalidConfig(format!(
                "lookahead_chunks {} out of range (1-{})",
                self.lookahead_chunks,
                Self::MAX_LOOKAHEAD_CHUNKS
            )));
        }
        if !(8000..=384_000).contains(&self.system_sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "system_sample_rate {} out of range (8000-384000 Hz)",
                self.system_sample_rate
            )));
        }
        Ok(())
    }

    /// Chunk geometry for this configuration.
    pub fn layout(&self) -> Result<ChunkLayout> {
        ChunkLayout::new(self.chunk_size_magnitude)
    }

    /// Total bytes of chunk memory the pool will allocate.
    pub fn total_bytes(&self) -> u64 {
        (self.num_chunks as u64) << self.chunk_size_magnitude
    }
}
