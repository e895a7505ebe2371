//! Chunk geometry.

use crate::{Error, Result};

/// Smallest chunk the pool supports (1 KiB).
pub const MIN_CHUNK_SIZE_MAGNITUDE: u32 = 10;

/// Largest chunk the pool supports (1 MiB).
pub const MAX_CHUNK_SIZE_MAGNITUDE: u32 = 20;

/// Fixed chunk size, always a power of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkLayout {
    magnitude: u32,
}

impl ChunkLayout {
    pub fn new(magnitude: u32) -> Result<Self> {
        if !(MIN_CHUNK_SIZE_MAGNITUDE..=MAX_CHUNK_SIZE_MAGNITUDE).contains(&magnitude) {
            return Err(Error::InvalidChunkSize(magnitude));
        }
        Ok(Self { magnitude })
    }

    #[inline]
    pub fn magnitude(&self) -> u32 {
        self.magnitude
    }

    #[inline]
    pub fn size(&self) -> usize {
        1 << self.magnitude
    }

    /// Index of the chunk containing `byte`.
    #[inline]
    pub fn chunk_index_of(&self, byte: u64) -> usize {
        (byte >> self.magnitude) as usize
    }

    /// Absolute byte position at which chunk `index` begins.
    #[inline]
    pub fn chunk_start(&self, index: usize) -> u64 {
        (index as u64) << self.magnitude
    }

    /// Position of `byte` within its chunk.
    #[inline]
    pub fn offset_within(&self, byte: u64) -> usize {
        (byte & (self.size() as u64 - 1)) as usize
    }

    /// Number of chunks needed to cover `[0, end_byte)`.
    #[inline]
    pub fn chunks_to_cover(&self, end_byte: u64) -> usize {
        ((end_byte + self.size() as u64 - 1) >> self.magnitude) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_arithmetic() {
        let layout = ChunkLayout::new(15).unwrap();
        assert_eq!(layout.size(), 32768);
        assert_eq!(layout.chunk_index_of(32767), 0);
        assert_eq!(layout.chunk_index_of(32768), 1);
        assert_eq!(layout.chunk_start(3), 3 * 32768);
        assert_eq!(layout.offset_within(32768 + 100), 100);
        assert_eq!(layout.chunks_to_cover(0), 0);
        assert_eq!(layout.chunks_to_cover(1), 1);
        assert_eq!(layout.chunks_to_cover(32768), 1);
        assert_eq!(layout.chunks_to_cover(32769), 2);
    }

    #[test]
    fn test_layout_bounds() {
        assert!(ChunkLayout::new(MIN_CHUNK_SIZE_MAGNITUDE - 1).is_err());
        assert!(ChunkLayout::new(MAX_CHUNK_SIZE_MAGNITUDE + 1).is_err());
        assert!(ChunkLayout::new(MIN_CHUNK_SIZE_MAGNITUDE).is_ok());
    }
}
