//! Samples and their chunk tables.

use crate::chunk::{ChunkId, ChunkOwner, ChunkTable};
use crate::error::{Error, Result};
use crate::pool::{ChunkPool, ChunkReason};
use serde::{Deserialize, Serialize};
use sostenuto_core::{
    freeze_with_error, ChunkLayout, InvariantCode, PlayDirection, RawDataFormat,
};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// One percussion cache byte covers `1 << PERC_BUFFER_REDUCTION_MAGNITUDE` frames.
pub const PERC_BUFFER_REDUCTION_MAGNITUDE: u32 = 7;

/// File-level facts about a sample, as read from its header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub path: PathBuf,
    /// Frames of audio
    pub length_in_samples: u64,
    pub num_channels: u32,
    /// Bytes per sample per channel on disk
    pub byte_depth: u32,
    pub sample_rate: u32,
    /// Byte position of the first audio byte within the file
    pub audio_data_start_pos_bytes: u64,
    pub audio_data_length_bytes: u64,
    pub raw_data_format: RawDataFormat,
}

impl SampleInfo {
    /// Native-layout PCM with the frame count derived from the data length.
    pub fn pcm(
        path: impl Into<PathBuf>,
        num_channels: u32,
        byte_depth: u32,
        sample_rate: u32,
        audio_data_start_pos_bytes: u64,
        audio_data_length_bytes: u64,
    ) -> Self {
        let frame_bytes = (num_channels as u64 * byte_depth as u64).max(1);
        Self {
            path: path.into(),
            length_in_samples: audio_data_length_bytes / frame_bytes,
            num_channels,
            byte_depth,
            sample_rate,
            audio_data_start_pos_bytes,
            audio_data_length_bytes,
            raw_data_format: RawDataFormat::Native,
        }
    }

    pub fn with_format(mut self, raw_data_format: RawDataFormat) -> Self {
        self.raw_data_format = raw_data_format;
        self
    }

    pub fn bytes_per_frame(&self) -> u64 {
        self.num_channels as u64 * self.byte_depth as u64
    }

    fn validate(&self) -> Result<()> {
        if self.num_channels == 0 {
            return Err(Error::InvalidSample(format!(
                "{}: no channels",
                self.path.display()
            )));
        }
        if !(1..=4).contains(&self.byte_depth) {
            return Err(Error::InvalidSample(format!(
                "{}: byte depth {} out of range (1-4)",
                self.path.display(),
                self.byte_depth
            )));
        }
        if self.sample_rate == 0 {
            return Err(Error::InvalidSample(format!(
                "{}: zero sample rate",
                self.path.display()
            )));
        }
        Ok(())
    }
}

/// A sample file whose audio data is streamed through the chunk pool.
#[derive(Debug)]
pub struct Sample {
    info: SampleInfo,
    layout: ChunkLayout,
    chunks: ChunkTable,
    perc_cache: [ChunkTable; 2],
    num_reasons: AtomicU32,
}

impl Sample {
    pub fn new(info: SampleInfo, layout: ChunkLayout) -> Result<Arc<Self>> {
        info.validate()?;

        let data_end = info.audio_data_start_pos_bytes + info.audio_data_length_bytes;
        let perc_bytes = info
            .length_in_samples
            .div_ceil(1 << PERC_BUFFER_REDUCTION_MAGNITUDE);
        let perc_chunks = layout.chunks_to_cover(perc_bytes);

        Ok(Arc::new(Self {
            chunks: ChunkTable::new(layout.chunks_to_cover(data_end)),
            perc_cache: [ChunkTable::new(perc_chunks), ChunkTable::new(perc_chunks)],
            info,
            layout,
            num_reasons: AtomicU32::new(0),
        }))
    }

    pub fn info(&self) -> &SampleInfo {
        &self.info
    }

    pub fn path(&self) -> &Path {
        &self.info.path
    }

    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    pub fn length_in_samples(&self) -> u64 {
        self.info.length_in_samples
    }

    pub fn num_channels(&self) -> u32 {
        self.info.num_channels
    }

    pub fn byte_depth(&self) -> u32 {
        self.info.byte_depth
    }

    pub fn sample_rate(&self) -> u32 {
        self.info.sample_rate
    }

    pub fn raw_data_format(&self) -> RawDataFormat {
        self.info.raw_data_format
    }

    pub fn audio_data_start(&self) -> u64 {
        self.info.audio_data_start_pos_bytes
    }

    pub fn audio_data_length(&self) -> u64 {
        self.info.audio_data_length_bytes
    }

    /// Byte position of `frame` within the file.
    pub fn frame_to_byte(&self, frame: u64) -> u64 {
        self.audio_data_start() + frame * self.info.bytes_per_frame()
    }

    /// First chunk index containing any audio data.
    pub fn first_chunk_with_audio(&self) -> usize {
        self.layout.chunk_index_of(self.audio_data_start())
    }

    /// One past the last chunk index containing audio data.
    pub fn first_chunk_with_no_audio(&self) -> usize {
        self.chunks.len()
    }

    /// Live reasons on this sample. Non-zero means the current song uses it.
    pub fn num_reasons(&self) -> u32 {
        self.num_reasons.load(Ordering::Acquire)
    }

    /// Take a reason that keeps this sample marked as in use.
    pub fn add_reason(self: &Arc<Self>) -> SampleReason {
        self.num_reasons.fetch_add(1, Ordering::AcqRel);
        SampleReason {
            sample: Arc::clone(self),
        }
    }

    /// Chunk currently holding raw data chunk `index`.
    pub fn chunk_id(&self, index: usize) -> Option<ChunkId> {
        self.chunks.get(index)
    }

    /// Raw data chunks currently linked.
    pub fn num_linked_chunks(&self) -> usize {
        self.chunks.linked_count()
    }

    pub(crate) fn link_chunk(&self, index: usize, id: ChunkId) -> std::result::Result<(), ChunkId> {
        self.chunks.link(index, id)
    }

    pub(crate) fn unlink_chunk(&self, index: usize, id: ChunkId) -> bool {
        self.chunks.unlink(index, id)
    }

    /// The raw data chunk at `index` is being taken by the pool.
    pub(crate) fn chunk_stolen(&self, index: usize, id: ChunkId) {
        if !self.chunks.unlink(index, id) {
            freeze_with_error(InvariantCode::ChunkTableMismatch);
        }
    }

    /// Chunks in each direction's percussion cache table.
    pub fn perc_cache_num_chunks(&self) -> usize {
        self.perc_cache[0].len()
    }

    pub fn perc_cache_chunk(&self, index: usize, direction: PlayDirection) -> Option<ChunkId> {
        self.perc_table(direction).get(index)
    }

    /// Claim percussion cache chunk `index`, allocating it if needed.
    ///
    /// A fresh chunk comes back ready to be written. The pool never steals
    /// this cache's own chunks to satisfy the claim.
    pub fn claim_perc_cache_chunk(
        self: &Arc<Self>,
        pool: &ChunkPool,
        index: usize,
        direction: PlayDirection,
    ) -> Option<ChunkReason> {
        if index >= self.perc_cache_num_chunks() {
            return None;
        }
        let owner = ChunkOwner::perc_cache(self, direction);
        let exclude = owner.key();
        pool.allocate_for(owner, index, Some(exclude))
    }

    /// Percussion cache chunk `index` has been taken by the pool.
    pub fn perc_cache_chunk_stolen(&self, index: usize, direction: PlayDirection) {
        if let Some(id) = self.perc_table(direction).get(index) {
            self.perc_table(direction).unlink(index, id);
        }
        tracing::debug!(
            path = %self.path().display(),
            index,
            ?direction,
            "percussion cache chunk stolen"
        );
    }

    pub(crate) fn link_perc_cache_chunk(
        &self,
        index: usize,
        direction: PlayDirection,
        id: ChunkId,
    ) -> std::result::Result<(), ChunkId> {
        self.perc_table(direction).link(index, id)
    }

    pub(crate) fn unlink_perc_cache_chunk(
        &self,
        index: usize,
        direction: PlayDirection,
        id: ChunkId,
    ) -> bool {
        self.perc_table(direction).unlink(index, id)
    }

    fn perc_table(&self, direction: PlayDirection) -> &ChunkTable {
        match direction {
            PlayDirection::Forward => &self.perc_cache[0],
            PlayDirection::Reverse => &self.perc_cache[1],
        }
    }
}

/// Owned reason on a [`Sample`]. Released on drop.
#[derive(Debug)]
pub struct SampleReason {
    sample: Arc<Sample>,
}

impl SampleReason {
    pub fn sample(&self) -> &Arc<Sample> {
        &self.sample
    }
}

impl Clone for SampleReason {
    fn clone(&self) -> Self {
        self.sample.add_reason()
    }
}

impl Deref for SampleReason {
    type Target = Sample;

    fn deref(&self) -> &Sample {
        &self.sample
    }
}

impl Drop for SampleReason {
    fn drop(&mut self) {
        let released = self
            .sample
            .num_reasons
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if released.is_err() {
            freeze_with_error(InvariantCode::SampleReasonUnderflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ChunkLayout {
        ChunkLayout::new(15).unwrap()
    }

    #[test]
    fn test_chunk_range() {
        // 100 header bytes, 3 chunks' worth of data
        let info = SampleInfo::pcm("pad.wav", 2, 3, 48000, 100, 3 * 32768);
        let sample = Sample::new(info, layout()).unwrap();
        assert_eq!(sample.first_chunk_with_audio(), 0);
        assert_eq!(sample.first_chunk_with_no_audio(), 4);
        assert_eq!(sample.length_in_samples(), 3 * 32768 / 6);
        assert_eq!(sample.frame_to_byte(10), 160);
    }

    #[test]
    fn test_large_header_skips_first_chunks() {
        let info = SampleInfo::pcm("pad.wav", 1, 2, 48000, 70_000, 1000);
        let sample = Sample::new(info, layout()).unwrap();
        assert_eq!(sample.first_chunk_with_audio(), 2);
        assert_eq!(sample.first_chunk_with_no_audio(), 3);
    }

    #[test]
    fn test_rejects_bad_info() {
        let info = SampleInfo::pcm("x.wav", 0, 2, 48000, 0, 10);
        assert!(matches!(
            Sample::new(info, layout()),
            Err(Error::InvalidSample(_))
        ));

        let mut info = SampleInfo::pcm("x.wav", 1, 2, 48000, 0, 10);
        info.byte_depth = 5;
        assert!(Sample::new(info, layout()).is_err());
    }

    #[test]
    fn test_info_from_header_json() {
        let json = r#"{
            "path": "loop.aiff",
            "length_in_samples": 1000,
            "num_channels": 2,
            "byte_depth": 3,
            "sample_rate": 48000,
            "audio_data_start_pos_bytes": 54,
            "audio_data_length_bytes": 6000,
            "raw_data_format": "EndiannessWrong24"
        }"#;
        let info: SampleInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.bytes_per_frame(), 6);
        assert_eq!(info.raw_data_format, RawDataFormat::EndiannessWrong24);

        let sample = Sample::new(info, layout()).unwrap();
        assert_eq!(sample.frame_to_byte(1), 60);
    }

    #[test]
    fn test_sample_reasons() {
        let info = SampleInfo::pcm("x.wav", 1, 2, 48000, 0, 10);
        let sample = Sample::new(info, layout()).unwrap();
        let a = sample.add_reason();
        let b = a.clone();
        assert_eq!(sample.num_reasons(), 2);
        assert_eq!(b.path(), Path::new("x.wav"));
        drop(a);
        drop(b);
        assert_eq!(sample.num_reasons(), 0);
    }

    #[test]
    fn test_perc_cache_tables_are_per_direction() {
        let info = SampleInfo::pcm("x.wav", 1, 2, 48000, 0, 2 * 10_000_000);
        let sample = Sample::new(info, layout()).unwrap();
        // 10M frames reduce to 78125 bytes
        assert_eq!(sample.perc_cache_num_chunks(), 3);

        sample
            .link_perc_cache_chunk(1, PlayDirection::Forward, ChunkId(4))
            .unwrap();
        assert_eq!(sample.perc_cache_chunk(1, PlayDirection::Forward), Some(ChunkId(4)));
        assert_eq!(sample.perc_cache_chunk(1, PlayDirection::Reverse), None);

        sample.perc_cache_chunk_stolen(1, PlayDirection::Forward);
        assert_eq!(sample.perc_cache_chunk(1, PlayDirection::Forward), None);
    }
}
