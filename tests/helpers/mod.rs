//! Test helpers and fixtures for sostenuto integration tests
//!
//! Files live in memory. [`MemoryLoader`] serves them to the pool and can be
//! told to report busy storage, so load-queue behaviour is deterministic.

#![allow(dead_code)]

use sostenuto::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Smallest chunk size the pool accepts, so tests cross chunk boundaries cheaply.
pub const TEST_CHUNK_MAGNITUDE: u32 = 10;

pub const TEST_CHUNK_SIZE: usize = 1 << TEST_CHUNK_MAGNITUDE;

/// Route pool logs to the test writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// In-memory storage keyed by path.
///
/// Clones share the same files and switches, so a test can keep one handle
/// after giving the other to the pool.
#[derive(Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, Arc<Vec<u8>>>,
    busy: Arc<AtomicBool>,
    loads: Arc<AtomicUsize>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        self.files.insert(path.into(), Arc::new(bytes));
        self
    }

    pub fn file(&self, path: impl AsRef<Path>) -> &[u8] {
        self.files
            .get(path.as_ref())
            .map(|bytes| bytes.as_slice())
            .unwrap_or_default()
    }

    /// Make every load report busy storage until cleared.
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    /// Loads that completed.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ChunkLoader for MemoryLoader {
    fn load_chunk(&mut self, request: &LoadRequest<'_>, buffer: &mut [u8]) -> std::result::Result<(), LoadError> {
        if self.busy.load(Ordering::SeqCst) {
            return Err(LoadError::Busy);
        }
        let file = self.files.get(request.sample.path()).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file in memory")
        })?;

        let start = (request.byte_offset as usize).min(file.len());
        let available = &file[start..];
        let n = available.len().min(buffer.len());
        buffer[..n].copy_from_slice(&available[..n]);
        buffer[n..].fill(0);

        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Deterministic file bytes: a header of `header` bytes, then `data_len`
/// bytes that differ from their neighbours.
pub fn file_bytes(header: usize, data_len: usize) -> Vec<u8> {
    (0..header + data_len)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 8)) as u8)
        .collect()
}

/// What the data region of `file` reads as once converted in one pass.
///
/// The last unit may be short of a word; only a trailing partial sample
/// stays raw.
pub fn converted_reference(file: &[u8], data_start: usize, format: RawDataFormat) -> Vec<u8> {
    let mut reference = file.to_vec();
    let sample = format.sample_width();
    let data_end = data_start + (file.len() - data_start) / sample * sample;
    for u in reference[data_start..data_end].chunks_mut(format.unit_width()) {
        format.convert_unit(u);
    }
    reference
}

/// Test pool over `loader` with small chunks.
pub fn test_pool(num_chunks: usize, lookahead: usize, loader: MemoryLoader) -> ChunkPool {
    ChunkPool::builder()
        .chunk_size_magnitude(TEST_CHUNK_MAGNITUDE)
        .num_chunks(num_chunks)
        .lookahead_chunks(lookahead)
        .system_sample_rate(44100)
        .loader(loader)
        .build()
        .expect("Failed to build test pool")
}

/// Mono 16-bit sample at 44.1kHz covering `loader`'s file at `path`.
pub fn mono_sample(
    pool: &ChunkPool,
    loader: &MemoryLoader,
    path: &str,
    header: u64,
) -> Arc<Sample> {
    let data_len = loader.file(path).len() as u64 - header;
    let info = SampleInfo::pcm(path, 1, 2, 44100, header, data_len);
    Sample::new(info, pool.layout()).expect("Failed to create test sample")
}

/// Bytes of chunk `index` of `sample` as the pool currently holds them.
pub fn chunk_bytes(pool: &ChunkPool, sample: &Sample, index: usize) -> Vec<u8> {
    let id = sample.chunk_id(index).expect("chunk not linked");
    pool.chunk(id).read(|data| data.to_vec())
}
