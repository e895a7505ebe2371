//! Chunk cache for streamed sample data.
//!
//! Large samples are split into fixed-size chunks that are loaded on demand,
//! reference-counted while in use, converted in place to the playback-native
//! layout and stolen under memory pressure.
//!
//! # Features
//!
//! - **Chunk pool**: Bounded slabs with prioritised eviction queues
//! - **Reasons**: Owned handles that keep a chunk (or a sample) from eviction
//! - **Conversion**: In-place reordering with cooperative yields
//! - **Caches**: Time-stretch and percussion cache chunk bookkeeping
//! - **Holders**: Sliding window of chunks near a playback marker
//!
//! # Example
//!
//! ```ignore
//! use sostenuto_sampler::{ChunkPool, LoadInstruction, Sample, SampleHolder};
//! use sostenuto_core::NoService;
//!
//! let pool = ChunkPool::builder().num_chunks(64).loader(my_loader).build()?;
//! let sample = Sample::new(info, pool.layout())?;
//!
//! let mut holder = SampleHolder::new();
//! holder.set_audio_file(&pool, Some(sample), false, true, LoadInstruction::Enqueue, &mut NoService);
//! pool.process_load_queue(&mut NoService, usize::MAX);
//! ```

// Error types
pub mod error;
pub use error::{Error, Result};

pub mod chunk;
pub use chunk::{Chunk, ChunkId, ChunkOwner, OwnerKey, OwnerKind, StealableQueue};

pub mod pool;
pub use pool::{
    ChunkLoader, ChunkPool, ChunkPoolBuilder, ChunkReason, LoadError, LoadInstruction,
    LoadRequest, NullLoader, ReasonClass, RecorderHold,
};

mod sample;
pub use sample::{Sample, SampleInfo, SampleReason, PERC_BUFFER_REDUCTION_MAGNITUDE};

mod cache;
pub use cache::SampleCache;

pub mod holder;
pub use holder::{ChunkWindow, SampleHolder, END_POS_UNSET};
