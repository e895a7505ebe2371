//! # Sostenuto - Chunk cache for streamed sample data
//!
//! Sample data too large to keep resident is read in fixed-size chunks from a
//! bounded pool. Chunks are held by reasons while in use, converted in place
//! to the playback-native layout once loaded, and stolen from prioritised
//! eviction queues when the pool runs dry.
//!
//! ## Architecture
//!
//! Sostenuto is an umbrella crate that coordinates:
//! - **sostenuto-core** - Configuration, chunk geometry, raw formats, diagnostics, metrics
//! - **sostenuto-sampler** - Chunk pool, samples, caches and sample holders
//!
//! ## Quick Start
//!
//! ```ignore
//! use sostenuto::prelude::*;
//!
//! let pool = ChunkPool::builder()
//!     .chunk_size_magnitude(15)
//!     .num_chunks(256)
//!     .loader(my_loader)
//!     .build()?;
//!
//! let sample = Sample::new(SampleInfo::pcm("kick.wav", 2, 2, 44100, 44, 88200), pool.layout())?;
//! let mut holder = SampleHolder::new();
//! holder.set_audio_file(&pool, Some(sample), false, true, LoadInstruction::Enqueue, &mut NoService);
//!
//! // On the loading thread
//! pool.process_load_queue(&mut NoService, usize::MAX);
//! ```
//!
//! ## Feature Flags
//!
//! - `beta-checks` - Freeze on invariant violations in release builds too

/// Re-export of sostenuto-core for direct access
pub use sostenuto_core as core;

/// Re-export of sostenuto-sampler for direct access
pub use sostenuto_sampler as sampler;

// Core types
pub use sostenuto_core::{
    freeze_with_error, ChunkLayout, InvariantCode, NoService, PlayDirection, PoolConfig,
    PoolMetrics, PoolMetricsSnapshot, RawDataFormat, RealtimeService, UNITY_PHASE_INCREMENT,
};

// Pool, owners and holders
pub use sostenuto_sampler::{
    Chunk, ChunkId, ChunkLoader, ChunkOwner, ChunkPool, ChunkPoolBuilder, ChunkReason,
    ChunkWindow, LoadError, LoadInstruction, LoadRequest, NullLoader, OwnerKey, OwnerKind,
    ReasonClass, RecorderHold, Sample, SampleCache, SampleHolder, SampleInfo, SampleReason,
    StealableQueue, END_POS_UNSET, PERC_BUFFER_REDUCTION_MAGNITUDE,
};

mod error;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Error, Result};

    pub use crate::{NoService, PlayDirection, PoolConfig, RawDataFormat, RealtimeService};

    pub use crate::{
        ChunkLoader, ChunkPool, ChunkReason, LoadError, LoadInstruction, LoadRequest, Sample,
        SampleCache, SampleHolder, SampleInfo, StealableQueue,
    };
}
