//! Core types for the sostenuto chunk cache.
//!
//! # Primary API
//!
//! - [`PoolConfig`]: Pool geometry and holder tuning
//! - [`ChunkLayout`]: Chunk size arithmetic (always a power of two)
//! - [`RawDataFormat`]: On-disk sample layouts and their in-place conversion
//! - [`RealtimeService`]: Cooperative yield back into the audio routine
//! - [`PoolMetrics`]: Counters for reasons, steals, loads and conversions
//! - [`freeze_with_error`]: Fatal invariant reporting for debug and beta builds

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::PoolConfig;

mod layout;
pub use layout::{ChunkLayout, MAX_CHUNK_SIZE_MAGNITUDE, MIN_CHUNK_SIZE_MAGNITUDE};

mod format;
pub use format::RawDataFormat;

mod direction;
pub use direction::PlayDirection;

mod diagnostics;
pub use diagnostics::{freeze_with_error, InvariantCode};

mod service;
pub use service::{NoService, RealtimeService};

mod metrics;
pub use metrics::{PoolMetrics, PoolMetricsSnapshot};

/// 24-bit fixed-point unity, used for phase increments and sample-rate ratios.
pub const UNITY_PHASE_INCREMENT: u32 = 1 << 24;
