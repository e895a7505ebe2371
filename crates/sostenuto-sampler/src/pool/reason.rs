//! Owned reasons on chunks.
//!
//! Each handle adds to one of a chunk's counters when created and takes it
//! away when dropped, so a hold can never be released twice or forgotten.

use super::PoolShared;
use crate::chunk::{Chunk, ChunkId};
use sostenuto_core::{freeze_with_error, InvariantCode, RealtimeService};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// Who took a [`ChunkReason`]. Carried for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonClass {
    /// A holder's playback window
    Playback,
    /// A cache being written
    CacheWrite,
    /// An active audio recorder
    Recorder,
    /// The pool while it loads a queued chunk
    Loader,
}

/// A hold that keeps a chunk out of the stealable queues.
pub struct ChunkReason {
    pool: Arc<PoolShared>,
    id: ChunkId,
    class: ReasonClass,
}

impl ChunkReason {
    /// Wrap a reason the pool has already counted.
    pub(crate) fn from_added(pool: Arc<PoolShared>, id: ChunkId, class: ReasonClass) -> Self {
        Self { pool, id, class }
    }

    #[inline]
    pub fn id(&self) -> ChunkId {
        self.id
    }

    #[inline]
    pub fn class(&self) -> ReasonClass {
        self.class
    }

    pub fn chunk(&self) -> &Chunk {
        self.pool.chunk(self.id)
    }

    pub fn is_loaded(&self) -> bool {
        self.chunk().is_loaded()
    }

    /// Convert the chunk's bytes to the native layout if that has not happened
    /// yet, servicing `rt` between work quanta.
    pub fn convert_data_if_necessary(&self, rt: &mut dyn RealtimeService) {
        self.pool.convert_chunk(self.id, rt);
    }

    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.chunk().read(f)
    }

    /// Write the chunk's bytes. Used by cache writers and recorders.
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut body = self.chunk().lock_body();
        f(&mut body.data[..])
    }

    /// Declare the bytes written through [`write`](Self::write) complete.
    ///
    /// They are taken to be in the owner's on-disk layout. The chunk reports
    /// loaded once the next [`convert_data_if_necessary`](Self::convert_data_if_necessary)
    /// has converted them.
    pub fn mark_filled(&self) {
        self.chunk().lock_body().mark_filled();
    }

    /// Take an additional reason on behalf of an audio recorder.
    pub fn hold_for_recorder(&self) -> RecorderHold {
        let reason = self.pool.add_reason(self.id, ReasonClass::Recorder);
        reason.chunk().recorder_holds().fetch_add(1, Ordering::AcqRel);
        RecorderHold { reason }
    }
}

impl Clone for ChunkReason {
    fn clone(&self) -> Self {
        self.pool.add_reason(self.id, self.class)
    }
}

impl Drop for ChunkReason {
    fn drop(&mut self) {
        self.pool.remove_reason(self.id, self.class);
    }
}

impl fmt::Debug for ChunkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkReason")
            .field("id", &self.id)
            .field("class", &self.class)
            .finish()
    }
}

/// A pending load. While any exist the chunk cannot be stolen.
pub(crate) struct LoadReason {
    pool: Weak<PoolShared>,
    id: ChunkId,
}

impl LoadReason {
    /// Wrap a load the pool has already counted.
    pub(crate) fn new(pool: Weak<PoolShared>, id: ChunkId) -> Self {
        Self { pool, id }
    }

    pub(crate) fn id(&self) -> ChunkId {
        self.id
    }
}

impl Drop for LoadReason {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            release(
                pool.chunk(self.id).reasons_to_be_loaded(),
                InvariantCode::LoadReasonUnderflow,
            );
        }
    }
}

/// A recorder's hold on a chunk, counted separately from other reasons.
#[derive(Debug)]
pub struct RecorderHold {
    reason: ChunkReason,
}

impl RecorderHold {
    pub fn id(&self) -> ChunkId {
        self.reason.id()
    }

    pub fn reason(&self) -> &ChunkReason {
        &self.reason
    }
}

impl Drop for RecorderHold {
    fn drop(&mut self) {
        release(
            self.reason.chunk().recorder_holds(),
            InvariantCode::RecorderHoldUnderflow,
        );
    }
}

fn release(counter: &AtomicU32, underflow: InvariantCode) {
    if counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_err()
    {
        freeze_with_error(underflow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{ChunkPool, LoadInstruction};
    use crate::sample::{Sample, SampleInfo};
    use sostenuto_core::NoService;

    fn setup() -> (ChunkPool, Arc<Sample>) {
        let pool = ChunkPool::builder()
            .chunk_size_magnitude(10)
            .num_chunks(2)
            .build()
            .unwrap();
        let info = SampleInfo::pcm("take.wav", 1, 2, 44100, 0, 2048);
        let sample = Sample::new(info, pool.layout()).unwrap();
        (pool, sample)
    }

    #[test]
    fn test_clone_and_drop_balance() {
        let (pool, sample) = setup();
        let reason = pool
            .acquire(&sample, 0, LoadInstruction::DontLoad, &mut NoService)
            .unwrap();
        let copy = reason.clone();
        assert_eq!(copy.class(), ReasonClass::Playback);
        assert_eq!(reason.chunk().num_reasons(), 2);
        drop(copy);
        assert_eq!(reason.chunk().num_reasons(), 1);

        let id = reason.id();
        drop(reason);
        assert_eq!(pool.chunk(id).num_reasons(), 0);

        let snapshot = pool.metrics().snapshot();
        assert_eq!(snapshot.reasons_added, snapshot.reasons_removed);
    }

    #[test]
    fn test_recorder_hold_is_counted_separately() {
        let (pool, sample) = setup();
        let reason = pool
            .acquire(&sample, 1, LoadInstruction::DontLoad, &mut NoService)
            .unwrap();
        let hold = reason.hold_for_recorder();
        assert_eq!(hold.id(), reason.id());
        assert_eq!(reason.chunk().num_recorder_holds(), 1);
        assert_eq!(reason.chunk().num_reasons(), 2);
        assert_eq!(hold.reason().class(), ReasonClass::Recorder);

        drop(reason);
        let chunk = hold.reason().chunk();
        assert_eq!(chunk.num_reasons(), 1);
        assert_eq!(chunk.num_recorder_holds(), 1);
        let id = hold.id();
        drop(hold);
        assert_eq!(pool.chunk(id).num_recorder_holds(), 0);
    }

    #[test]
    fn test_written_bytes_convert_after_mark_filled() {
        let (pool, _) = setup();
        let info = SampleInfo::pcm("be.wav", 1, 2, 44100, 0, 2048)
            .with_format(sostenuto_core::RawDataFormat::EndiannessWrong16);
        let sample = Sample::new(info, pool.layout()).unwrap();

        let reason = pool
            .acquire(&sample, 0, LoadInstruction::DontLoad, &mut NoService)
            .unwrap();
        reason.write(|data| data[..4].copy_from_slice(&[1, 2, 3, 4]));
        reason.convert_data_if_necessary(&mut NoService);
        assert_eq!(reason.read(|d| d[0]), 1);

        reason.mark_filled();
        assert!(!reason.is_loaded());
        reason.convert_data_if_necessary(&mut NoService);
        reason.convert_data_if_necessary(&mut NoService);
        assert!(reason.is_loaded());
        assert_eq!(reason.read(|d| [d[0], d[1], d[2], d[3]]), [2, 1, 4, 3]);
    }
}
