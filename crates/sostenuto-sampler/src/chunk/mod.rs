//! Fixed-size chunks of sample data.
//!
//! A [`Chunk`] is one slab of the pool. While bound it holds one chunk-sized
//! range of its [`ChunkOwner`]'s byte stream. Three counters govern its life:
//!
//! - **reasons**: holds that keep it out of the stealable queues
//! - **reasons to be loaded**: pending loads, during which it can never be stolen
//! - **recorder holds**: the subset of reasons taken by an active recorder

mod convert;
mod owner;
mod queue;
mod table;

pub(crate) use convert::{
    complete_boundary, convert_units, quantum_bytes, ChunkGeometry, ConversionState,
};
pub use owner::{ChunkOwner, OwnerKey, OwnerKind};
pub use queue::StealableQueue;
pub(crate) use table::ChunkTable;

use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU32, Ordering};

/// Index of a chunk slab within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(pub(crate) u32);

impl ChunkId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One slab of chunk memory.
#[derive(Debug)]
pub struct Chunk {
    id: ChunkId,
    body: Mutex<ChunkBody>,
    reasons: AtomicU32,
    reasons_to_be_loaded: AtomicU32,
    recorder_holds: AtomicU32,
}

/// What the pool does with a chunk once nothing holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Free,
    Queue(StealableQueue),
}

pub(crate) struct ChunkBody {
    pub(crate) owner: Option<ChunkOwner>,
    pub(crate) chunk_index: usize,
    /// Bytes are present and their raw edges saved
    pub(crate) filled: bool,
    /// A conversion pass is running with the lock released between quanta
    pub(crate) converting: bool,
    /// Filled and converted, ready for playback
    pub(crate) loaded: bool,
    pub(crate) conversion: ConversionState,
    pub(crate) data: Box<[u8]>,
}

impl std::fmt::Debug for ChunkBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkBody")
            .field("owner", &self.owner.as_ref().map(ChunkOwner::kind))
            .field("chunk_index", &self.chunk_index)
            .field("filled", &self.filled)
            .field("loaded", &self.loaded)
            .field("converted", &self.conversion.is_complete())
            .field("len", &self.data.len())
            .finish()
    }
}

impl ChunkBody {
    fn new(size: usize) -> Self {
        Self {
            owner: None,
            chunk_index: 0,
            filled: false,
            converting: false,
            loaded: false,
            conversion: ConversionState::default(),
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Bind to a new owner range. Data is left as is until loaded.
    pub(crate) fn bind(&mut self, owner: ChunkOwner, chunk_index: usize) {
        self.owner = Some(owner);
        self.chunk_index = chunk_index;
        self.reset();
    }

    /// Drop the owner binding, returning the former owner.
    pub(crate) fn unbind(&mut self) -> Option<ChunkOwner> {
        self.reset();
        self.owner.take()
    }

    fn reset(&mut self) {
        self.filled = false;
        self.converting = false;
        self.loaded = false;
        self.conversion = ConversionState::default();
    }

    /// Record that `data` now holds the owner's bytes, still unconverted.
    pub(crate) fn mark_filled(&mut self) {
        self.filled = true;
        let Self {
            conversion, data, ..
        } = self;
        conversion.capture_raw(data);
    }

    pub(crate) fn is_bound_to(&self, key: OwnerKey, chunk_index: usize) -> bool {
        self.chunk_index == chunk_index
            && self.owner.as_ref().is_some_and(|owner| owner.key() == key)
    }

    /// Free if the owner no longer links this chunk, otherwise its queue tier.
    pub(crate) fn disposition(&self, id: ChunkId) -> Disposition {
        match &self.owner {
            Some(owner) if owner.linked_chunk(self.chunk_index) == Some(id) => {
                Disposition::Queue(owner.eviction_queue())
            }
            _ => Disposition::Free,
        }
    }
}

impl Chunk {
    pub(crate) fn new(id: ChunkId, size: usize) -> Self {
        Self {
            id,
            body: Mutex::new(ChunkBody::new(size)),
            reasons: AtomicU32::new(0),
            reasons_to_be_loaded: AtomicU32::new(0),
            recorder_holds: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> ChunkId {
        self.id
    }

    pub fn num_reasons(&self) -> u32 {
        self.reasons.load(Ordering::Acquire)
    }

    pub fn num_reasons_to_be_loaded(&self) -> u32 {
        self.reasons_to_be_loaded.load(Ordering::Acquire)
    }

    pub fn num_recorder_holds(&self) -> u32 {
        self.recorder_holds.load(Ordering::Acquire)
    }

    /// Whether the chunk's bytes are present and converted.
    ///
    /// A unit straddling an unloaded neighbour may still be raw.
    pub fn is_loaded(&self) -> bool {
        self.body.lock().loaded
    }

    /// Whether the interior of the chunk has been converted.
    pub fn is_converted(&self) -> bool {
        self.body.lock().conversion.converted
    }

    /// Whether the interior and both boundary units have been converted.
    pub fn is_fully_converted(&self) -> bool {
        self.body.lock().conversion.is_complete()
    }

    pub fn chunk_index(&self) -> usize {
        self.body.lock().chunk_index
    }

    pub fn owner(&self) -> Option<ChunkOwner> {
        self.body.lock().owner.clone()
    }

    pub fn owner_kind(&self) -> Option<OwnerKind> {
        self.body.lock().owner.as_ref().map(ChunkOwner::kind)
    }

    /// Queue tier this chunk belongs in, or `None` while unbound.
    pub fn eviction_queue(&self) -> Option<StealableQueue> {
        self.body.lock().owner.as_ref().map(ChunkOwner::eviction_queue)
    }

    /// Whether a steal may take this chunk.
    ///
    /// Never while a load is pending. Otherwise only if `exclude` is not this
    /// chunk's owner.
    pub fn may_be_stolen(&self, exclude: Option<OwnerKey>) -> bool {
        if self.num_reasons_to_be_loaded() > 0 {
            return false;
        }
        let body = self.body.lock();
        Self::body_may_be_stolen(&body, exclude)
    }

    pub(crate) fn body_may_be_stolen(body: &ChunkBody, exclude: Option<OwnerKey>) -> bool {
        match (exclude, &body.owner) {
            (Some(key), Some(owner)) => owner.key() != key,
            _ => true,
        }
    }

    /// Run `f` over the chunk's bytes.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.body.lock().data[..])
    }

    pub(crate) fn lock_body(&self) -> MutexGuard<'_, ChunkBody> {
        self.body.lock()
    }

    pub(crate) fn try_lock_body(&self) -> Option<MutexGuard<'_, ChunkBody>> {
        self.body.try_lock()
    }

    pub(crate) fn reasons(&self) -> &AtomicU32 {
        &self.reasons
    }

    pub(crate) fn reasons_to_be_loaded(&self) -> &AtomicU32 {
        &self.reasons_to_be_loaded
    }

    pub(crate) fn recorder_holds(&self) -> &AtomicU32 {
        &self.recorder_holds
    }
}
