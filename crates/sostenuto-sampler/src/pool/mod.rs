//! Chunk pool.
//!
//! A fixed set of chunk slabs shared by every sample, cache and holder. Chunks
//! nobody holds a reason on wait in one of the [`StealableQueue`] tiers and are
//! stolen, lowest tier and least recently released first, when a claim finds
//! the free list empty.
//!
//! Locks are always taken in the order pool state, chunk body, owner table.
//! Reasons are never released with the pool state locked.

mod load;
mod reason;

pub use load::{ChunkLoader, LoadError, LoadInstruction, LoadRequest, NullLoader};
pub use reason::{ChunkReason, ReasonClass, RecorderHold};
pub(crate) use reason::LoadReason;

use crate::chunk::{
    complete_boundary, convert_units, quantum_bytes, Chunk, ChunkGeometry, ChunkId, ChunkOwner,
    Disposition, OwnerKey, StealableQueue,
};
use crate::error::Result;
use crate::sample::Sample;
use parking_lot::Mutex;
use smallvec::SmallVec;
use sostenuto_core::{
    freeze_with_error, ChunkLayout, InvariantCode, PoolConfig, PoolMetrics, RealtimeService,
};
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handle to a shared chunk pool. Cloning shares the same pool.
#[derive(Clone)]
pub struct ChunkPool {
    shared: Arc<PoolShared>,
}

pub(crate) struct PoolShared {
    config: PoolConfig,
    layout: ChunkLayout,
    chunks: Box<[Chunk]>,
    state: Mutex<PoolState>,
    loader: Mutex<Box<dyn ChunkLoader>>,
    metrics: PoolMetrics,
}

struct PoolState {
    free: Vec<ChunkId>,
    queues: [VecDeque<ChunkId>; StealableQueue::COUNT],
    queued_in: Vec<Option<StealableQueue>>,
    load_queue: VecDeque<LoadReason>,
}

impl PoolState {
    fn new(num_chunks: usize) -> Self {
        Self {
            // Popped from the back, so chunk 0 is handed out first
            free: (0..num_chunks as u32).rev().map(ChunkId).collect(),
            queues: Default::default(),
            queued_in: vec![None; num_chunks],
            load_queue: VecDeque::new(),
        }
    }

    fn enqueue(&mut self, id: ChunkId, queue: StealableQueue) {
        self.queues[queue.index()].push_back(id);
        self.queued_in[id.index()] = Some(queue);
    }

    fn dequeue(&mut self, id: ChunkId) {
        if let Some(queue) = self.queued_in[id.index()].take() {
            let entries = &mut self.queues[queue.index()];
            if let Some(position) = entries.iter().position(|&queued| queued == id) {
                entries.remove(position);
            }
        }
    }
}

/// Builder for [`ChunkPool`].
#[derive(Default)]
pub struct ChunkPoolBuilder {
    config: PoolConfig,
    loader: Option<Box<dyn ChunkLoader>>,
}

impl ChunkPoolBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn chunk_size_magnitude(mut self, magnitude: u32) -> Self {
        self.config.chunk_size_magnitude = magnitude;
        self
    }

    pub fn num_chunks(mut self, num_chunks: usize) -> Self {
        self.config.num_chunks = num_chunks;
        self
    }

    pub fn lookahead_chunks(mut self, lookahead_chunks: usize) -> Self {
        self.config.lookahead_chunks = lookahead_chunks;
        self
    }

    pub fn marker_frames_before_claim(mut self, frames: u64) -> Self {
        self.config.marker_frames_before_claim = frames;
        self
    }

    pub fn system_sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.system_sample_rate = sample_rate;
        self
    }

    /// Storage used to fill chunks. Defaults to [`NullLoader`].
    pub fn loader(mut self, loader: impl ChunkLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Validate the configuration and allocate every slab.
    pub fn build(self) -> Result<ChunkPool> {
        self.config.validate()?;
        let layout = self.config.layout()?;
        let num_chunks = self.config.num_chunks;

        let chunks = (0..num_chunks as u32)
            .map(|i| Chunk::new(ChunkId(i), layout.size()))
            .collect();

        debug!(
            num_chunks,
            chunk_size = layout.size(),
            lookahead = self.config.lookahead_chunks,
            "chunk pool allocated"
        );

        Ok(ChunkPool {
            shared: Arc::new(PoolShared {
                config: self.config,
                layout,
                chunks,
                state: Mutex::new(PoolState::new(num_chunks)),
                loader: Mutex::new(self.loader.unwrap_or_else(|| Box::new(NullLoader))),
                metrics: PoolMetrics::new(),
            }),
        })
    }
}

impl ChunkPool {
    pub fn builder() -> ChunkPoolBuilder {
        ChunkPoolBuilder::default()
    }

    /// Pool with `config` and no loader.
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn layout(&self) -> ChunkLayout {
        self.shared.layout
    }

    pub fn chunk_size(&self) -> usize {
        self.shared.layout.size()
    }

    pub fn chunk_size_magnitude(&self) -> u32 {
        self.shared.layout.magnitude()
    }

    pub fn num_chunks(&self) -> usize {
        self.shared.chunks.len()
    }

    pub fn chunk(&self, id: ChunkId) -> &Chunk {
        self.shared.chunk(id)
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.shared.metrics
    }

    /// Chunks on the free list.
    pub fn num_free(&self) -> usize {
        self.shared.state.lock().free.len()
    }

    /// Chunks waiting in `queue`, next victim first.
    pub fn queued(&self, queue: StealableQueue) -> Vec<ChunkId> {
        self.shared.state.lock().queues[queue.index()]
            .iter()
            .copied()
            .collect()
    }

    /// Loads waiting in the load queue.
    pub fn pending_loads(&self) -> usize {
        self.shared.state.lock().load_queue.len()
    }

    /// Swap the storage layer.
    pub fn set_loader(&self, loader: impl ChunkLoader + 'static) {
        *self.shared.loader.lock() = Box::new(loader);
    }

    /// Hold raw data chunk `index` of `sample`, allocating and loading it as
    /// `instruction` asks.
    ///
    /// Returns `None` when the index holds no audio, when no chunk can be freed,
    /// or when an immediate load fails.
    pub fn acquire(
        &self,
        sample: &Arc<Sample>,
        index: usize,
        instruction: LoadInstruction,
        rt: &mut dyn RealtimeService,
    ) -> Option<ChunkReason> {
        if index < sample.first_chunk_with_audio() || index >= sample.first_chunk_with_no_audio() {
            debug!(path = %sample.path().display(), index, "chunk index holds no audio");
            return None;
        }

        let owner = ChunkOwner::sample(sample);
        let (reason, fresh) = self
            .shared
            .claim(&owner, index, None, ReasonClass::Playback)?;
        let id = reason.id();

        match instruction {
            LoadInstruction::DontLoad => Some(reason),
            LoadInstruction::Enqueue => {
                let wanted = {
                    let body = reason.chunk().lock_body();
                    !body.loaded && !body.converting
                };
                if wanted {
                    self.shared.enqueue_load(id);
                }
                Some(reason)
            }
            LoadInstruction::LoadImmediately | LoadInstruction::LoadImmediatelyOrEnqueue => {
                match self.shared.load_chunk(id, rt) {
                    Ok(_) => Some(reason),
                    Err(LoadError::Busy)
                        if instruction == LoadInstruction::LoadImmediatelyOrEnqueue =>
                    {
                        self.shared.enqueue_load(id);
                        Some(reason)
                    }
                    Err(err) => {
                        warn!(
                            path = %sample.path().display(),
                            index,
                            "chunk load failed: {err}"
                        );
                        self.shared.metrics.record_load_failure();
                        if fresh {
                            self.shared.unbind(id);
                        }
                        None
                    }
                }
            }
        }
    }

    /// Hold chunk `index` of a cache owner, allocating it if needed.
    ///
    /// Fresh chunks are marked loaded and converted; the caller writes them.
    /// Chunks owned by `exclude` are never stolen to satisfy the claim.
    pub fn allocate_for(
        &self,
        owner: ChunkOwner,
        index: usize,
        exclude: Option<OwnerKey>,
    ) -> Option<ChunkReason> {
        let (reason, fresh) = self
            .shared
            .claim(&owner, index, exclude, ReasonClass::CacheWrite)?;
        if fresh {
            let mut body = reason.chunk().lock_body();
            body.filled = true;
            body.loaded = true;
            body.conversion.mark_complete();
        }
        Some(reason)
    }

    /// Run up to `max` queued loads. Returns the chunks loaded.
    ///
    /// Stops early if storage reports busy; that load stays at the front.
    pub fn process_load_queue(&self, rt: &mut dyn RealtimeService, max: usize) -> usize {
        let mut completed = 0;
        while completed < max {
            let Some(load) = self.shared.state.lock().load_queue.pop_front() else {
                break;
            };
            let Some(_reason) = self.shared.add_reason_if_bound(load.id(), ReasonClass::Loader)
            else {
                continue;
            };

            match self.shared.load_chunk(load.id(), rt) {
                Ok(true) => completed += 1,
                Ok(false) => {}
                Err(LoadError::Busy) => {
                    self.shared.state.lock().load_queue.push_front(load);
                    break;
                }
                Err(err) => {
                    warn!(chunk = load.id().index(), "queued chunk load failed: {err}");
                    self.shared.metrics.record_load_failure();
                }
            }
        }
        completed
    }
}

impl PoolShared {
    #[inline]
    pub(crate) fn chunk(&self, id: ChunkId) -> &Chunk {
        &self.chunks[id.index()]
    }

    pub(crate) fn add_reason(self: &Arc<Self>, id: ChunkId, class: ReasonClass) -> ChunkReason {
        let mut state = self.state.lock();
        self.add_reason_locked(&mut state, id);
        ChunkReason::from_added(Arc::clone(self), id, class)
    }

    /// Take a reason only if the chunk is still bound to an owner.
    fn add_reason_if_bound(self: &Arc<Self>, id: ChunkId, class: ReasonClass) -> Option<ChunkReason> {
        let mut state = self.state.lock();
        if self.chunk(id).lock_body().owner.is_none() {
            return None;
        }
        self.add_reason_locked(&mut state, id);
        Some(ChunkReason::from_added(Arc::clone(self), id, class))
    }

    fn add_reason_locked(&self, state: &mut PoolState, id: ChunkId) {
        if self.chunk(id).reasons().fetch_add(1, Ordering::AcqRel) == 0 {
            state.dequeue(id);
        }
        self.metrics.record_reason_added();
    }

    pub(crate) fn remove_reason(&self, id: ChunkId, class: ReasonClass) {
        let chunk = self.chunk(id);
        let mut state = self.state.lock();
        let held = chunk.reasons().load(Ordering::Acquire);
        if held == 0 {
            drop(state);
            warn!(chunk = id.index(), ?class, "chunk reason released twice");
            freeze_with_error(InvariantCode::ChunkReasonUnderflow);
            return;
        }
        chunk.reasons().store(held - 1, Ordering::Release);
        self.metrics.record_reason_removed();
        if held == 1 {
            self.park_locked(&mut state, id);
        }
    }

    /// Put an unheld chunk where it belongs: its queue tier or the free list.
    fn park_locked(&self, state: &mut PoolState, id: ChunkId) {
        let mut body = self.chunk(id).lock_body();
        match body.disposition(id) {
            Disposition::Queue(queue) => state.enqueue(id, queue),
            Disposition::Free => {
                body.unbind();
                state.free.push(id);
            }
        }
    }

    /// Link `owner`'s chunk `index`, allocating one if none is linked.
    ///
    /// Returns the reason and whether the chunk was freshly bound.
    fn claim(
        self: &Arc<Self>,
        owner: &ChunkOwner,
        index: usize,
        exclude: Option<OwnerKey>,
        class: ReasonClass,
    ) -> Option<(ChunkReason, bool)> {
        let mut state = self.state.lock();

        if let Some(id) = owner.linked_chunk(index) {
            self.add_reason_locked(&mut state, id);
            self.metrics.record_cache_hit();
            return Some((ChunkReason::from_added(Arc::clone(self), id, class), false));
        }
        self.metrics.record_cache_miss();

        let Some(id) = self.allocate_locked(&mut state, exclude) else {
            drop(state);
            self.metrics.record_allocation_failure();
            warn!(kind = ?owner.kind(), index, "no chunk available");
            return None;
        };

        {
            let mut body = self.chunk(id).lock_body();
            if body.owner.is_some() {
                freeze_with_error(InvariantCode::ChunkAlreadyBound);
            }
            body.bind(owner.clone(), index);
            if let Err(occupant) = owner.link(index, id) {
                if occupant != id {
                    freeze_with_error(InvariantCode::ChunkTableSlotOccupied);
                }
                body.unbind();
                state.free.push(id);
                return None;
            }
        }

        self.add_reason_locked(&mut state, id);
        Some((ChunkReason::from_added(Arc::clone(self), id, class), true))
    }

    fn allocate_locked(&self, state: &mut PoolState, exclude: Option<OwnerKey>) -> Option<ChunkId> {
        if let Some(id) = state.free.pop() {
            return Some(id);
        }
        self.steal_locked(state, exclude)
    }

    /// Take the first stealable chunk, lowest tier first.
    fn steal_locked(&self, state: &mut PoolState, exclude: Option<OwnerKey>) -> Option<ChunkId> {
        self.reclassify_locked(state);
        if let Some(id) = state.free.pop() {
            return Some(id);
        }

        for queue in StealableQueue::ALL {
            let mut position = 0;
            while let Some(&id) = state.queues[queue.index()].get(position) {
                let chunk = self.chunk(id);
                if chunk.num_reasons_to_be_loaded() > 0 {
                    position += 1;
                    continue;
                }
                let Some(mut body) = chunk.try_lock_body() else {
                    position += 1;
                    continue;
                };
                if !Chunk::body_may_be_stolen(&body, exclude) {
                    position += 1;
                    continue;
                }

                state.queues[queue.index()].remove(position);
                state.queued_in[id.index()] = None;

                let index = body.chunk_index;
                let Some(owner) = body.unbind() else {
                    freeze_with_error(InvariantCode::StolenWithoutOwner);
                    return Some(id);
                };
                drop(body);

                let dropped = if owner.linked_chunk(index) == Some(id) {
                    owner.steal(index, id)
                } else {
                    Vec::new()
                };
                self.metrics.record_steal();
                debug!(
                    chunk = id.index(),
                    kind = ?owner.kind(),
                    index,
                    ?queue,
                    "stole chunk"
                );

                for other in dropped {
                    self.release_unlinked_locked(state, other);
                }
                return Some(id);
            }
        }
        None
    }

    /// Move queued chunks whose tier changed since they were parked, and free
    /// those their owner no longer links.
    fn reclassify_locked(&self, state: &mut PoolState) {
        let mut moves: SmallVec<[(ChunkId, Disposition); 16]> = SmallVec::new();
        for queue in StealableQueue::ALL {
            for &id in &state.queues[queue.index()] {
                let Some(mut body) = self.chunk(id).try_lock_body() else {
                    continue;
                };
                let disposition = body.disposition(id);
                if disposition == Disposition::Free {
                    body.unbind();
                }
                if disposition != Disposition::Queue(queue) {
                    moves.push((id, disposition));
                }
            }
        }

        for (id, disposition) in moves {
            state.dequeue(id);
            match disposition {
                Disposition::Queue(queue) => state.enqueue(id, queue),
                Disposition::Free => state.free.push(id),
            }
        }
    }

    /// Free a chunk its owner just unlinked, unless something still holds it.
    fn release_unlinked_locked(&self, state: &mut PoolState, id: ChunkId) {
        let chunk = self.chunk(id);
        if chunk.num_reasons() > 0 {
            return;
        }
        let Some(mut body) = chunk.try_lock_body() else {
            return;
        };
        body.unbind();
        drop(body);
        state.dequeue(id);
        state.free.push(id);
    }

    /// Undo a fresh binding whose load failed. The caller still holds a reason.
    fn unbind(&self, id: ChunkId) {
        let _state = self.state.lock();
        let mut body = self.chunk(id).lock_body();
        let index = body.chunk_index;
        if let Some(owner) = body.unbind() {
            owner.unlink(index, id);
        }
    }

    fn enqueue_load(self: &Arc<Self>, id: ChunkId) {
        let mut state = self.state.lock();
        let chunk = self.chunk(id);
        if chunk.num_reasons_to_be_loaded() > 0 {
            return;
        }
        chunk.reasons_to_be_loaded().fetch_add(1, Ordering::AcqRel);
        state.load_queue.push_back(LoadReason::new(Arc::downgrade(self), id));
        self.metrics.record_load_enqueued();
    }

    /// Fill a bound raw data chunk from storage, then convert it.
    ///
    /// `Ok(false)` if it was already filled or is no longer bound to a sample.
    /// A filled chunk still gets any outstanding conversion.
    fn load_chunk(&self, id: ChunkId, rt: &mut dyn RealtimeService) -> std::result::Result<bool, LoadError> {
        let chunk = self.chunk(id);
        let (sample, filled) = {
            let body = chunk.lock_body();
            if body.loaded || body.converting {
                return Ok(false);
            }
            let sample = match &body.owner {
                Some(ChunkOwner::Sample(sample)) => sample.upgrade(),
                _ => None,
            };
            (sample, body.filled)
        };
        let Some(sample) = sample else {
            return Ok(false);
        };
        if filled {
            self.convert_chunk(id, rt);
            return Ok(false);
        }
        let key = OwnerKey::sample(&sample);

        let index = {
            let mut loader = self.loader.lock();
            let mut body = chunk.lock_body();
            let index = body.chunk_index;
            if body.filled || !body.is_bound_to(key, index) {
                return Ok(false);
            }
            let request = LoadRequest {
                sample: &sample,
                chunk_index: index,
                byte_offset: self.layout.chunk_start(index),
            };
            loader.load_chunk(&request, &mut body.data)?;
            body.mark_filled();
            index
        };

        self.metrics.record_load(self.layout.size() as u64);
        debug!(path = %sample.path().display(), index, chunk = id.index(), "chunk loaded");
        self.convert_chunk(id, rt);
        Ok(true)
    }

    /// Convert a filled raw data chunk in place, then any boundary units it
    /// shares with filled neighbours. Repeat calls do nothing.
    ///
    /// The body lock is taken per quantum and is never held across
    /// `rt.service()`. The chunk reports loaded once its interior is done.
    pub(crate) fn convert_chunk(&self, id: ChunkId, rt: &mut dyn RealtimeService) {
        let chunk = self.chunk(id);
        let (sample, index, format, geometry, interior) = {
            let mut guard = chunk.lock_body();
            let body = &mut *guard;
            if !body.filled || body.converting || body.conversion.is_complete() {
                return;
            }

            let sample = match &body.owner {
                Some(ChunkOwner::Sample(sample)) => sample.upgrade(),
                Some(_) => {
                    body.conversion.mark_complete();
                    body.loaded = true;
                    return;
                }
                None => return,
            };
            let Some(sample) = sample else {
                return;
            };

            let format = sample.raw_data_format();
            let index = body.chunk_index;
            let geometry = ChunkGeometry::for_chunk(
                index,
                self.layout,
                sample.audio_data_start(),
                sample.audio_data_length(),
                format,
            )
            .filter(|_| format.needs_conversion());
            let Some(geometry) = geometry else {
                body.conversion.mark_complete();
                body.loaded = true;
                return;
            };

            let interior = !body.conversion.converted;
            body.converting = interior;
            (sample, index, format, geometry, interior)
        };
        let key = OwnerKey::sample(&sample);

        let mut units = 0;
        if interior {
            let quantum = quantum_bytes(format);
            let mut offset = geometry.whole.start;
            loop {
                let end = (offset + quantum).min(geometry.whole.end);
                {
                    let mut body = chunk.lock_body();
                    // Rebinding clears `converting` and abandons the pass
                    if !body.converting || !body.is_bound_to(key, index) {
                        return;
                    }
                    units += convert_units(&mut body.data[offset..end], format);
                }
                offset = end;
                if offset >= geometry.whole.end {
                    break;
                }
                rt.service();
            }
        }

        let mut guard = chunk.lock_body();
        let body = &mut *guard;
        if interior {
            if !body.converting || !body.is_bound_to(key, index) {
                return;
            }
            body.converting = false;
            body.loaded = true;
            body.conversion.converted = true;
            if geometry.head.is_none() {
                body.conversion.head_converted = true;
            }
            if geometry.tail.is_none() {
                body.conversion.tail_converted = true;
            }
            self.metrics.record_conversion();
            debug!(chunk = id.index(), index, units, ?format, "chunk converted");
        } else if !body.is_bound_to(key, index) {
            return;
        }

        if let Some(straddle) = geometry.head.filter(|_| !body.conversion.head_converted) {
            let prev = index.checked_sub(1).and_then(|i| sample.chunk_id(i));
            if let Some(mut prev) = prev.and_then(|p| self.chunk(p).try_lock_body()) {
                if prev.filled && prev.is_bound_to(key, index - 1) {
                    let prev = &mut *prev;
                    complete_boundary(
                        format,
                        straddle,
                        &mut prev.conversion,
                        &mut prev.data,
                        &mut body.conversion,
                        &mut body.data,
                    );
                }
            }
        }

        if let Some(straddle) = geometry.tail.filter(|_| !body.conversion.tail_converted) {
            let next = sample.chunk_id(index + 1);
            if let Some(mut next) = next.and_then(|n| self.chunk(n).try_lock_body()) {
                if next.filled && next.is_bound_to(key, index + 1) {
                    let next = &mut *next;
                    complete_boundary(
                        format,
                        straddle,
                        &mut body.conversion,
                        &mut body.data,
                        &mut next.conversion,
                        &mut next.data,
                    );
                }
            }
        }
    }
}
