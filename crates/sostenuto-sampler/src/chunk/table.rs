//! Owner-side chunk tables.

use super::ChunkId;
use parking_lot::Mutex;

/// Maps chunk index to the chunk currently holding that range of an owner's data.
///
/// Linking and unlinking only happen with the pool state locked; lookups may
/// happen from anywhere.
#[derive(Debug)]
pub(crate) struct ChunkTable {
    slots: Mutex<Vec<Option<ChunkId>>>,
}

impl ChunkTable {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; len]),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<ChunkId> {
        self.slots.lock().get(index).copied().flatten()
    }

    /// Link `id` at `index`. Fails with the current occupant if the slot is
    /// taken, or with `id` itself if `index` is out of range.
    pub(crate) fn link(&self, index: usize, id: ChunkId) -> Result<(), ChunkId> {
        let mut slots = self.slots.lock();
        match slots.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(id);
                Ok(())
            }
            Some(Some(existing)) => Err(*existing),
            None => Err(id),
        }
    }

    /// Clear `index` if it holds `id`. Returns whether it did.
    pub(crate) fn unlink(&self, index: usize, id: ChunkId) -> bool {
        let mut slots = self.slots.lock();
        match slots.get_mut(index) {
            Some(slot) if *slot == Some(id) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Clear `index` and every slot after it, returning the chunks linked after `index`.
    pub(crate) fn unlink_from(&self, index: usize) -> Vec<ChunkId> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(index) {
            *slot = None;
        }
        slots
            .iter_mut()
            .skip(index + 1)
            .filter_map(Option::take)
            .collect()
    }

    pub(crate) fn linked_count(&self) -> usize {
        self.slots.lock().iter().filter(|slot| slot.is_some()).count()
    }
}
