use std::fmt;

use tracing::debug;

use crate::cache::ring::{RingStore, ShardSlot};
use crate::error::Error;

/// Fully qualified GPU destination of a ring slot: which of the two stores,
/// which shard texture, which array layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadTarget {
    pub buffer: usize,
    pub shard: usize,
    pub slot: usize,
}

impl UploadTarget {
    pub const fn new(buffer: usize, at: ShardSlot) -> Self {
        Self {
            buffer,
            shard: at.shard,
            slot: at.slot,
        }
    }
}

impl fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer {} shard {} slot {}", self.buffer, self.shard, self.slot)
    }
}

/// Two ring stores plus the index saying which one is safe to read.
///
/// The back store is the only write target. [`swap`](Self::swap) promotes it
/// to front and does nothing else: the demoted store still holds the previous
/// generation until its owner repeats the new writes into it (see
/// [`UploadScheduler`](crate::cache::UploadScheduler)).
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    stores: [RingStore<T>; 2],
    front: usize,
    swaps: u64,
}

impl<T> DoubleBuffer<T> {
    pub fn new(capacity: usize, shard_capacity: usize) -> Result<Self, Error> {
        Ok(Self {
            stores: [
                RingStore::new(capacity, shard_capacity)?,
                RingStore::new(capacity, shard_capacity)?,
            ],
            front: 0,
            swaps: 0,
        })
    }

    #[must_use]
    pub const fn front_index(&self) -> usize {
        self.front
    }

    #[must_use]
    pub const fn back_index(&self) -> usize {
        1 - self.front
    }

    #[must_use]
    pub fn front_store(&self) -> &RingStore<T> {
        &self.stores[self.front]
    }

    #[must_use]
    pub fn back_store(&self) -> &RingStore<T> {
        &self.stores[self.back_index()]
    }

    pub fn back_store_mut(&mut self) -> &mut RingStore<T> {
        let back = self.back_index();
        &mut self.stores[back]
    }

    /// Store by buffer index (0 or 1), regardless of its current role.
    #[must_use]
    pub fn store(&self, buffer: usize) -> Option<&RingStore<T>> {
        self.stores.get(buffer)
    }

    /// Promote the back store. Callers must have finished this tick's writes.
    pub fn swap(&mut self) {
        self.front = self.back_index();
        self.swaps += 1;
        debug!(
            front = self.front,
            generation = self.swaps,
            occupancy = self.front_store().occupancy(),
            "double buffer swapped"
        );
    }

    /// Number of swaps so far; doubles as the front generation number.
    #[must_use]
    pub const fn swap_count(&self) -> u64 {
        self.swaps
    }

    /// Destination for the next write into the back store.
    #[must_use]
    pub fn next_back_target(&self) -> UploadTarget {
        UploadTarget::new(self.back_index(), self.back_store().next_slot())
    }

    /// Front-store destination for a logical ring position.
    #[must_use]
    pub fn front_slot_for(&self, position: usize) -> Option<UploadTarget> {
        self.front_store()
            .slot_for(position)
            .map(|at| UploadTarget::new(self.front, at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_flips_roles() {
        let mut db = DoubleBuffer::new(3, 2).unwrap();
        assert_eq!(db.front_index(), 0);
        db.back_store_mut().write("x");
        assert_eq!(db.front_store().occupancy(), 0);
        db.swap();
        assert_eq!(db.front_index(), 1);
        assert_eq!(db.front_store().occupancy(), 1);
        assert_eq!(db.back_store().occupancy(), 0);
        assert_eq!(db.swap_count(), 1);
    }

    #[test]
    fn swap_does_not_copy_entries() {
        let mut db = DoubleBuffer::new(2, 2).unwrap();
        db.back_store_mut().write(1);
        db.swap();
        db.back_store_mut().write(2);
        db.swap();
        // swap alone does not copy; the demoted store lags until caught up
        assert_eq!(db.front_index(), 0);
        assert_eq!(db.front_store().iter_history().copied().collect::<Vec<_>>(), vec![2]);
        db.back_store_mut().write(3);
        assert_eq!(db.back_store().iter_history().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn front_view_is_stable_until_swap() {
        let mut db = DoubleBuffer::new(4, 2).unwrap();
        db.back_store_mut().write('a');
        db.swap();
        let before = db.front_slot_for(0);
        db.back_store_mut().write('b');
        db.back_store_mut().write('c');
        assert_eq!(db.front_slot_for(0), before);
        assert_eq!(db.front_store().occupancy(), 1);
        db.swap();
        assert_eq!(db.front_index(), 0);
        assert_eq!(db.front_store().occupancy(), 2);
    }

    #[test]
    fn targets_name_the_right_buffer() {
        let mut db = DoubleBuffer::new(4, 2).unwrap();
        assert_eq!(db.next_back_target(), UploadTarget { buffer: 1, shard: 0, slot: 0 });
        db.back_store_mut().write(());
        db.back_store_mut().write(());
        db.back_store_mut().write(());
        assert_eq!(db.next_back_target(), UploadTarget { buffer: 1, shard: 1, slot: 1 });
        db.swap();
        assert_eq!(db.front_slot_for(2), Some(UploadTarget { buffer: 1, shard: 1, slot: 0 }));
        assert_eq!(db.next_back_target(), UploadTarget { buffer: 0, shard: 0, slot: 0 });
    }
}
