//! Fixed-capacity circular store, sharded to respect a per-shard layer limit.

use crate::error::Error;

/// Location of a ring slot inside its shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardSlot {
    pub shard: usize,
    pub slot: usize,
}

/// A circular buffer of `capacity` slots split into shards of at most
/// `shard_capacity` slots each. Once full, every write overwrites the oldest
/// entry (FIFO eviction).
#[derive(Debug, Clone)]
pub struct RingStore<T> {
    slots: Vec<Option<T>>,
    shard_capacity: usize,
    write_cursor: usize,
    display_cursor: usize,
    occupancy: usize,
}

impl<T> RingStore<T> {
    /// # Errors
    /// Returns [`Error::ZeroCapacity`] or [`Error::ZeroShardCapacity`] when
    /// either dimension is zero.
    pub fn new(capacity: usize, shard_capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        if shard_capacity == 0 {
            return Err(Error::ZeroShardCapacity);
        }
        Ok(Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            shard_capacity,
            write_cursor: 0,
            display_cursor: 0,
            occupancy: 0,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub const fn shard_capacity(&self) -> usize {
        self.shard_capacity
    }

    #[must_use]
    pub const fn occupancy(&self) -> usize {
        self.occupancy
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.occupancy == self.capacity()
    }

    #[must_use]
    pub const fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    /// Global index of the oldest retained entry.
    #[must_use]
    pub const fn display_cursor(&self) -> usize {
        self.display_cursor
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.capacity().div_ceil(self.shard_capacity)
    }

    /// Number of slots in `shard`; only the last shard can be short.
    #[must_use]
    pub fn shard_len(&self, shard: usize) -> usize {
        let start = shard * self.shard_capacity;
        self.capacity()
            .saturating_sub(start)
            .min(self.shard_capacity)
    }

    /// Map a global ring index to its shard and slot.
    #[must_use]
    pub const fn locate(&self, global: usize) -> ShardSlot {
        ShardSlot {
            shard: global / self.shard_capacity,
            slot: global % self.shard_capacity,
        }
    }

    /// Where the next [`write`](Self::write) will land.
    #[must_use]
    pub const fn next_slot(&self) -> ShardSlot {
        self.locate(self.write_cursor)
    }

    /// Store `entry` at the write cursor and advance it, evicting the oldest
    /// entry once the ring is full. Returns the slot that was written.
    pub fn write(&mut self, entry: T) -> ShardSlot {
        let target = self.next_slot();
        let capacity = self.capacity();
        self.slots[self.write_cursor] = Some(entry);
        self.write_cursor = (self.write_cursor + 1) % capacity;
        if self.occupancy == capacity {
            self.display_cursor = (self.display_cursor + 1) % capacity;
        } else {
            self.occupancy += 1;
        }
        target
    }

    /// Entry stored at a global index.
    #[must_use]
    pub fn get(&self, global: usize) -> Option<&T> {
        self.slots.get(global).and_then(Option::as_ref)
    }

    /// Global index for a logical history position, where position 0 is the
    /// oldest retained entry. Positions wrap modulo the current occupancy;
    /// `None` when the ring is empty.
    #[must_use]
    pub fn global_index(&self, position: usize) -> Option<usize> {
        if self.occupancy == 0 {
            return None;
        }
        Some((self.display_cursor + position % self.occupancy) % self.capacity())
    }

    #[must_use]
    pub fn slot_for(&self, position: usize) -> Option<ShardSlot> {
        self.global_index(position).map(|global| self.locate(global))
    }

    #[must_use]
    pub fn entry_for(&self, position: usize) -> Option<&T> {
        self.global_index(position).and_then(|global| self.get(global))
    }

    /// Retained entries from oldest to newest.
    pub fn iter_history(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.occupancy).filter_map(move |pos| self.entry_for(pos))
    }
}
