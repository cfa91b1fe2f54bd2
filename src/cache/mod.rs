//! Streaming ring-buffer image cache.
//!
//! Producers push decoded [`Image`]s into a [`BoundedQueue`]. Once per render
//! tick, [`WallContext::tick`] drains a bounded number of them into the back
//! half of a [`DoubleBuffer`] through a [`ShardUploader`], swaps if anything
//! landed, and lets the [`TileScheduler`] advance a random share of the tiles
//! whose switch interval elapsed. Everything except the queue is owned by the
//! render thread.

mod double_buffer;
mod queue;
mod ring;
mod tiles;
mod upload;

use std::sync::Arc;
use std::time::Duration;

pub use double_buffer::{DoubleBuffer, UploadTarget};
pub use queue::BoundedQueue;
pub use ring::{RingStore, ShardSlot};
pub use tiles::{Tile, TileScheduler, switch_quota};
pub use upload::{CpuMirror, ShardUploader, SlotEntry, UploadReport, UploadScheduler};

use crate::error::Error;
use crate::events::Image;

/// Plain values the cache is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct WallSettings {
    pub ring_capacity: usize,
    pub shard_capacity: usize,
    pub max_uploads_per_tick: usize,
    pub upload_retries: u32,
    pub switch_interval: Duration,
    pub random_switch_fraction: f32,
    pub tile_count: usize,
    pub tile_shuffle_seed: Option<u64>,
}

impl Default for WallSettings {
    fn default() -> Self {
        Self {
            ring_capacity: 64,
            shard_capacity: 256,
            max_uploads_per_tick: 2,
            upload_retries: 1,
            switch_interval: Duration::from_secs(4),
            random_switch_fraction: 0.25,
            tile_count: 12,
            tile_shuffle_seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub upload: UploadReport,
    /// Tiles that advanced this tick.
    pub switched: Vec<usize>,
}

/// What one tile should draw. `target == None` means the blank placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileView {
    pub tile: usize,
    pub ring_position: usize,
    pub target: Option<UploadTarget>,
}

/// Owns the queue hand-off, both ring stores and the tile schedule.
#[derive(Debug)]
pub struct WallContext {
    images: Arc<BoundedQueue<Image>>,
    buffers: DoubleBuffer<SlotEntry>,
    uploads: UploadScheduler,
    tiles: TileScheduler,
}

impl WallContext {
    /// # Errors
    /// Fails fast when the ring or shard capacity is zero.
    pub fn new(settings: &WallSettings) -> Result<Self, Error> {
        Ok(Self {
            images: Arc::new(BoundedQueue::new()),
            buffers: DoubleBuffer::new(settings.ring_capacity, settings.shard_capacity)?,
            uploads: UploadScheduler::new(settings.max_uploads_per_tick, settings.upload_retries),
            tiles: TileScheduler::new(
                settings.tile_count,
                settings.switch_interval,
                settings.random_switch_fraction,
                settings.tile_shuffle_seed,
            ),
        })
    }

    /// Producer side of the hand-off; clone freely across threads.
    pub fn image_queue(&self) -> Arc<BoundedQueue<Image>> {
        Arc::clone(&self.images)
    }

    /// One render tick: upload under budget, swap if anything landed, then
    /// advance tiles against the (possibly new) front store.
    pub fn tick<U>(&mut self, dt: Duration, uploader: &mut U) -> TickReport
    where
        U: ShardUploader + ?Sized,
    {
        let upload = self.uploads.tick(&self.images, &mut self.buffers, uploader);
        let switched = self.tiles.tick(dt, self.occupancy());
        TickReport { upload, switched }
    }

    /// Front-store destination for a logical ring position.
    pub fn front_slot_for(&self, ring_position: usize) -> Option<UploadTarget> {
        self.buffers.front_slot_for(ring_position)
    }

    pub fn presentation(&self) -> Vec<TileView> {
        self.tiles
            .tiles()
            .iter()
            .enumerate()
            .map(|(tile, state)| TileView {
                tile,
                ring_position: state.ring_position,
                target: self.front_slot_for(state.ring_position),
            })
            .collect()
    }

    /// Rebuild the tile grid; in-flight timers are discarded.
    pub fn resize_grid(&mut self, tile_count: usize) {
        self.tiles.resize(tile_count);
    }

    pub fn occupancy(&self) -> usize {
        self.buffers.front_store().occupancy()
    }

    pub fn capacity(&self) -> usize {
        self.buffers.front_store().capacity()
    }

    pub fn generation(&self) -> u64 {
        self.buffers.swap_count()
    }

    pub fn pending_images(&self) -> usize {
        self.images.len()
    }

    pub fn buffers(&self) -> &DoubleBuffer<SlotEntry> {
        &self.buffers
    }

    pub fn tiles(&self) -> &TileScheduler {
        &self.tiles
    }
}
