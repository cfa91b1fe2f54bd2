//! Budgeted draining of the image queue into the back store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::cache::double_buffer::{DoubleBuffer, UploadTarget};
use crate::cache::queue::BoundedQueue;
use crate::error::Error;
use crate::events::Image;

/// The one place the cache touches GPU state.
pub trait ShardUploader {
    /// Copy `image` into array layer `target.slot` of shard `target.shard`
    /// of store `target.buffer`.
    fn upload(&mut self, target: UploadTarget, image: &Image) -> Result<(), Error>;
}

impl<F> ShardUploader for F
where
    F: FnMut(UploadTarget, &Image) -> Result<(), Error>,
{
    fn upload(&mut self, target: UploadTarget, image: &Image) -> Result<(), Error> {
        self(target, image)
    }
}

/// Bookkeeping kept per ring slot; pixels live on the upload side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    /// Admission order, starting at zero.
    pub sequence: u64,
    pub origin: Arc<str>,
}

/// Outcome of one upload pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: usize,
    pub failed: usize,
    pub dropped: usize,
    pub swapped: bool,
    /// Copies into the demoted store that the backend rejected.
    pub replay_failed: usize,
}

#[derive(Debug)]
struct PendingUpload {
    image: Image,
    attempts: u32,
}

/// Drains the queue into the back store, at most `max_per_tick` attempts per
/// tick (0 = unbounded), and swaps only when something was admitted. After a
/// swap the same writes are repeated into the demoted store, so the two
/// stores follow one write sequence and the front lags the writer by exactly
/// one generation.
///
/// An upload is attempted before the ring commits the write, so a rejected
/// image never leaves a slot pointing at undefined content. The rejected
/// image is retried at the head of the line on the next tick, `retries` more
/// times, then dropped.
#[derive(Debug)]
pub struct UploadScheduler {
    max_per_tick: usize,
    retries: u32,
    pending: Option<PendingUpload>,
    next_sequence: u64,
}

impl UploadScheduler {
    pub fn new(max_per_tick: usize, retries: u32) -> Self {
        Self {
            max_per_tick,
            retries,
            pending: None,
            next_sequence: 0,
        }
    }

    /// Whether an image is parked for retry.
    pub fn has_pending_retry(&self) -> bool {
        self.pending.is_some()
    }

    pub fn tick<U>(
        &mut self,
        queue: &BoundedQueue<Image>,
        buffers: &mut DoubleBuffer<SlotEntry>,
        uploader: &mut U,
    ) -> UploadReport
    where
        U: ShardUploader + ?Sized,
    {
        let mut report = UploadReport::default();
        let mut attempts = 0usize;
        let mut committed: Vec<(SlotEntry, Image)> = Vec::new();

        while self.max_per_tick == 0 || attempts < self.max_per_tick {
            let (image, prior_attempts) = match self.pending.take() {
                Some(PendingUpload { image, attempts }) => (image, attempts),
                None => match queue.try_pop() {
                    Some(image) => (image, 0),
                    None => break,
                },
            };
            attempts += 1;

            let target = buffers.next_back_target();
            match uploader.upload(target, &image) {
                Ok(()) => {
                    trace!(%target, origin = %image.origin, sequence = self.next_sequence, "uploaded");
                    let entry = SlotEntry {
                        sequence: self.next_sequence,
                        origin: Arc::clone(&image.origin),
                    };
                    buffers.back_store_mut().write(entry.clone());
                    committed.push((entry, image));
                    self.next_sequence += 1;
                    report.uploaded += 1;
                }
                Err(err) => {
                    report.failed += 1;
                    let attempts = prior_attempts + 1;
                    if attempts > self.retries {
                        warn!(%target, origin = %image.origin, attempts, error = %err, "upload failed; dropping image");
                        report.dropped += 1;
                    } else {
                        warn!(%target, origin = %image.origin, attempts, error = %err, "upload failed; retrying next tick");
                        self.pending = Some(PendingUpload { image, attempts });
                        break;
                    }
                }
            }
        }

        if !committed.is_empty() {
            buffers.swap();
            report.swapped = true;
            report.replay_failed = replay(committed, buffers, uploader);
        }
        report
    }
}

/// Bring the demoted store level with the new front by repeating this
/// generation's writes in order. Both stores then hold the same entries at
/// the same slots. A failed copy still commits the entry so the cursors stay
/// aligned; that layer keeps its previous pixels until it is overwritten.
fn replay<U>(
    committed: Vec<(SlotEntry, Image)>,
    buffers: &mut DoubleBuffer<SlotEntry>,
    uploader: &mut U,
) -> usize
where
    U: ShardUploader + ?Sized,
{
    let mut failed = 0;
    for (entry, image) in committed {
        let target = buffers.next_back_target();
        if let Err(err) = uploader.upload(target, &image) {
            warn!(%target, origin = %image.origin, error = %err, "replay into demoted store failed");
            failed += 1;
        }
        buffers.back_store_mut().write(entry);
    }
    failed
}

/// Host-memory stand-in for GPU shard storage.
///
/// Keeps one pixel buffer per written layer so the presentation side can be
/// inspected without a device.
#[derive(Debug, Default)]
pub struct CpuMirror {
    size: Option<(u32, u32)>,
    layers: HashMap<UploadTarget, Image>,
    uploads: u64,
}

impl CpuMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject images that are not exactly `width` x `height`.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            size: Some((width, height)),
            ..Self::default()
        }
    }

    pub fn layer(&self, target: UploadTarget) -> Option<&Image> {
        self.layers.get(&target)
    }

    pub fn uploads(&self) -> u64 {
        self.uploads
    }
}

impl ShardUploader for CpuMirror {
    fn upload(&mut self, target: UploadTarget, image: &Image) -> Result<(), Error> {
        if let Some(expected) = self.size {
            if image.dimensions() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: image.dimensions(),
                });
            }
        }
        let expected_len = image.width as usize * image.height as usize * 4;
        if image.pixels.len() != expected_len {
            return Err(Error::Upload {
                target,
                reason: format!(
                    "pixel buffer holds {} bytes, expected {expected_len}",
                    image.pixels.len()
                ),
            });
        }
        self.layers.insert(target, image.clone());
        self.uploads += 1;
        Ok(())
    }
}
