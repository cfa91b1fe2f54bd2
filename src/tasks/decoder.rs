//! Background decode worker.
//! Pops raw bytes, decodes and resizes them off the render thread, and hands
//! canonical RGBA8 images to the cache queue. Undecodable input is dropped
//! here and never reaches the cache.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cache::BoundedQueue;
use crate::events::{Image, RawImage};
use crate::processing::resize::decode_to_canonical;

#[derive(Debug, Default)]
struct Counters {
    decoded: AtomicU64,
    rejected: AtomicU64,
}

/// Owning handle for the decode thread. Dropping it closes the raw queue and
/// joins the worker.
#[derive(Debug)]
pub struct IngestPipeline {
    raw: Arc<BoundedQueue<RawImage>>,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<()>>,
}

impl IngestPipeline {
    pub fn spawn(target_size: (u32, u32), images: Arc<BoundedQueue<Image>>) -> Result<Self> {
        let raw = Arc::new(BoundedQueue::<RawImage>::new());
        let counters = Arc::new(Counters::default());
        let worker = thread::Builder::new()
            .name("image-decoder".into())
            .spawn({
                let raw = Arc::clone(&raw);
                let counters = Arc::clone(&counters);
                move || decode_loop(&raw, &images, &counters, target_size)
            })
            .context("failed to spawn decoder thread")?;
        info!(
            width = target_size.0,
            height = target_size.1,
            "decoder thread started"
        );
        Ok(Self {
            raw,
            counters,
            worker: Some(worker),
        })
    }

    /// Queue raw bytes for decoding. Never blocks.
    pub fn submit(&self, raw: RawImage) {
        self.raw.push(raw);
    }

    /// Producer handle for feeders running on other threads or tasks.
    pub fn raw_queue(&self) -> Arc<BoundedQueue<RawImage>> {
        Arc::clone(&self.raw)
    }

    pub fn decoded(&self) -> u64 {
        self.counters.decoded.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.counters.rejected.load(Ordering::Relaxed)
    }

    /// Finish the queued work and stop the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.raw.close();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("decoder thread panicked");
            }
        }
    }
}

impl Drop for IngestPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn decode_loop(
    raw: &BoundedQueue<RawImage>,
    images: &BoundedQueue<Image>,
    counters: &Counters,
    (width, height): (u32, u32),
) {
    while let Some(item) = raw.pop_blocking() {
        match decode_to_canonical(&item, width, height) {
            Ok(image) => {
                debug!(origin = %image.origin, "decoded");
                images.push(image);
                counters.decoded.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                warn!(origin = %item.origin, error = %err, "dropping undecodable image");
                counters.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    debug!("decoder thread exiting");
}
