use std::ffi::OsStr;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::cache::BoundedQueue;
use crate::config::{ImageSize, SourceConfig};
use crate::events::RawImage;

/// Feed raw image bytes into `raw` until `cancel` fires.
pub async fn run(
    source: SourceConfig,
    size: ImageSize,
    raw: Arc<BoundedQueue<RawImage>>,
    cancel: CancellationToken,
) -> Result<()> {
    match source {
        SourceConfig::Synthetic { interval } => run_synthetic(interval, size, raw, cancel).await,
        SourceConfig::Directory { path, interval } => {
            run_directory(path, interval, raw, cancel).await
        }
    }
}

#[instrument(skip(raw, cancel))]
async fn run_synthetic(
    every: Duration,
    size: ImageSize,
    raw: Arc<BoundedQueue<RawImage>>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut index: u64 = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(generated = index, "cancel received; exiting synthetic source");
                break;
            }
            _ = ticker.tick() => {
                let (w, h) = (size.width, size.height);
                let bytes = tokio::task::spawn_blocking(move || synthetic_card(index, w, h))
                    .await
                    .context("synthetic card task failed")??;
                raw.push(RawImage::new(format!("synthetic-{index}"), bytes));
                index += 1;
            }
        }
    }
    Ok(())
}

#[instrument(skip(root, raw, cancel), fields(root = %root.display()))]
async fn run_directory(
    root: PathBuf,
    every: Duration,
    raw: Arc<BoundedQueue<RawImage>>,
    cancel: CancellationToken,
) -> Result<()> {
    let files = {
        let root = root.clone();
        tokio::task::spawn_blocking(move || scan_directory(&root))
            .await
            .context("directory scan task failed")?
    };
    if files.is_empty() {
        warn!("no images found; directory source idle");
        cancel.cancelled().await;
        return Ok(());
    }
    info!(discovered = files.len(), "startup scan complete (shuffled)");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cursor = files.iter().cycle();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting directory source");
                break;
            }
            _ = ticker.tick() => {
                let Some(path) = cursor.next().cloned() else { break };
                let read = {
                    let path = path.clone();
                    tokio::task::spawn_blocking(move || std::fs::read(path))
                        .await
                        .context("file read task failed")?
                };
                match read {
                    Ok(bytes) => {
                        debug!(path = %path.display(), len = bytes.len(), "replaying");
                        raw.push(RawImage::new(path.display().to_string(), bytes));
                    }
                    Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable file"),
                }
            }
        }
    }
    Ok(())
}

/// Recursively list image files below `root`, shuffled.
pub fn scan_directory(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_image(p))
        .collect();
    files.shuffle(&mut rand::rng());
    files
}

#[inline]
fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "webp", "gif"].contains(&e.as_str())
    )
}

/// A PNG-encoded diagonal gradient between two colors derived from `index`.
pub fn synthetic_card(index: u64, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(index);
    let from: [u8; 3] = rng.random();
    let to: [u8; 3] = rng.random();
    let span = (width + height).saturating_sub(2).max(1) as f32;
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let t = (x + y) as f32 / span;
        let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
        Rgba([mix(from[0], to[0]), mix(from[1], to[1]), mix(from[2], to[2]), 255])
    });
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .context("failed to encode synthetic card")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn synthetic_cards_are_deterministic_pngs() {
        let a = synthetic_card(3, 8, 4).unwrap();
        let b = synthetic_card(3, 8, 4).unwrap();
        assert_eq!(a, b);
        let decoded = image::load_from_memory(&a).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
    }

    #[test]
    fn scan_filters_by_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("a.JPG"), b"x").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("nested").join("b.png"), b"x").unwrap();

        let mut found = scan_directory(root);
        found.sort();
        assert_eq!(found, vec![root.join("a.JPG"), root.join("nested").join("b.png")]);
    }

    #[tokio::test]
    async fn synthetic_source_pushes_until_cancelled() {
        let raw = Arc::new(BoundedQueue::new());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            SourceConfig::Synthetic {
                interval: Duration::from_millis(10),
            },
            ImageSize {
                width: 4,
                height: 4,
            },
            Arc::clone(&raw),
            cancel.clone(),
        ));
        while raw.len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        task.await.unwrap().unwrap();
        let first = raw.try_pop().unwrap();
        assert_eq!(&*first.origin, "synthetic-0");
    }
}
