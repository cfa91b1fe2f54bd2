use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::{ImageFormat, Rgba, RgbaImage};
use rust_image_wall::cache::{BoundedQueue, CpuMirror, WallContext, WallSettings};
use rust_image_wall::events::{Image, RawImage};
use rust_image_wall::tasks::decoder::IngestPipeline;

fn png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(w, h, Rgba(rgba));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn wait_for(queue: &BoundedQueue<Image>, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while queue.len() < count {
        assert!(Instant::now() < deadline, "timed out waiting for decoder");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn decodes_resizes_and_drops_garbage() {
    let images = Arc::new(BoundedQueue::new());
    let ingest = IngestPipeline::spawn((8, 6), Arc::clone(&images)).unwrap();

    ingest.submit(RawImage::new("wide.png", png(40, 10, [255, 0, 0, 255])));
    ingest.submit(RawImage::new("broken.jpg", b"\xff\xd8 nope".to_vec()));
    ingest.submit(RawImage::new("tall.png", png(3, 30, [0, 0, 255, 255])));

    wait_for(&images, 2);
    ingest.shutdown();

    let first = images.try_pop().unwrap();
    let second = images.try_pop().unwrap();
    assert!(images.try_pop().is_none());
    assert_eq!(&*first.origin, "wide.png");
    assert_eq!(&*second.origin, "tall.png");
    for img in [&first, &second] {
        assert_eq!(img.dimensions(), (8, 6));
        assert_eq!(img.pixels.len(), 8 * 6 * 4);
    }
}

#[test]
fn counters_track_outcomes() {
    let images = Arc::new(BoundedQueue::new());
    let ingest = IngestPipeline::spawn((4, 4), Arc::clone(&images)).unwrap();
    let raw = ingest.raw_queue();
    let producer = thread::spawn(move || {
        for i in 0..5 {
            raw.push(RawImage::new(format!("ok-{i}"), png(4, 4, [9, 9, 9, 255])));
        }
        raw.push(RawImage::new("junk", vec![0; 16]));
    });
    producer.join().unwrap();
    wait_for(&images, 5);

    let deadline = Instant::now() + Duration::from_secs(10);
    while ingest.rejected() < 1 {
        assert!(Instant::now() < deadline, "junk was never rejected");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(ingest.decoded(), 5);
    assert_eq!(ingest.rejected(), 1);
}

#[test]
fn dropping_the_pipeline_joins_an_idle_worker() {
    let images: Arc<BoundedQueue<Image>> = Arc::new(BoundedQueue::new());
    let ingest = IngestPipeline::spawn((4, 4), Arc::clone(&images)).unwrap();
    let raw = ingest.raw_queue();
    drop(ingest);
    assert!(raw.is_closed());
    assert!(images.is_empty());
}

#[test]
fn decoded_images_flow_into_the_wall() {
    let settings = WallSettings {
        ring_capacity: 4,
        shard_capacity: 2,
        max_uploads_per_tick: 0,
        ..WallSettings::default()
    };
    let mut wall = WallContext::new(&settings).unwrap();
    let ingest = IngestPipeline::spawn((16, 16), wall.image_queue()).unwrap();
    for label in ["a", "b", "c"] {
        ingest.submit(RawImage::new(label, png(5, 5, [1, 2, 3, 255])));
    }
    wait_for(&wall.image_queue(), 3);

    let mut mirror = CpuMirror::with_size(16, 16);
    let report = wall.tick(Duration::from_millis(16), &mut mirror);
    assert_eq!(report.upload.uploaded, 3);
    assert_eq!(wall.occupancy(), 3);
    assert!(wall.presentation().iter().all(|view| view.target.is_some()));
}
