use std::sync::Arc;

/// Undecoded bytes handed to the ingest pipeline by a feeder.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Where the bytes came from (file name, generator label); used for logging.
    pub origin: Arc<str>,
    pub bytes: Vec<u8>,
}

impl RawImage {
    pub fn new(origin: impl Into<Arc<str>>, bytes: Vec<u8>) -> Self {
        Self {
            origin: origin.into(),
            bytes,
        }
    }
}

/// An RGBA8 image at the canonical wall size, ready for GPU upload.
///
/// Produced by the decode step, moved through the queue and then into the
/// upload path; it is never aliased once admitted.
#[derive(Debug, Clone)]
pub struct Image {
    pub origin: Arc<str>,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Image {
    pub fn new(origin: impl Into<Arc<str>>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            origin: origin.into(),
            width,
            height,
            pixels,
        }
    }

    /// A single-color image, handy for placeholders and tests.
    pub fn solid(origin: impl Into<Arc<str>>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(origin, width, height, pixels)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
