use std::sync::Arc;

use fast_image_resize as fir;
use image::RgbaImage;

use crate::error::Error;
use crate::events::{Image, RawImage};

/// Decode raw bytes (format sniffed from content) and resample to exactly
/// `target_w` x `target_h` RGBA8.
pub fn decode_to_canonical(raw: &RawImage, target_w: u32, target_h: u32) -> Result<Image, Error> {
    let decoded = image::load_from_memory(&raw.bytes)?.to_rgba8();
    let resized = resize_rgba(&decoded, target_w, target_h)?;
    Ok(Image::new(
        Arc::clone(&raw.origin),
        target_w,
        target_h,
        resized.into_raw(),
    ))
}

pub fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage, Error> {
    if target_w == 0 || target_h == 0 {
        return Err(Error::Resize("resize dimensions must be positive".into()));
    }
    if source.width() == target_w && source.height() == target_h {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .map_err(|err| Error::Resize(format!("invalid source view: {err}")))?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| Error::Resize(err.to_string()))?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| Error::Resize("resized buffer has the wrong length".into()))
}
