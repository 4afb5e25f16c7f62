//! Thumbnail generation.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ColorType;

use crate::error::MediaResult;

/// Thumbnail size and JPEG quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSpec {
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
            quality: 80,
        }
    }
}

/// Scale an encoded frame into a JPEG thumbnail of exactly `spec` size.
///
/// The frame is scaled to cover the box and center-cropped, so frames of any
/// aspect ratio give the same output dimensions.
pub fn make_thumbnail(frame: &[u8], spec: &ThumbnailSpec) -> MediaResult<Vec<u8>> {
    let img = image::load_from_memory(frame)?;
    let thumb = img.resize_to_fill(spec.width, spec.height, FilterType::Triangle).to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, spec.quality.clamp(1, 100)).encode(
        thumb.as_raw(),
        thumb.width(),
        thumb.height(),
        ColorType::Rgb8,
    )?;

    Ok(out)
}

/// Read `(width, height)` from an encoded image header without decoding pixels.
pub fn image_dimensions(bytes: &[u8]) -> MediaResult<(u32, u32)> {
    let reader = image::io::Reader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}
