use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::codec::ImageHandle;
use crate::error::{EditorError, Result};

pub const THUMB_SIZE: u32 = 150;
pub const THUMB_QUALITY: u8 = 70;

static SUPPORTED_IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif"];

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
        return false;
    };
    exts.iter().any(|known| ext.eq_ignore_ascii_case(known))
}

/// Returns `true` if the path has a supported image extension.
pub fn is_supported_image(path: &Path) -> bool {
    has_extension(path, SUPPORTED_IMAGE_EXTS)
}

/// Encoded preview of a history image.
#[derive(Clone)]
pub struct Thumbnail {
    pub bytes: Arc<[u8]>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Output size for a thumbnail bounded by `max_dimension`.
///
/// Only the larger side is clamped; the other follows the aspect ratio.
/// Images already within the bound keep their size.
pub fn thumbnail_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let scaled = |side: u32, long: u32| {
        ((side as f64 * max_dimension as f64 / long as f64).round() as u32).max(1)
    };
    if width >= height {
        if width > max_dimension {
            return (max_dimension, scaled(height, width));
        }
    } else if height > max_dimension {
        return (scaled(width, height), max_dimension);
    }
    (width, height)
}

/// Produce a JPEG preview of `image` no larger than `max_dimension` on either side.
pub fn generate_thumbnail(image: &ImageHandle, max_dimension: u32) -> Result<Thumbnail> {
    if max_dimension == 0 {
        return Err(EditorError::Validation(
            "thumbnail size must be greater than 0",
        ));
    }
    downscale_and_encode(image.pixels(), max_dimension)
}

fn downscale_and_encode(img: &DynamicImage, max_dimension: u32) -> Result<Thumbnail> {
    let (width, height) = thumbnail_dimensions(img.width(), img.height(), max_dimension);
    let resized = if (width, height) == (img.width(), img.height()) {
        img.to_rgb8()
    } else {
        img.resize_exact(width, height, FilterType::Triangle).to_rgb8()
    };

    // JPEG has no alpha channel.
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), THUMB_QUALITY);
    DynamicImage::ImageRgb8(resized).write_with_encoder(encoder)?;

    Ok(Thumbnail {
        bytes: buf.into(),
        mime: "image/jpeg",
        width,
        height,
    })
}
