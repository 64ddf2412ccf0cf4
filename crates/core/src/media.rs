//! Gallery image preparation: resize if over a threshold, nothing more.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::error::CoreError;

/// Default longest side, in pixels, kept for gallery images.
pub const DEFAULT_MAX_DIMENSION: u32 = 1920;

/// Maximum accepted upload size.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

impl ProcessedImage {
    pub fn extension(&self) -> &'static str {
        extension_for(self.format)
    }

    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

fn extension_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::WebP => "webp",
        _ => "png",
    }
}

/// Decode `bytes`, shrink the image when either side exceeds
/// `max_dimension` (aspect ratio preserved), and re-encode in the source
/// format. Images within bounds are returned byte for byte.
pub fn downscale_if_oversized(bytes: &[u8], max_dimension: u32) -> Result<ProcessedImage, CoreError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "Image exceeds the {} MiB upload limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }

    let format = image::guess_format(bytes)
        .map_err(|_| CoreError::Validation("Unrecognized image format".to_string()))?;
    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP) {
        return Err(CoreError::Validation(format!(
            "Unsupported image format {format:?}. Supported: png, jpeg, webp"
        )));
    }

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| CoreError::Validation(format!("Could not decode image: {e}")))?;
    let (width, height) = decoded.dimensions();

    if width <= max_dimension && height <= max_dimension {
        return Ok(ProcessedImage {
            bytes: bytes.to_vec(),
            format,
            width,
            height,
            resized: false,
        });
    }

    let resized = decoded.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    let resized = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => resized,
    };
    let (new_width, new_height) = resized.dimensions();

    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, format)
        .map_err(|e| CoreError::Internal(format!("Could not encode image: {e}")))?;

    tracing::debug!(
        from_width = width,
        from_height = height,
        to_width = new_width,
        to_height = new_height,
        "Downscaled gallery image"
    );

    Ok(ProcessedImage {
        bytes: out.into_inner(),
        format,
        width: new_width,
        height: new_height,
        resized: true,
    })
}
