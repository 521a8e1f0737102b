//! Codec capabilities and their built-in implementations.
//!
//! This module provides:
//! - The [`Decode`], [`Encode`] and [`Resize`] capability traits
//! - Decoders and encoders for JPEG, PNG and WebP
//! - A resizer backed by `image::imageops`
//!
//! # Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image` crate decoders |
//! | EXIF orientation | `kamadak-exif` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP (lossy) | `webp` crate (libwebp) |
//! | Resize | `image::imageops::resize` |
//!
//! Capabilities are created by the registry on first use and then shared by
//! every request, so implementations hold configuration only, never
//! per-request state.

mod jpeg;
mod png;
mod resize;
mod webp;

use std::sync::Arc;

use image::{DynamicImage, ImageDecoder};

use crate::config::TransformConfig;
use crate::error::TransformError;
use crate::format::{ImageFormat, Quality};
use crate::types::{Dimensions, PixelBuffer};

pub use self::jpeg::{JpegDecoder, JpegEncoder};
pub use self::png::{PngDecoder, PngEncoder};
pub use self::resize::ImageResizer;
pub use self::webp::{WebpDecoder, WebpEncoder};

/// Turns encoded bytes of one format into a [`PixelBuffer`].
pub trait Decode: Send + Sync {
    fn format(&self) -> ImageFormat;

    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, TransformError>;
}

/// Turns a [`PixelBuffer`] into encoded bytes of one format.
pub trait Encode: Send + Sync {
    fn format(&self) -> ImageFormat;

    /// Encode `buffer`. `quality` is `None` for lossless formats; lossy
    /// encoders fall back to [`Quality::DEFAULT`].
    fn encode(&self, buffer: &PixelBuffer, quality: Option<Quality>)
        -> Result<Vec<u8>, TransformError>;
}

/// Resamples a [`PixelBuffer`] to new dimensions.
pub trait Resize: Send + Sync {
    fn resize(&self, buffer: &PixelBuffer, target: Dimensions)
        -> Result<PixelBuffer, TransformError>;
}

pub type DecoderHandle = Arc<dyn Decode>;
pub type EncoderHandle = Arc<dyn Encode>;
pub type ResizerHandle = Arc<dyn Resize>;

/// Build the built-in decoder for `format`.
pub fn decoder_for(format: ImageFormat, config: &TransformConfig) -> DecoderHandle {
    match format {
        ImageFormat::Jpeg => Arc::new(JpegDecoder::new(config)),
        ImageFormat::Png => Arc::new(PngDecoder::new(config)),
        ImageFormat::WebP => Arc::new(WebpDecoder::new(config)),
    }
}

/// Build the built-in encoder for `format`.
pub fn encoder_for(format: ImageFormat) -> EncoderHandle {
    match format {
        ImageFormat::Jpeg => Arc::new(JpegEncoder),
        ImageFormat::Png => Arc::new(PngEncoder),
        ImageFormat::WebP => Arc::new(WebpEncoder),
    }
}

/// Check header dimensions against the pixel limit, then decode.
///
/// Runs before any pixel allocation so oversized sources are rejected
/// cheaply.
pub(crate) fn decode_checked(
    decoder: impl ImageDecoder,
    format: ImageFormat,
    max_pixels: u64,
) -> Result<DynamicImage, TransformError> {
    let (width, height) = decoder.dimensions();
    let dims = Dimensions::new(width, height);

    if dims.is_empty() {
        return Err(TransformError::InvalidSourceDimensions { width, height });
    }
    if dims.pixel_count() > max_pixels {
        return Err(TransformError::SourceTooLarge {
            pixels: dims.pixel_count(),
            limit: max_pixels,
        });
    }

    DynamicImage::from_decoder(decoder).map_err(|e| TransformError::decode(format, e))
}
