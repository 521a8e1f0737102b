//! WebP decoding (`image` crate) and lossy encoding (libwebp via `webp`).

use std::io::Cursor;

use image::codecs::webp::WebPDecoder;

use super::{decode_checked, Decode, Encode};
use crate::config::TransformConfig;
use crate::error::TransformError;
use crate::format::{ImageFormat, Quality};
use crate::types::PixelBuffer;

#[derive(Debug, Clone)]
pub struct WebpDecoder {
    max_pixels: u64,
}

impl WebpDecoder {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            max_pixels: config.max_source_pixels,
        }
    }
}

impl Decode for WebpDecoder {
    fn format(&self) -> ImageFormat {
        ImageFormat::WebP
    }

    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, TransformError> {
        let decoder = WebPDecoder::new(Cursor::new(bytes))
            .map_err(|e| TransformError::decode(ImageFormat::WebP, e))?;
        let img = decode_checked(decoder, ImageFormat::WebP, self.max_pixels)?;

        PixelBuffer::from_rgba_image(img.into_rgba8())
    }
}

/// Lossy WebP encoder.
///
/// The `image` crate only writes lossless WebP, so encoding goes through
/// libwebp to honour the quality setting.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpEncoder;

impl Encode for WebpEncoder {
    fn format(&self) -> ImageFormat {
        ImageFormat::WebP
    }

    fn encode(
        &self,
        buffer: &PixelBuffer,
        quality: Option<Quality>,
    ) -> Result<Vec<u8>, TransformError> {
        let quality = quality.unwrap_or_default();

        let encoded = ::webp::Encoder::from_rgba(buffer.pixels(), buffer.width(), buffer.height())
            .encode_simple(false, quality.value() as f32)
            .map_err(|e| TransformError::encode(ImageFormat::WebP, format!("{e:?}")))?;

        Ok(encoded.to_vec())
    }
}
