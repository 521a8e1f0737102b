//! PNG decoding and encoding.

use std::io::Cursor;

use image::codecs::png;
use image::{ExtendedColorType, ImageEncoder};

use super::{decode_checked, Decode, Encode};
use crate::config::TransformConfig;
use crate::error::TransformError;
use crate::format::{ImageFormat, Quality};
use crate::types::PixelBuffer;

#[derive(Debug, Clone)]
pub struct PngDecoder {
    max_pixels: u64,
}

impl PngDecoder {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            max_pixels: config.max_source_pixels,
        }
    }
}

impl Decode for PngDecoder {
    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, TransformError> {
        let decoder = png::PngDecoder::new(Cursor::new(bytes))
            .map_err(|e| TransformError::decode(ImageFormat::Png, e))?;
        let img = decode_checked(decoder, ImageFormat::Png, self.max_pixels)?;

        PixelBuffer::from_rgba_image(img.into_rgba8())
    }
}

/// Lossless PNG encoder. Quality has no meaning here and is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder;

impl Encode for PngEncoder {
    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    fn encode(
        &self,
        buffer: &PixelBuffer,
        _quality: Option<Quality>,
    ) -> Result<Vec<u8>, TransformError> {
        let mut out = Vec::new();
        png::PngEncoder::new(&mut out)
            .write_image(
                buffer.pixels(),
                buffer.width(),
                buffer.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| TransformError::encode(ImageFormat::Png, e))?;

        Ok(out)
    }
}
