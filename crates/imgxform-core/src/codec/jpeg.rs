//! JPEG decoding (with optional EXIF orientation handling) and encoding.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::codecs::jpeg;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use super::{decode_checked, Decode, Encode};
use crate::config::TransformConfig;
use crate::error::TransformError;
use crate::format::{ImageFormat, Quality};
use crate::types::{Orientation, PixelBuffer, CHANNELS};

/// JPEG decoder.
///
/// When `apply_orientation` is set, the EXIF orientation tag is honoured so
/// the decoded buffer is upright and its dimensions are the displayed ones.
#[derive(Debug, Clone)]
pub struct JpegDecoder {
    apply_orientation: bool,
    max_pixels: u64,
}

impl JpegDecoder {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            apply_orientation: config.apply_orientation,
            max_pixels: config.max_source_pixels,
        }
    }
}

impl Decode for JpegDecoder {
    fn format(&self) -> ImageFormat {
        ImageFormat::Jpeg
    }

    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, TransformError> {
        let decoder = jpeg::JpegDecoder::new(Cursor::new(bytes))
            .map_err(|e| TransformError::decode(ImageFormat::Jpeg, e))?;
        let mut img = decode_checked(decoder, ImageFormat::Jpeg, self.max_pixels)?;

        if self.apply_orientation {
            img = apply_orientation(img, extract_orientation(bytes));
        }

        PixelBuffer::from_rgba_image(img.into_rgba8())
    }
}

/// JPEG encoder. Alpha is discarded; JPEG has no transparency.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl Encode for JpegEncoder {
    fn format(&self) -> ImageFormat {
        ImageFormat::Jpeg
    }

    fn encode(
        &self,
        buffer: &PixelBuffer,
        quality: Option<Quality>,
    ) -> Result<Vec<u8>, TransformError> {
        let quality = quality.unwrap_or_default();

        let rgb: Vec<u8> = buffer
            .pixels()
            .chunks_exact(CHANNELS)
            .flat_map(|px| &px[..3])
            .copied()
            .collect();

        let mut out = Vec::new();
        jpeg::JpegEncoder::new_with_quality(&mut out, quality.value())
            .write_image(&rgb, buffer.width(), buffer.height(), ExtendedColorType::Rgb8)
            .map_err(|e| TransformError::encode(ImageFormat::Jpeg, e))?;

        Ok(out)
    }
}

/// Extract EXIF orientation from JPEG bytes.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined.
fn extract_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

/// Apply EXIF orientation transformation to an image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
