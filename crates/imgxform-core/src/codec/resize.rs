//! Resampling using the `image` crate's algorithms.
//!
//! The resizer returns a new `PixelBuffer` and never modifies its input.

use image::{ImageBuffer, Rgba};

use super::Resize;
use crate::error::TransformError;
use crate::types::{Dimensions, FilterType, PixelBuffer, CHANNELS};

/// Resizer bound to one interpolation filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageResizer {
    filter: FilterType,
}

impl ImageResizer {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> FilterType {
        self.filter
    }
}

impl Resize for ImageResizer {
    /// Resize `buffer` to exactly `target`.
    ///
    /// # Errors
    ///
    /// Returns `ResizeFailure` if either target edge is zero.
    fn resize(
        &self,
        buffer: &PixelBuffer,
        target: Dimensions,
    ) -> Result<PixelBuffer, TransformError> {
        if target.is_empty() {
            return Err(TransformError::ResizeFailure(format!(
                "target dimensions {}x{} must be non-zero",
                target.width, target.height
            )));
        }

        // Fast path: if dimensions match, just clone
        if buffer.dimensions() == target {
            return Ok(buffer.clone());
        }

        let view: ImageBuffer<Rgba<u8>, &[u8]> =
            ImageBuffer::from_raw(buffer.width(), buffer.height(), buffer.pixels()).ok_or(
                TransformError::MalformedPixelBuffer {
                    expected: buffer.dimensions().pixel_count() as usize * CHANNELS,
                    actual: buffer.byte_size(),
                },
            )?;

        let resized = image::imageops::resize(
            &view,
            target.width,
            target.height,
            self.filter.to_image_filter(),
        );

        PixelBuffer::from_rgba_image(resized)
    }
}
