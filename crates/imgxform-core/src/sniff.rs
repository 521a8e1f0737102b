//! Content-based format detection.
//!
//! Only the leading magic bytes are inspected; file names, URLs and declared
//! content types play no part in classification.

use crate::error::TransformError;
use crate::format::ImageFormat;

/// Number of leading bytes examined. Enough for the longest signature we
/// accept (`RIFF????WEBP`).
const SNIFF_PREFIX: usize = 16;

/// Classify raw bytes as one of the supported formats.
///
/// # Errors
///
/// Returns `UnsupportedFormat` for empty or truncated input, unknown content,
/// and formats the `image` crate recognises but this pipeline does not handle.
pub fn detect(raw: &[u8]) -> Result<ImageFormat, TransformError> {
    let prefix = &raw[..raw.len().min(SNIFF_PREFIX)];

    match image::guess_format(prefix) {
        Ok(image::ImageFormat::Jpeg) => Ok(ImageFormat::Jpeg),
        Ok(image::ImageFormat::Png) => Ok(ImageFormat::Png),
        Ok(image::ImageFormat::WebP) => Ok(ImageFormat::WebP),
        Ok(other) => {
            log::debug!("Sniffed unsupported format {:?}", other);
            Err(TransformError::UnsupportedFormat)
        }
        Err(_) => Err(TransformError::UnsupportedFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_detect_jpeg() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        assert_eq!(detect(&bytes), Ok(ImageFormat::Jpeg));
    }

    #[test]
    fn test_detect_png() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
        assert_eq!(detect(&bytes), Ok(ImageFormat::Png));
    }

    #[test]
    fn test_detect_webp() {
        let bytes = b"RIFF\x24\x00\x00\x00WEBPVP8 ";
        assert_eq!(detect(bytes), Ok(ImageFormat::WebP));
    }

    #[test]
    fn test_riff_without_webp_tag_is_unsupported() {
        // WAV files share the RIFF container
        let bytes = b"RIFF\x24\x00\x00\x00WAVEfmt ";
        assert_eq!(detect(bytes), Err(TransformError::UnsupportedFormat));
    }

    #[test]
    fn test_detect_all_zero_bytes() {
        assert_eq!(detect(&[0u8; 64]), Err(TransformError::UnsupportedFormat));
    }

    #[test]
    fn test_detect_empty_and_truncated() {
        assert_eq!(detect(&[]), Err(TransformError::UnsupportedFormat));
        assert_eq!(detect(&[0xFF]), Err(TransformError::UnsupportedFormat));
        assert_eq!(detect(b"RIFF"), Err(TransformError::UnsupportedFormat));
    }

    #[test]
    fn test_detect_other_image_formats_are_unsupported() {
        assert_eq!(detect(b"GIF89a\x01\x00\x01\x00"), Err(TransformError::UnsupportedFormat));
        assert_eq!(detect(b"BM\x00\x00\x00\x00"), Err(TransformError::UnsupportedFormat));
    }

    #[test]
    fn test_detect_ignores_trailing_content() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xDB];
        bytes.extend(std::iter::repeat(0xAB).take(1 << 20));
        assert_eq!(detect(&bytes), Ok(ImageFormat::Jpeg));
    }
}
