//! Error taxonomy for the transformation pipeline.

use std::fmt;

use thiserror::Error;

use crate::format::ImageFormat;

/// A lazily-initialized codec capability, one per registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Decoder for the given format.
    Decode(ImageFormat),
    /// Encoder for the given format.
    Encode(ImageFormat),
    /// The format-independent resampler.
    Resize,
}

impl Capability {
    /// Every registry slot: three decoders, three encoders and the resizer.
    pub const ALL: [Capability; 7] = [
        Capability::Decode(ImageFormat::Jpeg),
        Capability::Decode(ImageFormat::Png),
        Capability::Decode(ImageFormat::WebP),
        Capability::Encode(ImageFormat::Jpeg),
        Capability::Encode(ImageFormat::Png),
        Capability::Encode(ImageFormat::WebP),
        Capability::Resize,
    ];

    /// The format this capability is bound to, if any.
    pub fn format(self) -> Option<ImageFormat> {
        match self {
            Capability::Decode(format) | Capability::Encode(format) => Some(format),
            Capability::Resize => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Decode(format) => write!(f, "{format} decoder"),
            Capability::Encode(format) => write!(f, "{format} encoder"),
            Capability::Resize => f.write_str("resizer"),
        }
    }
}

/// Errors produced by any stage of a transform call.
///
/// Every variant aborts the call; no partial output is ever returned.
/// The type is `Clone` so that a failed slot initialization can be handed
/// to every request that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// The input bytes carry no recognised image signature.
    #[error("Unsupported image format")]
    UnsupportedFormat,

    /// A codec capability could not be initialized.
    #[error("{capability} unavailable: {reason}")]
    CodecUnavailable { capability: Capability, reason: String },

    /// The source reports a zero or otherwise unusable dimension.
    #[error("Invalid source dimensions: {width}x{height}")]
    InvalidSourceDimensions { width: u32, height: u32 },

    /// Pixel data length does not match width * height * channels.
    #[error("Malformed pixel buffer: expected {expected} bytes, got {actual}")]
    MalformedPixelBuffer { expected: usize, actual: usize },

    /// The source decodes to more pixels than the configured limit.
    #[error("Source image too large: {pixels} pixels (limit {limit})")]
    SourceTooLarge { pixels: u64, limit: u64 },

    /// The planned output has more pixels than the configured limit.
    #[error("Requested output too large: {pixels} pixels (limit {limit})")]
    TargetTooLarge { pixels: u64, limit: u64 },

    #[error("Failed to decode {format}: {reason}")]
    DecodeFailure { format: ImageFormat, reason: String },

    #[error("Failed to encode {format}: {reason}")]
    EncodeFailure { format: ImageFormat, reason: String },

    #[error("Resize failed: {0}")]
    ResizeFailure(String),
}

impl TransformError {
    /// Whether the same request may succeed if retried later.
    ///
    /// Only codec initialization failures are transient; everything else
    /// depends on the input and will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransformError::CodecUnavailable { .. })
    }

    pub(crate) fn decode(format: ImageFormat, reason: impl ToString) -> Self {
        TransformError::DecodeFailure {
            format,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encode(format: ImageFormat, reason: impl ToString) -> Self {
        TransformError::EncodeFailure {
            format,
            reason: reason.to_string(),
        }
    }
}
