//! Target size computation.
//!
//! All functions here are pure and testable without any I/O or images.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::types::Dimensions;

/// A partial target size: zero, one or both edges.
///
/// A zero hint is treated as absent, so `SizeRequest::new(Some(0), None)`
/// requests no resize at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SizeRequest {
    pub width: Option<NonZeroU32>,
    pub height: Option<NonZeroU32>,
}

impl SizeRequest {
    pub fn new(width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            width: width.and_then(NonZeroU32::new),
            height: height.and_then(NonZeroU32::new),
        }
    }

    /// Check if neither edge is requested.
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }
}

/// Compute output dimensions for `request` against a source of `source` size.
///
/// Rules, in order:
/// 1. Both edges requested: returned verbatim, aspect ratio is not enforced.
/// 2. Width only: height follows the source aspect ratio.
/// 3. Height only: width follows the source aspect ratio.
/// 4. Neither: the source dimensions are returned unchanged.
///
/// The derived edge is rounded half away from zero (`f64::round`), so
/// 85.5 becomes 86, and clamped to at least 1 pixel.
///
/// # Errors
///
/// Returns `InvalidSourceDimensions` if the source has a zero edge.
///
/// # Examples
///
/// ```ignore
/// let request = SizeRequest::new(Some(150), None);
/// let target = plan(Dimensions::new(300, 171), &request)?;
/// assert_eq!(target, Dimensions::new(150, 86));
/// ```
pub fn plan(source: Dimensions, request: &SizeRequest) -> Result<Dimensions, TransformError> {
    if source.is_empty() {
        return Err(TransformError::InvalidSourceDimensions {
            width: source.width,
            height: source.height,
        });
    }

    let target = match (request.width, request.height) {
        (Some(width), Some(height)) => Dimensions::new(width.get(), height.get()),
        (Some(width), None) => {
            let height = scale_edge(width.get(), source.width, source.height);
            Dimensions::new(width.get(), height)
        }
        (None, Some(height)) => {
            let width = scale_edge(height.get(), source.height, source.width);
            Dimensions::new(width, height.get())
        }
        (None, None) => source,
    };

    Ok(target)
}

/// Scale `other` by `requested / known`, rounding half away from zero.
fn scale_edge(requested: u32, known: u32, other: u32) -> u32 {
    let scaled = (requested as f64 / known as f64 * other as f64).round();
    // `as` saturates at u32::MAX for absurd ratios
    (scaled as u32).max(1)
}
