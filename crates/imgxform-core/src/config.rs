//! Tunables shared by the codecs and the orchestrator.

use serde::{Deserialize, Serialize};

use crate::format::Quality;
use crate::types::FilterType;

/// Pipeline configuration.
///
/// Fields missing from a serialized config take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Quality used for lossy output when the request names none.
    pub default_quality: Quality,
    /// Resampling filter handed to the resizer when it is initialized.
    pub resize_filter: FilterType,
    /// Apply the EXIF orientation of JPEG sources before resizing.
    pub apply_orientation: bool,
    /// Upper bound on `width * height`. Sources are checked from the header
    /// before pixels are allocated; resize targets are checked after
    /// planning, before the resizer runs.
    pub max_source_pixels: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            default_quality: Quality::DEFAULT,
            resize_filter: FilterType::Lanczos3,
            apply_orientation: false,
            max_source_pixels: 40_000_000,
        }
    }
}
