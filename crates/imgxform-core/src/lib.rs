//! imgxform Core - On-demand image transformation
//!
//! This crate takes encoded image bytes plus optional width, height, output
//! format and quality, and returns re-encoded bytes. JPEG, PNG and WebP are
//! supported for both input and output.
//!
//! Codecs are initialized lazily by a [`CodecRegistry`] the first time a
//! request needs them and shared by every request after that.

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod plan;
pub mod registry;
pub mod sniff;
pub mod transform;
pub mod types;

pub use config::TransformConfig;
pub use error::{Capability, TransformError};
pub use format::{ImageFormat, Quality};
pub use plan::{plan, SizeRequest};
pub use registry::{BuiltinCodecs, CodecLoader, CodecRegistry, SlotState};
pub use transform::{RawImage, TransformOptions, Transformer};
pub use types::{Dimensions, FilterType, PixelBuffer};
