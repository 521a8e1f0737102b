//! Lazily-initialized codec capabilities.
//!
//! The registry owns one [`Slot`] per capability (three decoders, three
//! encoders and the resizer). Nothing is constructed until a request first
//! needs it; after that the handle is shared by every request.
//!
//! Construction itself is delegated to a [`CodecLoader`]. Production code
//! uses [`BuiltinCodecs`]; tests substitute a loader that counts calls or
//! fails on demand.

mod slot;

use std::future::Future;
use std::time::Instant;

use crate::codec::{self, DecoderHandle, EncoderHandle, ImageResizer, ResizerHandle};
use crate::config::TransformConfig;
use crate::error::{Capability, TransformError};
use crate::format::ImageFormat;

use self::slot::Slot;
pub use self::slot::SlotState;

/// Builds codec capabilities on behalf of the registry.
///
/// Each method is called at most once per successful initialization; a
/// failure may be followed by another call on a later request.
pub trait CodecLoader: Send + Sync + 'static {
    fn load_decoder(
        &self,
        format: ImageFormat,
    ) -> impl Future<Output = Result<DecoderHandle, TransformError>> + Send;

    fn load_encoder(
        &self,
        format: ImageFormat,
    ) -> impl Future<Output = Result<EncoderHandle, TransformError>> + Send;

    fn load_resizer(&self) -> impl Future<Output = Result<ResizerHandle, TransformError>> + Send;
}

/// Loader for the codecs compiled into this crate.
#[derive(Debug, Clone, Default)]
pub struct BuiltinCodecs {
    config: TransformConfig,
}

impl BuiltinCodecs {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }
}

impl CodecLoader for BuiltinCodecs {
    async fn load_decoder(&self, format: ImageFormat) -> Result<DecoderHandle, TransformError> {
        if !format.to_image_format().reading_enabled() {
            return Err(TransformError::CodecUnavailable {
                capability: Capability::Decode(format),
                reason: "decoder not compiled in".to_string(),
            });
        }
        Ok(codec::decoder_for(format, &self.config))
    }

    async fn load_encoder(&self, format: ImageFormat) -> Result<EncoderHandle, TransformError> {
        // WebP output goes through libwebp, not the image crate's encoder
        if format != ImageFormat::WebP && !format.to_image_format().writing_enabled() {
            return Err(TransformError::CodecUnavailable {
                capability: Capability::Encode(format),
                reason: "encoder not compiled in".to_string(),
            });
        }
        Ok(codec::encoder_for(format))
    }

    async fn load_resizer(&self) -> Result<ResizerHandle, TransformError> {
        Ok(std::sync::Arc::new(ImageResizer::new(self.config.resize_filter)))
    }
}

/// One slot per supported format.
struct FormatSlots<T> {
    jpeg: Slot<T>,
    png: Slot<T>,
    webp: Slot<T>,
}

impl<T: Clone> FormatSlots<T> {
    fn new() -> Self {
        Self {
            jpeg: Slot::new(),
            png: Slot::new(),
            webp: Slot::new(),
        }
    }

    fn get(&self, format: ImageFormat) -> &Slot<T> {
        match format {
            ImageFormat::Jpeg => &self.jpeg,
            ImageFormat::Png => &self.png,
            ImageFormat::WebP => &self.webp,
        }
    }
}

/// Registry of lazily-initialized codec capabilities.
///
/// Safe to share between tasks behind an `Arc`. Concurrent first use of a
/// capability triggers exactly one call into the loader.
pub struct CodecRegistry<L: CodecLoader = BuiltinCodecs> {
    loader: L,
    decoders: FormatSlots<DecoderHandle>,
    encoders: FormatSlots<EncoderHandle>,
    resizer: Slot<ResizerHandle>,
}

impl CodecRegistry<BuiltinCodecs> {
    /// Registry backed by the built-in codecs.
    pub fn builtin(config: TransformConfig) -> Self {
        Self::with_loader(BuiltinCodecs::new(config))
    }
}

impl<L: CodecLoader> CodecRegistry<L> {
    pub fn with_loader(loader: L) -> Self {
        Self {
            loader,
            decoders: FormatSlots::new(),
            encoders: FormatSlots::new(),
            resizer: Slot::new(),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Decoder for `format`, initializing it on first use.
    ///
    /// # Errors
    ///
    /// Returns `CodecUnavailable` if initialization fails. The failure is
    /// not cached beyond the callers already waiting on it.
    pub async fn decoder(&self, format: ImageFormat) -> Result<DecoderHandle, TransformError> {
        let capability = Capability::Decode(format);
        self.decoders
            .get(format)
            .get_or_try_init(|| initialize(capability, self.loader.load_decoder(format)))
            .await
    }

    /// Encoder for `format`, initializing it on first use.
    pub async fn encoder(&self, format: ImageFormat) -> Result<EncoderHandle, TransformError> {
        let capability = Capability::Encode(format);
        self.encoders
            .get(format)
            .get_or_try_init(|| initialize(capability, self.loader.load_encoder(format)))
            .await
    }

    /// The resizer, initializing it on first use.
    pub async fn resizer(&self) -> Result<ResizerHandle, TransformError> {
        self.resizer
            .get_or_try_init(|| initialize(Capability::Resize, self.loader.load_resizer()))
            .await
    }

    /// Current lifecycle state of the slot backing `capability`.
    pub fn slot_state(&self, capability: Capability) -> SlotState {
        match capability {
            Capability::Decode(format) => self.decoders.get(format).state(),
            Capability::Encode(format) => self.encoders.get(format).state(),
            Capability::Resize => self.resizer.state(),
        }
    }
}

/// Run one loader call with logging, tagging any failure with the
/// capability it was for.
async fn initialize<T>(
    capability: Capability,
    load: impl Future<Output = Result<T, TransformError>>,
) -> Result<T, TransformError> {
    log::debug!("Initializing {capability}");
    let start = Instant::now();

    match load.await {
        Ok(handle) => {
            log::debug!("Initialized {capability} in {:?}", start.elapsed());
            Ok(handle)
        }
        Err(error) => {
            log::warn!("Failed to initialize {capability}: {error}");
            Err(match error {
                TransformError::CodecUnavailable { .. } => error,
                other => TransformError::CodecUnavailable {
                    capability,
                    reason: other.to_string(),
                },
            })
        }
    }
}
